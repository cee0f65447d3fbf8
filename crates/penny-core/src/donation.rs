//! Donations and the per-pair state machine.
//!
//! One [`Donation`] exists per (member, campaign) pair. Each unit is one
//! timestamp; the unit count is the length of the timestamp list.
//!
//! ```text
//! NonExistent --donate--> Active(1)
//! Active(n)   --donate--> Active(n + 1)
//! Active(n>1) --undo----> Active(n - 1)
//! Active(1)   --undo----> NonExistent
//! Active(n)   --delete--> NonExistent
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::campaign::Campaign;

// ─── Donation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
  pub member_id:   Uuid,
  pub campaign_id: Uuid,
  /// Append order; the last entry is the most recently added unit.
  pub timestamps:  Vec<DateTime<Utc>>,
  pub updated_at:  DateTime<Utc>,
}

impl Donation {
  /// A donation holding its first unit.
  pub fn first(member_id: Uuid, campaign_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      member_id,
      campaign_id,
      timestamps: vec![now],
      updated_at: now,
    }
  }

  pub fn unit_count(&self) -> u64 { self.timestamps.len() as u64 }

  pub fn last_donated_at(&self) -> Option<DateTime<Utc>> {
    self.timestamps.last().copied()
  }

  /// Append one unit.
  pub fn record(&mut self, now: DateTime<Utc>) {
    self.timestamps.push(now);
    self.updated_at = now;
  }

  /// Remove the most recently added unit and report what remains.
  pub fn undo(mut self, now: DateTime<Utc>) -> DonationState {
    self.timestamps.pop();
    self.updated_at = now;
    DonationState::from_remaining(self)
  }
}

// ─── DonationState ───────────────────────────────────────────────────────────

/// Where a (member, campaign) pair stands after a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DonationState {
  NonExistent,
  Active(Donation),
}

impl DonationState {
  fn from_remaining(donation: Donation) -> Self {
    if donation.timestamps.is_empty() {
      Self::NonExistent
    } else {
      Self::Active(donation)
    }
  }

  pub fn unit_count(&self) -> u64 {
    match self {
      Self::NonExistent => 0,
      Self::Active(d) => d.unit_count(),
    }
  }

  pub fn donation(&self) -> Option<&Donation> {
    match self {
      Self::NonExistent => None,
      Self::Active(d) => Some(d),
    }
  }
}

/// Returned by donate and undo: the pair's new state plus the campaign with
/// its updated counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
  pub campaign: Campaign,
  pub state:    DonationState,
}

// ─── Member listings ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationEntry {
  pub donation: Donation,
  pub campaign: Campaign,
}

/// Everything one member has pledged, most recently touched first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDonations {
  pub member_id:   Uuid,
  pub total_units: u64,
  pub entries:     Vec<DonationEntry>,
}

impl MemberDonations {
  pub fn new(member_id: Uuid, entries: Vec<DonationEntry>) -> Self {
    let total_units = entries.iter().map(|e| e.donation.unit_count()).sum();
    Self { member_id, total_units, entries }
  }
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// A campaign whose stored counter disagreed with its donations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterCorrection {
  pub campaign_id: Uuid,
  pub link:        String,
  pub stored:      u64,
  pub actual:      u64,
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn t(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap() }

  #[test]
  fn record_appends_units() {
    let mut d = Donation::first(Uuid::nil(), Uuid::nil(), t(0));
    for k in 1..=4 {
      d.record(t(k));
    }
    assert_eq!(d.unit_count(), 5);
    assert_eq!(d.last_donated_at(), Some(t(4)));
    assert_eq!(d.updated_at, t(4));
  }

  #[test]
  fn undo_pops_latest_unit() {
    let mut d = Donation::first(Uuid::nil(), Uuid::nil(), t(0));
    d.record(t(10));
    let state = d.undo(t(20));
    let remaining = state.donation().unwrap();
    assert_eq!(remaining.timestamps, vec![t(0)]);
    assert_eq!(remaining.updated_at, t(20));
  }

  #[test]
  fn undo_of_last_unit_is_non_existent() {
    let d = Donation::first(Uuid::nil(), Uuid::nil(), t(0));
    let state = d.undo(t(0) + Duration::seconds(1));
    assert_eq!(state, DonationState::NonExistent);
    assert_eq!(state.unit_count(), 0);
  }

  #[test]
  fn member_totals() {
    let campaign = crate::campaign::Campaign::new(
      crate::campaign::CampaignLink::parse("http://example.com/a").unwrap(),
      t(0),
    );
    let mut two = Donation::first(Uuid::nil(), campaign.campaign_id, t(0));
    two.record(t(1));
    let one = Donation::first(Uuid::nil(), campaign.campaign_id, t(2));
    let listing = MemberDonations::new(Uuid::nil(), vec![
      DonationEntry { donation: two, campaign: campaign.clone() },
      DonationEntry { donation: one, campaign },
    ]);
    assert_eq!(listing.total_units, 3);
  }

  #[test]
  fn state_serialises_with_tag() {
    let json = serde_json::to_value(DonationState::NonExistent).unwrap();
    assert_eq!(json, serde_json::json!({ "state": "non_existent" }));

    let d = Donation::first(Uuid::nil(), Uuid::nil(), t(0));
    let json = serde_json::to_value(DonationState::Active(d)).unwrap();
    assert_eq!(json["state"], "active");
    assert_eq!(json["timestamps"].as_array().unwrap().len(), 1);
  }
}
