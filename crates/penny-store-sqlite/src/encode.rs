//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order is chronological order. UUIDs are stored as
//! hyphenated lowercase strings. Donation timestamp lists are compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use penny_core::{
  beneficiary::{Beneficiary, PayoutEmail, PledgeCampaignId},
  campaign::{Campaign, CampaignLink},
  donation::Donation,
  member::{ExternalIdentity, HashedKey, Member},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── Counts ──────────────────────────────────────────────────────────────────

pub fn encode_count(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

pub fn decode_count(n: i64) -> Result<u64> {
  u64::try_from(n).map_err(|_| Error::Decode(format!("negative count {n}")))
}

// ─── Pledge ids ──────────────────────────────────────────────────────────────

/// Pledge ids are unique keys, so an out-of-range id is refused rather than
/// clamped.
pub fn encode_pledge_id(id: PledgeCampaignId) -> Result<i64> {
  i64::try_from(id.get()).map_err(|_| {
    Error::Core(penny_core::Error::validation(
      "pledge campaign id",
      format!("{id} is larger than {}", PledgeCampaignId::MAX),
    ))
  })
}

// ─── Timestamp lists ─────────────────────────────────────────────────────────

pub fn encode_timestamps(ts: &[DateTime<Utc>]) -> Result<String> {
  let encoded: Vec<String> = ts.iter().copied().map(encode_dt).collect();
  Ok(serde_json::to_string(&encoded)?)
}

pub fn decode_timestamps(s: &str) -> Result<Vec<DateTime<Utc>>> {
  let raw: Vec<String> = serde_json::from_str(s)?;
  raw.iter().map(|t| decode_dt(t)).collect()
}

// ─── Validated strings ───────────────────────────────────────────────────────

fn decode_with<T>(
  column: &str,
  value: &str,
  parse: impl FnOnce(&str) -> penny_core::Result<T>,
) -> Result<T> {
  parse(value).map_err(|e| Error::Decode(format!("{column}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const MEMBER_COLUMNS: &str =
  "m.member_id, m.external_identity, m.hashed_key, m.created_at";

/// Raw strings read directly from a `members` row.
pub struct RawMember {
  pub member_id:         String,
  pub external_identity: String,
  pub hashed_key:        String,
  pub created_at:        String,
}

impl RawMember {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:         row.get(0)?,
      external_identity: row.get(1)?,
      hashed_key:        row.get(2)?,
      created_at:        row.get(3)?,
    })
  }

  pub fn into_member(self) -> Result<Member> {
    Ok(Member {
      member_id:         decode_uuid(&self.member_id)?,
      external_identity: decode_with(
        "external_identity",
        &self.external_identity,
        ExternalIdentity::parse,
      )?,
      hashed_key:        decode_with("hashed_key", &self.hashed_key, HashedKey::parse)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub const CAMPAIGN_COLUMNS: &str =
  "c.campaign_id, c.link, c.beneficiary_id, c.created_at, c.last_activity_at, c.counter";

/// Raw values read from a `campaigns` row, starting at column `at`.
pub struct RawCampaign {
  pub campaign_id:      String,
  pub link:             String,
  pub beneficiary_id:   Option<String>,
  pub created_at:       String,
  pub last_activity_at: String,
  pub counter:          i64,
}

impl RawCampaign {
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      campaign_id:      row.get(at)?,
      link:             row.get(at + 1)?,
      beneficiary_id:   row.get(at + 2)?,
      created_at:       row.get(at + 3)?,
      last_activity_at: row.get(at + 4)?,
      counter:          row.get(at + 5)?,
    })
  }

  pub fn into_campaign(self) -> Result<Campaign> {
    Ok(Campaign {
      campaign_id:      decode_uuid(&self.campaign_id)?,
      link:             decode_with("link", &self.link, CampaignLink::parse)?,
      beneficiary_id:   self.beneficiary_id.as_deref().map(decode_uuid).transpose()?,
      created_at:       decode_dt(&self.created_at)?,
      last_activity_at: decode_dt(&self.last_activity_at)?,
      counter:          decode_count(self.counter)?,
    })
  }
}

pub const DONATION_COLUMNS: &str =
  "d.member_id, d.campaign_id, d.timestamps, d.unit_count, d.updated_at";

/// Raw values read from a `donations` row, starting at column `at`.
pub struct RawDonation {
  pub member_id:   String,
  pub campaign_id: String,
  pub timestamps:  String,
  pub unit_count:  i64,
  pub updated_at:  String,
}

impl RawDonation {
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:   row.get(at)?,
      campaign_id: row.get(at + 1)?,
      timestamps:  row.get(at + 2)?,
      unit_count:  row.get(at + 3)?,
      updated_at:  row.get(at + 4)?,
    })
  }

  pub fn into_donation(self) -> Result<Donation> {
    let donation = Donation {
      member_id:   decode_uuid(&self.member_id)?,
      campaign_id: decode_uuid(&self.campaign_id)?,
      timestamps:  decode_timestamps(&self.timestamps)?,
      updated_at:  decode_dt(&self.updated_at)?,
    };
    if donation.unit_count() != decode_count(self.unit_count)? {
      return Err(Error::Decode(format!(
        "donation unit_count {} disagrees with {} timestamps",
        self.unit_count,
        donation.unit_count()
      )));
    }
    Ok(donation)
  }
}

pub const BENEFICIARY_COLUMNS: &str = "b.beneficiary_id, b.external_identity, \
  b.payout_email, b.pledge_campaign_id, b.pledge_platform_name, b.created_at, \
  b.updated_at";

/// Raw values read from a `beneficiaries` row.
pub struct RawBeneficiary {
  pub beneficiary_id:       String,
  pub external_identity:    String,
  pub payout_email:         String,
  pub pledge_campaign_id:   i64,
  pub pledge_platform_name: String,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawBeneficiary {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      beneficiary_id:       row.get(0)?,
      external_identity:    row.get(1)?,
      payout_email:         row.get(2)?,
      pledge_campaign_id:   row.get(3)?,
      pledge_platform_name: row.get(4)?,
      created_at:           row.get(5)?,
      updated_at:           row.get(6)?,
    })
  }

  pub fn into_beneficiary(self) -> Result<Beneficiary> {
    Ok(Beneficiary {
      beneficiary_id:       decode_uuid(&self.beneficiary_id)?,
      external_identity:    decode_with(
        "external_identity",
        &self.external_identity,
        ExternalIdentity::parse,
      )?,
      payout_email:         decode_with("payout_email", &self.payout_email, PayoutEmail::parse)?,
      pledge_campaign_id:   PledgeCampaignId::new(decode_count(self.pledge_campaign_id)?),
      pledge_platform_name: self.pledge_platform_name,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}
