//! Beneficiaries, the payees reached through an external pledge platform.
//!
//! Beneficiaries are managed by admins only. Campaigns point at them; deleting
//! one clears those pointers but never removes campaigns or donations.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, member::ExternalIdentity};

// ─── PledgeCampaignId ────────────────────────────────────────────────────────

/// The pledge platform's numeric campaign id. Checkout groups by this value.
///
/// Ids are non-negative and fit in a signed 64-bit integer, the range the
/// pledge platform and SQLite both use.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "RawPledgeId", into = "u64")]
pub struct PledgeCampaignId(u64);

impl PledgeCampaignId {
  pub const MAX: u64 = i64::MAX as u64;

  /// Wraps an id already known to be in range, such as a stored one.
  pub fn new(id: u64) -> Self { Self(id) }

  pub fn try_new(id: u64) -> Result<Self> {
    if id > Self::MAX {
      return Err(Error::validation(
        "pledge campaign id",
        format!("{id} is larger than {}", Self::MAX),
      ));
    }
    Ok(Self(id))
  }

  pub fn get(self) -> u64 { self.0 }
}

impl FromStr for PledgeCampaignId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let id = s.trim().parse::<u64>().map_err(|_| {
      Error::validation("pledge campaign id", format!("{s:?} is not a number"))
    })?;
    Self::try_new(id)
  }
}

impl fmt::Display for PledgeCampaignId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<PledgeCampaignId> for u64 {
  fn from(value: PledgeCampaignId) -> Self { value.0 }
}

/// Wire form of a pledge id: clients send either `42` or `"42"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPledgeId {
  Number(u64),
  Text(String),
}

impl TryFrom<RawPledgeId> for PledgeCampaignId {
  type Error = Error;

  fn try_from(raw: RawPledgeId) -> Result<Self> {
    match raw {
      RawPledgeId::Number(n) => Self::try_new(n),
      RawPledgeId::Text(s) => s.parse(),
    }
  }
}

// ─── PayoutEmail ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayoutEmail(String);

impl PayoutEmail {
  pub fn parse(raw: &str) -> Result<Self> {
    let email = raw.trim();
    match email.split_once('@') {
      Some((local, domain))
        if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
      {
        Ok(Self(email.to_owned()))
      }
      _ => Err(Error::validation("payout email", format!("{email:?} is not an address"))),
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for PayoutEmail {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<PayoutEmail> for String {
  fn from(value: PayoutEmail) -> Self { value.0 }
}

// ─── Beneficiary ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
  pub beneficiary_id:       Uuid,
  pub external_identity:    ExternalIdentity,
  pub payout_email:         PayoutEmail,
  pub pledge_campaign_id:   PledgeCampaignId,
  /// Display name of the pledge-platform campaign.
  pub pledge_platform_name: String,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

/// Validated input for creating or editing a [`Beneficiary`].
#[derive(Debug, Clone)]
pub struct NewBeneficiary {
  pub external_identity:    ExternalIdentity,
  pub payout_email:         PayoutEmail,
  pub pledge_campaign_id:   PledgeCampaignId,
  pub pledge_platform_name: String,
}

impl NewBeneficiary {
  pub fn parse(
    external_identity: &str,
    payout_email: &str,
    pledge_campaign_id: PledgeCampaignId,
    pledge_platform_name: &str,
  ) -> Result<Self> {
    let name = pledge_platform_name.trim();
    if name.is_empty() {
      return Err(Error::validation("pledge platform name", "must not be empty"));
    }
    Ok(Self {
      external_identity: ExternalIdentity::parse(external_identity)?,
      payout_email: PayoutEmail::parse(payout_email)?,
      pledge_campaign_id,
      pledge_platform_name: name.to_owned(),
    })
  }

  pub fn into_beneficiary(self, now: DateTime<Utc>) -> Beneficiary {
    Beneficiary {
      beneficiary_id:       Uuid::new_v4(),
      external_identity:    self.external_identity,
      payout_email:         self.payout_email,
      pledge_campaign_id:   self.pledge_campaign_id,
      pledge_platform_name: self.pledge_platform_name,
      created_at:           now,
      updated_at:           now,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pledge_id_from_number_or_string() {
    let a: PledgeCampaignId = serde_json::from_str("42").unwrap();
    let b: PledgeCampaignId = serde_json::from_str("\"42\"").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "42");
    assert_eq!(serde_json::to_string(&a).unwrap(), "42");
  }

  #[test]
  fn non_numeric_pledge_id_is_a_validation_error() {
    let err = "forty-two".parse::<PledgeCampaignId>().unwrap_err();
    assert!(matches!(err, Error::Validation { field: "pledge campaign id", .. }));
    assert!(serde_json::from_str::<PledgeCampaignId>("\"x1\"").is_err());
  }

  #[test]
  fn pledge_id_must_fit_in_i64() {
    let max = PledgeCampaignId::MAX;
    assert_eq!(max.to_string().parse::<PledgeCampaignId>().unwrap().get(), max);
    assert_eq!(PledgeCampaignId::try_new(max).unwrap().get(), max);

    let over = (max + 1).to_string();
    let err = over.parse::<PledgeCampaignId>().unwrap_err();
    assert!(matches!(err, Error::Validation { field: "pledge campaign id", .. }));
    assert!(serde_json::from_str::<PledgeCampaignId>(&over).is_err());
    assert!(serde_json::from_str::<PledgeCampaignId>(&u64::MAX.to_string()).is_err());
  }

  #[test]
  fn email_validation() {
    assert!(PayoutEmail::parse("payee@example.org").is_ok());
    for bad in ["", "payee", "@example.org", "payee@", "a@b@c"] {
      assert!(PayoutEmail::parse(bad).is_err(), "{bad:?}");
    }
  }

  #[test]
  fn new_beneficiary_requires_name() {
    let err = NewBeneficiary::parse(
      "owner",
      "owner@example.org",
      PledgeCampaignId::new(42),
      "  ",
    )
    .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "pledge platform name", .. }));

    let ok = NewBeneficiary::parse(
      "owner",
      "owner@example.org",
      PledgeCampaignId::new(42),
      " Clean Water ",
    )
    .unwrap();
    assert_eq!(ok.pledge_platform_name, "Clean Water");
  }
}
