//! Campaigns: the web pages members donate to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// The URL identifying a campaign. Unique across the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CampaignLink(String);

impl CampaignLink {
  pub fn parse(raw: &str) -> Result<Self> {
    let link = raw.trim();
    if link.is_empty() {
      return Err(Error::validation("link", "must not be empty"));
    }
    if link.chars().any(char::is_whitespace) {
      return Err(Error::validation("link", "must not contain whitespace"));
    }
    let rest = link
      .strip_prefix("http://")
      .or_else(|| link.strip_prefix("https://"))
      .ok_or_else(|| Error::validation("link", "must be an http(s) URL"))?;
    if rest.is_empty() || rest.starts_with('/') {
      return Err(Error::validation("link", "missing host"));
    }
    Ok(Self(link.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for CampaignLink {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<CampaignLink> for String {
  fn from(value: CampaignLink) -> Self { value.0 }
}

impl fmt::Display for CampaignLink {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A registered page and its running donation counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
  pub campaign_id:      Uuid,
  pub link:             CampaignLink,
  pub beneficiary_id:   Option<Uuid>,
  pub created_at:       DateTime<Utc>,
  pub last_activity_at: DateTime<Utc>,
  /// Always equal to the sum of unit counts over this campaign's donations.
  pub counter:          u64,
}

impl Campaign {
  pub fn new(link: CampaignLink, now: DateTime<Utc>) -> Self {
    Self {
      campaign_id: Uuid::new_v4(),
      link,
      beneficiary_id: None,
      created_at: now,
      last_activity_at: now,
      counter: 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_http_and_https() {
    assert_eq!(
      CampaignLink::parse(" http://example.com/a ").unwrap().as_str(),
      "http://example.com/a"
    );
    assert!(CampaignLink::parse("https://example.com").is_ok());
  }

  #[test]
  fn rejects_malformed_links() {
    for bad in ["", "example.com", "ftp://example.com", "http://", "http:///x", "http://a b"] {
      let err = CampaignLink::parse(bad).unwrap_err();
      assert!(matches!(err, Error::Validation { field: "link", .. }), "{bad:?}");
    }
  }

  #[test]
  fn new_campaign_starts_empty() {
    let c = Campaign::new(CampaignLink::parse("http://example.com/a").unwrap(), Utc::now());
    assert_eq!(c.counter, 0);
    assert!(c.beneficiary_id.is_none());
    assert_eq!(c.created_at, c.last_activity_at);
  }
}
