//! Members and the identities that resolve to them.
//!
//! A member is created the first time an external identity is seen. Its
//! hashed key is derived at that moment and stored; it is never recomputed,
//! so a bookmarklet installed once keeps working for the life of the member.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

// ─── ExternalIdentity ────────────────────────────────────────────────────────

/// The stable user id asserted by the external login provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalIdentity(String);

impl ExternalIdentity {
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Err(Error::validation("identity", "must not be empty"));
    }
    Ok(Self(trimmed.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for ExternalIdentity {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<ExternalIdentity> for String {
  fn from(value: ExternalIdentity) -> Self { value.0 }
}

impl fmt::Display for ExternalIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── HashedKey ───────────────────────────────────────────────────────────────

/// Lowercase hex SHA-256 digest of an [`ExternalIdentity`].
///
/// Authenticates the bookmarklet path, which carries no session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashedKey(String);

impl HashedKey {
  const LEN: usize = 64;

  /// One-way derivation. Only called when a member is first created.
  pub fn derive(identity: &ExternalIdentity) -> Self {
    let digest = Sha256::digest(identity.as_str().as_bytes());
    Self(hex::encode(digest))
  }

  pub fn parse(raw: &str) -> Result<Self> {
    let key = raw.trim().to_ascii_lowercase();
    if key.len() != Self::LEN {
      return Err(Error::validation(
        "hashed key",
        format!("expected {} hex characters, got {}", Self::LEN, key.len()),
      ));
    }
    if !key.bytes().all(|b| b.is_ascii_hexdigit()) {
      return Err(Error::validation("hashed key", "not a hex string"));
    }
    Ok(Self(key))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for HashedKey {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<HashedKey> for String {
  fn from(value: HashedKey) -> Self { value.0 }
}

impl fmt::Display for HashedKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Member ──────────────────────────────────────────────────────────────────

/// A resolved identity permitted to donate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
  pub member_id:         Uuid,
  pub external_identity: ExternalIdentity,
  /// Assigned once at creation; immutable afterwards.
  pub hashed_key:        HashedKey,
  pub created_at:        DateTime<Utc>,
}

impl Member {
  /// Build a brand-new member, deriving its hashed key.
  pub fn new(external_identity: ExternalIdentity, now: DateTime<Utc>) -> Self {
    let hashed_key = HashedKey::derive(&external_identity);
    Self {
      member_id: Uuid::new_v4(),
      external_identity,
      hashed_key,
      created_at: now,
    }
  }
}
