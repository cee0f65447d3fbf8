//! Error types for `penny-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("member not found")]
  MemberNotFound,

  #[error("campaign not found: {0}")]
  CampaignNotFound(String),

  #[error("member {member_id} has no donation to {link}")]
  DonationNotFound { member_id: Uuid, link: String },

  #[error("beneficiary not found: {0}")]
  BeneficiaryNotFound(String),

  /// A uniqueness invariant is already broken in the store.
  #[error("found {count} {entity} records for {key:?}")]
  DuplicateIntegrity {
    entity: &'static str,
    key:    String,
    count:  usize,
  },

  #[error("invalid {field}: {reason}")]
  Validation {
    field:  &'static str,
    reason: String,
  },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("transaction abandoned after {attempts} conflicting attempts")]
  ConcurrencyConflict { attempts: u32 },
}

impl Error {
  pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Validation { field, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse error category used by outer layers to pick a response without
/// knowing which backend produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  /// A uniqueness invariant was found broken. Always logged, never shown.
  Integrity,
  Validation,
  Conflict,
  /// Retries exhausted; the caller may try again.
  Transient,
  Internal,
}

/// Implemented by every error type a [`crate::store::LedgerStore`] can return.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::MemberNotFound
      | Self::CampaignNotFound(_)
      | Self::DonationNotFound { .. }
      | Self::BeneficiaryNotFound(_) => ErrorKind::NotFound,
      Self::DuplicateIntegrity { .. } => ErrorKind::Integrity,
      Self::Validation { .. } => ErrorKind::Validation,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::ConcurrencyConflict { .. } => ErrorKind::Transient,
    }
  }
}

/// Collapse the rows returned for a unique key into at most one record.
///
/// More than one row means the store's uniqueness guarantee has been broken.
pub fn at_most_one<T>(
  entity: &'static str,
  key: &str,
  mut rows: Vec<T>,
) -> Result<Option<T>> {
  match rows.len() {
    0 | 1 => Ok(rows.pop()),
    count => Err(Error::DuplicateIntegrity { entity, key: key.to_owned(), count }),
  }
}
