//! Tuning knobs for [`crate::SqliteStore`].

use std::time::Duration;

/// How hard a write transaction tries before giving up with
/// [`penny_core::Error::ConcurrencyConflict`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// Total attempts per transaction, including the first.
  pub max_attempts: u32,
  /// Delay before the first retry; doubled on each further retry.
  pub backoff:      Duration,
  /// SQLite `busy_timeout` applied to the connection.
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      backoff:      Duration::from_millis(10),
      busy_timeout: Duration::from_millis(250),
    }
  }
}

impl StoreOptions {
  /// Delay to wait after failed attempt number `attempt` (1-based).
  pub fn delay_after(&self, attempt: u32) -> Duration {
    self.backoff.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles() {
    let opts = StoreOptions::default();
    assert_eq!(opts.delay_after(1), Duration::from_millis(10));
    assert_eq!(opts.delay_after(2), Duration::from_millis(20));
    assert_eq!(opts.delay_after(4), Duration::from_millis(80));
  }
}
