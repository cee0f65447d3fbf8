//! Server configuration, read from `config.toml` and `PENNY_*` variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use penny_api::{AdminCredentials, ApiSettings};
use penny_store_sqlite::StoreOptions;
use serde::Deserialize;

/// Runtime server configuration.
///
/// Only the admin credentials are required; everything else has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  /// Public origin, used in the bookmarklet.
  #[serde(default = "default_base_url")]
  pub base_url:               String,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  pub admin_username:         String,
  pub admin_password_hash:    String,
  #[serde(default = "default_identity_header")]
  pub identity_header:        String,
  #[serde(default = "default_recent_campaigns_limit")]
  pub recent_campaigns_limit: usize,
  #[serde(default = "default_min_checkout_units")]
  pub min_checkout_units:     u64,
  #[serde(default = "default_tx_max_attempts")]
  pub tx_max_attempts:        u32,
  #[serde(default = "default_tx_backoff_ms")]
  pub tx_backoff_ms:          u64,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:        u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_base_url() -> String { "http://localhost:8080".to_string() }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/penny/penny.db") }
fn default_identity_header() -> String { "x-authenticated-user".to_string() }
fn default_recent_campaigns_limit() -> usize { 7 }
fn default_min_checkout_units() -> u64 { 1000 }
fn default_tx_max_attempts() -> u32 { 5 }
fn default_tx_backoff_ms() -> u64 { 10 }
fn default_busy_timeout_ms() -> u64 { 250 }

impl ServerConfig {
  /// Layer `PENNY_*` environment variables over the file at `path`, which
  /// may be absent.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(Environment::with_prefix("PENNY").try_parsing(true))
      .build()?
      .try_deserialize()
  }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      max_attempts: self.tx_max_attempts.max(1),
      backoff:      Duration::from_millis(self.tx_backoff_ms),
      busy_timeout: Duration::from_millis(self.busy_timeout_ms),
    }
  }

  pub fn api_settings(&self) -> anyhow::Result<ApiSettings> {
    let identity_header = self
      .identity_header
      .parse()
      .map_err(|e| anyhow::anyhow!("invalid identity_header {:?}: {e}", self.identity_header))?;
    Ok(ApiSettings {
      identity_header,
      base_url: self.base_url.clone(),
      recent_campaigns_limit: self.recent_campaigns_limit,
      min_checkout_units: self.min_checkout_units,
    })
  }

  pub fn admin_credentials(&self) -> AdminCredentials {
    AdminCredentials {
      username:      self.admin_username.clone(),
      password_hash: self.admin_password_hash.clone(),
    }
  }
}
