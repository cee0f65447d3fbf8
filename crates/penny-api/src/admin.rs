//! HTTP Basic-auth guard for `/admin` routes.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use penny_core::store::LedgerStore;
use subtle::ConstantTimeEq as _;
use tracing::warn;

use crate::{ApiState, error::ApiError};

/// The single admin account accepted by this server instance.
#[derive(Clone)]
pub struct AdminCredentials {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Zero-size marker: present in a handler means the caller is the admin.
pub struct Admin;

/// Check the `Authorization: Basic` header against `creds`.
pub fn verify_admin(headers: &HeaderMap, creds: &AdminCredentials) -> Result<(), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::AdminRequired)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::AdminRequired)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::AdminRequired)?;
  let creds_str = std::str::from_utf8(&decoded).map_err(|_| ApiError::AdminRequired)?;

  let (username, password) = creds_str.split_once(':').ok_or(ApiError::AdminRequired)?;

  let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
    warn!(error = %e, "configured admin password hash does not parse");
    ApiError::AdminRequired
  })?;

  // Both checks always run.
  let user_ok: bool = username.as_bytes().ct_eq(creds.username.as_bytes()).into();
  let password_ok = Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .is_ok();

  if !user_ok {
    warn!(username, "rejected admin login for unknown user");
    return Err(ApiError::AdminRequired);
  }
  if !password_ok {
    warn!(username, "rejected admin login with wrong password");
    return Err(ApiError::AdminRequired);
  }

  Ok(())
}

impl<S> FromRequestParts<ApiState<S>> for Admin
where
  S: LedgerStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_admin(&parts.headers, &state.admin)?;
    Ok(Admin)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use rand_core::OsRng;

  fn creds(password: &str) -> AdminCredentials {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AdminCredentials {
      username:      "admin".to_string(),
      password_hash: hash,
    }
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let encoded = B64.encode(format!("{user}:{pass}"));
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    );
    headers
  }

  #[test]
  fn correct_credentials() {
    let c = creds("secret");
    assert!(verify_admin(&basic("admin", "secret"), &c).is_ok());
  }

  #[test]
  fn wrong_password() {
    let c = creds("secret");
    assert!(matches!(
      verify_admin(&basic("admin", "wrong"), &c),
      Err(ApiError::AdminRequired)
    ));
  }

  #[test]
  fn wrong_user() {
    let c = creds("secret");
    assert!(matches!(
      verify_admin(&basic("root", "secret"), &c),
      Err(ApiError::AdminRequired)
    ));
  }

  #[test]
  fn username_prefix_is_not_enough() {
    let c = creds("secret");
    for user in ["adm", "admin2", "ADMIN", ""] {
      assert!(
        matches!(verify_admin(&basic(user, "secret"), &c), Err(ApiError::AdminRequired)),
        "{user:?}"
      );
    }
  }

  #[test]
  fn missing_header() {
    let c = creds("secret");
    assert!(matches!(
      verify_admin(&HeaderMap::new(), &c),
      Err(ApiError::AdminRequired)
    ));
  }

  #[test]
  fn invalid_base64() {
    let c = creds("secret");
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64!!!"));
    assert!(matches!(verify_admin(&headers, &c), Err(ApiError::AdminRequired)));
  }
}
