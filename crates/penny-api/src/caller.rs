//! Per-request caller context.
//!
//! Handlers name the caller they need as an extractor argument; the resolved
//! [`Member`] lives only as long as the request.

use axum::{
  extract::{FromRequestParts, Query},
  http::request::Parts,
};
use penny_core::{
  member::{ExternalIdentity, HashedKey, Member},
  store::LedgerStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

/// A caller authenticated by the upstream login provider.
///
/// The provider forwards the stable user id in the configured identity
/// header. The member is created on first sight.
pub struct SessionCaller(pub Member);

impl<S> FromRequestParts<ApiState<S>> for SessionCaller
where
  S: LedgerStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    let raw = parts
      .headers
      .get(&state.settings.identity_header)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .ok_or(ApiError::Unauthenticated)?;
    let identity = ExternalIdentity::parse(raw)?;

    let member = state
      .store
      .resolve_member(identity)
      .await
      .map_err(ApiError::from_store)?;
    Ok(Self(member))
  }
}

#[derive(Debug, Deserialize)]
struct KeyParams {
  k: String,
}

/// A caller identified only by the hashed key embedded in their bookmarklet.
/// Never creates a member.
pub struct BookmarkletCaller(pub Member);

impl<S> FromRequestParts<ApiState<S>> for BookmarkletCaller
where
  S: LedgerStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    let Query(params) = Query::<KeyParams>::try_from_uri(&parts.uri)
      .map_err(|_| ApiError::BadRequest("missing bookmarklet key `k`".into()))?;
    let key = HashedKey::parse(&params.k)?;

    let member = state
      .store
      .member_by_hashed_key(key)
      .await
      .map_err(ApiError::from_store)?;
    Ok(Self(member))
  }
}
