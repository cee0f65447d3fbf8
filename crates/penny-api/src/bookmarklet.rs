//! The bookmarklet flow.
//!
//! A logged-in member fetches their bookmarklet once from `GET /bookmarklet`.
//! Clicking it on any page opens `/bookmarklet/donate` in a small popup,
//! carrying the member's hashed key instead of a session.

use axum::{Json, extract::State};
use penny_core::{donation::LedgerReceipt, member::HashedKey, store::LedgerStore};
use serde::Serialize;

use crate::{
  ApiState,
  caller::{BookmarkletCaller, SessionCaller},
  donations::LinkParams,
  error::ApiError,
  extract::ApiQuery,
};

/// Render the `javascript:` URL a member installs as a bookmark.
///
/// The popup falls back to navigating the current window when blocked.
/// Firefox needs the open deferred to a timer.
pub fn bookmarklet_script(base_url: &str, key: &HashedKey) -> String {
  let base = base_url
    .trim_end_matches('/')
    .replace('\\', "\\\\")
    .replace('\'', "\\'");
  format!(
    "javascript:(function(){{var d=document,w=window,l=d.location,e=encodeURIComponent,\
     u='{base}/bookmarklet/donate?k={key}&link='+e(l.href);\
     var a=function(){{if(!w.open(u,'penny','toolbar=0,resizable=0,status=1,width=250,height=150'))l.href=u;}};\
     if(/Firefox/.test(navigator.userAgent))setTimeout(a,0);else a();}})();void(0)",
    key = key.as_str(),
  )
}

#[derive(Debug, Serialize)]
pub struct Bookmarklet {
  pub bookmarklet: String,
}

/// `GET /bookmarklet`
pub async fn script<S>(
  State(state): State<ApiState<S>>,
  SessionCaller(member): SessionCaller,
) -> Json<Bookmarklet>
where
  S: LedgerStore + Clone + 'static,
{
  Json(Bookmarklet {
    bookmarklet: bookmarklet_script(&state.settings.base_url, &member.hashed_key),
  })
}

/// `GET /bookmarklet/donate?k=…&link=…`
pub async fn donate<S>(
  State(state): State<ApiState<S>>,
  BookmarkletCaller(member): BookmarkletCaller,
  ApiQuery(params): ApiQuery<LinkParams>,
) -> Result<Json<LedgerReceipt>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let receipt = state
    .store
    .donate(member.member_id, params.parse()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(receipt))
}

/// `GET /bookmarklet/undo?k=…&link=…`
pub async fn undo<S>(
  State(state): State<ApiState<S>>,
  BookmarkletCaller(member): BookmarkletCaller,
  ApiQuery(params): ApiQuery<LinkParams>,
) -> Result<Json<LedgerReceipt>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let receipt = state
    .store
    .undo(member.member_id, params.parse()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(receipt))
}
