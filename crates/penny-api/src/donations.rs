//! Handlers for `/donations` endpoints (session callers).
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/donations` | The caller's donations, most recent first |
//! | `POST`   | `/donations` | Body: `{"link":"https://…"}`; adds one unit |
//! | `POST`   | `/donations/undo` | Body: `{"link":"https://…"}`; removes the latest unit |
//! | `DELETE` | `/donations?link=…` | Removes the whole donation; 204 |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use penny_core::{
  campaign::CampaignLink,
  donation::{LedgerReceipt, MemberDonations},
  store::LedgerStore,
};
use serde::Deserialize;

use crate::{
  ApiState,
  caller::SessionCaller,
  error::ApiError,
  extract::{ApiJson, ApiQuery},
};

/// Carries a campaign link, either as a JSON body or a query string.
#[derive(Debug, Deserialize)]
pub struct LinkParams {
  pub link: String,
}

impl LinkParams {
  pub fn parse(&self) -> Result<CampaignLink, ApiError> {
    Ok(CampaignLink::parse(&self.link)?)
  }
}

/// `GET /donations`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  SessionCaller(member): SessionCaller,
) -> Result<Json<MemberDonations>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let donations = state
    .store
    .list_member_donations(member.member_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(donations))
}

/// `POST /donations`
pub async fn donate<S>(
  State(state): State<ApiState<S>>,
  SessionCaller(member): SessionCaller,
  ApiJson(body): ApiJson<LinkParams>,
) -> Result<Json<LedgerReceipt>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let receipt = state
    .store
    .donate(member.member_id, body.parse()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(receipt))
}

/// `POST /donations/undo`
pub async fn undo<S>(
  State(state): State<ApiState<S>>,
  SessionCaller(member): SessionCaller,
  ApiJson(body): ApiJson<LinkParams>,
) -> Result<Json<LedgerReceipt>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let receipt = state
    .store
    .undo(member.member_id, body.parse()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(receipt))
}

/// `DELETE /donations?link=…`
pub async fn delete<S>(
  State(state): State<ApiState<S>>,
  SessionCaller(member): SessionCaller,
  ApiQuery(params): ApiQuery<LinkParams>,
) -> Result<StatusCode, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  state
    .store
    .delete_donation(member.member_id, params.parse()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
