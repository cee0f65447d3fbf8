//! Handlers for campaign listings and admin campaign triage.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/campaigns/recent` | Public; optional `?limit=` (capped at 100) |
//! | `GET`  | `/admin/campaigns/unassigned` | Highest counter first |
//! | `POST` | `/admin/campaigns/assign` | Body: `{"link":"…","pledge_campaign_id":42}` |
//! | `POST` | `/admin/reconcile` | Recompute counters; returns the corrections |

use axum::{
  Json,
  extract::State,
};
use penny_core::{
  beneficiary::{PledgeCampaignId, RawPledgeId},
  campaign::{Campaign, CampaignLink},
  donation::CounterCorrection,
  store::LedgerStore,
};
use serde::Deserialize;
use tracing::info;

use crate::{
  ApiState,
  admin::Admin,
  error::ApiError,
  extract::{ApiJson, ApiQuery},
};

/// Upper bound on `?limit=` for the recent-campaigns listing.
pub const MAX_RECENT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  pub limit: Option<usize>,
}

/// `GET /campaigns/recent[?limit=<n>]`
pub async fn recent<S>(
  State(state): State<ApiState<S>>,
  ApiQuery(params): ApiQuery<RecentParams>,
) -> Result<Json<Vec<Campaign>>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let limit = params
    .limit
    .unwrap_or(state.settings.recent_campaigns_limit)
    .min(MAX_RECENT_LIMIT);
  let campaigns = state
    .store
    .list_recent_campaigns(limit)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(campaigns))
}

/// `GET /admin/campaigns/unassigned`
pub async fn unassigned<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
) -> Result<Json<Vec<Campaign>>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let campaigns = state
    .store
    .list_unassigned_campaigns()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(campaigns))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub link:               String,
  pub pledge_campaign_id: RawPledgeId,
}

/// `POST /admin/campaigns/assign`
pub async fn assign<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
  ApiJson(body): ApiJson<AssignBody>,
) -> Result<Json<Campaign>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let link = CampaignLink::parse(&body.link)?;
  let pledge_id = PledgeCampaignId::try_from(body.pledge_campaign_id)?;
  let campaign = state
    .store
    .assign_beneficiary(link, pledge_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(campaign))
}

/// `POST /admin/reconcile`
pub async fn reconcile<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
) -> Result<Json<Vec<CounterCorrection>>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let corrections = state
    .store
    .reconcile_counters()
    .await
    .map_err(ApiError::from_store)?;
  info!(repaired = corrections.len(), "reconciled campaign counters");
  Ok(Json(corrections))
}
