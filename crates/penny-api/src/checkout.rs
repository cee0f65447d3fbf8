//! `GET /checkout`: the caller's donations grouped by pledge campaign.

use axum::{Json, extract::State};
use penny_core::{
  checkout::{CheckoutGroup, checkout_view},
  store::LedgerStore,
};

use crate::{ApiState, caller::SessionCaller, error::ApiError};

/// `GET /checkout`
pub async fn view<S>(
  State(state): State<ApiState<S>>,
  SessionCaller(member): SessionCaller,
) -> Result<Json<Vec<CheckoutGroup>>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let groups = checkout_view(
    state.store.as_ref(),
    member.member_id,
    state.settings.min_checkout_units,
  )
  .await
  .map_err(ApiError::from_store)?;
  Ok(Json(groups))
}
