//! Handlers for `/admin/beneficiaries` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/admin/beneficiaries` | Ordered by pledge campaign id |
//! | `POST`   | `/admin/beneficiaries` | 201; 409 on duplicate identity or pledge id |
//! | `GET`    | `/admin/beneficiaries/{id}` | 404 if not found |
//! | `PUT`    | `/admin/beneficiaries/{id}` | Replaces every editable field |
//! | `DELETE` | `/admin/beneficiaries/{id}` | Clears the beneficiary from its campaigns |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use penny_core::{
  beneficiary::{Beneficiary, NewBeneficiary, PledgeCampaignId, RawPledgeId},
  store::LedgerStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, admin::Admin, error::ApiError, extract::ApiJson};

/// Body for create and edit. Every field is validated before the store sees it.
#[derive(Debug, Deserialize)]
pub struct BeneficiaryBody {
  pub external_identity:    String,
  pub payout_email:         String,
  pub pledge_campaign_id:   RawPledgeId,
  pub pledge_platform_name: String,
}

impl BeneficiaryBody {
  fn validate(self) -> Result<NewBeneficiary, ApiError> {
    let pledge_id = PledgeCampaignId::try_from(self.pledge_campaign_id)?;
    Ok(NewBeneficiary::parse(
      &self.external_identity,
      &self.payout_email,
      pledge_id,
      &self.pledge_platform_name,
    )?)
  }
}

/// `GET /admin/beneficiaries`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
) -> Result<Json<Vec<Beneficiary>>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let beneficiaries = state
    .store
    .list_beneficiaries()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(beneficiaries))
}

/// `POST /admin/beneficiaries`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
  ApiJson(body): ApiJson<BeneficiaryBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let beneficiary = state
    .store
    .create_beneficiary(body.validate()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(beneficiary)))
}

/// `GET /admin/beneficiaries/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
  Path(id): Path<Uuid>,
) -> Result<Json<Beneficiary>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let beneficiary = state
    .store
    .get_beneficiary(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("beneficiary {id} not found")))?;
  Ok(Json(beneficiary))
}

/// `PUT /admin/beneficiaries/{id}`
pub async fn edit<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
  Path(id): Path<Uuid>,
  ApiJson(body): ApiJson<BeneficiaryBody>,
) -> Result<Json<Beneficiary>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let beneficiary = state
    .store
    .edit_beneficiary(id, body.validate()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(beneficiary))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
  pub beneficiary_id:    Uuid,
  pub cleared_campaigns: u64,
}

/// `DELETE /admin/beneficiaries/{id}`
pub async fn delete<S>(
  State(state): State<ApiState<S>>,
  _: Admin,
  Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, ApiError>
where
  S: LedgerStore + Clone + 'static,
{
  let cleared_campaigns = state
    .store
    .delete_beneficiary(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Deleted { beneficiary_id: id, cleared_campaigns }))
}
