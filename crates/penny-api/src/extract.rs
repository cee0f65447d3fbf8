//! Body and query extractors whose rejections use the API's JSON error shape.
//!
//! axum's own `Json` and `Query` reject with plain-text 400/415/422 responses.
//! These wrappers turn every rejection into [`ApiError::BadRequest`].

use axum::{
  Json,
  extract::{
    FromRequest, FromRequestParts, Query, Request,
    rejection::{JsonRejection, QueryRejection},
  },
  http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// A JSON request body.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
  S: Send + Sync,
  T: DeserializeOwned,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(value) = Json::<T>::from_request(req, state).await?;
    Ok(Self(value))
  }
}

/// Deserialized query-string parameters.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
  S: Send + Sync,
  T: DeserializeOwned,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let Query(value) = Query::<T>::try_from_uri(&parts.uri)?;
    Ok(Self(value))
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    match e {
      JsonRejection::MissingJsonContentType(_) => {
        Self::BadRequest("expected a JSON body with `Content-Type: application/json`".into())
      }
      e => Self::BadRequest(e.body_text()),
    }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { Self::BadRequest(e.body_text()) }
}
