//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use penny_core::{Classify, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// An error returned by an API handler or extractor.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthenticated,

  #[error("admin credentials required")]
  AdminRequired,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// Transaction retries ran out; the client may try again shortly.
  #[error("temporarily unavailable: {0}")]
  Unavailable(String),

  /// Details are logged where the error is created, never sent to clients.
  #[error("internal error")]
  Internal,
}

impl ApiError {
  /// Map any classified store error onto an HTTP-facing error.
  pub fn from_store<E>(e: E) -> Self
  where
    E: Classify + std::error::Error,
  {
    match e.kind() {
      ErrorKind::NotFound => Self::NotFound(e.to_string()),
      ErrorKind::Validation => Self::BadRequest(e.to_string()),
      ErrorKind::Conflict => Self::Conflict(e.to_string()),
      ErrorKind::Transient => {
        warn!(error = %e, "store gave up on a contended transaction");
        Self::Unavailable(e.to_string())
      }
      ErrorKind::Integrity => {
        error!(error = %e, "store integrity violation");
        Self::Internal
      }
      ErrorKind::Internal => {
        error!(error = %e, "store failure");
        Self::Internal
      }
    }
  }
}

impl From<penny_core::Error> for ApiError {
  fn from(e: penny_core::Error) -> Self { Self::from_store(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthenticated | ApiError::AdminRequired => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();

    match self {
      ApiError::AdminRequired => {
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"penny-admin\""),
        );
      }
      ApiError::Unavailable(_) => {
        res
          .headers_mut()
          .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
      }
      _ => {}
    }
    res
  }
}
