//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Security failures map to fixed bodies; provider failures map to the two
//! user-facing messages. Internal detail only reaches the log.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use kyc_engine::KycError;
use serde_json::json;
use thiserror::Error;

pub const START_UNAVAILABLE: &str = "verification could not be started, try again";
pub const STATUS_UNAVAILABLE: &str = "verification status unavailable";

#[derive(Debug, Error)]
pub enum ApiError {
  /// Admin credentials missing or wrong.
  #[error("unauthorized")]
  Unauthorized,

  /// A webhook failed authentication. Never says why.
  #[error("webhook rejected")]
  WebhookRejected,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("{0}")]
  Unavailable(&'static str),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<KycError> for ApiError {
  fn from(e: KycError) -> Self {
    match e {
      KycError::UserNotFound(id) => Self::NotFound(format!("user {id} not found")),
      KycError::ProviderNotConfigured(p) => {
        Self::BadRequest(format!("provider {p:?} is not available"))
      }
      KycError::ProviderUnavailable(_) => Self::Unavailable(START_UNAVAILABLE),
      KycError::ProviderQueryFailed { .. } => Self::Unavailable(STATUS_UNAVAILABLE),
      KycError::InvalidSignature(_) => Self::WebhookRejected,
      KycError::UnknownProvider(_) => Self::NotFound("not found".to_owned()),
      KycError::MalformedPayload(_) => Self::BadRequest("malformed payload".to_owned()),
      KycError::UnknownReference { .. } => {
        Self::NotFound("unknown verification reference".to_owned())
      }
      KycError::NoActiveSession(id) => {
        Self::Conflict(format!("user {id} has no verification in progress"))
      }
      KycError::InvalidRedirectUrl(msg) => Self::BadRequest(msg),
      KycError::Conflict(_) => {
        Self::Conflict("record changed concurrently, retry".to_owned())
      }
      KycError::StaleOrDuplicateEvent | KycError::InvalidTransition { .. } => {
        Self::Conflict(e.to_string())
      }
      KycError::Store(source) => Self::Internal(source),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized | ApiError::WebhookRejected => {
        (StatusCode::UNAUTHORIZED, "unauthorized".to_owned())
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, (*m).to_owned()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"kyc-admin\""),
      );
    }
    res
  }
}
