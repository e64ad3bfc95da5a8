//! `POST /kyc/webhook/{provider}`
//!
//! | Outcome | Status |
//! |---------|--------|
//! | applied, duplicate, suppressed, ignored | 200 |
//! | unknown reference | 200 |
//! | JSON missing required fields | 200 (discarded) |
//! | body is not JSON | 400 |
//! | signature failure | 401, opaque |
//! | unknown provider | 404, opaque |

use axum::{
  Json,
  extract::{Path, State},
  http::HeaderMap,
};
use bytes::Bytes;
use kyc_core::store::KycRepository;
use kyc_engine::{IngestOutcome, KycError};
use kyc_providers::ProviderError;
use serde::Serialize;

use crate::{AppState, error::ApiError};

/// How a delivery was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ack {
  Applied,
  Duplicate,
  CorrectionSuppressed,
  Ignored,
  UnknownReference,
  Discarded,
}

impl From<IngestOutcome> for Ack {
  fn from(outcome: IngestOutcome) -> Self {
    match outcome {
      IngestOutcome::Applied => Self::Applied,
      IngestOutcome::Duplicate => Self::Duplicate,
      IngestOutcome::CorrectionSuppressed => Self::CorrectionSuppressed,
      IngestOutcome::Ignored => Self::Ignored,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct AckBody {
  pub result: Ack,
}

pub async fn receive<R>(
  State(state): State<AppState<R>>,
  Path(provider): Path<String>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<AckBody>, ApiError>
where
  R: KycRepository + 'static,
{
  let result = match state.engine.ingest(&provider, &headers, &body).await {
    Ok(ingested) => Ack::from(ingested.outcome),
    Err(KycError::UnknownReference { .. }) => Ack::UnknownReference,
    Err(KycError::MalformedPayload(ProviderError::InvalidJson(_))) => {
      return Err(ApiError::BadRequest("malformed payload".to_owned()));
    }
    // Redelivery cannot fix a payload that parsed but is incomplete.
    Err(KycError::MalformedPayload(_)) => Ack::Discarded,
    Err(e) => return Err(e.into()),
  };
  Ok(Json(AckBody { result }))
}
