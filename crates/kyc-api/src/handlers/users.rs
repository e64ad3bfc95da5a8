//! Read-only user endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/kyc/users/{user_id}/status` | `StatusView`; 404 for unknown users |
//! | `GET`  | `/kyc/users/{user_id}/verified` | `{"verified": bool}` |

use axum::{
  Json,
  extract::{Path, State},
};
use kyc_core::{
  record::{StatusView, UserId},
  store::KycRepository,
};
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

pub async fn status<R>(
  State(state): State<AppState<R>>,
  Path(user_id): Path<UserId>,
) -> Result<Json<StatusView>, ApiError>
where
  R: KycRepository + 'static,
{
  Ok(Json(state.engine.status(user_id).await?))
}

pub async fn verified<R>(
  State(state): State<AppState<R>>,
  Path(user_id): Path<UserId>,
) -> Result<Json<Value>, ApiError>
where
  R: KycRepository + 'static,
{
  let verified = state.engine.is_verified(user_id).await?;
  Ok(Json(json!({ "verified": verified })))
}
