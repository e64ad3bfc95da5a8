//! Admin endpoints; all require Basic auth.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/kyc/admin/users/{user_id}` | register a platform user; 204 |
//! | `POST` | `/kyc/admin/users/{user_id}/resync` | poll the provider; `StatusView` |
//! | `POST` | `/kyc/admin/users/{user_id}/status` | body `{"status":"verified"}` or `{"status":"rejected","reason":..}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use kyc_core::{
  record::{StatusView, UserId},
  store::KycRepository,
};
use kyc_engine::StatusOverride;

use crate::{AppState, auth::Admin, error::ApiError};

pub async fn register<R>(
  _admin: Admin,
  State(state): State<AppState<R>>,
  Path(user_id): Path<UserId>,
) -> Result<StatusCode, ApiError>
where
  R: KycRepository + 'static,
{
  state.engine.register_user(user_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn resync<R>(
  _admin: Admin,
  State(state): State<AppState<R>>,
  Path(user_id): Path<UserId>,
) -> Result<Json<StatusView>, ApiError>
where
  R: KycRepository + 'static,
{
  let record = state.engine.sync(user_id).await?;
  Ok(Json(StatusView::from(&record)))
}

pub async fn override_status<R>(
  _admin: Admin,
  State(state): State<AppState<R>>,
  Path(user_id): Path<UserId>,
  Json(verdict): Json<StatusOverride>,
) -> Result<Json<StatusView>, ApiError>
where
  R: KycRepository + 'static,
{
  let record = state.engine.override_status(user_id, verdict).await?;
  Ok(Json(StatusView::from(&record)))
}
