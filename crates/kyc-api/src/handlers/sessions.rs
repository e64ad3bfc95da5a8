//! `POST /kyc/sessions`: body `{"user_id", "provider", "redirect_url"}`,
//! answers 201 with the session.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use kyc_core::{record::UserId, store::KycRepository};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub user_id:      UserId,
  pub provider:     String,
  pub redirect_url: String,
}

pub async fn create<R>(
  State(state): State<AppState<R>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  R: KycRepository + 'static,
{
  let session = state
    .engine
    .initiate(body.user_id, &body.provider, &body.redirect_url)
    .await?;
  Ok((StatusCode::CREATED, Json(session)))
}
