//! HTTP surface for the KYC engine.
//!
//! Exposes an axum [`Router`] over a [`KycEngine`] backed by any
//! [`KycRepository`]. User-facing routes trust an upstream gateway for
//! authentication; admin routes require HTTP Basic auth.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET`  | `/health` | liveness |
//! | `POST` | `/kyc/webhook/{provider}` | [`handlers::webhooks::receive`] |
//! | `POST` | `/kyc/sessions` | [`handlers::sessions::create`] |
//! | `GET`  | `/kyc/users/{user_id}/status` | [`handlers::users::status`] |
//! | `GET`  | `/kyc/users/{user_id}/verified` | [`handlers::users::verified`] |
//! | `PUT`  | `/kyc/admin/users/{user_id}` | [`handlers::admin::register`] |
//! | `POST` | `/kyc/admin/users/{user_id}/resync` | [`handlers::admin::resync`] |
//! | `POST` | `/kyc/admin/users/{user_id}/status` | [`handlers::admin::override_status`] |

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post, put},
};
use kyc_core::store::KycRepository;
use kyc_engine::KycEngine;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use auth::AdminAuth;
use handlers::{admin, sessions, users, webhooks};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<R> {
  pub engine: Arc<KycEngine<R>>,
  pub admin:  Arc<AdminAuth>,
}

impl<R> Clone for AppState<R> {
  fn clone(&self) -> Self {
    Self { engine: Arc::clone(&self.engine), admin: Arc::clone(&self.admin) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full router. Every request is traced.
pub fn router<R>(state: AppState<R>) -> Router
where
  R: KycRepository + 'static,
{
  Router::new()
    .route("/health",                             get(health))
    .route("/kyc/webhook/{provider}",             post(webhooks::receive::<R>))
    .route("/kyc/sessions",                       post(sessions::create::<R>))
    .route("/kyc/users/{user_id}/status",         get(users::status::<R>))
    .route("/kyc/users/{user_id}/verified",       get(users::verified::<R>))
    .route("/kyc/admin/users/{user_id}",          put(admin::register::<R>))
    .route("/kyc/admin/users/{user_id}/resync",   post(admin::resync::<R>))
    .route("/kyc/admin/users/{user_id}/status",   post(admin::override_status::<R>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
