//! KYC verification orchestration.
//!
//! [`KycEngine`] ties a [`KycRepository`], the [`ProviderRegistry`] and a
//! [`Notifier`] together and exposes the operations callers need:
//!
//! | Component | Entry point |
//! |-----------|-------------|
//! | Session manager | [`KycEngine::initiate`] |
//! | Webhook ingestion | [`KycEngine::ingest`] |
//! | Reconciliation | [`KycEngine::sync`], [`KycEngine::sweep`], [`spawn_sweeper`] |
//! | Verification gate | [`KycEngine::is_verified`], [`KycEngine::status`] |
//! | Administration | [`KycEngine::override_status`] |
//!
//! Every status write goes through one transition step that holds a
//! per-user lock and writes with compare-and-set on the record `version`, so
//! concurrent deliveries of the same event apply (and notify) once.

mod admin;
mod apply;
mod gate;
mod ingest;
mod locks;
mod notify;
mod reconcile;
mod retry;
mod session;

pub mod config;
pub mod error;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use kyc_core::{notify::Notifier, record::UserId, store::KycRepository};
use kyc_providers::ProviderRegistry;

pub use admin::StatusOverride;
pub use config::EngineConfig;
pub use error::{KycError, Result};
pub use ingest::{IngestOutcome, Ingested};
pub use locks::KeyedLocks;
pub use notify::TracingNotifier;
pub use reconcile::{SweepReport, spawn_sweeper};
pub use retry::RetryPolicy;
pub use session::SessionCache;

pub struct KycEngine<R> {
  repo:     Arc<R>,
  registry: Arc<ProviderRegistry>,
  notifier: Arc<dyn Notifier>,
  config:   EngineConfig,
  retry:    RetryPolicy,
  locks:    KeyedLocks<UserId>,
  sessions: SessionCache,
}

impl<R: KycRepository> KycEngine<R> {
  pub fn new(
    repo: Arc<R>,
    registry: Arc<ProviderRegistry>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
  ) -> Self {
    Self {
      repo,
      registry,
      notifier,
      retry: config.retry_policy(),
      config,
      locks: KeyedLocks::new(),
      sessions: SessionCache::new(),
    }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn registry(&self) -> &ProviderRegistry { &self.registry }

  pub fn sessions(&self) -> &SessionCache { &self.sessions }
}
