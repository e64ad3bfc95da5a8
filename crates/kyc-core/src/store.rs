//! The `KycRepository` trait: durable storage of one record per user.
//!
//! The trait is implemented by storage backends (e.g. `kyc-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::record::{KycRecord, UserId};

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
  Written,
  /// The stored row did not match the expected `version` (or a row existed
  /// when none was expected). Nothing was written.
  Conflict,
}

/// Abstraction over a KYC record store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait KycRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Mirror a platform user so submissions can reference it. Idempotent.
  fn register_user(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Whether `user_id` refers to an existing platform user.
  fn user_exists(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Retrieve a user's record. Returns `None` if the user never submitted.
  fn get_by_user_id(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Option<KycRecord>, Self::Error>> + Send + '_;

  /// Retrieve the record currently tied to a provider check.
  fn get_by_provider_reference<'a>(
    &'a self,
    provider: &'a str,
    reference_id: &'a str,
  ) -> impl Future<Output = Result<Option<KycRecord>, Self::Error>> + Send + 'a;

  /// Insert or replace the record keyed by `record.user_id`, with
  /// optimistic concurrency.
  ///
  /// - `expected_version = None`: insert only if no row exists.
  /// - `Some(v)`: update only if the stored `version` equals `v`. The new
  ///   record must carry a greater version.
  fn upsert(
    &self,
    record: KycRecord,
    expected_version: Option<u64>,
  ) -> impl Future<Output = Result<UpsertResult, Self::Error>> + Send + '_;

  /// Pending records that neither changed nor were polled since
  /// `older_than`, least recently touched first. A record's position is
  /// `last_polled_at` when set and `updated_at` otherwise, so polling a
  /// record moves it to the back of the queue.
  fn find_stale_pending(
    &self,
    older_than: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<KycRecord>, Self::Error>> + Send + '_;
}
