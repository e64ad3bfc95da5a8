//! Error type for `kyc-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] kyc_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Another user's record already holds this provider reference.
  #[error("reference {reference_id:?} already used with provider {provider:?}")]
  DuplicateReference {
    provider:     String,
    reference_id: String,
  },

  /// The record's user is not in the `users` table.
  #[error("user not found: {0}")]
  UnknownUser(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
