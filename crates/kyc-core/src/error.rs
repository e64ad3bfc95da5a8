//! Error types for `kyc-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown kyc status: {0:?}")]
  UnknownStatus(String),

  /// A stored or constructed record breaks the status/timestamp invariants.
  #[error("record invariant violated: {0}")]
  Invariant(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
