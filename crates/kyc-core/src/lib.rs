//! Core types and trait definitions for the KYC verification engine.
//!
//! No HTTP or database dependencies live here; provider adapters, storage
//! backends and the engine build on these types.

pub mod error;
pub mod event;
pub mod notify;
pub mod record;
pub mod session;
pub mod store;
pub mod transition;

pub use error::{Error, Result};
