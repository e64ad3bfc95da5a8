//! Identity-verification provider adapters.
//!
//! Every provider is reached through the [`ProviderAdapter`] contract and
//! looked up by identifier in a [`ProviderRegistry`]. Adding a provider means
//! implementing the trait and registering it; callers never change.

pub mod adapter;
pub mod config;
pub mod error;
pub mod registry;
pub mod signature;
pub mod sumsub;

pub use adapter::{HeaderMap, ProviderAdapter};
pub use error::{ProviderError, Result};
pub use registry::ProviderRegistry;
pub use reqwest::Url;
