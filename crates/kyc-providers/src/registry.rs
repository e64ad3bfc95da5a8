//! Provider registry: maps provider identifiers to adapter instances.
//!
//! Populated once at startup and read-only afterwards; share it behind an
//! `Arc`.

use std::{collections::BTreeMap, sync::Arc};

use crate::{ProviderAdapter, ProviderError, Result};

#[derive(Clone, Default)]
pub struct ProviderRegistry {
  adapters: BTreeMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
  pub fn new() -> Self { Self::default() }

  /// Register `adapter` under `provider_id`. Registering the same identifier
  /// twice is a configuration error.
  pub fn register(
    &mut self,
    provider_id: impl Into<String>,
    adapter: Arc<dyn ProviderAdapter>,
  ) -> Result<()> {
    let provider_id = provider_id.into();
    if self.adapters.contains_key(&provider_id) {
      return Err(ProviderError::Config(format!(
        "provider {provider_id:?} registered twice"
      )));
    }
    tracing::debug!(provider = %provider_id, "registered kyc provider");
    self.adapters.insert(provider_id, adapter);
    Ok(())
  }

  /// Builder-style [`register`](Self::register).
  pub fn with(
    mut self,
    provider_id: impl Into<String>,
    adapter: Arc<dyn ProviderAdapter>,
  ) -> Result<Self> {
    self.register(provider_id, adapter)?;
    Ok(self)
  }

  pub fn resolve(&self, provider_id: &str) -> Result<Arc<dyn ProviderAdapter>> {
    self
      .adapters
      .get(provider_id)
      .cloned()
      .ok_or_else(|| ProviderError::NotRegistered(provider_id.to_owned()))
  }

  pub fn contains(&self, provider_id: &str) -> bool {
    self.adapters.contains_key(provider_id)
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.adapters.keys().map(String::as_str)
  }

  /// Fail fast if any provider referenced elsewhere in configuration has no
  /// adapter.
  pub fn ensure_registered<'a>(
    &self,
    provider_ids: impl IntoIterator<Item = &'a str>,
  ) -> Result<()> {
    for id in provider_ids {
      if !self.contains(id) {
        return Err(ProviderError::Config(format!(
          "provider {id:?} is referenced but not configured"
        )));
      }
    }
    Ok(())
  }
}
