//! Provider configuration and registry construction.

use std::{collections::BTreeMap, sync::Arc};

use serde::Deserialize;

use crate::{
  ProviderRegistry, Result,
  sumsub::{SumsubAdapter, SumsubConfig},
};

/// One entry of the `providers` table. The `kind` tag selects the adapter
/// implementation; an unknown kind fails deserialisation, and so startup.
#[derive(Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderSettings {
  Sumsub(SumsubConfig),
}

/// Instantiate and register every configured provider.
pub fn build_registry(
  providers: &BTreeMap<String, ProviderSettings>,
) -> Result<ProviderRegistry> {
  let mut registry = ProviderRegistry::new();
  for (id, settings) in providers {
    match settings {
      ProviderSettings::Sumsub(cfg) => {
        let adapter = SumsubAdapter::new(id.clone(), cfg.clone())?;
        registry.register(id.clone(), Arc::new(adapter))?;
      }
    }
  }
  Ok(registry)
}
