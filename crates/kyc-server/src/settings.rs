//! Runtime configuration, deserialised from `config.toml` layered under
//! `KYC_*` environment variables.

use std::{collections::BTreeMap, path::PathBuf};

use kyc_engine::EngineConfig;
use kyc_providers::config::ProviderSettings;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  /// argon2 PHC string; produce one with `--hash-password`.
  pub admin_password_hash: String,
  /// Providers the rest of the platform refers to. Startup fails unless
  /// each one is configured under `providers`.
  #[serde(default)]
  pub required_providers:  Vec<String>,
  #[serde(default)]
  pub engine:              EngineConfig,
  #[serde(default)]
  pub providers:           BTreeMap<String, ProviderSettings>,
}

impl ServerConfig {
  /// Layer `file` (optional) under `KYC_`-prefixed environment variables.
  /// Nested keys use `__`, e.g. `KYC_ENGINE__RETRY_ATTEMPTS=5`.
  pub fn load(file: PathBuf) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("KYC")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }
}
