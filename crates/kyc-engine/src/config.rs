//! Engine tuning knobs, deserialised from the `[engine]` table.

use std::time::Duration;

use kyc_core::transition::TransitionPolicy;
use serde::Deserialize;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Let a newer provider event overwrite one terminal state with another.
  pub allow_terminal_correction: bool,
  /// Upper bound on how long an issued session stays in the session cache.
  pub session_ttl_secs:          u64,
  /// Deadline for a single adapter call.
  pub adapter_timeout_secs:      u64,
  /// Total attempts for a transient adapter failure, including the first.
  pub retry_attempts:            u32,
  pub retry_base_delay_ms:       u64,
  /// Pending records untouched for this long are picked up by the sweep.
  pub stale_pending_after_secs:  u64,
  /// Sweep period; `None` disables the periodic sweep.
  pub sweep_interval_secs:       Option<u64>,
  pub sweep_batch_limit:         usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      allow_terminal_correction: false,
      session_ttl_secs:          1800,
      adapter_timeout_secs:      10,
      retry_attempts:            3,
      retry_base_delay_ms:       200,
      stale_pending_after_secs:  86_400,
      sweep_interval_secs:       None,
      sweep_batch_limit:         50,
    }
  }
}

impl EngineConfig {
  pub fn transition_policy(&self) -> TransitionPolicy {
    TransitionPolicy {
      allow_terminal_correction: self.allow_terminal_correction,
    }
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      attempts:   self.retry_attempts.max(1),
      base_delay: Duration::from_millis(self.retry_base_delay_ms),
      timeout:    Duration::from_secs(self.adapter_timeout_secs),
    }
  }

  pub fn session_ttl(&self) -> chrono::Duration { secs(self.session_ttl_secs) }

  pub fn stale_pending_after(&self) -> chrono::Duration {
    secs(self.stale_pending_after_secs)
  }

  pub fn sweep_interval(&self) -> Option<Duration> {
    self
      .sweep_interval_secs
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs)
  }
}

fn secs(n: u64) -> chrono::Duration {
  i64::try_from(n)
    .ok()
    .and_then(chrono::Duration::try_seconds)
    .unwrap_or(chrono::Duration::MAX)
}
