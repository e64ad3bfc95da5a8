//! Bounded retry with exponential backoff for adapter calls.

use std::{future::Future, time::Duration};

use kyc_providers::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. At least one.
  pub attempts:   u32,
  pub base_delay: Duration,
  /// Deadline for each attempt.
  pub timeout:    Duration,
}

impl RetryPolicy {
  /// Delay before attempt `attempt + 1`: `base_delay * 2^(attempt - 1)`.
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    self.base_delay.saturating_mul(factor)
  }

  /// Run `call` until it succeeds, fails permanently, or the attempts run
  /// out. A timed-out attempt counts as [`ProviderError::Timeout`].
  pub async fn run<T, F, Fut>(
    &self,
    operation: &'static str,
    mut call: F,
  ) -> Result<T, ProviderError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
  {
    let attempts = self.attempts.max(1);
    let mut attempt = 1;
    loop {
      let result = match tokio::time::timeout(self.timeout, call()).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout),
      };

      match result {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() && attempt < attempts => {
          let delay = self.backoff(attempt);
          tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "transient provider failure, retrying"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
