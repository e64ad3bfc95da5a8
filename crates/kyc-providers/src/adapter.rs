//! The contract every provider adapter satisfies.

use async_trait::async_trait;
use kyc_core::{
  event::{ProviderStatus, WebhookEvent},
  record::UserId,
  session::VerificationSession,
};
pub use reqwest::header::HeaderMap;
use reqwest::Url;

use crate::Result;

/// One implementation per identity-verification provider.
///
/// Adapters are held as `Arc<dyn ProviderAdapter>` in the registry, so the
/// trait is object-safe. Network calls are made with the adapter's own
/// client timeout; retry and an outer deadline are applied by the engine.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
  /// The identifier this adapter is registered under, e.g. `"sumsub"`.
  fn id(&self) -> &str;

  /// Open a check with the provider and return a session whose
  /// `reference_id` is unique within this provider.
  async fn init_verification(
    &self,
    user_id: UserId,
    redirect_url: &Url,
  ) -> Result<VerificationSession>;

  /// Poll the provider for the current status of a check.
  async fn get_status(&self, reference_id: &str) -> Result<ProviderStatus>;

  /// Authenticate a webhook delivery. Comparisons are constant-time.
  /// Fails with [`ProviderError::InvalidSignature`](crate::ProviderError).
  fn verify_webhook_signature(
    &self,
    headers: &HeaderMap,
    raw_body: &[u8],
  ) -> Result<()>;

  /// Deserialize a webhook body into the common event shape.
  fn parse_webhook_payload(&self, raw_body: &[u8]) -> Result<WebhookEvent>;
}
