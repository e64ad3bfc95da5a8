use async_trait::async_trait;
use kyc_core::{
  notify::Notifier,
  record::{KycStatus, UserId},
};

/// Default notifier: one structured log event per status change.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
  async fn notify_status_changed(
    &self,
    user_id: UserId,
    old: KycStatus,
    new: KycStatus,
  ) {
    tracing::info!(
      target: "kyc::notify",
      %user_id,
      %old,
      %new,
      "kyc status changed"
    );
  }
}
