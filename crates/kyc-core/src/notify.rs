//! The notification collaborator informed whenever a user's effective status
//! changes.

use async_trait::async_trait;

use crate::record::{KycStatus, UserId};

/// Delivery channel for status-change notifications (email, push, ...).
///
/// Object-safe so the engine can hold an `Arc<dyn Notifier>`. Delivery
/// failures are the implementation's concern; the engine never retries.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn notify_status_changed(
    &self,
    user_id: UserId,
    old: KycStatus,
    new: KycStatus,
  );
}
