//! Verification gate and status projection. Read-only.

use kyc_core::{
  record::{KycStatus, StatusView, UserId},
  store::KycRepository,
};

use crate::{KycEngine, KycError, Result};

impl<R: KycRepository> KycEngine<R> {
  /// Whether the user's stored status is `VERIFIED` right now. A single
  /// keyed read with no caching; unknown users are simply not verified.
  pub async fn is_verified(&self, user_id: UserId) -> Result<bool> {
    let record = self
      .repo
      .get_by_user_id(user_id)
      .await
      .map_err(KycError::store)?;
    Ok(record.is_some_and(|r| r.status() == KycStatus::Verified))
  }

  /// The user-facing projection of the user's record; `not_started` when
  /// the user never submitted.
  pub async fn status(&self, user_id: UserId) -> Result<StatusView> {
    match self
      .repo
      .get_by_user_id(user_id)
      .await
      .map_err(KycError::store)?
    {
      Some(record) => Ok(StatusView::from(&record)),
      None => match self.missing_record(user_id).await? {
        KycError::NoActiveSession(_) => Ok(StatusView::not_started(user_id)),
        other => Err(other),
      },
    }
  }
}
