//! The KYC record: one per user, the internal source of truth for
//! verification status.
//!
//! The verification outcome is modelled as a tagged variant so that
//! "verified implies `verified_at`" and "rejected implies a reason" hold by
//! construction rather than by convention.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub type UserId = Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Flat verification status, as exposed to callers and stored in the
/// `status` column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
  Pending,
  Verified,
  Rejected,
}

impl KycStatus {
  /// `Verified` and `Rejected` are terminal: no further automatic transition
  /// is expected without a resubmission or an admin override.
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }

  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// The verification outcome with the data each state carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
  Pending,
  Verified {
    verified_at: DateTime<Utc>,
  },
  Rejected {
    rejected_at: DateTime<Utc>,
    reason:      String,
  },
}

impl Outcome {
  pub fn status(&self) -> KycStatus {
    match self {
      Self::Pending => KycStatus::Pending,
      Self::Verified { .. } => KycStatus::Verified,
      Self::Rejected { .. } => KycStatus::Rejected,
    }
  }

  pub fn is_terminal(&self) -> bool { self.status().is_terminal() }

  pub fn verified_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Verified { verified_at } => Some(*verified_at),
      _ => None,
    }
  }

  pub fn rejected_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Rejected { rejected_at, .. } => Some(*rejected_at),
      _ => None,
    }
  }

  pub fn rejection_reason(&self) -> Option<&str> {
    match self {
      Self::Rejected { reason, .. } => Some(reason),
      _ => None,
    }
  }

  /// Rebuild an outcome from the flat column layout used by storage
  /// backends, rejecting any combination that breaks the invariants.
  pub fn from_columns(
    status: KycStatus,
    verified_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    reason: Option<String>,
  ) -> Result<Self> {
    match (status, verified_at, rejected_at, reason) {
      (KycStatus::Pending, None, None, None) => Ok(Self::Pending),
      (KycStatus::Pending, ..) => {
        Err(Error::Invariant("pending record carries outcome fields"))
      }
      (KycStatus::Verified, Some(verified_at), None, None) => {
        Ok(Self::Verified { verified_at })
      }
      (KycStatus::Verified, ..) => Err(Error::Invariant(
        "verified record must have verified_at and no rejection fields",
      )),
      (KycStatus::Rejected, None, Some(rejected_at), Some(reason)) => {
        Ok(Self::Rejected { rejected_at, reason })
      }
      (KycStatus::Rejected, ..) => Err(Error::Invariant(
        "rejected record must have rejected_at and a reason",
      )),
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One record per user. Never hard-deleted; a resubmission resets it to
/// pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycRecord {
  pub user_id:        UserId,
  /// Identifier of the provider used for the latest submission.
  pub provider:       String,
  /// Provider-assigned check ID; unique within the provider's namespace.
  pub reference_id:   String,
  pub outcome:        Outcome,
  /// Ordering token of the most recent accepted transition. Never decreases.
  /// Starts at the Unix epoch so provider timestamps from before the record
  /// was created still order after it.
  pub last_event_at:  DateTime<Utc>,
  /// Write counter used as the compare-and-set token. Every derived record
  /// carries a strictly greater value than the one it was derived from.
  pub version:        u64,
  /// When reconciliation last asked the provider about this check.
  pub last_polled_at: Option<DateTime<Utc>>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl KycRecord {
  /// A fresh pending record for a user's first submission.
  pub fn pending(
    user_id: UserId,
    provider: impl Into<String>,
    reference_id: impl Into<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      user_id,
      provider: provider.into(),
      reference_id: reference_id.into(),
      outcome: Outcome::Pending,
      last_event_at: DateTime::<Utc>::default(),
      version: 1,
      last_polled_at: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn status(&self) -> KycStatus { self.outcome.status() }

  /// Reset to pending for a new submission. Rejection fields are cleared;
  /// `created_at` and `last_event_at` are preserved.
  pub fn resubmitted(
    &self,
    provider: impl Into<String>,
    reference_id: impl Into<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      provider: provider.into(),
      reference_id: reference_id.into(),
      outcome: Outcome::Pending,
      version: self.version + 1,
      last_polled_at: None,
      updated_at: now,
      ..self.clone()
    }
  }

  /// The record after accepting a transition to `outcome` carried by an
  /// event with ordering token `token`.
  pub fn with_outcome(
    &self,
    outcome: Outcome,
    token: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      outcome,
      last_event_at: self.last_event_at.max(token),
      version: self.version + 1,
      updated_at: now,
      ..self.clone()
    }
  }

  /// The record after a reconciliation poll that changed nothing. Only
  /// `last_polled_at` moves, so `updated_at` still reflects the last real
  /// change.
  pub fn polled(&self, now: DateTime<Utc>) -> Self {
    Self {
      version: self.version + 1,
      last_polled_at: Some(now),
      ..self.clone()
    }
  }

  /// Whether this record belongs to the given provider check.
  pub fn is_for(&self, provider: &str, reference_id: &str) -> bool {
    self.provider == provider && self.reference_id == reference_id
  }
}

// ─── Projection ──────────────────────────────────────────────────────────────

/// Status as shown to users and admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
  NotStarted,
  Pending,
  Verified,
  Rejected,
}

impl From<KycStatus> for ViewStatus {
  fn from(s: KycStatus) -> Self {
    match s {
      KycStatus::Pending => Self::Pending,
      KycStatus::Verified => Self::Verified,
      KycStatus::Rejected => Self::Rejected,
    }
  }
}

/// The read model returned by status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
  pub user_id:          UserId,
  pub status:           ViewStatus,
  pub provider:         Option<String>,
  pub reference_id:     Option<String>,
  pub verified_at:      Option<DateTime<Utc>>,
  pub rejected_at:      Option<DateTime<Utc>>,
  pub rejection_reason: Option<String>,
  pub updated_at:       Option<DateTime<Utc>>,
}

impl StatusView {
  pub fn not_started(user_id: UserId) -> Self {
    Self {
      user_id,
      status: ViewStatus::NotStarted,
      provider: None,
      reference_id: None,
      verified_at: None,
      rejected_at: None,
      rejection_reason: None,
      updated_at: None,
    }
  }
}

impl From<&KycRecord> for StatusView {
  fn from(r: &KycRecord) -> Self {
    Self {
      user_id:          r.user_id,
      status:           r.status().into(),
      provider:         Some(r.provider.clone()),
      reference_id:     Some(r.reference_id.clone()),
      verified_at:      r.outcome.verified_at(),
      rejected_at:      r.outcome.rejected_at(),
      rejection_reason: r.outcome.rejection_reason().map(str::to_owned),
      updated_at:       Some(r.updated_at),
    }
  }
}
