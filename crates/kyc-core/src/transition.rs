//! State-transition validation shared by webhook ingestion and
//! reconciliation.
//!
//! Pure: given the current record and a provider-reported status with its
//! ordering token, decide what (if anything) to write. Delivery is
//! at-least-once and possibly out of order, so the rules are:
//!
//! | Current  | Incoming                 | Token vs `last_event_at` | Result |
//! |----------|--------------------------|--------------------------|--------|
//! | terminal | anything                 | not newer                | `Duplicate` |
//! | pending  | verified / rejected      | any                      | `Apply` |
//! | terminal | other terminal state     | newer                    | `Apply` if corrections allowed, else `CorrectionSuppressed` |
//! | *        | anything else            | *                        | `Ignored` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  event::ProviderStatus,
  record::{KycRecord, KycStatus},
};

/// Policy knobs for transitions between terminal states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPolicy {
  /// Let a newer event overwrite one terminal state with another. Off by
  /// default: the first terminal state wins.
  pub allow_terminal_correction: bool,
}

/// What to do with an incoming status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  /// Write this record.
  Apply(KycRecord),
  /// Redelivery of something already reflected; succeed without writing.
  Duplicate,
  /// The provider changed its mind but the policy forbids overwriting.
  CorrectionSuppressed {
    current:  KycStatus,
    proposed: KycStatus,
  },
  /// Nothing to do (e.g. pending for a terminal record).
  Ignored,
}

pub fn decide(
  record: &KycRecord,
  incoming: &ProviderStatus,
  token: DateTime<Utc>,
  now: DateTime<Utc>,
  policy: TransitionPolicy,
) -> Decision {
  let current = record.status();
  let proposed = incoming.status;

  if current.is_terminal() {
    if token <= record.last_event_at {
      return Decision::Duplicate;
    }
    if !proposed.is_terminal() || proposed == current {
      return Decision::Ignored;
    }
    if !policy.allow_terminal_correction {
      return Decision::CorrectionSuppressed { current, proposed };
    }
  } else if !proposed.is_terminal() {
    return Decision::Ignored;
  }

  Decision::Apply(record.with_outcome(incoming.to_outcome(token), token, now))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use uuid::Uuid;

  use super::*;
  use crate::record::Outcome;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn pending() -> KycRecord {
    KycRecord::pending(Uuid::new_v4(), "sumsub", "ref-1", at(100))
  }

  fn verified_at(secs: i64) -> KycRecord {
    pending().with_outcome(
      Outcome::Verified { verified_at: at(secs) },
      at(secs),
      at(secs),
    )
  }

  const FIRST_WINS: TransitionPolicy =
    TransitionPolicy { allow_terminal_correction: false };
  const CORRECTING: TransitionPolicy =
    TransitionPolicy { allow_terminal_correction: true };

  #[test]
  fn pending_to_verified_applies() {
    let rec = pending();
    let decision =
      decide(&rec, &ProviderStatus::verified(None), at(200), at(201), FIRST_WINS);
    let Decision::Apply(next) = decision else {
      panic!("expected Apply, got {decision:?}");
    };
    assert_eq!(next.outcome, Outcome::Verified { verified_at: at(200) });
    assert_eq!(next.last_event_at, at(200));
    assert_eq!(next.updated_at, at(201));
  }

  #[test]
  fn pending_to_rejected_records_reason() {
    let rec = pending();
    let status = ProviderStatus::rejected(Some("document expired".into()), None);
    let Decision::Apply(next) = decide(&rec, &status, at(200), at(200), FIRST_WINS)
    else {
      panic!("expected Apply");
    };
    assert_eq!(next.outcome.rejection_reason(), Some("document expired"));
    assert_eq!(next.outcome.rejected_at(), Some(at(200)));
  }

  #[test]
  fn pending_to_pending_is_ignored() {
    let decision =
      decide(&pending(), &ProviderStatus::pending(), at(200), at(200), FIRST_WINS);
    assert_eq!(decision, Decision::Ignored);
  }

  #[test]
  fn identical_redelivery_is_duplicate() {
    let rec = verified_at(200);
    let decision =
      decide(&rec, &ProviderStatus::verified(None), at(200), at(300), FIRST_WINS);
    assert_eq!(decision, Decision::Duplicate);
  }

  #[test]
  fn stale_conflicting_event_is_duplicate_even_when_correcting() {
    let rec = verified_at(200);
    let status = ProviderStatus::rejected(Some("late".into()), None);
    let decision = decide(&rec, &status, at(150), at(300), CORRECTING);
    assert_eq!(decision, Decision::Duplicate);
  }

  #[test]
  fn newer_correction_is_suppressed_by_default() {
    let rec = verified_at(200);
    let status = ProviderStatus::rejected(Some("fraud".into()), None);
    let decision = decide(&rec, &status, at(250), at(300), FIRST_WINS);
    assert_eq!(
      decision,
      Decision::CorrectionSuppressed {
        current:  KycStatus::Verified,
        proposed: KycStatus::Rejected,
      }
    );
  }

  #[test]
  fn newer_correction_applies_when_allowed() {
    let rec = verified_at(200);
    let status = ProviderStatus::rejected(Some("fraud".into()), None);
    let Decision::Apply(next) = decide(&rec, &status, at(250), at(300), CORRECTING)
    else {
      panic!("expected Apply");
    };
    assert_eq!(next.status(), KycStatus::Rejected);
    assert_eq!(next.outcome.verified_at(), None);
    assert_eq!(next.last_event_at, at(250));
  }

  #[test]
  fn newer_pending_for_terminal_record_is_ignored() {
    let rec = verified_at(200);
    let decision =
      decide(&rec, &ProviderStatus::pending(), at(400), at(400), CORRECTING);
    assert_eq!(decision, Decision::Ignored);
  }

  #[test]
  fn newer_same_terminal_state_is_ignored() {
    let rec = verified_at(200);
    let decision =
      decide(&rec, &ProviderStatus::verified(None), at(400), at(400), CORRECTING);
    assert_eq!(decision, Decision::Ignored);
  }
}
