//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that text comparison matches time order and
//! range filters stay index-friendly. UUIDs are stored as hyphenated
//! lowercase strings. Record versions are stored as SQLite integers.

use chrono::{DateTime, SecondsFormat, Utc};
use kyc_core::record::{KycRecord, KycStatus, Outcome};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Version ─────────────────────────────────────────────────────────────────

pub fn encode_version(v: u64) -> Result<i64> {
  i64::try_from(v).map_err(|_| {
    kyc_core::Error::Invariant("record version exceeds storage range").into()
  })
}

pub fn decode_version(v: i64) -> Result<u64> {
  u64::try_from(v)
    .map_err(|_| kyc_core::Error::Invariant("negative record version").into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const RECORD_COLUMNS: &str = "user_id, status, provider, reference_id, \
   verified_at, rejected_at, rejection_reason, last_event_at, version, \
   last_polled_at, created_at, updated_at";

/// Raw strings read directly from a `kyc_records` row.
pub struct RawRecord {
  pub user_id:          String,
  pub status:           String,
  pub provider:         String,
  pub reference_id:     String,
  pub verified_at:      Option<String>,
  pub rejected_at:      Option<String>,
  pub rejection_reason: Option<String>,
  pub last_event_at:    String,
  pub version:          i64,
  pub last_polled_at:   Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawRecord {
  /// Read a row selected with [`RECORD_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:          row.get(0)?,
      status:           row.get(1)?,
      provider:         row.get(2)?,
      reference_id:     row.get(3)?,
      verified_at:      row.get(4)?,
      rejected_at:      row.get(5)?,
      rejection_reason: row.get(6)?,
      last_event_at:    row.get(7)?,
      version:          row.get(8)?,
      last_polled_at:   row.get(9)?,
      created_at:       row.get(10)?,
      updated_at:       row.get(11)?,
    })
  }

  pub fn from_record(r: &KycRecord) -> Result<Self> {
    Ok(Self {
      user_id:          encode_uuid(r.user_id),
      status:           r.status().to_string(),
      provider:         r.provider.clone(),
      reference_id:     r.reference_id.clone(),
      verified_at:      r.outcome.verified_at().map(encode_dt),
      rejected_at:      r.outcome.rejected_at().map(encode_dt),
      rejection_reason: r.outcome.rejection_reason().map(str::to_owned),
      last_event_at:    encode_dt(r.last_event_at),
      version:          encode_version(r.version)?,
      last_polled_at:   r.last_polled_at.map(encode_dt),
      created_at:       encode_dt(r.created_at),
      updated_at:       encode_dt(r.updated_at),
    })
  }

  pub fn into_record(self) -> Result<KycRecord> {
    let status = KycStatus::parse(&self.status)?;
    let outcome = Outcome::from_columns(
      status,
      self.verified_at.as_deref().map(decode_dt).transpose()?,
      self.rejected_at.as_deref().map(decode_dt).transpose()?,
      self.rejection_reason,
    )?;

    Ok(KycRecord {
      user_id: decode_uuid(&self.user_id)?,
      provider: self.provider,
      reference_id: self.reference_id,
      outcome,
      last_event_at: decode_dt(&self.last_event_at)?,
      version: decode_version(self.version)?,
      last_polled_at: self.last_polled_at.as_deref().map(decode_dt).transpose()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
