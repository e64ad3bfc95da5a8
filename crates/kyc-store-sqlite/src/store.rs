//! [`SqliteStore`]: the SQLite implementation of [`KycRepository`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use kyc_core::{
  record::{KycRecord, UserId},
  store::{KycRepository, UpsertResult},
};

use crate::{
  encode::{RECORD_COLUMNS, RawRecord, encode_dt, encode_uuid, encode_version},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A KYC record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What a conditional write did, decided inside the connection thread.
enum RawUpsert {
  Written,
  Stale,
  DuplicateReference,
  UnknownUser,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-row `SELECT` over `kyc_records` with the given filter.
  async fn select_one(
    &self,
    filter: &'static str,
    params: Vec<String>,
  ) -> Result<Option<KycRecord>> {
    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM kyc_records WHERE {filter}");
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params_from_iter(params.iter()),
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }
}

// ─── KycRepository impl ──────────────────────────────────────────────────────

impl KycRepository for SqliteStore {
  type Error = Error;

  async fn register_user(&self, user_id: UserId) -> Result<()> {
    let id_str = encode_uuid(user_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO users (user_id, created_at) VALUES (?1, ?2)",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn user_exists(&self, user_id: UserId) -> Result<bool> {
    let id_str = encode_uuid(user_id);

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM users WHERE user_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn get_by_user_id(&self, user_id: UserId) -> Result<Option<KycRecord>> {
    self.select_one("user_id = ?1", vec![encode_uuid(user_id)]).await
  }

  async fn get_by_provider_reference(
    &self,
    provider: &str,
    reference_id: &str,
  ) -> Result<Option<KycRecord>> {
    self
      .select_one(
        "provider = ?1 AND reference_id = ?2",
        vec![provider.to_owned(), reference_id.to_owned()],
      )
      .await
  }

  async fn upsert(
    &self,
    record: KycRecord,
    expected_version: Option<u64>,
  ) -> Result<UpsertResult> {
    if expected_version.is_some_and(|v| record.version <= v) {
      return Err(
        kyc_core::Error::Invariant("write must advance the record version").into(),
      );
    }
    let raw = RawRecord::from_record(&record)?;
    let expected = expected_version.map(encode_version).transpose()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let result = match expected {
          None => conn.execute(
            &format!(
              "INSERT INTO kyc_records ({RECORD_COLUMNS})
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
               ON CONFLICT(user_id) DO NOTHING"
            ),
            rusqlite::params![
              raw.user_id,
              raw.status,
              raw.provider,
              raw.reference_id,
              raw.verified_at,
              raw.rejected_at,
              raw.rejection_reason,
              raw.last_event_at,
              raw.version,
              raw.last_polled_at,
              raw.created_at,
              raw.updated_at,
            ],
          ),
          Some(expected) => conn.execute(
            "UPDATE kyc_records SET
               status = ?2, provider = ?3, reference_id = ?4,
               verified_at = ?5, rejected_at = ?6, rejection_reason = ?7,
               last_event_at = ?8, version = ?9, last_polled_at = ?10,
               updated_at = ?11
             WHERE user_id = ?1 AND version = ?12",
            rusqlite::params![
              raw.user_id,
              raw.status,
              raw.provider,
              raw.reference_id,
              raw.verified_at,
              raw.rejected_at,
              raw.rejection_reason,
              raw.last_event_at,
              raw.version,
              raw.last_polled_at,
              raw.updated_at,
              expected,
            ],
          ),
        };

        Ok(match result {
          Ok(0) => RawUpsert::Stale,
          Ok(_) => RawUpsert::Written,
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            RawUpsert::DuplicateReference
          }
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
          {
            RawUpsert::UnknownUser
          }
          Err(e) => return Err(e.into()),
        })
      })
      .await?;

    match outcome {
      RawUpsert::Written => Ok(UpsertResult::Written),
      RawUpsert::Stale => Ok(UpsertResult::Conflict),
      RawUpsert::DuplicateReference => Err(Error::DuplicateReference {
        provider:     record.provider,
        reference_id: record.reference_id,
      }),
      RawUpsert::UnknownUser => Err(Error::UnknownUser(record.user_id)),
    }
  }

  async fn find_stale_pending(
    &self,
    older_than: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<KycRecord>> {
    let cutoff = encode_dt(older_than);
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS} FROM kyc_records
           WHERE status = 'PENDING'
             AND COALESCE(last_polled_at, updated_at) < ?1
           ORDER BY COALESCE(last_polled_at, updated_at), user_id
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![cutoff, limit_val], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}
