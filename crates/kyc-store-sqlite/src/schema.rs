//! SQL schema for the KYC SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Mirror of the platform's user ids; the user directory proper lives
-- outside this store.
CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

-- One row per user. Never deleted; resubmission resets the row to PENDING.
CREATE TABLE IF NOT EXISTS kyc_records (
    user_id          TEXT PRIMARY KEY REFERENCES users(user_id),
    status           TEXT NOT NULL,   -- 'PENDING' | 'VERIFIED' | 'REJECTED'
    provider         TEXT NOT NULL,
    reference_id     TEXT NOT NULL,
    verified_at      TEXT,
    rejected_at      TEXT,
    rejection_reason TEXT,
    last_event_at    TEXT NOT NULL,   -- fixed-width RFC 3339, compared as text
    version          INTEGER NOT NULL CHECK (version > 0),
    last_polled_at   TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    UNIQUE (provider, reference_id),
    CHECK  (status IN ('PENDING', 'VERIFIED', 'REJECTED')),
    CHECK  (status != 'VERIFIED' OR (verified_at IS NOT NULL
                                     AND rejected_at IS NULL
                                     AND rejection_reason IS NULL)),
    CHECK  (status != 'REJECTED' OR (rejected_at IS NOT NULL
                                     AND rejection_reason IS NOT NULL))
);

-- Reconciliation queue order: least recently polled (or changed) first.
CREATE INDEX IF NOT EXISTS kyc_records_sweep_idx
    ON kyc_records(status, COALESCE(last_polled_at, updated_at));

PRAGMA user_version = 1;
";
