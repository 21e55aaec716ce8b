//! SQL schema for the dswatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
PRAGMA temp_store = MEMORY;

-- The catalog. Seeded once; only `class` changes afterwards.
CREATE TABLE IF NOT EXISTS domains (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT    NOT NULL UNIQUE,
    rank  INTEGER NOT NULL,
    class TEXT
);

-- One row per verdict change. A repeated verdict only bumps `checked_at`.
CREATE TABLE IF NOT EXISTS dns_checks (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    domain_id  INTEGER NOT NULL REFERENCES domains(id),
    checked_at TEXT    NOT NULL,   -- RFC 3339 UTC, fixed-width microseconds
    has_dnssec INTEGER,            -- NULL when the probe failed
    error      TEXT    NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS domains_rank_idx       ON domains(rank);
CREATE INDEX IF NOT EXISTS dns_checks_domain_idx  ON dns_checks(domain_id, checked_at);
CREATE INDEX IF NOT EXISTS dns_checks_checked_idx ON dns_checks(checked_at);

PRAGMA user_version = 1;
";
