//! SQL schema for the Muster SQLite store.
//!
//! [`SCHEMA`] runs first on every open and only creates what is missing.
//! Older databases may then need columns added (see `migrate.rs`) before
//! [`INDEXES`] can reference them.

/// Table DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    email   TEXT,
    grade   TEXT NOT NULL DEFAULT 'Staff',
    name    TEXT NOT NULL,
    dept    TEXT,
    phone   TEXT,
    role    TEXT NOT NULL DEFAULT 'member'   -- 'member' | 'admin'
);

CREATE TABLE IF NOT EXISTS rosters (
    roster_id  TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    is_active  INTEGER NOT NULL DEFAULT 1,
    group_name TEXT,
    UNIQUE (user_id)
);

CREATE TABLE IF NOT EXISTS periods (
    period_id  TEXT PRIMARY KEY,
    seq        INTEGER NOT NULL UNIQUE,
    started_at TEXT NOT NULL,
    ended_at   TEXT                      -- NULL while the period is open
);

-- At most one open period. Every open row indexes to the same value (1),
-- so a second open row violates uniqueness.
CREATE UNIQUE INDEX IF NOT EXISTS periods_single_open
    ON periods ((ended_at IS NULL)) WHERE ended_at IS NULL;

-- One current report per member per period; overwritten in place.
CREATE TABLE IF NOT EXISTS reports_p (
    period_id     TEXT NOT NULL REFERENCES periods(period_id) ON DELETE CASCADE,
    user_id       TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    status        TEXT NOT NULL
                  CHECK (status IN ('safe', 'evacuating', 'need_help', 'unknown')),
    contact_email TEXT,
    shelter_name  TEXT,
    shelter_type  TEXT,
    shelter_addr  TEXT,
    shelter_lat   REAL,
    shelter_lng   REAL,
    damage_level  TEXT,
    damage_notes  TEXT,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (period_id, user_id)
);

-- Strictly append-only.
CREATE TABLE IF NOT EXISTS report_history_p (
    history_id TEXT PRIMARY KEY,
    period_id  TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    changed_at TEXT NOT NULL,
    diff       TEXT
);

CREATE INDEX IF NOT EXISTS report_history_p_member_idx
    ON report_history_p(period_id, user_id);
";

/// Indexes over columns that older databases only gain after migration.
pub const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS users_email_idx ON users(email);
CREATE INDEX IF NOT EXISTS reports_p_updated_idx ON reports_p(period_id, updated_at);

PRAGMA user_version = 2;
";

/// `(grade, name)` identifies a user. Only created once the data allows it;
/// see `migrate::ensure_grade_name_unique`.
pub const GRADE_NAME_UNIQUE: &str =
  "CREATE UNIQUE INDEX IF NOT EXISTS users_grade_name ON users(grade, name)";
