//! Database Migrations
//!
//! Schema migration definitions for the storage layer.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: study items with flat memory-state columns",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Review log for per-item grade history",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Integer due key so the due query orders past year 9999",
        up: MIGRATION_V3_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
///
/// Memory-state columns are all NULL until the first review. Timestamps are
/// RFC 3339 with nanoseconds and a `Z` suffix.
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS study_items (
    id TEXT PRIMARY KEY,
    term TEXT NOT NULL,
    explanation TEXT NOT NULL DEFAULT '',
    exercise TEXT NOT NULL DEFAULT '',
    answer TEXT NOT NULL DEFAULT '{}',
    user_answer TEXT NOT NULL DEFAULT '{}',
    group_name TEXT,
    is_difficult INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    -- Optimistic concurrency: bumped on every write
    version INTEGER NOT NULL DEFAULT 0,

    -- Memory state (NULL = never reviewed)
    memory_stability_days REAL,
    memory_difficulty REAL,
    memory_scheduled_at TEXT,
    memory_last_reviewed_at TEXT,
    memory_reps INTEGER,
    memory_lapses INTEGER
);

CREATE INDEX IF NOT EXISTS idx_items_scheduled_at ON study_items(memory_scheduled_at);
CREATE INDEX IF NOT EXISTS idx_items_created_at ON study_items(created_at);
CREATE INDEX IF NOT EXISTS idx_items_group ON study_items(group_name);

INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Review log
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS review_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id TEXT NOT NULL REFERENCES study_items(id) ON DELETE CASCADE,
    grade TEXT NOT NULL,
    reviewed_at TEXT NOT NULL,
    stability_before REAL,
    stability_after REAL NOT NULL,
    difficulty_after REAL NOT NULL,
    scheduled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_review_log_item ON review_log(item_id, reviewed_at);

INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

/// V3: Due key
///
/// RFC 3339 text only sorts correctly inside years 0000-9999 (chrono writes
/// `+10000-...` beyond that), so the due query compares
/// `(memory_due_secs, memory_due_nanos)` instead. Existing rows are
/// backfilled from the four-digit-year text form.
const MIGRATION_V3_UP: &str = r#"
ALTER TABLE study_items ADD COLUMN memory_due_secs INTEGER;
ALTER TABLE study_items ADD COLUMN memory_due_nanos INTEGER;

UPDATE study_items SET
    memory_due_secs = CAST(strftime('%s', substr(memory_scheduled_at, 1, 19)) AS INTEGER),
    memory_due_nanos = CAST(substr(memory_scheduled_at, 21, 9) AS INTEGER)
WHERE memory_scheduled_at GLOB '[0-9][0-9][0-9][0-9]-*';

DROP INDEX IF EXISTS idx_items_scheduled_at;
CREATE INDEX IF NOT EXISTS idx_items_due_key ON study_items(memory_due_secs, memory_due_nanos);

INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (3, datetime('now'));
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
