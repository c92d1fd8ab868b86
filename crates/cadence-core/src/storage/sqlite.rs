//! SQLite Storage Implementation
//!
//! Reference store for study items. It satisfies the two obligations the
//! scheduler places on persistence: fetching the due set, and writing back
//! the state a review produced without losing concurrent updates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::{LegacyTerm, NewItem, StudyItem};
use crate::schedule::{Grade, MemoryState, PreviewResults, Scheduler};
use crate::selection::{ReviewSetSelector, ReviewSummary};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Item not found
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Item changed since it was read
    #[error("Item {id} was modified concurrently (expected version {expected})")]
    Conflict { id: String, expected: i64 },
    /// Rejected input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// RECORDS
// ============================================================================

/// Result of a recorded review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    /// The item as persisted after the review
    pub item: StudyItem,
    /// State before the review (`None` on first review)
    pub previous: Option<MemoryState>,
    /// Grade applied
    pub grade: Grade,
}

impl ReviewOutcome {
    /// State produced by the review
    pub fn memory(&self) -> Option<&MemoryState> {
        self.item.memory.as_ref()
    }
}

/// One row of an item's review history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLogEntry {
    pub grade: Grade,
    pub reviewed_at: DateTime<Utc>,
    pub stability_before: Option<f64>,
    pub stability_after: f64,
    pub difficulty_after: f64,
    pub scheduled_at: DateTime<Utc>,
}

/// Outcome of a legacy import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Items written
    pub imported: usize,
    /// Records left out (empty term or id already present)
    pub skipped: usize,
    /// Of those, items that arrived with a scheduling state
    pub scheduled: usize,
    /// Terms whose scheduling state was discarded, with the reason
    pub rejected_states: Vec<(String, String)>,
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

/// RFC 3339 with nanoseconds, so a stored instant reads back exactly
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Integer key whose tuple order is time order over chrono's whole range
fn due_key(at: DateTime<Utc>) -> (i64, i64) {
    (at.timestamp(), i64::from(at.timestamp_subsec_nanos()))
}

/// Parse a stored timestamp
///
/// `FromStr` also accepts the signed five-digit years chrono writes past
/// 9999, which `parse_from_rfc3339` does not.
fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(StorageError::InvalidTimestamp(format!(
                    "{} '{}': {}",
                    field_name, value, e
                ))),
            )
        })
}

fn parse_json_map(value: &str) -> rusqlite::Result<BTreeMap<String, String>> {
    serde_json::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ============================================================================
// STORAGE
// ============================================================================

/// SQLite-backed item store
///
/// Uses separate reader/writer connections for interior mutability. All
/// methods take `&self`, so `Storage` is `Send + Sync` and can be shared
/// behind an `Arc`.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    scheduler: Scheduler,
    path: PathBuf,
}

impl Storage {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Default database location under the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "cadence", "cadence").ok_or_else(|| {
            StorageError::Init("Could not determine project directories".to_string())
        })?;
        Ok(proj_dirs.data_dir().join("cadence.db"))
    }

    /// Open (creating if needed) with default coefficients
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        Self::with_scheduler(db_path, Scheduler::default())
    }

    /// Open (creating if needed) with a specific scheduler
    pub fn with_scheduler(db_path: Option<PathBuf>, scheduler: Scheduler) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_path()?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
            // Restrict directory permissions to owner-only on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                let _ = std::fs::set_permissions(parent, perms);
            }
        }

        // Open writer connection
        let writer_conn = Connection::open(&path)?;

        // Restrict database file permissions to owner-only on Unix
        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        let applied = super::migrations::apply_migrations(&writer_conn)?;

        // Open reader connection to same path
        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        tracing::info!(
            path = %path.display(),
            migrations_applied = applied,
            "Storage opened"
        );

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            scheduler,
            path,
        })
    }

    /// Database file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scheduler applied by [`record_review`](Self::record_review)
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn lock_reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))
    }

    // ========================================================================
    // ITEMS
    // ========================================================================

    /// Create a new, unscheduled item
    pub fn add_item(&self, input: NewItem, at: DateTime<Utc>) -> Result<StudyItem> {
        if let Some(reason) = input.validation_error() {
            return Err(StorageError::InvalidInput(reason));
        }
        let item = StudyItem::from_new(Uuid::new_v4().to_string(), input, at);
        {
            let writer = self.lock_writer()?;
            Self::insert_item(&writer, &item)?;
        }
        tracing::debug!(id = %item.id, term = %item.term, "Item added");
        Ok(item)
    }

    fn insert_item(conn: &Connection, item: &StudyItem) -> Result<()> {
        let answer_json = serde_json::to_string(&item.answer)?;
        let user_answer_json = serde_json::to_string(&item.user_answer)?;
        let memory = item.memory.as_ref();
        let key = memory.map(|m| due_key(m.scheduled_at));

        conn.execute(
            "INSERT INTO study_items (
                id, term, explanation, exercise, answer, user_answer,
                group_name, is_difficult, created_at, updated_at, version,
                memory_stability_days, memory_difficulty, memory_scheduled_at,
                memory_last_reviewed_at, memory_reps, memory_lapses,
                memory_due_secs, memory_due_nanos
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17,
                ?18, ?19
            )",
            params![
                item.id,
                item.term,
                item.explanation,
                item.exercise,
                answer_json,
                user_answer_json,
                item.group_name,
                item.is_difficult,
                format_timestamp(item.created_at),
                format_timestamp(item.updated_at),
                item.version,
                memory.map(|m| m.stability_days),
                memory.map(|m| m.difficulty),
                memory.map(|m| format_timestamp(m.scheduled_at)),
                memory.and_then(|m| m.last_reviewed_at).map(format_timestamp),
                memory.map(|m| m.reps),
                memory.map(|m| m.lapses),
                key.map(|k| k.0),
                key.map(|k| k.1),
            ],
        )?;
        Ok(())
    }

    /// Get an item by ID
    pub fn get_item(&self, id: &str) -> Result<Option<StudyItem>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare("SELECT * FROM study_items WHERE id = ?1")?;
        let item = stmt
            .query_row(params![id], |row| Self::row_to_item(row))
            .optional()?;
        Ok(item)
    }

    /// Memory column that must be set whenever `memory_scheduled_at` is
    fn memory_column<T: rusqlite::types::FromSql>(
        row: &rusqlite::Row,
        column: &str,
    ) -> rusqlite::Result<T> {
        let value: Option<T> = row.get(column)?;
        value.ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Null,
                Box::new(StorageError::InvalidInput(format!(
                    "{} is NULL on a scheduled item",
                    column
                ))),
            )
        })
    }

    /// Convert a row to StudyItem
    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<StudyItem> {
        let answer: String = row.get("answer")?;
        let user_answer: String = row.get("user_answer")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        let scheduled_at: Option<String> = row.get("memory_scheduled_at")?;
        let memory = match scheduled_at {
            Some(scheduled_at) => {
                let last_reviewed_at: Option<String> = row.get("memory_last_reviewed_at")?;
                Some(MemoryState {
                    stability_days: Self::memory_column(row, "memory_stability_days")?,
                    difficulty: Self::memory_column(row, "memory_difficulty")?,
                    scheduled_at: parse_timestamp(&scheduled_at, "memory_scheduled_at")?,
                    last_reviewed_at: last_reviewed_at
                        .map(|s| parse_timestamp(&s, "memory_last_reviewed_at"))
                        .transpose()?,
                    reps: Self::memory_column(row, "memory_reps")?,
                    lapses: Self::memory_column(row, "memory_lapses")?,
                })
            }
            None => None,
        };

        Ok(StudyItem {
            id: row.get("id")?,
            term: row.get("term")?,
            explanation: row.get("explanation")?,
            exercise: row.get("exercise")?,
            answer: parse_json_map(&answer)?,
            user_answer: parse_json_map(&user_answer)?,
            group_name: row.get("group_name")?,
            is_difficult: row.get("is_difficult")?,
            created_at: parse_timestamp(&created_at, "created_at")?,
            updated_at: parse_timestamp(&updated_at, "updated_at")?,
            version: row.get("version")?,
            memory,
        })
    }

    fn collect_items(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<StudyItem>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| Self::row_to_item(row))?;

        let mut result = Vec::new();
        for item in rows {
            result.push(item?);
        }
        Ok(result)
    }

    /// Get items newest first (paginated)
    pub fn list_items(&self, limit: i64, offset: i64) -> Result<Vec<StudyItem>> {
        let reader = self.lock_reader()?;
        Self::collect_items(
            &reader,
            "SELECT * FROM study_items
             ORDER BY created_at DESC, id ASC
             LIMIT ?1 OFFSET ?2",
            params![limit, offset],
        )
    }

    /// Every item, oldest first
    pub fn export_items(&self) -> Result<Vec<StudyItem>> {
        let reader = self.lock_reader()?;
        Self::collect_items(
            &reader,
            "SELECT * FROM study_items ORDER BY created_at ASC, id ASC",
            [],
        )
    }

    /// Number of stored items
    pub fn count_items(&self) -> Result<i64> {
        let reader = self.lock_reader()?;
        let count = reader.query_row("SELECT COUNT(*) FROM study_items", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete an item and its review history
    pub fn delete_item(&self, id: &str) -> Result<bool> {
        let writer = self.lock_writer()?;
        let rows = writer.execute("DELETE FROM study_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // ========================================================================
    // REVIEW SET
    // ========================================================================

    /// Items due at `at`: unscheduled first, then by due instant, then oldest
    pub fn due_items(&self, at: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<StudyItem>> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let (secs, nanos) = due_key(at);
        let reader = self.lock_reader()?;
        let items = Self::collect_items(
            &reader,
            "SELECT * FROM study_items
             WHERE memory_scheduled_at IS NULL
                OR (memory_due_secs, memory_due_nanos) <= (?1, ?2)
             ORDER BY memory_scheduled_at IS NOT NULL,
                      memory_due_secs ASC,
                      memory_due_nanos ASC,
                      created_at ASC,
                      id ASC
             LIMIT ?3",
            params![secs, nanos, limit],
        )?;
        tracing::debug!(at = %at, count = items.len(), "Due items selected");
        Ok(items)
    }

    /// Workload summary over every stored item
    pub fn summary(&self, at: DateTime<Utc>) -> Result<ReviewSummary> {
        let items = self.export_items()?;
        Ok(ReviewSummary::compute(&items, at))
    }

    // ========================================================================
    // REVIEWS
    // ========================================================================

    /// Grade an item and persist the resulting state
    ///
    /// Fails with [`StorageError::Conflict`] if the item was written by
    /// someone else between the read and the write.
    pub fn record_review(&self, id: &str, grade: Grade, at: DateTime<Utc>) -> Result<ReviewOutcome> {
        let item = self
            .get_item(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let reviewed = item.reviewed(&self.scheduler, grade, at);
        let Some(next) = reviewed.memory else {
            return Err(StorageError::Init("Review produced no state".into()));
        };

        {
            let mut writer = self.lock_writer()?;
            let tx = writer.transaction()?;
            Self::write_memory(&tx, id, &next, item.version, at)?;
            tx.execute(
                "INSERT INTO review_log (
                    item_id, grade, reviewed_at, stability_before,
                    stability_after, difficulty_after, scheduled_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    grade.as_str(),
                    format_timestamp(at),
                    item.memory.map(|m| m.stability_days),
                    next.stability_days,
                    next.difficulty,
                    format_timestamp(next.scheduled_at),
                ],
            )?;
            tx.commit()?;
        }

        tracing::debug!(
            id = %id,
            grade = %grade,
            stability = next.stability_days,
            scheduled_at = %next.scheduled_at,
            "Review recorded"
        );

        Ok(ReviewOutcome {
            previous: item.memory,
            item: reviewed,
            grade,
        })
    }

    /// Persist a state computed elsewhere
    ///
    /// `expected_version` is the version the caller read; a mismatch means a
    /// concurrent write won and nothing is changed.
    pub fn save_memory(
        &self,
        id: &str,
        state: &MemoryState,
        expected_version: i64,
        at: DateTime<Utc>,
    ) -> Result<StudyItem> {
        {
            let mut writer = self.lock_writer()?;
            let tx = writer.transaction()?;
            Self::write_memory(&tx, id, state, expected_version, at)?;
            tx.commit()?;
        }
        self.get_item(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn write_memory(
        tx: &Transaction<'_>,
        id: &str,
        state: &MemoryState,
        expected_version: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let (due_secs, due_nanos) = due_key(state.scheduled_at);
        let rows = tx.execute(
            "UPDATE study_items SET
                memory_stability_days = ?1,
                memory_difficulty = ?2,
                memory_scheduled_at = ?3,
                memory_last_reviewed_at = ?4,
                memory_reps = ?5,
                memory_lapses = ?6,
                memory_due_secs = ?7,
                memory_due_nanos = ?8,
                updated_at = ?9,
                version = version + 1
            WHERE id = ?10 AND version = ?11",
            params![
                state.stability_days,
                state.difficulty,
                format_timestamp(state.scheduled_at),
                state.last_reviewed_at.map(format_timestamp),
                state.reps,
                state.lapses,
                due_secs,
                due_nanos,
                format_timestamp(at),
                id,
                expected_version,
            ],
        )?;

        if rows == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM study_items WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            return Err(if exists {
                tracing::warn!(id = %id, expected_version, "Stale write rejected");
                StorageError::Conflict {
                    id: id.to_string(),
                    expected: expected_version,
                }
            } else {
                StorageError::NotFound(id.to_string())
            });
        }
        Ok(())
    }

    /// Outcome of every grade for an item, without writing anything
    pub fn preview_review(&self, id: &str, at: DateTime<Utc>) -> Result<PreviewResults> {
        let item = self
            .get_item(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        Ok(self.scheduler.preview(item.memory.as_ref(), at))
    }

    /// Review history of an item, oldest first
    pub fn review_history(&self, id: &str) -> Result<Vec<ReviewLogEntry>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(
            "SELECT grade, reviewed_at, stability_before, stability_after,
                    difficulty_after, scheduled_at
             FROM review_log
             WHERE item_id = ?1
             ORDER BY reviewed_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![id], |row| {
            let grade: String = row.get(0)?;
            let reviewed_at: String = row.get(1)?;
            let scheduled_at: String = row.get(5)?;
            Ok(ReviewLogEntry {
                grade: grade.parse::<Grade>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                reviewed_at: parse_timestamp(&reviewed_at, "reviewed_at")?,
                stability_before: row.get(2)?,
                stability_after: row.get(3)?,
                difficulty_after: row.get(4)?,
                scheduled_at: parse_timestamp(&scheduled_at, "scheduled_at")?,
            })
        })?;

        let mut result = Vec::new();
        for entry in rows {
            result.push(entry?);
        }
        Ok(result)
    }

    // ========================================================================
    // IMPORT
    // ========================================================================

    /// Import items in the legacy export format
    ///
    /// Each record gets a fresh id. A malformed scheduling entry is logged and
    /// the item is imported unscheduled. All rows are written in one
    /// transaction.
    pub fn import_legacy(&self, terms: Vec<LegacyTerm>, at: DateTime<Utc>) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        let mut writer = self.lock_writer()?;
        let tx = writer.transaction()?;

        for term in terms {
            if term.term.trim().is_empty() {
                tracing::warn!("Skipping legacy record with empty term");
                report.skipped += 1;
                continue;
            }
            let label = term.term.clone();
            let (item, rejected) = term.into_study_item(Uuid::new_v4().to_string(), at);
            if let Some(reason) = rejected {
                tracing::warn!(term = %label, error = %reason, "Discarding legacy scheduling state");
                report.rejected_states.push((label, reason.to_string()));
            }
            if item.memory.is_some() {
                report.scheduled += 1;
            }
            Self::insert_item(&tx, &item)?;
            report.imported += 1;
        }

        tx.commit()?;
        tracing::info!(
            imported = report.imported,
            scheduled = report.scheduled,
            "Legacy import finished"
        );
        Ok(report)
    }

    /// Import items previously written by [`export_items`](Self::export_items)
    ///
    /// Ids, versions and memory states are kept as exported. Items whose id
    /// already exists are skipped rather than overwritten. A memory state
    /// that fails [`MemoryState::normalized`] is dropped and reported, and the
    /// item is imported unscheduled.
    pub fn import_items(&self, items: Vec<StudyItem>) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        let mut writer = self.lock_writer()?;
        let tx = writer.transaction()?;

        for mut item in items {
            if item.term.trim().is_empty() {
                tracing::warn!(id = %item.id, "Skipping exported item with empty term");
                report.skipped += 1;
                continue;
            }
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM study_items WHERE id = ?1)",
                params![item.id],
                |row| row.get(0),
            )?;
            if exists {
                tracing::debug!(id = %item.id, "Item already present, skipping");
                report.skipped += 1;
                continue;
            }
            if let Some(memory) = item.memory.take() {
                match memory.normalized() {
                    Ok(memory) => item.memory = Some(memory),
                    Err(reason) => {
                        tracing::warn!(
                            id = %item.id,
                            error = %reason,
                            "Discarding imported scheduling state"
                        );
                        report.rejected_states.push((item.term.clone(), reason.to_string()));
                    }
                }
            }
            if item.memory.is_some() {
                report.scheduled += 1;
            }
            Self::insert_item(&tx, &item)?;
            report.imported += 1;
        }

        tx.commit()?;
        tracing::info!(
            imported = report.imported,
            skipped = report.skipped,
            "Item import finished"
        );
        Ok(report)
    }
}

impl ReviewSetSelector for Storage {
    type Error = StorageError;

    fn select_due(
        &self,
        at: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<StudyItem>> {
        self.due_items(at, limit)
    }
}

// ============================================================================
// TESTS
// ============================================================================
