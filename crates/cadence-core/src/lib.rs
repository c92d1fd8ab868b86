//! # Cadence Core
//!
//! Review scheduling for fill-in-the-blank study items. Each item carries a
//! small memory record (stability in days, difficulty on 1..=10, next due
//! instant) that a graded review moves forward.
//!
//! - **Scheduler**: pure, deterministic `init`, `review`, `is_due`, `preview`
//! - **Study items**: typed records with an optional [`MemoryState`]
//! - **Review sets**: everything due at an instant, unscheduled items first
//! - **Storage**: SQLite with optimistic versioning and a review log
//! - **Legacy import**: lifts `__fsrs` entries out of old answer maps
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadence_core::{Grade, NewItem, Storage};
//! use chrono::Utc;
//!
//! // Create storage (uses default platform-specific location)
//! let storage = Storage::new(None)?;
//!
//! let item = storage.add_item(NewItem::new("zeugma"), Utc::now())?;
//!
//! // Today's review set
//! for item in storage.due_items(Utc::now(), Some(20))? {
//!     storage.record_review(&item.id, Grade::Good, Utc::now())?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): Compile SQLite in rather than linking the system library

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod item;
pub mod schedule;
pub mod selection;
pub mod storage;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use schedule::{
    init, is_due, review, Clock, ConfigError, FixedClock, Grade, GradeParseError, GradeTable,
    MemoryState, PreviewResults, Scheduler, SchedulerConfig, StateBoundsError, SystemClock,
    DEFAULT_DIFFICULTY, DEFAULT_STABILITY_DAYS, MAX_DAY_OFFSET, MAX_DIFFICULTY,
    MAX_STABILITY_DAYS, MIN_DIFFICULTY, MIN_STABILITY_DAYS,
};

pub use item::{LegacyStateError, LegacyTerm, NewItem, StudyItem, LEGACY_STATE_KEY};

pub use selection::{due_order, select_due, ReviewSetSelector, ReviewSummary};

pub use storage::{ImportReport, Result, ReviewLogEntry, ReviewOutcome, Storage, StorageError};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Grade, MemoryState, NewItem, Result, ReviewSetSelector, Scheduler, Storage, StorageError,
        StudyItem,
    };
}
