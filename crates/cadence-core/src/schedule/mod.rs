//! Review scheduling module
//!
//! A compact stability/difficulty model in the FSRS family. It is a heuristic
//! updater with fixed default coefficients, not a fitted forgetting curve.
//!
//! ## Pieces
//! - [`MemoryState`]: per-item scheduling record
//! - [`Grade`]: closed Again/Hard/Good/Easy outcome
//! - [`Scheduler`]: `init`, `review`, `is_due`, `preview`
//! - [`Clock`]: where front ends get "now" from
//!
//! ## Transition
//! - Difficulty drifts by a per-grade delta and is clamped to [1, 10]
//! - Stability is scaled per grade; successes add `(10 - D') * 0.2`
//! - The item is due `round(S')` days after the review, offset clamped to 3650 days

mod algorithm;
mod clock;
mod config;
mod scheduler;
mod state;

pub use algorithm::{
    add_days,
    clamp_day_offset,
    clamp_difficulty,
    next_difficulty,
    next_difficulty_with_config,
    next_stability,
    next_stability_with_config,
    // Constants
    DEFAULT_DIFFICULTY,
    DEFAULT_STABILITY_DAYS,
    DIFFICULTY_DELTAS,
    EASE_BONUS_WEIGHT,
    GRADE_FACTORS,
    MAX_DAY_OFFSET,
    MAX_DIFFICULTY,
    MAX_STABILITY_DAYS,
    MIN_DIFFICULTY,
    MIN_STABILITY_DAYS,
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, GradeTable, SchedulerConfig};
pub use scheduler::{init, is_due, review, PreviewResults, Scheduler};
pub use state::{Grade, GradeParseError, MemoryState, StateBoundsError};
