//! Transition arithmetic
//!
//! The numeric pieces of a review: difficulty drift, stability growth and
//! projecting the next due instant. Everything here is a pure function of its
//! arguments; [`Scheduler`](super::Scheduler) strings them together.
//!
//! ## Formulas
//!
//! - Difficulty: `D' = clamp(D + delta(grade), 1, 10)`
//! - Stability (Again): `S' = clamp(round(S * factor), 1, 3650)`
//! - Stability (success): `S' = clamp(round(S * factor + (10 - D') * 0.2), 1, 3650)`
//! - Schedule: `due = at + clamp(round(S'), -3650, 3650) days`

use chrono::{DateTime, Duration, Utc};

use super::config::SchedulerConfig;
use super::state::Grade;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Stability assigned to an item that has never been reviewed
pub const DEFAULT_STABILITY_DAYS: f64 = 1.0;

/// Neutral starting difficulty
pub const DEFAULT_DIFFICULTY: f64 = 6.0;

/// Lower difficulty bound (easiest)
pub const MIN_DIFFICULTY: f64 = 1.0;

/// Upper difficulty bound (hardest)
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Stability never drops below one day
pub const MIN_STABILITY_DAYS: f64 = 1.0;

/// Largest day offset applied when projecting a schedule, in either direction
pub const MAX_DAY_OFFSET: i64 = 3650;

/// Stability saturates at the longest interval a schedule can express
pub const MAX_STABILITY_DAYS: f64 = MAX_DAY_OFFSET as f64;

/// Stability multipliers indexed by grade (Again, Hard, Good, Easy)
pub const GRADE_FACTORS: [f64; 4] = [0.5, 0.8, 1.8, 2.5];

/// Additive difficulty deltas indexed by grade (Again, Hard, Good, Easy)
pub const DIFFICULTY_DELTAS: [f64; 4] = [1.0, 0.4, -0.3, -0.6];

/// Weight of the `(10 - difficulty)` bonus applied on successful recall
pub const EASE_BONUS_WEIGHT: f64 = 0.2;

// ============================================================================
// DIFFICULTY
// ============================================================================

/// Clamp a difficulty into the default `[1, 10]` range
#[inline]
pub fn clamp_difficulty(difficulty: f64) -> f64 {
    difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Difficulty after a review, using the default coefficients
pub fn next_difficulty(difficulty: f64, grade: Grade) -> f64 {
    clamp_difficulty(difficulty + DIFFICULTY_DELTAS[grade.index()])
}

/// Difficulty after a review with custom coefficients
pub fn next_difficulty_with_config(difficulty: f64, grade: Grade, config: &SchedulerConfig) -> f64 {
    (difficulty + config.difficulty_deltas.get(grade))
        .clamp(config.min_difficulty, config.max_difficulty)
}

// ============================================================================
// STABILITY
// ============================================================================

/// Stability after a review, using the default coefficients
///
/// `difficulty_after` is the difficulty produced by the same review, so easy
/// items already eased by this grade get the larger bonus.
pub fn next_stability(stability_days: f64, difficulty_after: f64, grade: Grade) -> f64 {
    next_stability_with_config(
        stability_days,
        difficulty_after,
        grade,
        &SchedulerConfig::default(),
    )
}

/// Stability after a review with custom coefficients
pub fn next_stability_with_config(
    stability_days: f64,
    difficulty_after: f64,
    grade: Grade,
    config: &SchedulerConfig,
) -> f64 {
    let scaled = stability_days * config.grade_factors.get(grade);
    let raw = if grade.is_lapse() {
        scaled
    } else {
        scaled + (config.max_difficulty - difficulty_after) * config.ease_bonus_weight
    };

    // Bounds apply after rounding
    raw.round().clamp(MIN_STABILITY_DAYS, MAX_STABILITY_DAYS)
}

// ============================================================================
// SCHEDULE PROJECTION
// ============================================================================

/// Round a (possibly fractional) day count and saturate it to
/// `[-MAX_DAY_OFFSET, MAX_DAY_OFFSET]`
pub fn clamp_day_offset(days: f64) -> i64 {
    if days.is_nan() {
        return 0;
    }
    let bound = MAX_DAY_OFFSET as f64;
    days.round().clamp(-bound, bound) as i64
}

/// Add a clamped number of whole days to an instant
///
/// Saturates at chrono's representable range rather than panicking.
pub fn add_days(at: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let offset = clamp_day_offset(days);
    at.checked_add_signed(Duration::days(offset))
        .unwrap_or(if offset >= 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}

// ============================================================================
// TESTS
// ============================================================================
