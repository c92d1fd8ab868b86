//! Memory state and grades
//!
//! [`MemoryState`] is the durable per-item scheduling record. It carries no
//! derived or cached fields, so whatever is persisted is exactly what the
//! transition function reads back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::algorithm::{
    DEFAULT_DIFFICULTY, DEFAULT_STABILITY_DAYS, MAX_DIFFICULTY, MAX_STABILITY_DAYS, MIN_DIFFICULTY,
    MIN_STABILITY_DAYS,
};

// ============================================================================
// GRADE
// ============================================================================

/// Self-assessed outcome of a single review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    /// Forgot the item (a lapse)
    Again,
    /// Recalled with serious difficulty
    Hard,
    /// Recalled correctly
    Good,
    /// Recalled effortlessly
    Easy,
}

impl Grade {
    /// Every grade, in ascending order of recall quality
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Again => "again",
            Grade::Hard => "hard",
            Grade::Good => "good",
            Grade::Easy => "easy",
        }
    }

    /// Capitalised display label
    pub fn label(&self) -> &'static str {
        match self {
            Grade::Again => "Again",
            Grade::Hard => "Hard",
            Grade::Good => "Good",
            Grade::Easy => "Easy",
        }
    }

    /// Conventional 1..=4 numbering
    pub fn as_i32(&self) -> i32 {
        match self {
            Grade::Again => 1,
            Grade::Hard => 2,
            Grade::Good => 3,
            Grade::Easy => 4,
        }
    }

    /// Parse the conventional 1..=4 numbering
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Grade::Again),
            2 => Some(Grade::Hard),
            3 => Some(Grade::Good),
            4 => Some(Grade::Easy),
            _ => None,
        }
    }

    /// Whether this grade counts as a failed recall
    pub fn is_lapse(&self) -> bool {
        matches!(self, Grade::Again)
    }

    /// Position in coefficient tables
    pub(crate) fn index(&self) -> usize {
        match self {
            Grade::Again => 0,
            Grade::Hard => 1,
            Grade::Good => 2,
            Grade::Easy => 3,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raised when text does not name a grade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown grade '{0}' (expected again, hard, good, easy or 1-4)")]
pub struct GradeParseError(pub String);

impl std::str::FromStr for Grade {
    type Err = GradeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<i32>() {
            return Grade::from_i32(n).ok_or_else(|| GradeParseError(s.to_string()));
        }
        match trimmed.to_lowercase().as_str() {
            "again" => Ok(Grade::Again),
            "hard" => Ok(Grade::Hard),
            "good" => Ok(Grade::Good),
            "easy" => Ok(Grade::Easy),
            _ => Err(GradeParseError(s.to_string())),
        }
    }
}

/// A stored state whose numbers no review could have produced
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateBoundsError {
    #[error("Difficulty {0} lies outside [1, 10]")]
    Difficulty(f64),
    #[error("Stability {0} is below one day")]
    Stability(f64),
}

// ============================================================================
// MEMORY STATE
// ============================================================================

/// Scheduling record embedded in a study item
///
/// | Field              | Invariant                                   |
/// |--------------------|---------------------------------------------|
/// | `stability_days`   | >= 1, whole days after any review           |
/// | `difficulty`       | within the configured difficulty bounds     |
/// | `scheduled_at`     | >= the review instant that produced it      |
/// | `last_reviewed_at` | `None` only before the first review         |
/// | `reps` / `lapses`  | successful / failed review counts           |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Current retention interval in days
    pub stability_days: f64,
    /// Inverse ease (1.0 = easy, 10.0 = hard)
    pub difficulty: f64,
    /// Instant at which the item becomes due
    pub scheduled_at: DateTime<Utc>,
    /// Instant of the most recent review
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// Number of non-failing reviews
    pub reps: u32,
    /// Number of failing reviews
    pub lapses: u32,
}

impl MemoryState {
    /// Default state for an item that has never been reviewed: due at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            stability_days: DEFAULT_STABILITY_DAYS,
            difficulty: DEFAULT_DIFFICULTY,
            scheduled_at: now,
            last_reviewed_at: None,
            reps: 0,
            lapses: 0,
        }
    }

    /// Due iff the scheduled instant is at or before `at`
    pub fn is_due(&self, at: DateTime<Utc>) -> bool {
        self.scheduled_at <= at
    }

    /// True until the first review completes
    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }

    /// Total completed reviews
    pub fn review_count(&self) -> u32 {
        self.reps.saturating_add(self.lapses)
    }

    /// Whole days between the last review and the scheduled instant
    pub fn interval_days(&self) -> Option<i64> {
        self.last_reviewed_at
            .map(|last| (self.scheduled_at - last).num_days())
    }

    /// Whole days from `at` until the item is due (negative when overdue)
    pub fn days_until_due(&self, at: DateTime<Utc>) -> i64 {
        (self.scheduled_at - at).num_days()
    }

    /// Check a state read from outside the engine against the review bounds
    ///
    /// Stability above the cap is saturated the way a review would saturate
    /// it. Any other out-of-range value (NaN included) is rejected.
    pub fn normalized(mut self) -> Result<Self, StateBoundsError> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(StateBoundsError::Difficulty(self.difficulty));
        }
        if self.stability_days.is_nan() || self.stability_days < MIN_STABILITY_DAYS {
            return Err(StateBoundsError::Stability(self.stability_days));
        }
        self.stability_days = self.stability_days.min(MAX_STABILITY_DAYS);
        Ok(self)
    }
}

// ============================================================================
// TESTS
// ============================================================================
