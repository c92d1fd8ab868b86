//! Review scheduler
//!
//! Pure state transitions over [`MemoryState`]. A [`Scheduler`] is a small
//! `Copy` value holding validated coefficients, so it can be shared freely
//! between threads; every call returns a new state and mutates nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::algorithm::{add_days, next_difficulty_with_config, next_stability_with_config};
use super::config::{ConfigError, SchedulerConfig};
use super::state::{Grade, MemoryState};

// ============================================================================
// PREVIEW
// ============================================================================

/// Outcome of each grade from the same starting state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResults {
    pub again: MemoryState,
    pub hard: MemoryState,
    pub good: MemoryState,
    pub easy: MemoryState,
}

impl PreviewResults {
    /// Resulting state for a grade
    pub fn get(&self, grade: Grade) -> &MemoryState {
        match grade {
            Grade::Again => &self.again,
            Grade::Hard => &self.hard,
            Grade::Good => &self.good,
            Grade::Easy => &self.easy,
        }
    }

    /// Resulting interval (whole days) per grade, Again first
    pub fn intervals(&self) -> [(Grade, f64); 4] {
        Grade::ALL.map(|g| (g, self.get(g).stability_days))
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Grade-driven state transition function
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler with custom coefficients
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Coefficients in use
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// State of a never-reviewed item, due immediately
    pub fn init(&self, now: DateTime<Utc>) -> MemoryState {
        MemoryState {
            stability_days: self.config.initial_stability_days,
            difficulty: self.config.initial_difficulty,
            ..MemoryState::new(now)
        }
    }

    /// Absent state is always due
    pub fn is_due(&self, state: Option<&MemoryState>, at: DateTime<Utc>) -> bool {
        state.is_none_or(|s| s.is_due(at))
    }

    /// Apply one review
    ///
    /// An absent state is initialised at `at` first. Total over all grades.
    pub fn review(
        &self,
        state: Option<&MemoryState>,
        grade: Grade,
        at: DateTime<Utc>,
    ) -> MemoryState {
        let prev = state.copied().unwrap_or_else(|| self.init(at));

        let difficulty = next_difficulty_with_config(prev.difficulty, grade, &self.config);
        let stability_days =
            next_stability_with_config(prev.stability_days, difficulty, grade, &self.config);
        let scheduled_at = add_days(at, stability_days);

        let (reps, lapses) = if grade.is_lapse() {
            (prev.reps, prev.lapses.saturating_add(1))
        } else {
            (prev.reps.saturating_add(1), prev.lapses)
        };

        debug!(
            grade = %grade,
            stability_before = prev.stability_days,
            stability_after = stability_days,
            difficulty_after = difficulty,
            scheduled_at = %scheduled_at,
            "review applied"
        );

        MemoryState {
            stability_days,
            difficulty,
            scheduled_at,
            last_reviewed_at: Some(at),
            reps,
            lapses,
        }
    }

    /// What every grade would produce, without committing to one
    pub fn preview(&self, state: Option<&MemoryState>, at: DateTime<Utc>) -> PreviewResults {
        PreviewResults {
            again: self.review(state, Grade::Again, at),
            hard: self.review(state, Grade::Hard, at),
            good: self.review(state, Grade::Good, at),
            easy: self.review(state, Grade::Easy, at),
        }
    }

    /// Fold a review history from scratch
    ///
    /// Returns `None` for an empty history.
    pub fn replay<I>(&self, reviews: I) -> Option<MemoryState>
    where
        I: IntoIterator<Item = (Grade, DateTime<Utc>)>,
    {
        reviews.into_iter().fold(None, |state, (grade, at)| {
            Some(self.review(state.as_ref(), grade, at))
        })
    }
}

// ============================================================================
// DEFAULT-COEFFICIENT SHORTHANDS
// ============================================================================

/// [`Scheduler::init`] with default coefficients
pub fn init(now: DateTime<Utc>) -> MemoryState {
    Scheduler::default().init(now)
}

/// [`Scheduler::is_due`] with default coefficients
pub fn is_due(state: Option<&MemoryState>, at: DateTime<Utc>) -> bool {
    Scheduler::default().is_due(state, at)
}

/// [`Scheduler::review`] with default coefficients
pub fn review(state: Option<&MemoryState>, grade: Grade, at: DateTime<Utc>) -> MemoryState {
    Scheduler::default().review(state, grade, at)
}

// ============================================================================
// TESTS
// ============================================================================
