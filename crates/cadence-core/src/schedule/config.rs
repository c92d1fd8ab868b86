//! Scheduler coefficients
//!
//! The defaults reproduce the fixed heuristic exactly. They are carried as a
//! value so that a deployment can load different coefficients from its
//! configuration file without touching code.

use serde::{Deserialize, Serialize};

use super::algorithm::{
    DEFAULT_DIFFICULTY, DEFAULT_STABILITY_DAYS, DIFFICULTY_DELTAS, EASE_BONUS_WEIGHT,
    GRADE_FACTORS, MAX_DIFFICULTY, MAX_STABILITY_DAYS, MIN_DIFFICULTY, MIN_STABILITY_DAYS,
};
use super::state::Grade;

/// Rejected coefficient set
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A coefficient is NaN or infinite
    #[error("Coefficient '{0}' must be finite")]
    NonFinite(&'static str),
    /// A stability factor is zero or negative
    #[error("Stability factor for {grade} must be positive, got {value}")]
    NonPositiveFactor { grade: Grade, value: f64 },
    /// Factors must not decrease from Again to Easy
    #[error("Stability factors must be ordered again <= hard <= good <= easy")]
    UnorderedFactors,
    /// The ease bonus must not penalise easy items
    #[error("Ease bonus weight must be >= 0, got {0}")]
    NegativeBonus(f64),
    /// Difficulty bounds are inverted or empty
    #[error("Invalid difficulty range [{min}, {max}]")]
    InvalidDifficultyRange { min: f64, max: f64 },
    /// The starting difficulty lies outside the bounds
    #[error("Initial difficulty {0} lies outside the difficulty range")]
    InitialDifficultyOutOfRange(f64),
    /// Initial stability outside `[1, 3650]` days
    #[error("Initial stability must lie in [1, 3650] days, got {0}")]
    InitialStabilityOutOfRange(f64),
}

/// One value per grade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GradeTable {
    pub again: f64,
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

impl GradeTable {
    /// Build from an array indexed Again, Hard, Good, Easy
    pub const fn from_array(values: [f64; 4]) -> Self {
        Self {
            again: values[0],
            hard: values[1],
            good: values[2],
            easy: values[3],
        }
    }

    /// Value for a grade
    pub fn get(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Again => self.again,
            Grade::Hard => self.hard,
            Grade::Good => self.good,
            Grade::Easy => self.easy,
        }
    }

    fn values(&self) -> [(Grade, f64); 4] {
        Grade::ALL.map(|g| (g, self.get(g)))
    }
}

/// Coefficients driving the review transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SchedulerConfig {
    /// Stability of a never-reviewed item
    pub initial_stability_days: f64,
    /// Difficulty of a never-reviewed item
    pub initial_difficulty: f64,
    /// Difficulty floor
    pub min_difficulty: f64,
    /// Difficulty ceiling, also the pivot of the ease bonus
    pub max_difficulty: f64,
    /// Multiplicative stability factor per grade
    pub grade_factors: GradeTable,
    /// Additive difficulty delta per grade
    pub difficulty_deltas: GradeTable,
    /// Weight of `(max_difficulty - difficulty)` added on success
    pub ease_bonus_weight: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_stability_days: DEFAULT_STABILITY_DAYS,
            initial_difficulty: DEFAULT_DIFFICULTY,
            min_difficulty: MIN_DIFFICULTY,
            max_difficulty: MAX_DIFFICULTY,
            grade_factors: GradeTable::from_array(GRADE_FACTORS),
            difficulty_deltas: GradeTable::from_array(DIFFICULTY_DELTAS),
            ease_bonus_weight: EASE_BONUS_WEIGHT,
        }
    }
}

impl SchedulerConfig {
    /// Check that the coefficients keep the transition's invariants
    ///
    /// Accepted sets guarantee stability >= 1, difficulty within bounds, and
    /// that Again is never scheduled further out than Good or Easy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scalars = [
            ("initialStabilityDays", self.initial_stability_days),
            ("initialDifficulty", self.initial_difficulty),
            ("minDifficulty", self.min_difficulty),
            ("maxDifficulty", self.max_difficulty),
            ("easeBonusWeight", self.ease_bonus_weight),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
        }
        for (_, value) in self.grade_factors.values() {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite("gradeFactors"));
            }
        }
        for (_, value) in self.difficulty_deltas.values() {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite("difficultyDeltas"));
            }
        }

        if self.min_difficulty > self.max_difficulty {
            return Err(ConfigError::InvalidDifficultyRange {
                min: self.min_difficulty,
                max: self.max_difficulty,
            });
        }
        if !(self.min_difficulty..=self.max_difficulty).contains(&self.initial_difficulty) {
            return Err(ConfigError::InitialDifficultyOutOfRange(self.initial_difficulty));
        }
        if !(MIN_STABILITY_DAYS..=MAX_STABILITY_DAYS).contains(&self.initial_stability_days) {
            return Err(ConfigError::InitialStabilityOutOfRange(self.initial_stability_days));
        }

        for (grade, value) in self.grade_factors.values() {
            if value <= 0.0 {
                return Err(ConfigError::NonPositiveFactor { grade, value });
            }
        }
        let f = &self.grade_factors;
        if !(f.again <= f.hard && f.hard <= f.good && f.good <= f.easy) {
            return Err(ConfigError::UnorderedFactors);
        }
        if self.ease_bonus_weight < 0.0 {
            return Err(ConfigError::NegativeBonus(self.ease_bonus_weight));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
