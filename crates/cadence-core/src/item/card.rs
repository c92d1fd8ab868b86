//! Study Item - The unit that gets reviewed
//!
//! Each item carries:
//! - The term and its fill-in-the-blank exercise
//! - Expected answers and the learner's latest answers, keyed by blank index
//! - An optional [`MemoryState`], present only after the first review

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{Grade, MemoryState, Scheduler};

// ============================================================================
// STUDY ITEM
// ============================================================================

/// A persisted study item
///
/// The JSON form is the export format: `version` is required and unknown
/// keys are rejected, so legacy records never read as exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudyItem {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// The term being learned
    pub term: String,
    /// Explanation shown after answering
    pub explanation: String,
    /// Exercise text with `____` blanks
    pub exercise: String,
    /// Expected answer per blank
    #[serde(default)]
    pub answer: BTreeMap<String, String>,
    /// Learner's most recent answer per blank (free text only)
    #[serde(default)]
    pub user_answer: BTreeMap<String, String>,
    /// Optional grouping label, managed elsewhere
    #[serde(default)]
    pub group_name: Option<String>,
    /// Flagged by the learner for extra practice
    #[serde(default)]
    pub is_difficult: bool,
    /// When the item was created
    pub created_at: DateTime<Utc>,
    /// When the item was last modified
    pub updated_at: DateTime<Utc>,
    /// Write counter used for optimistic concurrency
    pub version: i64,
    /// Scheduling state; `None` until first graded
    #[serde(default)]
    pub memory: Option<MemoryState>,
}

impl StudyItem {
    /// Build a fresh, never-reviewed item from creation input
    pub fn from_new(id: impl Into<String>, input: NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            term: input.term,
            explanation: input.explanation,
            exercise: input.exercise,
            answer: input.answer,
            user_answer: BTreeMap::new(),
            group_name: input.group_name,
            is_difficult: input.is_difficult,
            created_at: now,
            updated_at: now,
            version: 0,
            memory: None,
        }
    }

    /// Whether the item belongs in a review set at `at`
    pub fn is_due(&self, at: DateTime<Utc>) -> bool {
        self.memory.is_none_or(|m| m.is_due(at))
    }

    /// Whether a review has ever been recorded
    pub fn is_scheduled(&self) -> bool {
        self.memory.is_some()
    }

    /// Number of blanks in the exercise
    pub fn blank_count(&self) -> usize {
        self.exercise.matches("____").count()
    }

    /// Copy of this item after a graded review
    pub fn reviewed(&self, scheduler: &Scheduler, grade: Grade, at: DateTime<Utc>) -> StudyItem {
        StudyItem {
            memory: Some(scheduler.review(self.memory.as_ref(), grade, at)),
            updated_at: at,
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Short human-readable schedule status
    pub fn describe_schedule(&self, at: DateTime<Utc>) -> String {
        let Some(memory) = self.memory else {
            return "not yet scheduled".to_string();
        };
        let days = memory.days_until_due(at);
        if memory.is_due(at) {
            match -days {
                0 => "due now".to_string(),
                1 => "overdue by 1 day".to_string(),
                n => format!("overdue by {} days", n),
            }
        } else {
            match days {
                0 => "due later today".to_string(),
                1 => "due in 1 day".to_string(),
                n => format!("due in {} days", n),
            }
        }
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for creating a new study item
///
/// Uses `deny_unknown_fields` so stray keys are rejected instead of silently
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewItem {
    /// The term being learned
    pub term: String,
    /// Explanation shown after answering
    #[serde(default)]
    pub explanation: String,
    /// Exercise text with `____` blanks
    #[serde(default)]
    pub exercise: String,
    /// Expected answer per blank
    #[serde(default)]
    pub answer: BTreeMap<String, String>,
    /// Optional grouping label
    #[serde(default)]
    pub group_name: Option<String>,
    /// Flag for extra practice
    #[serde(default)]
    pub is_difficult: bool,
}

impl NewItem {
    /// Input with just a term
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Default::default()
        }
    }

    /// Set the explanation
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Set the exercise and its answers, in blank order
    pub fn with_exercise<I, S>(mut self, exercise: impl Into<String>, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exercise = exercise.into();
        self.answer = answers
            .into_iter()
            .enumerate()
            .map(|(i, a)| (i.to_string(), a.into()))
            .collect();
        self
    }

    /// Set the group label
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group_name = Some(group.into());
        self
    }

    /// Reason the input cannot be stored, if any
    pub fn validation_error(&self) -> Option<String> {
        if self.term.trim().is_empty() {
            return Some("term must not be empty".to_string());
        }
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
