//! Legacy answer-bag import
//!
//! Older exports stored the scheduling record inside the free-form
//! `userAnswer` map under the reserved key `__fsrs`, next to the learner's
//! blank answers. These helpers lift it out into the typed
//! [`StudyItem::memory`] field and leave plain answers behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::card::StudyItem;
use crate::schedule::{MemoryState, StateBoundsError};

/// Reserved key holding the scheduling record in legacy answer maps
pub const LEGACY_STATE_KEY: &str = "__fsrs";

/// A legacy scheduling entry that is present but unusable
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LegacyStateError {
    /// Entry is a scalar or array
    #[error("Legacy state is not an object")]
    NotAnObject,
    /// Entry lacks a usable `scheduledAt`
    #[error("Legacy state has no scheduledAt")]
    MissingSchedule,
    /// Entry has the right shape but bad field values
    #[error("Malformed legacy state: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Entry parses but holds values no review could produce
    #[error("Legacy state out of range: {0}")]
    OutOfRange(#[from] StateBoundsError),
}

/// Falsy values mean "no state recorded"
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Read the scheduling record from a legacy answer map
///
/// A missing or falsy entry yields `Ok(None)`. An object needs a non-empty
/// `scheduledAt`, must otherwise parse as a [`MemoryState`], and must pass
/// [`MemoryState::normalized`].
pub fn read_legacy_state(
    bag: &Map<String, Value>,
) -> Result<Option<MemoryState>, LegacyStateError> {
    let raw = match bag.get(LEGACY_STATE_KEY) {
        Some(v) if !is_falsy(v) => v,
        _ => return Ok(None),
    };
    let Value::Object(fields) = raw else {
        return Err(LegacyStateError::NotAnObject);
    };
    match fields.get("scheduledAt") {
        Some(v) if !is_falsy(v) => {}
        _ => return Err(LegacyStateError::MissingSchedule),
    }
    let state = MemoryState::deserialize(raw)?.normalized()?;
    Ok(Some(state))
}

/// Text form of a legacy answer value; `None` drops the entry
fn answer_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        other => serde_json::to_string(&other).ok(),
    }
}

/// Convert a free-form map into plain blank answers
pub fn stringify_answers(bag: Map<String, Value>) -> BTreeMap<String, String> {
    bag.into_iter()
        .filter_map(|(k, v)| answer_text(v).map(|text| (k, text)))
        .collect()
}

/// Legacy answer map separated into answers and scheduling state
#[derive(Debug)]
pub struct LegacySplit {
    /// Blank answers with the reserved key removed
    pub answers: BTreeMap<String, String>,
    /// Scheduling state, when one was recorded and valid
    pub memory: Option<MemoryState>,
    /// Why a recorded state was discarded
    pub rejected: Option<LegacyStateError>,
}

/// Remove the reserved key and parse it, keeping the remaining answers
pub fn split_legacy_answers(mut bag: Map<String, Value>) -> LegacySplit {
    let (memory, rejected) = match read_legacy_state(&bag) {
        Ok(memory) => (memory, None),
        Err(e) => (None, Some(e)),
    };
    bag.remove(LEGACY_STATE_KEY);
    LegacySplit {
        answers: stringify_answers(bag),
        memory,
        rejected,
    }
}

// ============================================================================
// LEGACY RECORD
// ============================================================================

/// A study item as written by the legacy exporter
///
/// Unknown keys (status, numeric ids and so on) are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTerm {
    pub term: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub exercise: String,
    #[serde(default)]
    pub answer: Option<Map<String, Value>>,
    #[serde(default)]
    pub is_difficult: bool,
    #[serde(default)]
    pub user_answer: Option<Map<String, Value>>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LegacyTerm {
    /// Convert into a typed item
    ///
    /// The second value explains a discarded scheduling entry; the item is
    /// still usable and simply starts unscheduled.
    pub fn into_study_item(
        self,
        id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> (StudyItem, Option<LegacyStateError>) {
        let split = split_legacy_answers(self.user_answer.unwrap_or_default());
        let created_at = self.created_at.unwrap_or(now);
        let item = StudyItem {
            id: id.into(),
            term: self.term,
            explanation: self.explanation,
            exercise: self.exercise,
            answer: stringify_answers(self.answer.unwrap_or_default()),
            user_answer: split.answers,
            group_name: self.group_name,
            is_difficult: self.is_difficult,
            created_at,
            updated_at: now,
            version: 0,
            memory: split.memory,
        };
        (item, split.rejected)
    }
}

// ============================================================================
// TESTS
// ============================================================================
