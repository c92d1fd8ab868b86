//! Test Data Factory
//!
//! Provides utilities for generating realistic test data:
//! - Study items with exercises and answers
//! - Batch generation for stress testing
//! - Pre-built due-set scenarios
//! - Legacy export payloads with embedded `__fsrs` entries

use cadence_core::{Grade, NewItem, Storage, StudyItem};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};

/// Factory for creating test data
///
/// # Example
///
/// ```rust,ignore
/// let storage = Storage::new(Some(path))?;
///
/// // Create a single item
/// let item = TestDataFactory::create_item(&storage, "zeugma", at);
///
/// // Create a batch
/// let ids = TestDataFactory::create_batch(&storage, 100, at);
///
/// // Create a specific scenario
/// let scenario = TestDataFactory::create_due_scenario(&storage, at);
/// ```
pub struct TestDataFactory;

/// Configuration for batch item generation
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of items to create
    pub count: usize,
    /// Base term prefix
    pub term_prefix: String,
    /// Group to assign (None = no group)
    pub group: Option<String>,
    /// Whether to attach an exercise with blanks
    pub with_exercise: bool,
    /// Gap between creation times
    pub spacing: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            term_prefix: "Test term".to_string(),
            group: None,
            with_exercise: true,
            spacing: Duration::minutes(1),
        }
    }
}

/// A prepared scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    /// Item ids in the order they are expected to be reviewed
    pub expected_order: Vec<String>,
    /// Item ids that must not appear in the due set
    pub not_due: Vec<String>,
    /// Instant the scenario is evaluated at
    pub at: DateTime<Utc>,
    /// Description of the scenario
    pub description: String,
}

const TERMS: &[(&str, &str)] = &[
    ("metaphor", "Describing one thing as another"),
    ("simile", "Comparison using like or as"),
    ("hyperbole", "Deliberate exaggeration"),
    ("litotes", "Understatement by negating the opposite"),
    ("chiasmus", "Reversed grammatical structure"),
    ("anaphora", "Repetition at the start of clauses"),
    ("zeugma", "One word governing two in different senses"),
    ("synecdoche", "A part standing for the whole"),
];

impl TestDataFactory {
    /// Create one unscheduled item
    pub fn create_item(storage: &Storage, term: &str, at: DateTime<Utc>) -> Option<StudyItem> {
        storage.add_item(NewItem::new(term), at).ok()
    }

    /// Create an item with explanation and a one-blank exercise
    pub fn create_item_full(
        storage: &Storage,
        term: &str,
        explanation: &str,
        at: DateTime<Utc>,
    ) -> Option<StudyItem> {
        let input = NewItem::new(term)
            .with_explanation(explanation)
            .with_exercise(format!("This line is an example of ____ ({}).", term), [term]);
        storage.add_item(input, at).ok()
    }

    /// Create a batch of items
    pub fn create_batch(storage: &Storage, count: usize, at: DateTime<Utc>) -> Vec<String> {
        Self::create_batch_with_config(
            storage,
            BatchConfig {
                count,
                ..Default::default()
            },
            at,
        )
    }

    /// Create a batch with custom configuration
    pub fn create_batch_with_config(
        storage: &Storage,
        config: BatchConfig,
        at: DateTime<Utc>,
    ) -> Vec<String> {
        let mut ids = Vec::with_capacity(config.count);

        for i in 0..config.count {
            let (term, explanation) = Self::literary_term(i);
            let mut input = NewItem::new(format!("{} {} ({})", config.term_prefix, i, term))
                .with_explanation(explanation);
            if config.with_exercise {
                input = input.with_exercise(format!("Name the device: ____ #{}", i), [term]);
            }
            if let Some(group) = &config.group {
                input = input.in_group(group.clone());
            }

            let created_at = at + config.spacing * i as i32;
            if let Ok(item) = storage.add_item(input, created_at) {
                ids.push(item.id);
            }
        }

        ids
    }

    /// Items in every due-set position, evaluated two days after `at`
    ///
    /// - two never-reviewed items (older first)
    /// - one item failed at `at` (due `at + 1d`)
    /// - one item passed with Hard at `at` (due `at + 2d`, exactly on the boundary)
    /// - one item passed with Good at `at` (due `at + 3d`, not due)
    pub fn create_due_scenario(storage: &Storage, at: DateTime<Utc>) -> TestScenario {
        let make = |term: &str, offset_min: i64| {
            storage
                .add_item(NewItem::new(term), at + Duration::minutes(offset_min))
                .map(|item| item.id)
                .unwrap_or_default()
        };

        let failed = make("failed", 0);
        let hard = make("hard", 1);
        let good = make("good", 2);
        let fresh_new = make("fresh-new", 4);
        let fresh_old = make("fresh-old", 3);

        for (id, grade) in [(&failed, Grade::Again), (&hard, Grade::Hard), (&good, Grade::Good)] {
            let _ = storage.record_review(id, grade, at);
        }

        TestScenario {
            expected_order: vec![fresh_old, fresh_new, failed, hard],
            not_due: vec![good],
            at: at + Duration::days(2),
            description: "Unscheduled first, then by due instant".to_string(),
        }
    }

    /// Legacy export records, one per entry in `states`
    ///
    /// `Some(s)` embeds a valid `__fsrs` entry with stability `s` days that
    /// fell due one day before `at`; `None` leaves the item unscheduled.
    pub fn legacy_payload(states: &[Option<f64>], at: DateTime<Utc>) -> Value {
        let records: Vec<Value> = states
            .iter()
            .enumerate()
            .map(|(i, state)| {
                let (term, explanation) = Self::literary_term(i);
                let mut user_answer = json!({ "0": term });
                if let Some(stability) = state {
                    let due = at - Duration::days(1);
                    let reviewed = due - Duration::days(*stability as i64);
                    user_answer["__fsrs"] = json!({
                        "stabilityDays": stability,
                        "difficulty": 5.7,
                        "scheduledAt": due.to_rfc3339_opts(SecondsFormat::Millis, true),
                        "lastReviewedAt": reviewed.to_rfc3339_opts(SecondsFormat::Millis, true),
                        "reps": 1,
                        "lapses": 0
                    });
                }
                json!({
                    "id": i + 1,
                    "term": term,
                    "explanation": explanation,
                    "exercise": "Name the device: ____",
                    "answer": { "0": term },
                    "isDifficult": false,
                    "status": "unanswered",
                    "userAnswer": user_answer,
                    "createdAt": (at - Duration::days(30) + Duration::minutes(i as i64))
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                    "groupName": null
                })
            })
            .collect();
        Value::Array(records)
    }

    // ========================================================================
    // UTILITY METHODS
    // ========================================================================

    /// Cycle through a fixed list of literary devices
    pub fn literary_term(seed: usize) -> (&'static str, &'static str) {
        TERMS[seed % TERMS.len()]
    }

    /// A deterministic grade sequence that mixes lapses and successes
    pub fn grade_sequence(len: usize, seed: usize) -> Vec<Grade> {
        (0..len)
            .map(|i| Grade::ALL[(i * 7 + seed * 3 + i / 5) % Grade::ALL.len()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{epoch, TestDatabaseManager};

    #[test]
    fn test_create_batch() {
        let db = TestDatabaseManager::new_temp();
        let ids = TestDataFactory::create_batch(&db.storage, 12, epoch());
        assert_eq!(ids.len(), 12);
        assert_eq!(db.item_count(), 12);
    }

    #[test]
    fn test_batch_config_group() {
        let db = TestDatabaseManager::new_temp();
        let config = BatchConfig {
            count: 3,
            group: Some("tropes".to_string()),
            with_exercise: false,
            ..Default::default()
        };
        let ids = TestDataFactory::create_batch_with_config(&db.storage, config, epoch());
        let item = db.item(&ids[2]);
        assert_eq!(item.group_name.as_deref(), Some("tropes"));
        assert!(item.exercise.is_empty());
    }

    #[test]
    fn test_legacy_payload_shape() {
        let payload = TestDataFactory::legacy_payload(&[Some(4.0), None], epoch());
        let records = payload.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0]["userAnswer"]["__fsrs"].is_object());
        assert!(records[1]["userAnswer"].get("__fsrs").is_none());
    }

    #[test]
    fn test_grade_sequence_has_lapses_and_successes() {
        let grades = TestDataFactory::grade_sequence(40, 1);
        assert!(grades.iter().any(|g| g.is_lapse()));
        assert!(grades.iter().any(|g| !g.is_lapse()));
    }
}
