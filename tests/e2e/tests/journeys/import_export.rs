//! # Import/Export Journey Tests
//!
//! Moving a collection between stores: the native export round trip, and
//! bringing in files from the older exporter that kept scheduling state in
//! the answer map.

use cadence_core::{Grade, LegacyTerm, StudyItem, LEGACY_STATE_KEY};
use cadence_e2e_tests::{TestDataFactory, TestDatabaseManager};
use chrono::Duration;
use serde_json::json;

fn legacy_terms(value: serde_json::Value) -> Vec<LegacyTerm> {
    serde_json::from_value(value).expect("legacy payload should parse")
}

// ============================================================================
// NATIVE EXPORT
// ============================================================================

/// Test that an export restores into an empty store unchanged.
#[test]
fn test_export_restores_exactly() {
    let mut source = TestDatabaseManager::new_temp();
    let ids = source.seed_items(5);
    for (i, id) in ids.iter().enumerate() {
        source
            .storage
            .record_review(id, Grade::ALL[i % 4], source.now())
            .unwrap();
    }
    let exported = source.storage.export_items().unwrap();

    // Through JSON text, as the CLI writes it
    let text = serde_json::to_string_pretty(&exported).unwrap();
    let parsed: Vec<StudyItem> = serde_json::from_str(&text).unwrap();

    let target = TestDatabaseManager::new_temp();
    let report = target.storage.import_items(parsed).unwrap();
    assert_eq!(report.imported, 5);
    assert_eq!(report.scheduled, 5);

    for original in &exported {
        let restored = target.item(&original.id);
        let (a, b) = (restored.memory.unwrap(), original.memory.unwrap());
        assert_eq!(a.scheduled_at, b.scheduled_at);
        assert_eq!(a.last_reviewed_at, b.last_reviewed_at);
        assert_eq!((a.reps, a.lapses), (b.reps, b.lapses));
        assert!((a.stability_days - b.stability_days).abs() < 1e-12);
        assert!((a.difficulty - b.difficulty).abs() < 1e-12);
        assert_eq!(restored.version, original.version);
    }
}

/// Test that the restored store keeps scheduling where the source left off.
#[test]
fn test_restored_items_keep_schedule() {
    let mut source = TestDatabaseManager::new_temp();
    let id = source.seed_items(1).remove(0);
    source.storage.record_review(&id, Grade::Good, source.now()).unwrap();

    let mut target = TestDatabaseManager::new_temp();
    target
        .storage
        .import_items(source.storage.export_items().unwrap())
        .unwrap();

    assert!(target.storage.due_items(target.now(), None).unwrap().is_empty());
    target.advance(Duration::days(3));
    let due = target.storage.due_items(target.now(), None).unwrap();
    assert_eq!(due.len(), 1);

    // Versions continue, so a stale writer from the source is still rejected
    let outcome = target.storage.record_review(&id, Grade::Good, target.now()).unwrap();
    assert_eq!(outcome.item.version, 2);
}

// ============================================================================
// LEGACY FILES
// ============================================================================

/// Test that legacy scheduling entries become typed memory states.
#[test]
fn test_legacy_import_lifts_state() {
    let db = TestDatabaseManager::new_temp();
    let payload = TestDataFactory::legacy_payload(&[Some(4.0), None, Some(9.0)], db.now());

    let report = db.storage.import_legacy(legacy_terms(payload), db.now()).unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(report.scheduled, 2);
    assert!(report.rejected_states.is_empty());

    for item in db.storage.export_items().unwrap() {
        assert!(!item.user_answer.contains_key(LEGACY_STATE_KEY));
        assert_eq!(item.user_answer.len(), 1);
        assert_eq!(item.answer.len(), 1);
    }

    // Both scheduled items fell due a day ago; all three are in today's set
    let due = db.storage.due_items(db.now(), None).unwrap();
    assert_eq!(due.len(), 3);
    assert!(due[0].memory.is_none());
    assert!(due[1].memory.is_some());
}

/// Test that a legacy state keeps evolving under the engine.
#[test]
fn test_legacy_state_continues() {
    let db = TestDatabaseManager::new_temp();
    let payload = TestDataFactory::legacy_payload(&[Some(4.0)], db.now());
    db.storage.import_legacy(legacy_terms(payload), db.now()).unwrap();
    let item = db.storage.export_items().unwrap().remove(0);

    let outcome = db.storage.record_review(&item.id, Grade::Good, db.now()).unwrap();
    let state = outcome.item.memory.unwrap();
    // D: 5.7 - 0.3 = 5.4; S: 4 * 1.8 + 4.6 * 0.2 = 8.12 -> 8
    assert_eq!(state.stability_days, 8.0);
    assert!((state.difficulty - 5.4).abs() < 1e-9);
    assert_eq!(state.reps, 2);
    assert_eq!(outcome.previous.map(|m| m.stability_days), Some(4.0));
}

/// Test that unusable legacy entries are reported and the item still imports.
#[test]
fn test_legacy_bad_entries_reported() {
    let db = TestDatabaseManager::new_temp();
    let payload = json!([
        { "term": "pun", "userAnswer": { "__fsrs": "soon" } },
        { "term": "oxymoron", "userAnswer": { "__fsrs": { "stabilityDays": 3 } } },
        { "term": "pathos", "userAnswer": { "__fsrs": { "scheduledAt": "not a date", "stabilityDays": 1, "difficulty": 6, "reps": 0, "lapses": 0 } } },
        { "term": "ethos", "userAnswer": { "__fsrs": false, "0": "ethos" } },
        { "term": "logos" }
    ]);

    let report = db.storage.import_legacy(legacy_terms(payload), db.now()).unwrap();
    assert_eq!(report.imported, 5);
    assert_eq!(report.scheduled, 0);
    let rejected: Vec<&str> = report.rejected_states.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(rejected, vec!["pun", "oxymoron", "pathos"]);

    // Every item starts unscheduled and is due
    assert_eq!(db.storage.due_items(db.now(), None).unwrap().len(), 5);
}
