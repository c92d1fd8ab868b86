//! # Schedule Invariant Tests
//!
//! Properties of the review transition that must hold for any history:
//! bounds on difficulty and stability, due instants never in the past,
//! failures never scheduled after successes, counters that match the grades,
//! and states that survive the store bit for bit.

use cadence_core::{
    init, is_due, review, Grade, MemoryState, Scheduler, MAX_DAY_OFFSET, MAX_DIFFICULTY,
    MAX_STABILITY_DAYS, MIN_DIFFICULTY, MIN_STABILITY_DAYS,
};
use cadence_e2e_tests::{epoch, TestDataFactory, TestDatabaseManager};
use chrono::{DateTime, Duration, Utc};

fn assert_bounded(state: &MemoryState, at: DateTime<Utc>) {
    assert!(
        (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&state.difficulty),
        "difficulty {} out of range",
        state.difficulty
    );
    assert!((MIN_STABILITY_DAYS..=MAX_STABILITY_DAYS).contains(&state.stability_days));
    assert_eq!(state.stability_days.fract(), 0.0, "stability should be whole days");
    assert!(state.scheduled_at >= at);
    assert!(state.scheduled_at <= at + Duration::days(MAX_DAY_OFFSET));
    assert!(!is_due(Some(state), at) || state.scheduled_at == at);
}

// ============================================================================
// BOUNDS
// ============================================================================

/// Test bounds over many mixed histories.
#[test]
fn test_bounds_over_mixed_histories() {
    for seed in 0..20 {
        let mut state: Option<MemoryState> = None;
        let mut at = epoch();
        for grade in TestDataFactory::grade_sequence(150, seed) {
            let next = review(state.as_ref(), grade, at);
            assert_bounded(&next, at);
            at = next.scheduled_at;
            state = Some(next);
        }
    }
}

/// Test that a long Easy streak saturates at the day-offset cap.
#[test]
fn test_easy_streak_hits_offset_cap() {
    let mut state = init(epoch());
    let mut at = epoch();
    for _ in 0..40 {
        state = review(Some(&state), Grade::Easy, at);
        assert_bounded(&state, at);
        at = state.scheduled_at;
    }
    assert_eq!(state.difficulty, MIN_DIFFICULTY);
    let last_review = state.last_reviewed_at.unwrap();
    assert_eq!(state.scheduled_at - last_review, Duration::days(MAX_DAY_OFFSET));
}

/// Test that stability stays finite and serializable however long the streak.
#[test]
fn test_long_easy_streak_stays_serializable() {
    let mut state = init(epoch());
    for _ in 0..800 {
        // Same instant keeps the due date inside chrono's range
        state = review(Some(&state), Grade::Easy, epoch());
    }
    assert!(state.stability_days.is_finite());
    assert_eq!(state.stability_days, MAX_STABILITY_DAYS);

    let json = serde_json::to_string(&state).unwrap();
    let back: MemoryState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
    assert_eq!(back.stability_days.to_bits(), state.stability_days.to_bits());
}

/// Test that an Again streak pins difficulty and stability at their floors.
#[test]
fn test_again_streak_hits_floors() {
    let mut state = init(epoch());
    for _ in 0..20 {
        state = review(Some(&state), Grade::Again, epoch());
    }
    assert_eq!(state.difficulty, MAX_DIFFICULTY);
    assert_eq!(state.stability_days, MIN_STABILITY_DAYS);
    assert_eq!(state.lapses, 20);
    assert_eq!(state.reps, 0);
}

// ============================================================================
// ORDERING
// ============================================================================

/// Test that failing is never scheduled later than passing from the same state.
#[test]
fn test_again_not_after_success_along_histories() {
    let scheduler = Scheduler::default();
    for seed in 0..10 {
        let mut state: Option<MemoryState> = None;
        let mut at = epoch();
        for grade in TestDataFactory::grade_sequence(60, seed) {
            let preview = scheduler.preview(state.as_ref(), at);
            assert!(preview.again.scheduled_at <= preview.good.scheduled_at);
            assert!(preview.again.scheduled_at <= preview.easy.scheduled_at);
            let next = *preview.get(grade);
            at = next.scheduled_at;
            state = Some(next);
        }
    }
}

/// Test determinism: same inputs, same output.
#[test]
fn test_review_is_deterministic() {
    let history: Vec<(Grade, DateTime<Utc>)> = TestDataFactory::grade_sequence(50, 3)
        .into_iter()
        .enumerate()
        .map(|(i, g)| (g, epoch() + Duration::hours(i as i64 * 17)))
        .collect();
    let a = Scheduler::default().replay(history.iter().copied());
    let b = Scheduler::default().replay(history.iter().copied());
    assert_eq!(a, b);
}

// ============================================================================
// COUNTERS
// ============================================================================

/// Test that reps count successes and lapses count failures.
#[test]
fn test_counters_match_grades() {
    let grades = TestDataFactory::grade_sequence(97, 5);
    let expected_lapses = grades.iter().filter(|g| g.is_lapse()).count() as u32;
    let expected_reps = grades.len() as u32 - expected_lapses;

    let history = grades
        .iter()
        .enumerate()
        .map(|(i, g)| (*g, epoch() + Duration::days(i as i64)));
    let state = Scheduler::default().replay(history).unwrap();
    assert_eq!(state.reps, expected_reps);
    assert_eq!(state.lapses, expected_lapses);
    assert_eq!(state.review_count(), grades.len() as u32);
}

// ============================================================================
// PERSISTENCE
// ============================================================================

/// Test that states read back from the store are identical to those written.
#[test]
fn test_store_round_trip_is_exact() {
    let mut db = TestDatabaseManager::new_temp();
    let ids = db.seed_items(4);

    for (n, id) in ids.iter().enumerate() {
        let mut at = db.now() + Duration::nanoseconds(123_456_789 * n as i64);
        for grade in TestDataFactory::grade_sequence(9, n) {
            let outcome = db.storage.record_review(id, grade, at).unwrap();
            let written = outcome.item.memory.unwrap();
            let read = db.item(id).memory.unwrap();
            assert_eq!(read, written);
            assert_eq!(read.difficulty.to_bits(), written.difficulty.to_bits());
            at = written.scheduled_at;
        }
    }
}
