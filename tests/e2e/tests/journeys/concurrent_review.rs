//! # Concurrent Review Journey Tests
//!
//! Two devices (or two tabs) grading the same item must not silently lose a
//! review. Writes carry the version they were computed from and stale ones
//! are rejected.

use std::sync::{Arc, Barrier};
use std::thread;

use cadence_core::{Grade, Storage, StorageError};
use cadence_e2e_tests::TestDatabaseManager;

/// Test that the second of two writers computed from the same read loses.
#[test]
fn test_stale_writer_rejected() {
    let mut db = TestDatabaseManager::new_temp();
    let id = db.seed_items(1).remove(0);
    let now = db.now();

    let read_a = db.item(&id);
    let read_b = db.item(&id);
    let scheduler = *db.storage.scheduler();
    let state_a = scheduler.review(read_a.memory.as_ref(), Grade::Easy, now);
    let state_b = scheduler.review(read_b.memory.as_ref(), Grade::Again, now);

    db.storage.save_memory(&id, &state_a, read_a.version, now).unwrap();
    let err = db
        .storage
        .save_memory(&id, &state_b, read_b.version, now)
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict { .. }));

    let stored = db.item(&id);
    assert_eq!(stored.memory, Some(state_a));
    assert_eq!(stored.version, read_a.version + 1);
}

/// Test that the loser can re-read and apply its grade on top.
#[test]
fn test_loser_retries_on_fresh_state() {
    let mut db = TestDatabaseManager::new_temp();
    let id = db.seed_items(1).remove(0);
    let now = db.now();
    let scheduler = *db.storage.scheduler();

    let stale = db.item(&id);
    let winner = scheduler.review(stale.memory.as_ref(), Grade::Good, now);
    db.storage.save_memory(&id, &winner, stale.version, now).unwrap();

    let fresh = db.item(&id);
    let retried = scheduler.review(fresh.memory.as_ref(), Grade::Hard, now);
    let saved = db.storage.save_memory(&id, &retried, fresh.version, now).unwrap();

    let memory = saved.memory.unwrap();
    assert_eq!(memory.reps, 2);
    assert_eq!(saved.version, 2);
}

/// Test racing writers from many threads: exactly one wins each round.
#[test]
fn test_racing_writers_one_winner() {
    let mut db = TestDatabaseManager::new_temp();
    let id = db.seed_items(1).remove(0);
    let now = db.now();
    let storage = Arc::new(db.storage);
    let base = storage.get_item(&id).unwrap().unwrap();

    const WRITERS: usize = 8;
    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let storage = Arc::clone(&storage);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            let base = base.clone();
            thread::spawn(move || {
                let state = storage
                    .scheduler()
                    .review(base.memory.as_ref(), Grade::ALL[i % 4], now);
                barrier.wait();
                storage.save_memory(&id, &state, base.version, now)
            })
        })
        .collect();

    let results: Vec<Result<_, StorageError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(StorageError::Conflict { .. })))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, WRITERS - 1);
    assert_eq!(storage.get_item(&id).unwrap().unwrap().version, 1);
}

fn review_with_retry(storage: &Storage, id: &str, grade: Grade, now: chrono::DateTime<chrono::Utc>) {
    loop {
        match storage.record_review(id, grade, now) {
            Ok(_) => return,
            Err(StorageError::Conflict { .. }) => continue,
            Err(e) => panic!("review failed: {}", e),
        }
    }
}

/// Test that retrying on conflict means no review is ever lost.
#[test]
fn test_no_lost_reviews_with_retry() {
    let mut db = TestDatabaseManager::new_temp();
    let id = db.seed_items(1).remove(0);
    let now = db.now();
    let storage = Arc::new(db.storage);

    const REVIEWERS: usize = 6;
    const ROUNDS: usize = 5;
    let handles: Vec<_> = (0..REVIEWERS)
        .map(|_| {
            let storage = Arc::clone(&storage);
            let id = id.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    review_with_retry(&storage, &id, Grade::Good, now);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let item = storage.get_item(&id).unwrap().unwrap();
    let memory = item.memory.unwrap();
    assert_eq!(memory.reps as usize, REVIEWERS * ROUNDS);
    assert_eq!(item.version as usize, REVIEWERS * ROUNDS);
    assert_eq!(
        storage.review_history(&id).unwrap().len(),
        REVIEWERS * ROUNDS
    );
}

/// Test that reviews of different items never conflict.
#[test]
fn test_independent_items_in_parallel() {
    let mut db = TestDatabaseManager::new_temp();
    let ids = db.seed_items(10);
    let now = db.now();
    let storage = Arc::new(db.storage);

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || storage.record_review(&id, Grade::Good, now).map(|_| ()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert!(storage.due_items(now, None).unwrap().is_empty());
}
