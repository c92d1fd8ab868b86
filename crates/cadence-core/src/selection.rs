//! Due-set selection
//!
//! The engine only needs two things from whatever holds the items: a way to
//! fetch everything due at an instant, and a way to persist the state that
//! [`Scheduler::review`](crate::Scheduler::review) returns. The first half is
//! [`ReviewSetSelector`]; [`Storage`](crate::Storage) provides both.
//!
//! Review sets are ordered unscheduled-first, then by due instant, then by
//! creation time.

use std::cmp::Ordering;
use std::convert::Infallible;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::item::StudyItem;

/// Source of today's review set
pub trait ReviewSetSelector {
    /// Failure type of the backing store
    type Error;

    /// Items due at `at` (including never-reviewed ones), in review order
    fn select_due(
        &self,
        at: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<StudyItem>, Self::Error>;
}

/// Review order: unscheduled first, then earliest due, then oldest
pub fn due_order(a: &StudyItem, b: &StudyItem) -> Ordering {
    let key = |item: &StudyItem| item.memory.map(|m| m.scheduled_at);
    let by_schedule = match (key(a), key(b)) {
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (x, y) => x.cmp(&y),
    };
    by_schedule
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Borrowing selection over an in-memory collection
pub fn select_due(
    items: &[StudyItem],
    at: DateTime<Utc>,
    limit: Option<usize>,
) -> Vec<&StudyItem> {
    let mut due: Vec<&StudyItem> = items.iter().filter(|item| item.is_due(at)).collect();
    due.sort_by(|a, b| due_order(a, b));
    if let Some(limit) = limit {
        due.truncate(limit);
    }
    due
}

impl ReviewSetSelector for [StudyItem] {
    type Error = Infallible;

    fn select_due(
        &self,
        at: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<StudyItem>, Self::Error> {
        Ok(select_due(self, at, limit).into_iter().cloned().collect())
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

/// Review workload at an instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    /// Items considered
    pub total_items: usize,
    /// Items never reviewed
    pub unscheduled: usize,
    /// Items due now, unscheduled ones included
    pub due_now: usize,
    /// Scheduled items falling due within the next 24 hours
    pub upcoming_24h: usize,
    /// Sum of successful reviews
    pub total_reps: u64,
    /// Sum of lapses
    pub total_lapses: u64,
    /// Mean difficulty over scheduled items
    pub average_difficulty: Option<f64>,
    /// Earliest future due instant
    pub next_due_at: Option<DateTime<Utc>>,
}

impl ReviewSummary {
    /// Tally a collection of items at `at`
    pub fn compute<'a, I>(items: I, at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a StudyItem>,
    {
        let horizon = at + Duration::hours(24);
        let mut summary = ReviewSummary::default();
        let mut difficulty_sum = 0.0;
        let mut scheduled = 0usize;

        for item in items {
            summary.total_items += 1;
            let Some(memory) = item.memory else {
                summary.unscheduled += 1;
                summary.due_now += 1;
                continue;
            };
            scheduled += 1;
            difficulty_sum += memory.difficulty;
            summary.total_reps += u64::from(memory.reps);
            summary.total_lapses += u64::from(memory.lapses);

            if memory.is_due(at) {
                summary.due_now += 1;
            } else {
                if memory.scheduled_at <= horizon {
                    summary.upcoming_24h += 1;
                }
                summary.next_due_at = Some(match summary.next_due_at {
                    Some(current) => current.min(memory.scheduled_at),
                    None => memory.scheduled_at,
                });
            }
        }

        if scheduled > 0 {
            summary.average_difficulty = Some(difficulty_sum / scheduled as f64);
        }
        summary
    }
}

// ============================================================================
// TESTS
// ============================================================================
