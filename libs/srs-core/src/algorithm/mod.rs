//! Spaced repetition scheduling core.
//!
//! The types here form the scheduler's own working model, distinct from the
//! persisted [`FlashCard`](crate::types::FlashCard): the service layer
//! adapts between the two.

pub mod fsrs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CardPhase, Rating};

/// Scheduler working state for a single item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub due: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    /// Whole days since the previous review, computed at review time.
    pub elapsed_days: i64,
    /// Chosen gap in days until the next due date (0 for minute-scale steps).
    pub scheduled_days: i64,
    pub reps: u32,
    pub lapses: u32,
    pub state: CardPhase,
    pub last_review: Option<DateTime<Utc>>,
}

impl Card {
    /// Unreviewed card; stability and difficulty are initialized by the
    /// first review.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            due: now,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            state: CardPhase::New,
            last_review: None,
        }
    }
}

/// Log entry capturing one committed review event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewLog {
    pub rating: Rating,
    pub elapsed_days: i64,
    pub scheduled_days: i64,
    pub review_time: DateTime<Utc>,
    pub previous_state: CardPhase,
}

/// One candidate successor state plus its log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingInfo {
    pub card: Card,
    pub review_log: ReviewLog,
}

/// The four candidate outcomes of one review, computed together.
///
/// Exactly one of them is committed per review event; the caller selects
/// by the user's actual rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLog {
    pub again: SchedulingInfo,
    pub hard: SchedulingInfo,
    pub good: SchedulingInfo,
    pub easy: SchedulingInfo,
}

impl RecordLog {
    pub fn get(&self, rating: Rating) -> &SchedulingInfo {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }
}
