//! Core types for the scheduling engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user's self-assessed recall quality for one review event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// All four ratings in grading order.
    pub const ALL: [Rating; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

    /// Convert to the 1-4 ordinal used by the scheduling formulas.
    pub fn to_value(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Create from the 1-4 ordinal.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }
}

/// Card lifecycle phase.
///
/// `Learning` and `Relearning` are the minute-scale short-term phases;
/// `Review` is the day-scale long-term phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardPhase {
    New,
    Learning,
    Review,
    Relearning,
}

impl Default for CardPhase {
    fn default() -> Self {
        Self::New
    }
}

/// Persisted per-item memory state.
///
/// Cards are value snapshots: applying a grade produces a new `FlashCard`,
/// it never mutates the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashCard {
    pub id: i64,
    /// Expected days until recall probability decays to the retention target.
    pub stability: f64,
    /// Intrinsic hardness, clamped to [1, 10] by every update.
    pub difficulty: f64,
    /// Scheduled gap in days until the next review.
    pub interval_days: u32,
    pub review_count: u32,
    pub lapses: u32,
    pub phase: CardPhase,
    pub due_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
}

impl FlashCard {
    pub const INITIAL_STABILITY: f64 = 2.5;
    pub const INITIAL_DIFFICULTY: f64 = 2.5;

    /// Fresh card: phase `New`, due immediately.
    pub fn new(id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            stability: Self::INITIAL_STABILITY,
            difficulty: Self::INITIAL_DIFFICULTY,
            interval_days: 0,
            review_count: 0,
            lapses: 0,
            phase: CardPhase::New,
            due_date: now,
            last_review: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.phase == CardPhase::New
    }
}

/// One of the four candidate outcomes of reviewing a card right now.
///
/// Grades are recomputed fresh on every access and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub choice: Rating,
    pub stability: f64,
    pub difficulty: f64,
    pub interval_days: u32,
    /// Time until the candidate due date, in whole milliseconds.
    pub duration_millis: i64,
    /// Human-readable interval, e.g. "10 min", "5 day", "2.5 month".
    pub display: String,
}

/// Aggregate statistics over a card collection.
///
/// Averages over an empty collection are 0.0, never NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStat {
    pub total_cards: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub review_cards: usize,
    pub relearning_cards: usize,
    pub average_difficulty: f64,
    pub average_stability: f64,
}
