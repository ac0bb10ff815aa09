//! Service façade over the scheduling core.
//!
//! Wraps the scheduler with business defaults and adapts between the
//! persisted [`FlashCard`] and the scheduler's working [`Card`]. All
//! operations take "now" explicitly and return new value snapshots.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::algorithm::fsrs::{Parameters, Scheduler, Weights};
use crate::algorithm::{Card, SchedulingInfo};
use crate::types::{CardPhase, FlashCard, Grade, LearningStat, Rating};

/// Business configuration for [`FsrsService`].
#[derive(Debug, Clone)]
pub struct FsrsConfig {
    /// Target recall probability, 0..1.
    pub request_retention: f64,
    /// Optional custom weight vector in classic w0..w12 order.
    pub custom_weights: Option<[f64; 13]>,
    /// Early-phase model selection; see [`Parameters::enable_short_term`].
    pub enable_short_term: bool,
}

impl Default for FsrsConfig {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            custom_weights: None,
            enable_short_term: true,
        }
    }
}

/// Card creation, grading, due queries, and aggregate statistics.
#[derive(Debug, Clone, Default)]
pub struct FsrsService {
    scheduler: Scheduler,
}

impl FsrsService {
    pub fn new(config: FsrsConfig) -> Self {
        let params = Parameters {
            request_retention: config.request_retention.clamp(0.0001, 0.9999),
            enable_short_term: config.enable_short_term,
            w: config
                .custom_weights
                .map(Weights::from_array)
                .unwrap_or_default(),
            ..Parameters::default()
        };
        Self {
            scheduler: Scheduler::new(params),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Fresh card in phase `New`, due immediately.
    pub fn create_new_card(&self, id: i64, now: DateTime<Utc>) -> FlashCard {
        FlashCard::new(id, now)
    }

    /// The four candidate outcomes of reviewing `card` at `now`, ordered
    /// Again/Hard/Good/Easy.
    ///
    /// Recomputed fresh on every call; two calls at the same instant
    /// return identical grades.
    pub fn grade_options(&self, card: &FlashCard, now: DateTime<Utc>) -> [Grade; 4] {
        let record = self.scheduler.repeat(&to_scheduler_card(card), now);
        Rating::ALL.map(|rating| project_grade(record.get(rating), now))
    }

    /// Commit one candidate outcome.
    ///
    /// The returned card carries the grade's memory state, is due at
    /// `now + duration_millis`, and moves to `Relearning` on Again and to
    /// `Review` otherwise.
    pub fn apply_grade(&self, card: &FlashCard, grade: &Grade, now: DateTime<Utc>) -> FlashCard {
        let next = apply_grade_to(card, grade, now);
        debug!(
            card_id = card.id,
            rating = ?grade.choice,
            interval_days = grade.interval_days,
            "grade applied"
        );
        next
    }

    /// Inclusive boundary: a card due exactly at `now` is due.
    pub fn is_due(&self, card: &FlashCard, now: DateTime<Utc>) -> bool {
        now >= card.due_date
    }

    pub fn due_cards(&self, cards: &[FlashCard], now: DateTime<Utc>) -> Vec<FlashCard> {
        cards
            .iter()
            .filter(|card| self.is_due(card, now))
            .cloned()
            .collect()
    }

    /// Grade options for every card, keyed by card id.
    pub fn batch_calculate_grades(
        &self,
        cards: &[FlashCard],
        now: DateTime<Utc>,
    ) -> HashMap<i64, [Grade; 4]> {
        cards
            .iter()
            .map(|card| (card.id, self.grade_options(card, now)))
            .collect()
    }

    pub fn learning_stat(&self, cards: &[FlashCard], now: DateTime<Utc>) -> LearningStat {
        let total = cards.len();
        let mut stat = LearningStat {
            total_cards: total,
            ..LearningStat::default()
        };
        for card in cards {
            if self.is_due(card, now) {
                stat.due_cards += 1;
            }
            match card.phase {
                CardPhase::New => stat.new_cards += 1,
                CardPhase::Review => stat.review_cards += 1,
                CardPhase::Relearning => stat.relearning_cards += 1,
                CardPhase::Learning => {}
            }
        }
        if total > 0 {
            stat.average_difficulty =
                cards.iter().map(|c| c.difficulty).sum::<f64>() / total as f64;
            stat.average_stability =
                cards.iter().map(|c| c.stability).sum::<f64>() / total as f64;
        }
        stat
    }
}

/// Adapter: persisted card -> scheduler working state.
fn to_scheduler_card(card: &FlashCard) -> Card {
    Card {
        due: card.due_date,
        stability: card.stability,
        difficulty: card.difficulty,
        elapsed_days: 0,
        scheduled_days: i64::from(card.interval_days),
        reps: card.review_count,
        lapses: card.lapses,
        state: card.phase,
        last_review: card.last_review,
    }
}

/// Adapter: scheduler successor -> ephemeral grade projection.
fn project_grade(info: &SchedulingInfo, now: DateTime<Utc>) -> Grade {
    let duration_millis = (info.card.due - now).num_milliseconds().max(0);
    Grade {
        choice: info.review_log.rating,
        stability: info.card.stability,
        difficulty: info.card.difficulty,
        interval_days: info.card.scheduled_days.max(0) as u32,
        duration_millis,
        display: format_interval(duration_millis),
    }
}

/// The due-date/stat updates shared by `apply_grade` and the time-utils
/// convenience wrapper.
pub(crate) fn apply_grade_to(card: &FlashCard, grade: &Grade, now: DateTime<Utc>) -> FlashCard {
    let mut next = card.clone();
    next.stability = grade.stability;
    next.difficulty = grade.difficulty;
    next.interval_days = grade.interval_days;
    next.due_date = now + Duration::milliseconds(grade.duration_millis);
    next.review_count = card.review_count + 1;
    next.last_review = Some(now);
    if grade.choice == Rating::Again {
        next.lapses = card.lapses + 1;
        next.phase = CardPhase::Relearning;
    } else {
        next.phase = CardPhase::Review;
    }
    next
}

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Largest whole unit that keeps the number at least 1, one decimal at most:
/// "10 min", "3 hour", "5 day", "2.5 month", "1.2 year".
pub fn format_interval(duration_millis: i64) -> String {
    let minutes = duration_millis.max(0) as f64 / MILLIS_PER_MINUTE;
    let hours = minutes / 60.0;
    let days = hours / 24.0;
    if minutes < 60.0 {
        format_unit(minutes, "min")
    } else if hours < 24.0 {
        format_unit(hours, "hour")
    } else if days < 30.0 {
        format_unit(days, "day")
    } else if days < 365.0 {
        format_unit(days / 30.0, "month")
    } else {
        format_unit(days / 365.0, "year")
    }
}

fn format_unit(value: f64, unit: &str) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as i64, unit)
    } else {
        format!("{:.1} {}", rounded, unit)
    }
}
