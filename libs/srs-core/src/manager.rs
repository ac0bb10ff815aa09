//! Bulk operations over card collections.
//!
//! Everything here is a pure function over `FlashCard` values; the manager
//! owns no card storage, only the service and an id generator.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::service::FsrsService;
use crate::types::{CardPhase, FlashCard, Grade};

/// Monotonic card id source, seeded from a base value.
///
/// Owned by the manager rather than hidden in a global so tests can inject
/// a deterministic generator.
#[derive(Debug)]
pub struct CardIdGenerator {
    next: AtomicI64,
}

impl CardIdGenerator {
    pub fn new(base: i64) -> Self {
        Self {
            next: AtomicI64::new(base),
        }
    }

    /// Seed from a millisecond timestamp to avoid collisions across runs.
    pub fn from_time(now: DateTime<Utc>) -> Self {
        Self::new(now.timestamp_millis())
    }

    pub fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Point-in-time report for a single card.
#[derive(Debug, Clone, Serialize)]
pub struct CardAnalytics {
    pub card_id: i64,
    pub phase: CardPhase,
    pub stability: f64,
    pub difficulty: f64,
    pub review_count: u32,
    pub days_since_last_review: i64,
    /// Negative when the card is overdue.
    pub days_until_due: i64,
    /// Estimated current recall probability; 0 when stability is degenerate.
    pub retention: f64,
    pub grade_options: [Grade; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DifficultyBuckets {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseCounts {
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub relearning: usize,
}

/// Aggregate report over a card collection.
#[derive(Debug, Clone, Serialize)]
pub struct BatchAnalysisResult {
    pub total_cards: usize,
    pub average_stability: f64,
    pub average_difficulty: f64,
    pub difficulty_buckets: DifficultyBuckets,
    pub phase_counts: PhaseCounts,
    /// Cards whose next review is now or earlier.
    pub due_now: usize,
    /// Cards more than one day past due.
    pub overdue: usize,
}

/// Conjunctive card filter; `None`/`false` fields impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    pub phases: Option<Vec<CardPhase>>,
    pub min_difficulty: Option<f64>,
    pub max_difficulty: Option<f64>,
    pub min_stability: Option<f64>,
    pub max_stability: Option<f64>,
    pub due_only: bool,
    pub overdue_only: bool,
}

/// Total orders over card collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStrategy {
    DueDateAsc,
    DueDateDesc,
    DifficultyAsc,
    DifficultyDesc,
    StabilityAsc,
    StabilityDesc,
    ReviewCountAsc,
    ReviewCountDesc,
    /// Most overdue and most difficult first.
    Priority,
}

/// Composite urgency score; lower sorts first under `Priority`.
pub(crate) fn priority_score(card: &FlashCard, now: DateTime<Utc>) -> f64 {
    let days_past_due = (now - card.due_date).num_days() as f64;
    -(days_past_due + card.difficulty / 10.0)
}

/// Bulk card creation, lifecycle operations, filtering, sorting, and
/// analytics aggregation.
#[derive(Debug)]
pub struct FlashCardManager {
    service: FsrsService,
    ids: CardIdGenerator,
}

impl FlashCardManager {
    pub fn new(service: FsrsService, now: DateTime<Utc>) -> Self {
        Self::with_id_generator(service, CardIdGenerator::from_time(now))
    }

    pub fn with_id_generator(service: FsrsService, ids: CardIdGenerator) -> Self {
        Self { service, ids }
    }

    pub fn service(&self) -> &FsrsService {
        &self.service
    }

    pub fn create_card(&self, now: DateTime<Utc>) -> FlashCard {
        self.service.create_new_card(self.ids.next_id(), now)
    }

    pub fn create_cards(&self, count: usize, now: DateTime<Utc>) -> Vec<FlashCard> {
        (0..count).map(|_| self.create_card(now)).collect()
    }

    /// Back to `New` defaults, preserving only the id.
    pub fn reset_card(&self, card: &FlashCard, now: DateTime<Utc>) -> FlashCard {
        FlashCard::new(card.id, now)
    }

    /// Push the due date forward without touching the memory state.
    pub fn suspend_card(&self, card: &FlashCard, days: i64, now: DateTime<Utc>) -> FlashCard {
        let mut next = card.clone();
        next.due_date = now + Duration::days(days);
        next
    }

    /// Pull the due date back to now without touching the memory state.
    pub fn resume_card(&self, card: &FlashCard, now: DateTime<Utc>) -> FlashCard {
        let mut next = card.clone();
        next.due_date = now;
        next
    }

    pub fn card_analytics(&self, card: &FlashCard, now: DateTime<Utc>) -> CardAnalytics {
        let days_since_last_review = card
            .last_review
            .map(|last| (now - last).num_days().max(0))
            .unwrap_or(0);
        let retention = if card.stability <= 0.0 {
            0.0
        } else {
            (-(days_since_last_review as f64) / card.stability).exp()
        };
        CardAnalytics {
            card_id: card.id,
            phase: card.phase,
            stability: card.stability,
            difficulty: card.difficulty,
            review_count: card.review_count,
            days_since_last_review,
            days_until_due: (card.due_date - now).num_days(),
            retention,
            grade_options: self.service.grade_options(card, now),
        }
    }

    pub fn batch_analyze(&self, cards: &[FlashCard], now: DateTime<Utc>) -> BatchAnalysisResult {
        let total = cards.len();
        let mut result = BatchAnalysisResult {
            total_cards: total,
            average_stability: 0.0,
            average_difficulty: 0.0,
            difficulty_buckets: DifficultyBuckets::default(),
            phase_counts: PhaseCounts::default(),
            due_now: 0,
            overdue: 0,
        };

        for card in cards {
            if card.difficulty < 3.0 {
                result.difficulty_buckets.easy += 1;
            } else if card.difficulty < 7.0 {
                result.difficulty_buckets.medium += 1;
            } else {
                result.difficulty_buckets.hard += 1;
            }
            match card.phase {
                CardPhase::New => result.phase_counts.new += 1,
                CardPhase::Learning => result.phase_counts.learning += 1,
                CardPhase::Review => result.phase_counts.review += 1,
                CardPhase::Relearning => result.phase_counts.relearning += 1,
            }
            let days_until_due = (card.due_date - now).num_days();
            if days_until_due <= 0 {
                result.due_now += 1;
            }
            if days_until_due < -1 {
                result.overdue += 1;
            }
        }
        if total > 0 {
            result.average_stability =
                cards.iter().map(|c| c.stability).sum::<f64>() / total as f64;
            result.average_difficulty =
                cards.iter().map(|c| c.difficulty).sum::<f64>() / total as f64;
        }
        debug!(total, due_now = result.due_now, "batch analysis");
        result
    }

    pub fn filter_cards(
        &self,
        cards: &[FlashCard],
        filter: &CardFilter,
        now: DateTime<Utc>,
    ) -> Vec<FlashCard> {
        cards
            .iter()
            .filter(|card| {
                if let Some(phases) = &filter.phases {
                    if !phases.contains(&card.phase) {
                        return false;
                    }
                }
                if let Some(min) = filter.min_difficulty {
                    if card.difficulty < min {
                        return false;
                    }
                }
                if let Some(max) = filter.max_difficulty {
                    if card.difficulty > max {
                        return false;
                    }
                }
                if let Some(min) = filter.min_stability {
                    if card.stability < min {
                        return false;
                    }
                }
                if let Some(max) = filter.max_stability {
                    if card.stability > max {
                        return false;
                    }
                }
                if filter.due_only && !self.service.is_due(card, now) {
                    return false;
                }
                if filter.overdue_only && (card.due_date - now).num_days() >= 0 {
                    return false;
                }
                true
            })
            .cloned()
            .collect()
    }

    pub fn sort_cards(
        &self,
        mut cards: Vec<FlashCard>,
        strategy: SortStrategy,
        now: DateTime<Utc>,
    ) -> Vec<FlashCard> {
        match strategy {
            SortStrategy::DueDateAsc => cards.sort_by_key(|c| c.due_date),
            SortStrategy::DueDateDesc => {
                cards.sort_by_key(|c| std::cmp::Reverse(c.due_date))
            }
            SortStrategy::DifficultyAsc => {
                cards.sort_by(|a, b| a.difficulty.total_cmp(&b.difficulty))
            }
            SortStrategy::DifficultyDesc => {
                cards.sort_by(|a, b| b.difficulty.total_cmp(&a.difficulty))
            }
            SortStrategy::StabilityAsc => {
                cards.sort_by(|a, b| a.stability.total_cmp(&b.stability))
            }
            SortStrategy::StabilityDesc => {
                cards.sort_by(|a, b| b.stability.total_cmp(&a.stability))
            }
            SortStrategy::ReviewCountAsc => cards.sort_by_key(|c| c.review_count),
            SortStrategy::ReviewCountDesc => {
                cards.sort_by_key(|c| std::cmp::Reverse(c.review_count))
            }
            SortStrategy::Priority => cards.sort_by(|a, b| {
                priority_score(a, now).total_cmp(&priority_score(b, now))
            }),
        }
        cards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn manager() -> FlashCardManager {
        FlashCardManager::with_id_generator(FsrsService::default(), CardIdGenerator::new(100))
    }

    fn review_card(id: i64, difficulty: f64, stability: f64, overdue_days: i64) -> FlashCard {
        let mut card = FlashCard::new(id, now());
        card.phase = CardPhase::Review;
        card.difficulty = difficulty;
        card.stability = stability;
        card.review_count = 3;
        card.due_date = now() - Duration::days(overdue_days);
        card.last_review = Some(now() - Duration::days(overdue_days + 5));
        card
    }

    #[test]
    fn batch_creation_assigns_sequential_ids() {
        let manager = manager();
        let cards = manager.create_cards(3, now());
        let ids: Vec<i64> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![100, 101, 102]);
        assert!(cards.iter().all(|c| c.phase == CardPhase::New));
    }

    #[test]
    fn reset_preserves_id_only() {
        let manager = manager();
        let card = review_card(7, 8.0, 15.0, 3);
        let reset = manager.reset_card(&card, now());
        assert_eq!(reset.id, 7);
        assert_eq!(reset.phase, CardPhase::New);
        assert_eq!(reset.stability, FlashCard::INITIAL_STABILITY);
        assert_eq!(reset.review_count, 0);
        assert_eq!(reset.due_date, now());
    }

    #[test]
    fn suspend_and_resume_touch_only_the_due_date() {
        let manager = manager();
        let card = review_card(1, 5.0, 10.0, 0);

        let suspended = manager.suspend_card(&card, 7, now());
        assert_eq!(suspended.due_date, now() + Duration::days(7));
        assert_eq!(suspended.stability, card.stability);
        assert_eq!(suspended.difficulty, card.difficulty);

        let resumed = manager.resume_card(&suspended, now());
        assert_eq!(resumed.due_date, now());
        assert_eq!(resumed.stability, card.stability);
    }

    #[test]
    fn analytics_report_retention_and_dueness() {
        let manager = manager();
        // Reviewed 5 days ago with stability 5: retention e^-1.
        let card = review_card(1, 6.0, 5.0, 0);
        let analytics = manager.card_analytics(&card, now());

        assert_eq!(analytics.card_id, 1);
        assert_eq!(analytics.days_since_last_review, 5);
        assert_eq!(analytics.days_until_due, 0);
        assert!((analytics.retention - (-1.0_f64).exp()).abs() < 1e-9);
        assert_eq!(analytics.grade_options.len(), 4);
    }

    #[test]
    fn analytics_degenerate_stability_gives_zero_retention() {
        let manager = manager();
        let mut card = review_card(1, 6.0, 5.0, 0);
        card.stability = 0.0;
        let analytics = manager.card_analytics(&card, now());
        assert_eq!(analytics.retention, 0.0);
    }

    #[test]
    fn overdue_cards_report_negative_days_until_due() {
        let manager = manager();
        let card = review_card(1, 6.0, 5.0, 10);
        let analytics = manager.card_analytics(&card, now());
        assert_eq!(analytics.days_until_due, -10);
    }

    #[test]
    fn batch_analysis_buckets_and_counts() {
        let manager = manager();
        let cards = vec![
            review_card(1, 2.0, 5.0, 0),  // easy bucket, due now
            review_card(2, 5.0, 10.0, 3), // medium bucket, overdue
            review_card(3, 9.0, 2.0, 0),  // hard bucket, due now
            {
                let mut c = FlashCard::new(4, now()); // easy bucket (difficulty 2.5)
                c.due_date = now() + Duration::days(2);
                c
            },
        ];

        let result = manager.batch_analyze(&cards, now());
        assert_eq!(result.total_cards, 4);
        assert_eq!(result.difficulty_buckets.easy, 2);
        assert_eq!(result.difficulty_buckets.medium, 1);
        assert_eq!(result.difficulty_buckets.hard, 1);
        assert_eq!(result.phase_counts.review, 3);
        assert_eq!(result.phase_counts.new, 1);
        assert_eq!(result.due_now, 3);
        assert_eq!(result.overdue, 1);
        assert!((result.average_difficulty - 4.625).abs() < 1e-9);
    }

    #[test]
    fn batch_analysis_empty_collection() {
        let manager = manager();
        let result = manager.batch_analyze(&[], now());
        assert_eq!(result.total_cards, 0);
        assert_eq!(result.average_stability, 0.0);
        assert_eq!(result.average_difficulty, 0.0);
    }

    #[test]
    fn filter_is_conjunctive() {
        let manager = manager();
        let cards = vec![
            review_card(1, 6.0, 10.0, 2), // due, difficulty >= 5
            review_card(2, 3.0, 10.0, 2), // due, difficulty too low
            {
                let mut c = review_card(3, 8.0, 10.0, 0); // difficulty ok, not due
                c.due_date = now() + Duration::days(4);
                c
            },
        ];

        let filter = CardFilter {
            min_difficulty: Some(5.0),
            due_only: true,
            ..CardFilter::default()
        };
        let matched = manager.filter_cards(&cards, &filter, now());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);
    }

    #[test]
    fn filter_by_phase_set() {
        let manager = manager();
        let mut relearning = review_card(1, 5.0, 5.0, 0);
        relearning.phase = CardPhase::Relearning;
        let cards = vec![relearning, review_card(2, 5.0, 5.0, 0)];

        let filter = CardFilter {
            phases: Some(vec![CardPhase::Relearning]),
            ..CardFilter::default()
        };
        let matched = manager.filter_cards(&cards, &filter, now());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);
    }

    #[test]
    fn sort_by_due_date_and_difficulty() {
        let manager = manager();
        let cards = vec![
            review_card(1, 3.0, 5.0, 1),
            review_card(2, 9.0, 5.0, 5),
            review_card(3, 6.0, 5.0, 3),
        ];

        let by_due = manager.sort_cards(cards.clone(), SortStrategy::DueDateAsc, now());
        let ids: Vec<i64> = by_due.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let by_difficulty = manager.sort_cards(cards, SortStrategy::DifficultyDesc, now());
        let ids: Vec<i64> = by_difficulty.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn priority_puts_difficult_overdue_first() {
        let manager = manager();
        // Same overdue-ness, different difficulty.
        let cards = vec![review_card(1, 2.0, 5.0, 10), review_card(2, 8.0, 5.0, 10)];

        let sorted = manager.sort_cards(cards, SortStrategy::Priority, now());
        let ids: Vec<i64> = sorted.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
