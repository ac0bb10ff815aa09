//! FSRS (Free Spaced Repetition Scheduler) core.
//!
//! Exponential-forgetting-curve model with per-card difficulty and
//! stability. One review produces four candidate successor states (one per
//! rating); the caller commits exactly one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Card, RecordLog, ReviewLog, SchedulingInfo};
use crate::error::{Result, SrsError};
use crate::types::{CardPhase, Rating};

pub const MIN_STABILITY: f64 = 0.1;
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// The 13 model coefficients, named by role.
///
/// `from_array`/`to_array` use the classic index order w0..w12 so stored
/// weight vectors stay compatible with existing card histories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// w0: base of the initial stability line.
    pub init_stability_base: f64,
    /// w1: per-rating slope of the initial stability line.
    pub init_stability_step: f64,
    /// w2: initial difficulty at the neutral rating.
    pub init_difficulty_base: f64,
    /// w3: per-rating slope of initial difficulty.
    pub init_difficulty_step: f64,
    /// w4: per-rating difficulty shift on later reviews.
    pub difficulty_step: f64,
    /// w5: mean-reversion weight pulling difficulty toward its initial value.
    pub mean_reversion_weight: f64,
    /// w6: stability growth factor on successful recall (as an exponent).
    pub recall_factor: f64,
    /// w7: stability saturation exponent (negative: large stabilities grow slower).
    pub recall_stability_decay: f64,
    /// w8: retrievability gain on successful recall.
    pub recall_retrievability_gain: f64,
    /// w9: post-lapse stability factor.
    pub forget_factor: f64,
    /// w10: difficulty exponent in the post-lapse formula (negative).
    pub forget_difficulty_decay: f64,
    /// w11: stability exponent in the post-lapse formula.
    pub forget_stability_gain: f64,
    /// w12: retrievability gain in the post-lapse formula.
    pub forget_retrievability_gain: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self::from_array([
            1.0, 1.0, 5.0, -0.5, -0.5, 0.2, 1.4, -0.12, 0.8, 2.0, -0.2, 0.2, 1.0,
        ])
    }
}

impl Weights {
    pub fn from_array(w: [f64; 13]) -> Self {
        Self {
            init_stability_base: w[0],
            init_stability_step: w[1],
            init_difficulty_base: w[2],
            init_difficulty_step: w[3],
            difficulty_step: w[4],
            mean_reversion_weight: w[5],
            recall_factor: w[6],
            recall_stability_decay: w[7],
            recall_retrievability_gain: w[8],
            forget_factor: w[9],
            forget_difficulty_decay: w[10],
            forget_stability_gain: w[11],
            forget_retrievability_gain: w[12],
        }
    }

    pub fn from_slice(w: &[f64]) -> Result<Self> {
        let arr: [f64; 13] = w
            .try_into()
            .map_err(|_| SrsError::InvalidWeights(w.len()))?;
        Ok(Self::from_array(arr))
    }

    pub fn to_array(&self) -> [f64; 13] {
        [
            self.init_stability_base,
            self.init_stability_step,
            self.init_difficulty_base,
            self.init_difficulty_step,
            self.difficulty_step,
            self.mean_reversion_weight,
            self.recall_factor,
            self.recall_stability_decay,
            self.recall_retrievability_gain,
            self.forget_factor,
            self.forget_difficulty_decay,
            self.forget_stability_gain,
            self.forget_retrievability_gain,
        ]
    }
}

/// Immutable scheduler configuration.
///
/// Different profiles are made by constructing a new value, never by
/// mutating an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Target recall probability at review time.
    pub request_retention: f64,
    /// Ceiling on any scheduled interval, in days.
    pub maximum_interval: u32,
    pub easy_bonus: f64,
    pub hard_factor: f64,
    /// When false, new cards skip the minute-scale learning steps and are
    /// scheduled on day intervals from their initial stability.
    pub enable_short_term: bool,
    pub w: Weights,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            maximum_interval: 36500,
            easy_bonus: 1.3,
            hard_factor: 1.2,
            enable_short_term: true,
            w: Weights::default(),
        }
    }
}

/// The scheduling core. Pure: `repeat` has no side effects and reads no
/// clock of its own.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    params: Parameters,
}

impl Scheduler {
    pub fn new(params: Parameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Compute the four candidate successor states for `card` reviewed at
    /// `now`.
    ///
    /// Negative elapsed time from clock skew clamps to zero; degenerate
    /// stability is floored rather than rejected.
    pub fn repeat(&self, card: &Card, now: DateTime<Utc>) -> RecordLog {
        let elapsed_days = match (card.state, card.last_review) {
            (CardPhase::New, _) | (_, None) => 0,
            (_, Some(last)) => (now - last).num_days().max(0),
        };

        let mut base = card.clone();
        base.elapsed_days = elapsed_days;
        base.reps += 1;
        base.last_review = Some(now);

        let previous_state = card.state;
        let cards = match card.state {
            CardPhase::New if self.params.enable_short_term => self.schedule_new(&base, now),
            CardPhase::New => self.schedule_new_long_term(&base, now),
            CardPhase::Learning | CardPhase::Relearning => self.schedule_learning(&base, now),
            CardPhase::Review => self.schedule_review(&base, now),
        };

        let [again, hard, good, easy] = cards;
        RecordLog {
            again: attach_log(again, Rating::Again, elapsed_days, now, previous_state),
            hard: attach_log(hard, Rating::Hard, elapsed_days, now, previous_state),
            good: attach_log(good, Rating::Good, elapsed_days, now, previous_state),
            easy: attach_log(easy, Rating::Easy, elapsed_days, now, previous_state),
        }
    }

    /// First exposure: per-rating initial memory state, fixed minute-scale
    /// steps for everything but Easy.
    fn schedule_new(&self, base: &Card, now: DateTime<Utc>) -> [Card; 4] {
        let [mut again, mut hard, mut good, mut easy] = self.init_grades(base);

        again.state = CardPhase::Learning;
        again.lapses += 1;
        again.scheduled_days = 0;
        again.due = now + Duration::minutes(1);

        hard.state = CardPhase::Learning;
        hard.scheduled_days = 0;
        hard.due = now + Duration::minutes(5);

        good.state = CardPhase::Learning;
        good.scheduled_days = 0;
        good.due = now + Duration::minutes(10);

        easy.state = CardPhase::Review;
        let easy_interval = self.next_interval(easy.stability * self.params.easy_bonus);
        easy.scheduled_days = easy_interval;
        easy.due = now + Duration::days(easy_interval);

        [again, hard, good, easy]
    }

    /// First exposure with short-term steps disabled: day-scale intervals
    /// for all ratings, immediate graduation on success.
    fn schedule_new_long_term(&self, base: &Card, now: DateTime<Utc>) -> [Card; 4] {
        let [mut again, mut hard, mut good, mut easy] = self.init_grades(base);

        again.state = CardPhase::Learning;
        again.lapses += 1;
        again.scheduled_days = 1;
        again.due = now + Duration::days(1);

        let hard_interval = self.next_interval(hard.stability);
        let good_interval = self.next_interval(good.stability).max(hard_interval + 1);
        let easy_interval = self
            .next_interval(easy.stability * self.params.easy_bonus)
            .max(good_interval + 1);

        hard.state = CardPhase::Review;
        hard.scheduled_days = hard_interval;
        hard.due = now + Duration::days(hard_interval);

        good.state = CardPhase::Review;
        good.scheduled_days = good_interval;
        good.due = now + Duration::days(good_interval);

        easy.state = CardPhase::Review;
        easy.scheduled_days = easy_interval;
        easy.due = now + Duration::days(easy_interval);

        [again, hard, good, easy]
    }

    /// Short-term phase: memory state carries over unchanged, only the
    /// intervals are recomputed. Success graduates to Review.
    fn schedule_learning(&self, base: &Card, now: DateTime<Utc>) -> [Card; 4] {
        let mut again = base.clone();
        let mut hard = base.clone();
        let mut good = base.clone();
        let mut easy = base.clone();

        again.lapses += 1;
        again.scheduled_days = 0;
        again.due = now + Duration::minutes(5);

        let hard_interval = self.next_interval(hard.stability);
        let good_interval = self.next_interval(good.stability).max(hard_interval + 1);
        let easy_interval = self
            .next_interval(easy.stability * self.params.easy_bonus)
            .max(good_interval + 1);

        hard.state = CardPhase::Review;
        hard.scheduled_days = hard_interval;
        hard.due = now + Duration::days(hard_interval);

        good.state = CardPhase::Review;
        good.scheduled_days = good_interval;
        good.due = now + Duration::days(good_interval);

        easy.state = CardPhase::Review;
        easy.scheduled_days = easy_interval;
        easy.due = now + Duration::days(easy_interval);

        [again, hard, good, easy]
    }

    /// Long-term phase: retrievability-driven stability/difficulty updates,
    /// monotonic interval ordering hard <= good < easy.
    fn schedule_review(&self, base: &Card, now: DateTime<Utc>) -> [Card; 4] {
        let last_stability = base.stability.max(MIN_STABILITY);
        let last_difficulty = base.difficulty;
        let retrievability = retrievability(base.elapsed_days, last_stability);

        let mut again = base.clone();
        let mut hard = base.clone();
        let mut good = base.clone();
        let mut easy = base.clone();

        again.difficulty = self.next_difficulty(last_difficulty, Rating::Again);
        again.stability =
            self.next_forget_stability(again.difficulty, last_stability, retrievability);
        hard.difficulty = self.next_difficulty(last_difficulty, Rating::Hard);
        hard.stability =
            self.next_recall_stability(hard.difficulty, last_stability, retrievability);
        good.difficulty = self.next_difficulty(last_difficulty, Rating::Good);
        good.stability =
            self.next_recall_stability(good.difficulty, last_stability, retrievability);
        easy.difficulty = self.next_difficulty(last_difficulty, Rating::Easy);
        easy.stability =
            self.next_recall_stability(easy.difficulty, last_stability, retrievability);

        again.state = CardPhase::Relearning;
        again.lapses += 1;
        again.scheduled_days = 0;
        again.due = now + Duration::minutes(5);

        let good_base = self.next_interval(good.stability);
        let hard_interval = self
            .next_interval(last_stability * self.params.hard_factor)
            .min(good_base);
        let good_interval = good_base.max(hard_interval + 1);
        let easy_interval = self
            .next_interval(easy.stability * self.params.easy_bonus)
            .max(good_interval + 1);

        hard.state = CardPhase::Review;
        hard.scheduled_days = hard_interval;
        hard.due = now + Duration::days(hard_interval);

        good.state = CardPhase::Review;
        good.scheduled_days = good_interval;
        good.due = now + Duration::days(good_interval);

        easy.state = CardPhase::Review;
        easy.scheduled_days = easy_interval;
        easy.due = now + Duration::days(easy_interval);

        [again, hard, good, easy]
    }

    /// Four working copies with per-rating initial stability/difficulty.
    fn init_grades(&self, base: &Card) -> [Card; 4] {
        Rating::ALL.map(|rating| {
            let mut card = base.clone();
            card.stability = self.init_stability(rating);
            card.difficulty = self.init_difficulty(rating);
            card
        })
    }

    fn init_stability(&self, rating: Rating) -> f64 {
        let r = f64::from(rating.to_value());
        (self.params.w.init_stability_base + self.params.w.init_stability_step * r)
            .max(MIN_STABILITY)
    }

    fn init_difficulty(&self, rating: Rating) -> f64 {
        let r = f64::from(rating.to_value());
        (self.params.w.init_difficulty_base + self.params.w.init_difficulty_step * (r - 2.0))
            .clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    /// Days until recall probability decays to the retention target,
    /// clamped to [1, maximum_interval].
    fn next_interval(&self, stability: f64) -> i64 {
        let retention = self.params.request_retention.clamp(0.0001, 0.9999);
        let days = (stability.max(MIN_STABILITY) * retention.ln() / 0.9_f64.ln()).round();
        (days as i64).clamp(1, i64::from(self.params.maximum_interval))
    }

    fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let r = f64::from(rating.to_value());
        let shifted = difficulty + self.params.w.difficulty_step * (r - 2.0);
        self.mean_reversion(self.params.w.init_difficulty_base, shifted)
            .clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    fn mean_reversion(&self, init: f64, current: f64) -> f64 {
        let weight = self.params.w.mean_reversion_weight;
        weight * init + (1.0 - weight) * current
    }

    /// `r` here is retrievability (0..1), not the rating ordinal.
    fn next_recall_stability(&self, difficulty: f64, stability: f64, r: f64) -> f64 {
        let w = &self.params.w;
        let growth = w.recall_factor.exp()
            * (11.0 - difficulty)
            * stability.powf(w.recall_stability_decay)
            * ((1.0 - r) * w.recall_retrievability_gain).exp_m1();
        (stability * (1.0 + growth)).max(MIN_STABILITY)
    }

    /// Post-lapse stability; never exceeds the previous stability.
    fn next_forget_stability(&self, difficulty: f64, stability: f64, r: f64) -> f64 {
        let w = &self.params.w;
        let next = w.forget_factor
            * difficulty.max(MIN_DIFFICULTY).powf(w.forget_difficulty_decay)
            * stability.powf(w.forget_stability_gain)
            * ((1.0 - r) * w.forget_retrievability_gain).exp();
        next.clamp(MIN_STABILITY, stability.max(MIN_STABILITY))
    }
}

/// Forgetting-curve estimate of current recall probability:
/// `0.9 ^ (elapsed_days / stability)`.
pub fn retrievability(elapsed_days: i64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    let elapsed = elapsed_days.max(0) as f64;
    0.9_f64.powf(elapsed / stability)
}

fn attach_log(
    card: Card,
    rating: Rating,
    elapsed_days: i64,
    now: DateTime<Utc>,
    previous_state: CardPhase,
) -> SchedulingInfo {
    let review_log = ReviewLog {
        rating,
        elapsed_days,
        scheduled_days: card.scheduled_days,
        review_time: now,
        previous_state,
    };
    SchedulingInfo { card, review_log }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn review_card(stability: f64, difficulty: f64, elapsed_days: i64) -> Card {
        let last = now() - Duration::days(elapsed_days);
        Card {
            due: now(),
            stability,
            difficulty,
            elapsed_days: 0,
            scheduled_days: elapsed_days,
            reps: 3,
            lapses: 0,
            state: CardPhase::Review,
            last_review: Some(last),
        }
    }

    #[test]
    fn new_card_fixed_learning_steps() {
        let scheduler = Scheduler::default();
        let record = scheduler.repeat(&Card::new(now()), now());

        assert_eq!(record.again.card.due, now() + Duration::minutes(1));
        assert_eq!(record.hard.card.due, now() + Duration::minutes(5));
        assert_eq!(record.good.card.due, now() + Duration::minutes(10));
        assert_eq!(record.again.card.state, CardPhase::Learning);
        assert_eq!(record.hard.card.state, CardPhase::Learning);
        assert_eq!(record.good.card.state, CardPhase::Learning);
        assert_eq!(record.easy.card.state, CardPhase::Review);
        assert!(record.easy.card.scheduled_days >= 1);
    }

    #[test]
    fn new_card_again_counts_a_lapse() {
        let scheduler = Scheduler::default();
        let record = scheduler.repeat(&Card::new(now()), now());
        assert_eq!(record.again.card.lapses, 1);
        assert_eq!(record.good.card.lapses, 0);
    }

    #[test]
    fn initial_memory_state_ordering() {
        let scheduler = Scheduler::default();
        let record = scheduler.repeat(&Card::new(now()), now());

        // Better ratings start with higher stability and lower difficulty.
        assert!(record.again.card.stability < record.hard.card.stability);
        assert!(record.hard.card.stability < record.good.card.stability);
        assert!(record.good.card.stability < record.easy.card.stability);
        assert!(record.again.card.difficulty > record.good.card.difficulty);
        assert!(record.good.card.difficulty > record.easy.card.difficulty);
    }

    #[test]
    fn learning_card_graduates_with_ordered_intervals() {
        let scheduler = Scheduler::default();
        let mut card = Card::new(now() - Duration::minutes(10));
        card.stability = 3.0;
        card.difficulty = 5.0;
        card.state = CardPhase::Learning;
        card.reps = 1;
        card.last_review = Some(now() - Duration::minutes(10));

        let record = scheduler.repeat(&card, now());
        assert_eq!(record.again.card.state, CardPhase::Learning);
        assert_eq!(record.again.card.due, now() + Duration::minutes(5));
        assert_eq!(record.hard.card.state, CardPhase::Review);

        let hard = record.hard.card.scheduled_days;
        let good = record.good.card.scheduled_days;
        let easy = record.easy.card.scheduled_days;
        assert!(hard <= good);
        assert!(good < easy);
        assert!(hard >= 1);
    }

    #[test]
    fn relearning_again_stays_in_relearning() {
        let scheduler = Scheduler::default();
        let mut card = review_card(4.0, 6.0, 1);
        card.state = CardPhase::Relearning;

        let record = scheduler.repeat(&card, now());
        assert_eq!(record.again.card.state, CardPhase::Relearning);
        assert_eq!(record.again.card.lapses, 1);
    }

    #[test]
    fn review_intervals_ordered_and_bounded() {
        let scheduler = Scheduler::default();
        let record = scheduler.repeat(&review_card(10.0, 5.0, 10), now());

        let hard = record.hard.card.scheduled_days;
        let good = record.good.card.scheduled_days;
        let easy = record.easy.card.scheduled_days;
        assert!(hard <= good);
        assert!(good < easy);
        assert!(hard >= 1);
        assert!(easy <= i64::from(scheduler.params().maximum_interval));
    }

    #[test]
    fn review_again_applies_forgetting_penalty() {
        let scheduler = Scheduler::default();
        let record = scheduler.repeat(&review_card(10.0, 5.0, 10), now());

        assert_eq!(record.again.card.state, CardPhase::Relearning);
        assert_eq!(record.again.card.lapses, 1);
        assert!(record.again.card.stability < 10.0);
        assert!(record.again.card.difficulty > 5.0);
    }

    #[test]
    fn review_success_grows_stability() {
        let scheduler = Scheduler::default();
        let record = scheduler.repeat(&review_card(10.0, 5.0, 10), now());

        assert!(record.good.card.stability > 10.0);
        assert!(record.easy.card.stability > record.good.card.stability);
        assert!(record.hard.card.stability < record.good.card.stability);
    }

    #[test]
    fn difficulty_and_stability_stay_in_bounds() {
        let scheduler = Scheduler::default();
        let mut card = review_card(0.3, 9.8, 30);
        for _ in 0..50 {
            let record = scheduler.repeat(&card, now());
            card = record.again.card;
            assert!(card.difficulty >= MIN_DIFFICULTY);
            assert!(card.difficulty <= MAX_DIFFICULTY);
            assert!(card.stability >= MIN_STABILITY);
            card.state = CardPhase::Review;
        }
    }

    #[test]
    fn negative_elapsed_days_clamps_to_zero() {
        let scheduler = Scheduler::default();
        let mut card = review_card(5.0, 5.0, 0);
        // Clock skew: last review in the future.
        card.last_review = Some(now() + Duration::days(3));

        let record = scheduler.repeat(&card, now());
        assert_eq!(record.good.review_log.elapsed_days, 0);
        assert!(record.good.card.stability >= MIN_STABILITY);
    }

    #[test]
    fn repeat_is_pure() {
        let scheduler = Scheduler::default();
        let card = review_card(7.0, 4.0, 5);
        let first = scheduler.repeat(&card, now());
        let second = scheduler.repeat(&card, now());

        for rating in Rating::ALL {
            assert_eq!(
                first.get(rating).card.scheduled_days,
                second.get(rating).card.scheduled_days
            );
            assert_eq!(first.get(rating).card.stability, second.get(rating).card.stability);
        }
    }

    #[test]
    fn review_log_captures_transition() {
        let scheduler = Scheduler::default();
        let record = scheduler.repeat(&review_card(10.0, 5.0, 10), now());

        let log = &record.good.review_log;
        assert_eq!(log.rating, Rating::Good);
        assert_eq!(log.elapsed_days, 10);
        assert_eq!(log.previous_state, CardPhase::Review);
        assert_eq!(log.review_time, now());
        assert_eq!(log.scheduled_days, record.good.card.scheduled_days);
    }

    #[test]
    fn retrievability_decays_with_elapsed_time() {
        let r0 = retrievability(0, 10.0);
        let r5 = retrievability(5, 10.0);
        let r10 = retrievability(10, 10.0);
        assert!((r0 - 1.0).abs() < 1e-12);
        assert!(r0 > r5);
        assert!(r5 > r10);
        // At t == stability the curve passes through the 0.9 reference.
        assert!((retrievability(10, 10.0) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn retrievability_degenerate_stability_is_zero() {
        assert_eq!(retrievability(5, 0.0), 0.0);
        assert_eq!(retrievability(5, -2.0), 0.0);
    }

    #[test]
    fn interval_tracks_retention_target() {
        // At the 0.9 reference retention the interval equals the stability.
        let scheduler = Scheduler::default();
        assert_eq!(scheduler.next_interval(5.0), 5);
        assert_eq!(scheduler.next_interval(0.4), 1);

        let lax = Scheduler::new(Parameters {
            request_retention: 0.8,
            ..Parameters::default()
        });
        // Lower retention targets stretch the interval.
        assert!(lax.next_interval(5.0) > 5);
    }

    #[test]
    fn interval_respects_maximum() {
        let scheduler = Scheduler::new(Parameters {
            maximum_interval: 100,
            ..Parameters::default()
        });
        assert_eq!(scheduler.next_interval(1e6), 100);
    }

    #[test]
    fn long_term_mode_skips_learning_steps() {
        let scheduler = Scheduler::new(Parameters {
            enable_short_term: false,
            ..Parameters::default()
        });
        let record = scheduler.repeat(&Card::new(now()), now());

        assert_eq!(record.again.card.state, CardPhase::Learning);
        assert_eq!(record.again.card.scheduled_days, 1);
        assert_eq!(record.hard.card.state, CardPhase::Review);
        assert_eq!(record.good.card.state, CardPhase::Review);
        assert!(record.hard.card.scheduled_days >= 1);
        assert!(record.hard.card.scheduled_days <= record.good.card.scheduled_days);
        assert!(record.good.card.scheduled_days < record.easy.card.scheduled_days);
    }

    #[test]
    fn weights_array_round_trips() {
        let weights = Weights::default();
        assert_eq!(Weights::from_array(weights.to_array()), weights);

        let err = Weights::from_slice(&[1.0, 2.0]).unwrap_err();
        assert_eq!(err, SrsError::InvalidWeights(2));
    }
}
