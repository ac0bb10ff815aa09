//! Bounded review sessions and workload recommendations.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SrsError};
use crate::manager::priority_score;
use crate::service::FsrsService;
use crate::types::{CardPhase, FlashCard, Rating};

/// A bounded, ordered sequence of review events over a selected card set.
///
/// The session is complete once `current_index` runs past the end; there is
/// no way back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSession {
    pub cards: Vec<FlashCard>,
    pub current_index: usize,
    pub completed_count: usize,
    pub correct_count: usize,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Rating chosen for each reviewed card, by card id.
    pub ratings: HashMap<i64, Rating>,
}

impl LearningSession {
    fn new(cards: Vec<FlashCard>, now: DateTime<Utc>) -> Self {
        Self {
            cards,
            current_index: 0,
            completed_count: 0,
            correct_count: 0,
            started_at: now,
            finished_at: None,
            ratings: HashMap::new(),
        }
    }

    pub fn current_card(&self) -> Option<&FlashCard> {
        self.cards.get(self.current_index)
    }

    pub fn is_completed(&self) -> bool {
        self.current_index >= self.cards.len()
    }

    pub fn total(&self) -> usize {
        self.cards.len()
    }

    /// Percentage of the session done; an empty session is trivially done.
    pub fn progress(&self) -> f64 {
        if self.cards.is_empty() {
            return 100.0;
        }
        self.completed_count as f64 / self.cards.len() as f64 * 100.0
    }

    /// Percentage of completed reviews rated better than Again.
    pub fn accuracy(&self) -> f64 {
        if self.completed_count == 0 {
            return 0.0;
        }
        self.correct_count as f64 / self.completed_count as f64 * 100.0
    }

    /// Average seconds spent per reviewed card, for finished sessions.
    fn seconds_per_card(&self) -> Option<f64> {
        let finished = self.finished_at?;
        if self.completed_count == 0 {
            return None;
        }
        let elapsed = (finished - self.started_at).num_seconds().max(0) as f64;
        Some(elapsed / self.completed_count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadLevel {
    Low,
    Medium,
    High,
}

/// Due-count outlook used to pace new-card introduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyLoad {
    pub due_today: usize,
    pub due_tomorrow: usize,
    pub due_next_week: usize,
    pub level: LoadLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningRecommendations {
    pub study_load: StudyLoad,
    pub suggested_new_cards: usize,
    /// Up to ten most urgent overdue cards.
    pub priority_cards: Vec<FlashCard>,
    pub estimated_study_seconds: u64,
    pub recommendations: Vec<String>,
}

const DEFAULT_SECONDS_PER_CARD: f64 = 30.0;
const MEDIUM_LOAD_THRESHOLD: usize = 20;
const HIGH_LOAD_THRESHOLD: usize = 50;

/// Orchestrates review sessions on top of [`FsrsService`].
#[derive(Debug, Clone, Default)]
pub struct LearningSessionManager {
    service: FsrsService,
}

impl LearningSessionManager {
    pub fn new(service: FsrsService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &FsrsService {
        &self.service
    }

    /// Select due non-new cards (capped at `max_review_cards`) plus new
    /// cards (capped at `max_new_cards`) and shuffle them into a session.
    pub fn start_session(
        &self,
        all_cards: &[FlashCard],
        max_new_cards: usize,
        max_review_cards: usize,
        now: DateTime<Utc>,
    ) -> LearningSession {
        let mut cards: Vec<FlashCard> = all_cards
            .iter()
            .filter(|card| !card.is_new() && self.service.is_due(card, now))
            .take(max_review_cards)
            .cloned()
            .collect();
        cards.extend(
            all_cards
                .iter()
                .filter(|card| card.is_new())
                .take(max_new_cards)
                .cloned(),
        );
        cards.shuffle(&mut thread_rng());
        debug!(total = cards.len(), "session started");
        LearningSession::new(cards, now)
    }

    /// Apply `rating` to the session's current card and advance.
    ///
    /// Returns the updated card for the caller to persist, or
    /// [`SrsError::SessionExhausted`] when the session is already complete.
    pub fn process_card_review(
        &self,
        session: &mut LearningSession,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<FlashCard> {
        let card = session
            .current_card()
            .cloned()
            .ok_or(SrsError::SessionExhausted)?;

        let options = self.service.grade_options(&card, now);
        let grade = &options[usize::from(rating.to_value() - 1)];
        let updated = self.service.apply_grade(&card, grade, now);

        session.ratings.insert(card.id, rating);
        session.current_index += 1;
        session.completed_count += 1;
        if rating != Rating::Again {
            session.correct_count += 1;
        }
        if session.is_completed() {
            session.finished_at = Some(now);
        }
        Ok(updated)
    }

    /// Workload outlook plus pacing advice derived from the card collection
    /// and recent session timings.
    pub fn learning_recommendations(
        &self,
        cards: &[FlashCard],
        recent_sessions: &[LearningSession],
        now: DateTime<Utc>,
    ) -> LearningRecommendations {
        let study_load = self.study_load(cards, now);
        let suggested_new_cards = match study_load.level {
            LoadLevel::Low => 10,
            LoadLevel::Medium => 5,
            LoadLevel::High => 0,
        };

        let mut overdue: Vec<FlashCard> = cards
            .iter()
            .filter(|card| card.due_date < now)
            .cloned()
            .collect();
        overdue.sort_by(|a, b| priority_score(a, now).total_cmp(&priority_score(b, now)));
        overdue.truncate(10);

        let timings: Vec<f64> = recent_sessions
            .iter()
            .filter_map(LearningSession::seconds_per_card)
            .collect();
        let seconds_per_card = if timings.is_empty() {
            DEFAULT_SECONDS_PER_CARD
        } else {
            timings.iter().sum::<f64>() / timings.len() as f64
        };
        let estimated_study_seconds =
            (seconds_per_card * study_load.due_today as f64).round() as u64;

        let recommendations = self.recommendation_texts(cards, &study_load);
        LearningRecommendations {
            study_load,
            suggested_new_cards,
            priority_cards: overdue,
            estimated_study_seconds,
            recommendations,
        }
    }

    fn study_load(&self, cards: &[FlashCard], now: DateTime<Utc>) -> StudyLoad {
        let due_today = cards.iter().filter(|c| self.service.is_due(c, now)).count();
        let due_tomorrow = cards
            .iter()
            .filter(|c| c.due_date <= now + Duration::days(1))
            .count();
        let due_next_week = cards
            .iter()
            .filter(|c| c.due_date <= now + Duration::days(7))
            .count();
        let level = if due_today >= HIGH_LOAD_THRESHOLD {
            LoadLevel::High
        } else if due_today >= MEDIUM_LOAD_THRESHOLD {
            LoadLevel::Medium
        } else {
            LoadLevel::Low
        };
        StudyLoad {
            due_today,
            due_tomorrow,
            due_next_week,
            level,
        }
    }

    fn recommendation_texts(&self, cards: &[FlashCard], load: &StudyLoad) -> Vec<String> {
        let mut texts = Vec::new();
        match load.level {
            LoadLevel::High => texts.push(
                "Heavy review backlog: clear due cards before introducing new material."
                    .to_string(),
            ),
            LoadLevel::Medium => texts.push(
                "Moderate workload: keep new cards limited until the queue shrinks.".to_string(),
            ),
            LoadLevel::Low => {
                texts.push("Light workload: a good day to introduce new cards.".to_string())
            }
        }

        if !cards.is_empty() {
            let average_difficulty =
                cards.iter().map(|c| c.difficulty).sum::<f64>() / cards.len() as f64;
            if average_difficulty >= 6.0 {
                texts.push(
                    "Cards trend difficult; shorter, more frequent sessions help.".to_string(),
                );
            }
            let relearning = cards
                .iter()
                .filter(|c| c.phase == CardPhase::Relearning)
                .count();
            if relearning as f64 / cards.len() as f64 > 0.2 {
                texts.push(
                    "Many cards are in relearning; slow down on new material.".to_string(),
                );
            }
        }
        texts
    }
}
