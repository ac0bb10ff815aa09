//! Time-arithmetic helpers around the scheduling engine.
//!
//! Durations cross the service boundary as whole milliseconds; instants are
//! `DateTime<Utc>`.

use chrono::{DateTime, Duration, Utc};

use crate::service::apply_grade_to;
use crate::types::{FlashCard, Grade};

/// `base + millis`.
pub fn add_millis(base: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
    base + Duration::milliseconds(millis)
}

/// Inclusive boundary: a card due exactly at `now` is due.
pub fn is_due(card: &FlashCard, now: DateTime<Utc>) -> bool {
    now >= card.due_date
}

/// Milliseconds until the card comes due; 0 when already due.
pub fn millis_until_due(card: &FlashCard, now: DateTime<Utc>) -> i64 {
    (card.due_date - now).num_milliseconds().max(0)
}

/// Apply a grade's due-date and stat updates to a card.
///
/// Same transformation as `FsrsService::apply_grade`; offered here for
/// callers holding a grade without a service handle.
pub fn update_card_due_date(card: &FlashCard, grade: &Grade, now: DateTime<Utc>) -> FlashCard {
    apply_grade_to(card, grade, now)
}
