use chrono::{DateTime, Days, Duration, NaiveTime, Utc};

use crate::card::Card;

/// Cards due within this window of "now" are folded into today's session
/// so the learner isn't kept waiting for trivially-soon reviews
pub const SOON_LOOKAHEAD_MINS: i64 = 60;

/// Due-queue partition for one instant in time. Later-today cards are kept
/// separate from true next-day cards; displays that want a single upcoming
/// list merge them via [`ReviewQueues::upcoming`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewQueues {
    pub today: Vec<Card>,
    pub later_today: Vec<Card>,
    pub tomorrow: Vec<Card>,
    pub later: Vec<Card>,
}

impl ReviewQueues {
    /// Later-today and tomorrow cards merged for display
    pub fn upcoming(&self) -> Vec<&Card> {
        self.later_today.iter().chain(self.tomorrow.iter()).collect()
    }
}

/// Partition cards by due time. Pure function of its inputs; callers
/// recompute it whenever the wall clock matters, never patch it up
/// incrementally. Each card lands in exactly one bucket, first rule wins:
/// never reviewed or due within the lookahead window -> today; due before
/// next midnight -> later today; due before the following midnight ->
/// tomorrow; everything else -> later.
pub fn partition(cards: &[Card], now: DateTime<Utc>) -> ReviewQueues {
    let midnight_tomorrow = (now.date_naive() + Days::new(1))
        .and_time(NaiveTime::MIN)
        .and_utc();
    let midnight_after = (now.date_naive() + Days::new(2))
        .and_time(NaiveTime::MIN)
        .and_utc();
    let soon_cutoff = now + Duration::minutes(SOON_LOOKAHEAD_MINS);

    let mut queues = ReviewQueues {
        today: Vec::new(),
        later_today: Vec::new(),
        tomorrow: Vec::new(),
        later: Vec::new(),
    };

    for card in cards {
        let bucket = match card.due() {
            None => &mut queues.today,
            Some(due) if due <= soon_cutoff => &mut queues.today,
            Some(due) if due < midnight_tomorrow => &mut queues.later_today,
            Some(due) if due < midnight_after => &mut queues.tomorrow,
            Some(_) => &mut queues.later,
        };
        bucket.push(card.clone());
    }

    queues
}
