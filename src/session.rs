use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::card::Card;
use crate::queue;
use crate::scheduler::{Projection, Rating, SchedulePreview, Scheduler};
use crate::store::CardStore;

/// Cadence at which the owning event loop should call [`ReviewSession::tick`].
/// The session itself owns no timer; whoever owns the session drives this,
/// which also ties the timer's lifetime to the session's.
pub const TICK_PERIOD: std::time::Duration = std::time::Duration::from_secs(5);

/// A just-reviewed card whose next due time lands within this window of
/// "now" stays in the session as a pending requeue instead of leaving
pub const REQUEUE_WINDOW_MINS: i64 = 15;

/// Session lifecycle. Waiting means the live deck is empty but pending
/// requeues will bring cards back; Complete is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Active,
    Waiting,
    Complete,
}

/// A card held out of the live deck until its short-interval due time passes
#[derive(Debug, Clone)]
pub struct PendingRequeue {
    pub card: Card,
    pub due_time: DateTime<Utc>,
}

/// Per-sitting statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub reviewed: u32,
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl SessionStats {
    fn record(&mut self, rating: Rating) {
        self.reviewed += 1;
        match rating {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
        }
    }
}

/// One review sitting: the live deck, the pending-requeue list and the
/// session statistics. Cards are processed strictly first-in-first-out;
/// a card coming back from pending joins the tail, never its old spot.
pub struct ReviewSession {
    phase: SessionPhase,
    deck: VecDeque<Card>,
    pending: Vec<PendingRequeue>,
    stats: SessionStats,
    requeue_window: Duration,
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Loading,
            deck: VecDeque::new(),
            pending: Vec::new(),
            stats: SessionStats::default(),
            requeue_window: Duration::minutes(REQUEUE_WINDOW_MINS),
        }
    }

    pub fn with_requeue_window(mut self, minutes: i64) -> Self {
        self.requeue_window = Duration::minutes(minutes);
        self
    }

    /// Load today's due cards into the live deck and begin the sitting
    pub fn start(&mut self, store: &CardStore, now: DateTime<Utc>) {
        let queues = queue::partition(store.active(), now);
        self.deck = queues.today.into();
        self.pending.clear();
        self.stats = SessionStats::default();
        self.phase = if self.deck.is_empty() {
            SessionPhase::Complete
        } else {
            SessionPhase::Active
        };
        log::debug!("session started with {} cards due", self.deck.len());
    }

    /// The card currently being shown, if any
    pub fn current_card(&self) -> Option<&Card> {
        self.deck.front()
    }

    /// Projected outcome of each rating for the current card, for the UI
    /// to render wait-time previews before the learner commits
    pub fn preview_current(
        &self,
        scheduler: &Scheduler,
        now: DateTime<Utc>,
    ) -> Option<SchedulePreview> {
        self.current_card().map(|card| scheduler.preview(card, now))
    }

    /// Commit a rating for the current card. Guarded no-op (returns None)
    /// when there is no current card, so a stray double-rating can never
    /// corrupt session state. Persistence failures are the store's problem;
    /// the session state here is authoritative for the sitting.
    pub fn rate_current(
        &mut self,
        rating: Rating,
        scheduler: &Scheduler,
        store: &mut CardStore,
        now: DateTime<Utc>,
    ) -> Option<Projection> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        let card = self.deck.front()?.clone();

        self.stats.record(rating);

        let preview = scheduler.preview(&card, now);
        let projection = *preview.for_rating(rating);
        let mut updated = card;
        updated.apply_review(&projection);
        store.upsert(updated.clone());

        if projection.due <= now + self.requeue_window {
            log::debug!("card {} pending requeue at {}", updated.id, projection.due);
            self.pending.push(PendingRequeue {
                card: updated,
                due_time: projection.due,
            });
        }

        self.deck.pop_front();

        if self.deck.is_empty() {
            self.phase = if self.pending.is_empty() {
                log::debug!("session complete: {} reviewed", self.stats.reviewed);
                SessionPhase::Complete
            } else {
                SessionPhase::Waiting
            };
        }

        Some(projection)
    }

    /// Fold elapsed pending requeues back onto the tail of the live deck.
    /// Returns how many cards came back. The owner calls this on the
    /// [`TICK_PERIOD`] cadence while the session is running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> usize {
        if self.phase != SessionPhase::Active && self.phase != SessionPhase::Waiting {
            return 0;
        }

        let mut requeued = 0;
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].due_time <= now {
                let entry = self.pending.remove(i);
                log::debug!("card {} back in the live deck", entry.card.id);
                self.deck.push_back(entry.card);
                requeued += 1;
            } else {
                i += 1;
            }
        }

        if requeued > 0 && self.phase == SessionPhase::Waiting {
            self.phase = SessionPhase::Active;
        }
        requeued
    }

    /// True only when the deck is exhausted and nothing is pending;
    /// distinct from Loading (nothing loaded yet) and Waiting (cards
    /// will return)
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn pending(&self) -> &[PendingRequeue] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::MemoryModel;
    use anyhow::Result;
    use fsrs::{ItemState, MemoryState, NextStates};

    /// Model with fixed intervals (in days) per rating
    struct StubModel {
        again: f32,
        hard: f32,
        good: f32,
        easy: f32,
    }

    impl StubModel {
        fn item(interval: f32) -> ItemState {
            ItemState {
                memory: MemoryState {
                    stability: 1.0,
                    difficulty: 5.0,
                },
                interval,
            }
        }
    }

    impl MemoryModel for StubModel {
        fn next_states(&self, _: Option<MemoryState>, _: u32) -> Result<NextStates> {
            Ok(NextStates {
                again: Self::item(self.again),
                hard: Self::item(self.hard),
                good: Self::item(self.good),
                easy: Self::item(self.easy),
            })
        }
    }

    const FIVE_MINUTES: f32 = 5.0 / 1440.0;

    fn stub_scheduler() -> Scheduler {
        Scheduler::with_model(
            Box::new(StubModel {
                again: FIVE_MINUTES,
                hard: 0.5,
                good: 3.0,
                easy: 10.0,
            }),
            365.0,
        )
    }

    fn store_with(words: &[(i64, &str)]) -> CardStore {
        let mut store = CardStore::new();
        for (id, word) in words {
            store.upsert(Card::new(*id, *word, "meaning"));
        }
        store
    }

    #[test]
    fn test_empty_deck_completes_immediately() {
        let mut session = ReviewSession::new();
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert!(!session.is_complete());

        session.start(&CardStore::new(), Utc::now());
        assert_eq!(session.phase(), SessionPhase::Complete);
        assert!(session.is_complete());
    }

    #[test]
    fn test_rating_without_current_card_is_noop() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scheduler = stub_scheduler();
        let mut store = store_with(&[]);
        let mut session = ReviewSession::new();

        // Not started yet
        assert!(
            session
                .rate_current(Rating::Good, &scheduler, &mut store, Utc::now())
                .is_none()
        );
        assert_eq!(session.stats().reviewed, 0);
    }

    #[test]
    fn test_requeue_and_waiting_round_trip() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scheduler = stub_scheduler();
        let mut store = store_with(&[(1, "a"), (2, "b")]);
        let mut session = ReviewSession::new();
        let now = Utc::now();

        session.start(&store, now);
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.deck_len(), 2);

        // Easy projects 10 days out: card leaves the session entirely
        let easy = session
            .rate_current(Rating::Easy, &scheduler, &mut store, now)
            .unwrap();
        assert!(easy.due > now + Duration::minutes(REQUEUE_WINDOW_MINS));
        assert_eq!(session.deck_len(), 1);
        assert!(session.pending().is_empty());

        // Again projects five minutes out: card goes pending, deck drains
        let again = session
            .rate_current(Rating::Again, &scheduler, &mut store, now)
            .unwrap();
        assert_eq!(session.pending().len(), 1);
        assert_eq!(session.phase(), SessionPhase::Waiting);
        assert!(!session.is_complete());

        // Before the due time nothing moves
        assert_eq!(session.tick(now + Duration::minutes(1)), 0);
        assert_eq!(session.phase(), SessionPhase::Waiting);

        // Once the pending card is due it rejoins the tail and the
        // session wakes back up
        assert_eq!(session.tick(again.due), 1);
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.deck_len(), 1);
        assert_eq!(session.current_card().unwrap().id, 2);
        assert!(!session.is_complete());
    }

    #[test]
    fn test_completion_without_pending() {
        let scheduler = stub_scheduler();
        let mut store = store_with(&[(1, "a")]);
        let mut session = ReviewSession::new();
        let now = Utc::now();

        session.start(&store, now);
        session.rate_current(Rating::Good, &scheduler, &mut store, now);

        assert_eq!(session.phase(), SessionPhase::Complete);
        assert!(session.is_complete());
        assert_eq!(session.deck_len(), 0);
        assert!(session.pending().is_empty());

        // Terminal: further ratings are rejected
        assert!(
            session
                .rate_current(Rating::Good, &scheduler, &mut store, now)
                .is_none()
        );
        assert_eq!(session.stats().reviewed, 1);
    }

    #[test]
    fn test_requeued_card_joins_the_tail() {
        let scheduler = stub_scheduler();
        let mut store = store_with(&[(1, "a"), (2, "b"), (3, "c")]);
        let mut session = ReviewSession::new();
        let now = Utc::now();

        session.start(&store, now);
        let again = session
            .rate_current(Rating::Again, &scheduler, &mut store, now)
            .unwrap();
        session.rate_current(Rating::Good, &scheduler, &mut store, now);

        // Deck is [c]; the requeued card must land after it
        session.tick(again.due);
        assert_eq!(session.current_card().unwrap().id, 3);
        assert_eq!(session.deck_len(), 2);
    }

    #[test]
    fn test_store_sees_the_review() {
        let scheduler = stub_scheduler();
        let mut store = store_with(&[(1, "a")]);
        let mut session = ReviewSession::new();
        let now = Utc::now();

        session.start(&store, now);
        session.rate_current(Rating::Hard, &scheduler, &mut store, now);

        let card = store.get(1).unwrap();
        assert_eq!(card.reps, 1);
        assert_eq!(card.history.len(), 1);
        assert_eq!(card.history[0].rating, Rating::Hard);
        assert_eq!(card.confidence, 2);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_stats_tally_per_rating() {
        let scheduler = stub_scheduler();
        let mut store = store_with(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
        let mut session = ReviewSession::new();
        let now = Utc::now();

        session.start(&store, now);
        session.rate_current(Rating::Again, &scheduler, &mut store, now);
        session.rate_current(Rating::Hard, &scheduler, &mut store, now);
        session.rate_current(Rating::Good, &scheduler, &mut store, now);
        session.rate_current(Rating::Easy, &scheduler, &mut store, now);

        let stats = session.stats();
        assert_eq!(stats.reviewed, 4);
        assert_eq!(stats.again, 1);
        assert_eq!(stats.hard, 1);
        assert_eq!(stats.good, 1);
        assert_eq!(stats.easy, 1);
    }

    #[test]
    fn test_preview_matches_committed_projection() {
        let scheduler = stub_scheduler();
        let mut store = store_with(&[(1, "a")]);
        let mut session = ReviewSession::new();
        let now = Utc::now();

        session.start(&store, now);
        let preview = session.preview_current(&scheduler, now).unwrap();
        let committed = session
            .rate_current(Rating::Good, &scheduler, &mut store, now)
            .unwrap();
        assert_eq!(*preview.for_rating(Rating::Good), committed);
    }

    #[test]
    fn test_history_grows_once_per_review() {
        let scheduler = stub_scheduler();
        let mut store = store_with(&[(1, "a")]);
        let mut session = ReviewSession::new();
        let mut now = Utc::now();

        // Drive the same card through several short-interval reviews
        for round in 1..=3u32 {
            session.start(&store, now);
            session.rate_current(Rating::Again, &scheduler, &mut store, now);
            let card = store.get(1).unwrap();
            assert_eq!(card.reps, round);
            assert_eq!(card.lapses, round);
            assert_eq!(card.history.len() as u32, round);
            now += Duration::minutes(10);
        }
    }
}
