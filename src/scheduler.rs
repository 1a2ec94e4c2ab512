use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use fsrs::{DEFAULT_PARAMETERS, FSRS, ItemState, MemoryState, NextStates};

use crate::card::{Card, Memory, ReviewPhase};

/// Recall quality reported by the learner after self-testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    /// Forgot the item
    Again = 1,
    /// Recalled with serious difficulty
    Hard = 2,
    /// Recalled correctly
    Good = 3,
    /// Recalled instantly
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Convert to FSRS rating (1-4)
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    /// Confidence proxy shown to the user after this rating.
    /// 3 is reserved as the unlearn reset value.
    pub fn confidence_hint(&self) -> u8 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 4,
            Rating::Easy => 5,
        }
    }
}

/// Scheduling strategy boundary. The production model wraps the FSRS crate;
/// tests substitute deterministic or failing models through this trait.
pub trait MemoryModel {
    fn next_states(&self, memory: Option<MemoryState>, elapsed_days: u32) -> Result<NextStates>;
}

/// FSRS-backed memory model with a desired retention rate
pub struct FsrsModel {
    fsrs: FSRS,
    desired_retention: f32,
}

impl FsrsModel {
    pub fn new(desired_retention: f32) -> Result<Self> {
        Ok(Self {
            fsrs: FSRS::new(Some(&DEFAULT_PARAMETERS))?,
            desired_retention,
        })
    }
}

impl MemoryModel for FsrsModel {
    fn next_states(&self, memory: Option<MemoryState>, elapsed_days: u32) -> Result<NextStates> {
        let states = self
            .fsrs
            .next_states(memory, self.desired_retention, elapsed_days)?;
        Ok(states)
    }
}

/// Projected card state for one candidate rating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub rating: Rating,
    pub stability: f32,
    pub difficulty: f32,
    pub elapsed_days: f32,
    pub scheduled_days: f32,
    pub reps: u32,
    pub lapses: u32,
    pub phase: ReviewPhase,
    pub due: DateTime<Utc>,
    pub reviewed_at: DateTime<Utc>,
    /// True when the linear fallback produced this projection
    pub degraded: bool,
}

impl Projection {
    /// Time until the projected due date, for wait-time previews
    pub fn due_in(&self) -> Duration {
        self.due - self.reviewed_at
    }
}

/// Projections for all four ratings, so the UI can preview the
/// consequence of each choice before the learner commits one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulePreview {
    pub again: Projection,
    pub hard: Projection,
    pub good: Projection,
    pub easy: Projection,
}

impl SchedulePreview {
    pub fn for_rating(&self, rating: Rating) -> &Projection {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }
}

/// Shortest interval the scheduler will ever produce
const MIN_INTERVAL_SECS: i64 = 60;

const SECS_PER_DAY: f64 = 86_400.0;

/// Fallback difficulty for cards that have never been through the model
const FRESH_DIFFICULTY: f32 = 5.0;

/// Scheduler wrapping a memory model
pub struct Scheduler {
    model: Box<dyn MemoryModel>,
    max_interval_days: f32,
}

impl Scheduler {
    /// Create a scheduler with the FSRS model at the given retention rate
    pub fn new(desired_retention: f32, max_interval_days: f32) -> Result<Self> {
        Ok(Self {
            model: Box::new(FsrsModel::new(desired_retention)?),
            max_interval_days,
        })
    }

    /// Create with default 0.9 retention and a one-year interval cap
    pub fn with_defaults() -> Result<Self> {
        Self::new(0.9, 365.0)
    }

    /// Create with a custom memory model
    pub fn with_model(model: Box<dyn MemoryModel>, max_interval_days: f32) -> Self {
        Self {
            model,
            max_interval_days,
        }
    }

    /// Project the card's next state for every rating. Never fails: if the
    /// model errors, every projection comes from the deterministic linear
    /// policy (interval = rating * 2 days) and is flagged as degraded.
    pub fn preview(&self, card: &Card, now: DateTime<Utc>) -> SchedulePreview {
        let elapsed_days = match card.last_review() {
            Some(last) => now.signed_duration_since(last).num_days().max(0) as u32,
            None => 0,
        };

        match self.model.next_states(card.memory_state(), elapsed_days) {
            Ok(next) => SchedulePreview {
                again: self.project(card, Rating::Again, &next.again, elapsed_days, now),
                hard: self.project(card, Rating::Hard, &next.hard, elapsed_days, now),
                good: self.project(card, Rating::Good, &next.good, elapsed_days, now),
                easy: self.project(card, Rating::Easy, &next.easy, elapsed_days, now),
            },
            Err(err) => {
                log::warn!(
                    "memory model failed for card {} (degraded mode, linear intervals): {err:#}",
                    card.id
                );
                SchedulePreview {
                    again: fallback(card, Rating::Again, elapsed_days, now),
                    hard: fallback(card, Rating::Hard, elapsed_days, now),
                    good: fallback(card, Rating::Good, elapsed_days, now),
                    easy: fallback(card, Rating::Easy, elapsed_days, now),
                }
            }
        }
    }

    fn project(
        &self,
        card: &Card,
        rating: Rating,
        state: &ItemState,
        elapsed_days: u32,
        now: DateTime<Utc>,
    ) -> Projection {
        // FSRS intervals are fractional days; keep the sub-day precision
        let secs = (f64::from(state.interval) * SECS_PER_DAY).clamp(
            MIN_INTERVAL_SECS as f64,
            f64::from(self.max_interval_days) * SECS_PER_DAY,
        ) as i64;

        Projection {
            rating,
            stability: state.memory.stability,
            difficulty: state.memory.difficulty,
            elapsed_days: elapsed_days as f32,
            scheduled_days: secs as f32 / SECS_PER_DAY as f32,
            reps: card.reps + 1,
            lapses: card.lapses + u32::from(rating == Rating::Again),
            phase: next_phase(card.phase, rating),
            due: now + Duration::seconds(secs),
            reviewed_at: now,
            degraded: false,
        }
    }
}

/// Deterministic degraded-mode policy: interval = rating * 2 days,
/// stability and difficulty untouched
fn fallback(card: &Card, rating: Rating, elapsed_days: u32, now: DateTime<Utc>) -> Projection {
    let (stability, difficulty) = match card.memory {
        Memory::Reviewed(state) => (state.stability, state.difficulty),
        Memory::Fresh => (0.0, FRESH_DIFFICULTY),
    };
    let interval_days = rating.as_u32() as i64 * 2;

    Projection {
        rating,
        stability,
        difficulty,
        elapsed_days: elapsed_days as f32,
        scheduled_days: interval_days as f32,
        reps: card.reps + 1,
        lapses: card.lapses + u32::from(rating == Rating::Again),
        phase: next_phase(card.phase, rating),
        due: now + Duration::days(interval_days),
        reviewed_at: now,
        degraded: true,
    }
}

fn next_phase(current: ReviewPhase, rating: Rating) -> ReviewPhase {
    use ReviewPhase::*;
    match (current, rating) {
        (New | Learning, Rating::Again | Rating::Hard) => Learning,
        (New | Learning, _) => Review,
        (Review, Rating::Again) => Relearning,
        (Review, _) => Review,
        (Relearning, Rating::Again | Rating::Hard) => Relearning,
        (Relearning, _) => Review,
    }
}
