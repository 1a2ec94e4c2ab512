use chrono::{DateTime, Utc};
use fsrs::MemoryState;

use crate::scheduler::{Projection, Rating};

pub type CardId = i64;

/// Memory-model review phase of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    New,
    Learning,
    Review,
    Relearning,
}

impl ReviewPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewPhase::New => "new",
            ReviewPhase::Learning => "learning",
            ReviewPhase::Review => "review",
            ReviewPhase::Relearning => "relearning",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ReviewPhase::New),
            "learning" => Some(ReviewPhase::Learning),
            "review" => Some(ReviewPhase::Review),
            "relearning" => Some(ReviewPhase::Relearning),
            _ => None,
        }
    }
}

/// FSRS state carried by a card that has been reviewed at least once
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewedState {
    pub stability: f32,
    pub difficulty: f32,
    pub due: DateTime<Utc>,
    pub last_review: DateTime<Utc>,
    pub elapsed_days: f32,
    pub scheduled_days: f32,
}

/// A never-reviewed card has no due date, stability or difficulty at all,
/// so those fields live behind this sum type rather than a pile of Options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Memory {
    Fresh,
    Reviewed(ReviewedState),
}

/// One entry in a card's append-only review log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewLogEntry {
    pub at: DateTime<Utc>,
    pub rating: Rating,
}

/// A vocabulary item under spaced repetition
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub word: String,
    pub meaning: String,
    /// User-facing 1-5 proxy for recall quality
    pub confidence: u8,
    /// Mastered by policy; distinct from the memory model's phase
    pub learned: bool,
    pub phase: ReviewPhase,
    pub reps: u32,
    pub lapses: u32,
    pub memory: Memory,
    pub history: Vec<ReviewLogEntry>,
}

impl Card {
    /// Create a fresh card: never reviewed, immediately due
    pub fn new(id: CardId, word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            id,
            word: word.into(),
            meaning: meaning.into(),
            confidence: 1,
            learned: false,
            phase: ReviewPhase::New,
            reps: 0,
            lapses: 0,
            memory: Memory::Fresh,
            history: Vec::new(),
        }
    }

    /// Next scheduled review time; None means never reviewed (due now)
    pub fn due(&self) -> Option<DateTime<Utc>> {
        match self.memory {
            Memory::Fresh => None,
            Memory::Reviewed(state) => Some(state.due),
        }
    }

    pub fn last_review(&self) -> Option<DateTime<Utc>> {
        match self.memory {
            Memory::Fresh => None,
            Memory::Reviewed(state) => Some(state.last_review),
        }
    }

    /// FSRS memory state for the scheduler, if the card has one
    pub fn memory_state(&self) -> Option<MemoryState> {
        match self.memory {
            Memory::Fresh => None,
            Memory::Reviewed(state) => Some(MemoryState {
                stability: state.stability,
                difficulty: state.difficulty,
            }),
        }
    }

    /// Apply a committed rating's projection: bookkeeping counters, phase,
    /// memory state, history entry and the confidence proxy all move together.
    pub fn apply_review(&mut self, projection: &Projection) {
        self.reps = projection.reps;
        self.lapses = projection.lapses;
        self.phase = projection.phase;
        self.memory = Memory::Reviewed(ReviewedState {
            stability: projection.stability,
            difficulty: projection.difficulty,
            due: projection.due,
            last_review: projection.reviewed_at,
            elapsed_days: projection.elapsed_days,
            scheduled_days: projection.scheduled_days,
        });
        self.history.push(ReviewLogEntry {
            at: projection.reviewed_at,
            rating: projection.rating,
        });
        self.confidence = projection.rating.confidence_hint();
    }

    /// Mark as mastered (confidence pinned to 5 at the transition)
    pub fn mark_learned(&mut self) {
        self.learned = true;
        self.confidence = 5;
    }

    /// Put a mastered card back into rotation: medium confidence,
    /// immediately due again
    pub fn unmark_learned(&mut self, now: DateTime<Utc>) {
        self.learned = false;
        self.confidence = 3;
        if let Memory::Reviewed(ref mut state) = self.memory {
            state.due = state.due.min(now).max(state.last_review);
        }
    }

    /// Set confidence, clamped to 1-5. Top confidence marks the card learned.
    pub fn set_confidence(&mut self, level: u8) {
        self.confidence = level.clamp(1, 5);
        if self.confidence == 5 {
            self.learned = true;
        }
    }
}
