use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::card::{Card, CardId};
use crate::storage::CardRepository;

/// In-memory view of a user's cards, split into the two disjoint
/// partitions the rest of the core works against: active (still being
/// learned) and mastered. Persistence is a best-effort snapshot handed
/// to the repository collaborator; the live view never waits for it.
#[derive(Debug, Default)]
pub struct CardStore {
    active: Vec<Card>,
    mastered: Vec<Card>,
    dirty: bool,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the live view from the repository at startup
    pub fn hydrate(repo: &dyn CardRepository, user: &str) -> Result<Self> {
        let cards = repo.load_cards(user)?;
        let mut store = Self::new();
        for card in cards {
            if card.learned {
                store.mastered.push(card);
            } else {
                store.active.push(card);
            }
        }
        log::debug!(
            "hydrated store for {user}: {} active, {} mastered",
            store.active.len(),
            store.mastered.len()
        );
        Ok(store)
    }

    /// Cards still being learned, in insertion order
    pub fn active(&self) -> &[Card] {
        &self.active
    }

    /// Mastered cards, in insertion order
    pub fn mastered(&self) -> &[Card] {
        &self.mastered
    }

    /// Insert or replace by id. The card lands in the partition matching
    /// its learned flag; any copy in the other partition is dropped first.
    pub fn upsert(&mut self, card: Card) {
        let other = if card.learned {
            &mut self.active
        } else {
            &mut self.mastered
        };
        other.retain(|c| c.id != card.id);

        let target = if card.learned {
            &mut self.mastered
        } else {
            &mut self.active
        };
        if let Some(slot) = target.iter_mut().find(|c| c.id == card.id) {
            *slot = card;
        } else {
            target.push(card);
        }
        self.dirty = true;
    }

    /// Remove from whichever partition holds the card; no-op if absent
    pub fn remove(&mut self, id: CardId) -> Option<Card> {
        for list in [&mut self.active, &mut self.mastered] {
            if let Some(pos) = list.iter().position(|c| c.id == id) {
                self.dirty = true;
                return Some(list.remove(pos));
            }
        }
        None
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.active
            .iter()
            .chain(self.mastered.iter())
            .find(|c| c.id == id)
    }

    /// Linear scan across both partitions
    pub fn find(&self, predicate: impl Fn(&Card) -> bool) -> Option<&Card> {
        self.active
            .iter()
            .chain(self.mastered.iter())
            .find(|c| predicate(c))
    }

    /// Case-insensitive word-text lookup
    pub fn find_by_word(&self, word: &str) -> Option<&Card> {
        self.find(|c| c.word.eq_ignore_ascii_case(word))
    }

    /// Promote a card to mastered; no-op if absent or already mastered
    pub fn mark_learned(&mut self, id: CardId) {
        if let Some(pos) = self.active.iter().position(|c| c.id == id) {
            let mut card = self.active.remove(pos);
            card.mark_learned();
            self.mastered.push(card);
            self.dirty = true;
        }
    }

    /// Move a mastered card back into learning rotation
    pub fn unmark_learned(&mut self, id: CardId, now: DateTime<Utc>) {
        if let Some(pos) = self.mastered.iter().position(|c| c.id == id) {
            let mut card = self.mastered.remove(pos);
            card.unmark_learned(now);
            self.active.push(card);
            self.dirty = true;
        }
    }

    /// Set a card's confidence, moving it to mastered if the card
    /// crosses the learned threshold
    pub fn set_confidence(&mut self, id: CardId, level: u8) {
        if let Some(mut card) = self.remove(id) {
            card.set_confidence(level);
            self.upsert(card);
        }
    }

    /// True when changes have not yet reached the repository
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Snapshot-save both partitions. A failure leaves the in-memory view
    /// untouched and the store dirty; the caller decides whether to retry.
    pub fn persist(&mut self, repo: &mut dyn CardRepository, user: &str) -> Result<()> {
        let mut all = Vec::with_capacity(self.active.len() + self.mastered.len());
        all.extend(self.active.iter().cloned());
        all.extend(self.mastered.iter().cloned());

        match repo.save_cards(user, &all) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                log::warn!("failed to persist cards for {user}: {err:#}");
                Err(err)
            }
        }
    }
}
