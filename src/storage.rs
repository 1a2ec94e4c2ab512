use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::path::Path;

use crate::card::{Card, CardId, Memory, ReviewLogEntry, ReviewPhase, ReviewedState};
use crate::scheduler::Rating;

/// Persistence collaborator for the card store. Durability is eventual:
/// the core never blocks on a save and treats failures as retryable.
pub trait CardRepository {
    fn load_cards(&self, user: &str) -> Result<Vec<Card>>;
    fn save_cards(&mut self, user: &str, cards: &[Card]) -> Result<()>;
}

/// SQLite-backed repository. Saves are whole-user snapshots inside a
/// transaction; card history lives in the reviews table.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let repo = SqliteRepository { conn };
        repo.init_schema()?;

        Ok(repo)
    }

    /// In-memory database, useful for tests and throwaway sessions
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = SqliteRepository { conn };
        repo.init_schema()?;
        Ok(repo)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                user TEXT NOT NULL,
                word TEXT NOT NULL,
                meaning TEXT NOT NULL,
                confidence INTEGER NOT NULL DEFAULT 1,
                learned INTEGER NOT NULL DEFAULT 0,
                phase TEXT NOT NULL DEFAULT 'new',
                reps INTEGER NOT NULL DEFAULT 0,
                lapses INTEGER NOT NULL DEFAULT 0,
                stability REAL,
                difficulty REAL,
                due TEXT,
                last_review TEXT,
                elapsed_days REAL,
                scheduled_days REAL,
                UNIQUE(user, word)
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY,
                card_id INTEGER NOT NULL,
                rating INTEGER NOT NULL,
                reviewed_at TEXT NOT NULL,
                FOREIGN KEY (card_id) REFERENCES cards(id)
            );

            CREATE INDEX IF NOT EXISTS idx_cards_user ON cards(user);
            CREATE INDEX IF NOT EXISTS idx_cards_due ON cards(due);
            CREATE INDEX IF NOT EXISTS idx_reviews_card ON reviews(card_id);
            ",
        )?;

        Ok(())
    }

    fn load_history(&self, card_id: CardId) -> Result<Vec<ReviewLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT rating, reviewed_at FROM reviews
             WHERE card_id = ?1 ORDER BY reviewed_at ASC, id ASC",
        )?;

        let raw = stmt
            .query_map(params![card_id], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut history = Vec::with_capacity(raw.len());
        for (rating, at) in raw {
            let rating = Rating::from_u32(rating)
                .ok_or_else(|| anyhow!("invalid rating {rating} for card {card_id}"))?;
            let at: DateTime<Utc> = at
                .parse()
                .with_context(|| format!("invalid review timestamp for card {card_id}"))?;
            history.push(ReviewLogEntry { at, rating });
        }

        Ok(history)
    }
}

impl CardRepository for SqliteRepository {
    fn load_cards(&self, user: &str) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, word, meaning, confidence, learned, phase, reps, lapses,
                    stability, difficulty, due, last_review, elapsed_days, scheduled_days
             FROM cards WHERE user = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![user], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, u32>(7)?,
                    row.get::<_, Option<f32>>(8)?,
                    row.get::<_, Option<f32>>(9)?,
                    row.get::<_, Option<String>>(10)?,
                    row.get::<_, Option<String>>(11)?,
                    row.get::<_, Option<f32>>(12)?,
                    row.get::<_, Option<f32>>(13)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut cards = Vec::with_capacity(rows.len());
        for (
            id,
            word,
            meaning,
            confidence,
            learned,
            phase,
            reps,
            lapses,
            stability,
            difficulty,
            due,
            last_review,
            elapsed_days,
            scheduled_days,
        ) in rows
        {
            let phase = ReviewPhase::parse(&phase)
                .ok_or_else(|| anyhow!("unknown review phase '{phase}' for card {id}"))?;

            let memory = match (stability, difficulty, due, last_review) {
                (Some(stability), Some(difficulty), Some(due), Some(last_review)) => {
                    Memory::Reviewed(ReviewedState {
                        stability,
                        difficulty,
                        due: due
                            .parse()
                            .with_context(|| format!("invalid due date for card {id}"))?,
                        last_review: last_review
                            .parse()
                            .with_context(|| format!("invalid last_review for card {id}"))?,
                        elapsed_days: elapsed_days.unwrap_or(0.0),
                        scheduled_days: scheduled_days.unwrap_or(0.0),
                    })
                }
                _ => Memory::Fresh,
            };

            cards.push(Card {
                id,
                word,
                meaning,
                confidence,
                learned,
                phase,
                reps,
                lapses,
                memory,
                history: self.load_history(id)?,
            });
        }

        Ok(cards)
    }

    fn save_cards(&mut self, user: &str, cards: &[Card]) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM reviews WHERE card_id IN (SELECT id FROM cards WHERE user = ?1)",
            params![user],
        )?;
        tx.execute("DELETE FROM cards WHERE user = ?1", params![user])?;

        for card in cards {
            let (stability, difficulty, due, last_review, elapsed_days, scheduled_days) =
                match card.memory {
                    Memory::Reviewed(state) => (
                        Some(state.stability),
                        Some(state.difficulty),
                        Some(state.due.to_rfc3339()),
                        Some(state.last_review.to_rfc3339()),
                        Some(state.elapsed_days),
                        Some(state.scheduled_days),
                    ),
                    Memory::Fresh => (None, None, None, None, None, None),
                };

            tx.execute(
                "INSERT INTO cards (id, user, word, meaning, confidence, learned, phase,
                                    reps, lapses, stability, difficulty, due, last_review,
                                    elapsed_days, scheduled_days)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    card.id,
                    user,
                    card.word,
                    card.meaning,
                    card.confidence,
                    card.learned,
                    card.phase.as_str(),
                    card.reps,
                    card.lapses,
                    stability,
                    difficulty,
                    due,
                    last_review,
                    elapsed_days,
                    scheduled_days,
                ],
            )?;

            for entry in &card.history {
                tx.execute(
                    "INSERT INTO reviews (card_id, rating, reviewed_at) VALUES (?1, ?2, ?3)",
                    params![card.id, entry.rating.as_u32(), entry.at.to_rfc3339()],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
