//! In-memory [`GameStore`] used as the default backend and by the tests.

use std::sync::Mutex;

use futures::future::{self, BoxFuture};
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{AnswerRecord, GameResultRecord, GameStatusUpdate},
    storage::StorageResult,
};

/// Process-local store keeping every record in plain vectors.
///
/// Duplicate writes are dropped rather than rejected so the coordinator's
/// at-most-once write contract holds even if a settlement is replayed.
#[derive(Debug, Default)]
pub struct InMemoryGameStore {
    answers: Mutex<Vec<AnswerRecord>>,
    results: Mutex<Vec<GameResultRecord>>,
    status_updates: Mutex<Vec<GameStatusUpdate>>,
}

impl InMemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored answers for one game, in write order.
    pub fn answers_for(&self, game_id: Uuid) -> Vec<AnswerRecord> {
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|record| record.game_id == game_id)
            .cloned()
            .collect()
    }

    /// Stored final standings for one game, in rank order.
    pub fn results_for(&self, game_id: Uuid) -> Vec<GameResultRecord> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|record| record.game_id == game_id)
            .cloned()
            .collect()
    }

    /// Status updates recorded for one game, in write order.
    pub fn status_history(&self, game_id: Uuid) -> Vec<GameStatusUpdate> {
        self.status_updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|update| update.game_id == game_id)
            .cloned()
            .collect()
    }
}

impl GameStore for InMemoryGameStore {
    fn save_answer(&self, answer: AnswerRecord) -> BoxFuture<'static, StorageResult<()>> {
        let mut answers = self
            .answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let already_stored = answers.iter().any(|stored| {
            stored.game_id == answer.game_id
                && stored.round_number == answer.round_number
                && stored.user_id == answer.user_id
        });
        if !already_stored {
            answers.push(answer);
        }

        Box::pin(future::ready(Ok(())))
    }

    fn save_game_results(
        &self,
        results: Vec<GameResultRecord>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let mut stored = self
            .results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(game_id) = results.first().map(|record| record.game_id) {
            let already_stored = stored.iter().any(|record| record.game_id == game_id);
            if !already_stored {
                stored.extend(results);
            }
        }

        Box::pin(future::ready(Ok(())))
    }

    fn update_game_status(&self, update: GameStatusUpdate) -> BoxFuture<'static, StorageResult<()>> {
        self.status_updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(update);

        Box::pin(future::ready(Ok(())))
    }
}
