pub mod memory;

use futures::future::BoxFuture;

use crate::dao::models::{AnswerRecord, GameResultRecord, GameStatusUpdate};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for answers and game results.
///
/// Writes are append-only from the coordinator's perspective and must be
/// idempotent: at most one stored answer per (round, user) and one result
/// set per game, re-applying a write that already landed is a no-op.
pub trait GameStore: Send + Sync {
    /// Persist one scored answer.
    fn save_answer(&self, answer: AnswerRecord) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist the final standings of a finished game.
    fn save_game_results(
        &self,
        results: Vec<GameResultRecord>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Record a lifecycle status change with its timestamps.
    fn update_game_status(&self, update: GameStatusUpdate) -> BoxFuture<'static, StorageResult<()>>;
}
