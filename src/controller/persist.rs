//! Optional write-through seam over the game store.
//!
//! The core keeps no durable state; embedders that want games mirrored
//! into external storage implement this trait and hand it to the store.
//! Every hook is best-effort: failures are the adapter's to log, never the
//! game's to see.

use async_trait::async_trait;

use crate::game::entities::GameId;

use super::messages::GameStatus;

#[async_trait]
pub trait WriteThrough: Send + Sync {
    /// A game was created and its actor spawned.
    async fn game_created(&self, status: &GameStatus);

    /// A game reached FINISHED (reported by the reaper's status sweep).
    async fn game_finished(&self, status: &GameStatus);

    /// A game was reaped out of the store.
    async fn game_removed(&self, game_id: GameId);
}

/// Adapter that persists nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPersistence;

#[async_trait]
impl WriteThrough for NoPersistence {
    async fn game_created(&self, _status: &GameStatus) {}
    async fn game_finished(&self, _status: &GameStatus) {}
    async fn game_removed(&self, _game_id: GameId) {}
}
