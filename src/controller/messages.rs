//! Actor message envelope and typed results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::game::command::Command;
use crate::game::entities::{GameId, PlayerId, PlayerPrivateView, PublicSnapshot, RoomSnapshot};
use crate::game::phase::Phase;
use crate::game::validator::ValidationError;
use crate::journal::EventRecord;

/// Result of an accepted command: warnings that rode along with success.
#[derive(Clone, Debug, Default)]
pub struct CommandOutcome {
    pub warnings: Vec<ValidationError>,
}

/// Why a command (or query) failed.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("game not found")]
    GameNotFound,
    #[error("unknown player")]
    UnknownPlayer,
    #[error("command rejected")]
    Rejected(Vec<ValidationError>),
    #[error("game is no longer running")]
    GameClosed,
    #[error("internal inconsistency: {0}")]
    Internal(String),
}

impl CommandError {
    /// First human-readable failure plus its suggestion, for hosts.
    pub fn user_message(&self) -> (String, Option<String>) {
        match self {
            Self::Rejected(errors) => errors
                .first()
                .map(|e| (e.message.clone(), e.suggestion.clone()))
                .unwrap_or_else(|| ("command rejected".to_string(), None)),
            other => (other.to_string(), None),
        }
    }
}

/// Credentials returned to a newly joined (or created) player.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JoinedGame {
    pub game_id: GameId,
    pub code: String,
    pub player_id: PlayerId,
    pub connection_token: uuid::Uuid,
}

/// Store-level summary of one live game.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameStatus {
    pub id: GameId,
    pub code: String,
    pub phase: Phase,
    pub player_count: usize,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Everything a transport can ask a game actor to do.
#[derive(Debug)]
pub enum GameMessage {
    /// Validated, gated mutation path for every in-game command.
    Execute {
        command: Command,
        response: oneshot::Sender<Result<CommandOutcome, CommandError>>,
    },

    /// Add a player in the lobby.
    Join {
        name: String,
        response: oneshot::Sender<Result<JoinedGame, CommandError>>,
    },

    /// Attach a live event channel, draining the journal past `acked`.
    Subscribe {
        player_id: PlayerId,
        acked: u64,
        sender: mpsc::Sender<EventRecord>,
        response: oneshot::Sender<Result<(), CommandError>>,
    },

    Unsubscribe {
        player_id: PlayerId,
    },

    /// Transport lost the player's connection.
    ConnectionLost {
        player_id: PlayerId,
    },

    /// Transport re-authenticated the player; replays and resyncs.
    Reconnect {
        player_id: PlayerId,
        acked: u64,
        sender: mpsc::Sender<EventRecord>,
        response: oneshot::Sender<Result<JoinedGame, CommandError>>,
    },

    Status {
        response: oneshot::Sender<GameStatus>,
    },

    PublicState {
        response: oneshot::Sender<PublicSnapshot>,
    },

    RoomState {
        player_id: PlayerId,
        response: oneshot::Sender<Result<RoomSnapshot, CommandError>>,
    },

    PrivateView {
        player_id: PlayerId,
        response: oneshot::Sender<Result<PlayerPrivateView, CommandError>>,
    },

    /// Stop the actor. Used by the store when reaping.
    Close {
        response: oneshot::Sender<()>,
    },
}
