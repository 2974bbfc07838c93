//! Externally submitted commands.
//!
//! A command is a typed message on behalf of an authenticated player. The
//! transport adapter builds these; the controller is the only consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CharacterId;

use super::entities::{PlayerId, RoomId};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Command {
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub kind: CommandKind,
    pub timestamp: DateTime<Utc>,
}

impl Command {
    pub fn new(player_id: PlayerId, kind: CommandKind) -> Self {
        Self {
            player_id,
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    LeaveGame,
    LockRoom,
    UnlockRoom,
    StartRoleSelection,
    CancelRoleSelection,
    SelectRoles {
        roles: Vec<CharacterId>,
    },
    SetRounds {
        total_rounds: u8,
    },
    ConfirmRoles,
    StartGame,
    NominateLeader {
        room: RoomId,
        candidate: PlayerId,
    },
    InitiateNewLeaderVote {
        room: RoomId,
    },
    VoteUsurp {
        room: RoomId,
        candidate: PlayerId,
    },
    Abdicate {
        room: RoomId,
        successor: PlayerId,
    },
    SelectHostage {
        room: RoomId,
        target: PlayerId,
    },
    LockHostages {
        room: RoomId,
    },
    CardShare {
        target: PlayerId,
    },
    ColorShare {
        target: PlayerId,
    },
    PrivateReveal {
        target: PlayerId,
    },
    PublicReveal,
    ActivateAbility {
        ability: String,
        targets: Vec<PlayerId>,
    },
}

impl CommandKind {
    /// The wire `type` tag, used in log lines and error context.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LeaveGame => "LEAVE_GAME",
            Self::LockRoom => "LOCK_ROOM",
            Self::UnlockRoom => "UNLOCK_ROOM",
            Self::StartRoleSelection => "START_ROLE_SELECTION",
            Self::CancelRoleSelection => "CANCEL_ROLE_SELECTION",
            Self::SelectRoles { .. } => "SELECT_ROLES",
            Self::SetRounds { .. } => "SET_ROUNDS",
            Self::ConfirmRoles => "CONFIRM_ROLES",
            Self::StartGame => "START_GAME",
            Self::NominateLeader { .. } => "NOMINATE_LEADER",
            Self::InitiateNewLeaderVote { .. } => "INITIATE_NEW_LEADER_VOTE",
            Self::VoteUsurp { .. } => "VOTE_USURP",
            Self::Abdicate { .. } => "ABDICATE",
            Self::SelectHostage { .. } => "SELECT_HOSTAGE",
            Self::LockHostages { .. } => "LOCK_HOSTAGES",
            Self::CardShare { .. } => "CARD_SHARE",
            Self::ColorShare { .. } => "COLOR_SHARE",
            Self::PrivateReveal { .. } => "PRIVATE_REVEAL",
            Self::PublicReveal => "PUBLIC_REVEAL",
            Self::ActivateAbility { .. } => "ACTIVATE_ABILITY",
        }
    }
}
