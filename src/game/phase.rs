//! Phase state machine.
//!
//! A pure decision function over `(Game, Trigger)`: it never mutates, it
//! only answers whether a transition is legal and what the next phase is.
//! The controller applies the result and publishes the transition event.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::constants::{MAX_PLAYERS, MIN_PLAYERS};
use super::entities::Game;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Lobby,
    Locked,
    RoleSelection,
    RoleDistribution,
    RoomAssignment,
    Round(u8),
    Resolution,
    Finished,
}

impl Phase {
    pub fn is_round(&self) -> bool {
        matches!(self, Self::Round(_))
    }

    pub fn round_number(&self) -> Option<u8> {
        match self {
            Self::Round(k) => Some(*k),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "LOBBY"),
            Self::Locked => write!(f, "LOCKED"),
            Self::RoleSelection => write!(f, "ROLE_SELECTION"),
            Self::RoleDistribution => write!(f, "ROLE_DISTRIBUTION"),
            Self::RoomAssignment => write!(f, "ROOM_ASSIGNMENT"),
            Self::Round(k) => write!(f, "ROUND_{k}"),
            Self::Resolution => write!(f, "RESOLUTION"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    LockRoom,
    UnlockRoom,
    StartRoleSelection,
    CancelRoleSelection,
    ConfirmRoles,
    RolesDistributed,
    StartGame,
    RoundComplete,
    InstantWin,
    WinConditionsResolved,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::LockRoom => "lock_room",
            Self::UnlockRoom => "unlock_room",
            Self::StartRoleSelection => "start_role_selection",
            Self::CancelRoleSelection => "cancel_role_selection",
            Self::ConfirmRoles => "confirm_roles",
            Self::RolesDistributed => "roles_distributed",
            Self::StartGame => "start_game",
            Self::RoundComplete => "round_complete",
            Self::InstantWin => "instant_win",
            Self::WinConditionsResolved => "win_conditions_resolved",
        };
        write!(f, "{repr}")
    }
}

/// Typed refusal from the state machine.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransitionDenied {
    #[error("trigger {trigger} does not apply in phase {phase}")]
    NotApplicable { phase: Phase, trigger: Trigger },
    #[error("player count {count} outside {MIN_PLAYERS}-{MAX_PLAYERS}")]
    PlayerCountOutOfRange { count: usize },
    #[error("roles are already assigned")]
    RolesAlreadyAssigned,
    #[error("{missing} player(s) still have no role")]
    RolesIncomplete { missing: usize },
    #[error("room sizes {room_a} and {room_b} differ by more than one")]
    RoomsUnbalanced { room_a: usize, room_b: usize },
    #[error("hostage exchange has not completed")]
    ExchangeIncomplete,
}

/// Decide the next phase for `trigger`, or a typed denial.
pub fn transition(game: &Game, trigger: Trigger) -> Result<Phase, TransitionDenied> {
    use Phase::*;
    use Trigger::*;

    let denied = || TransitionDenied::NotApplicable {
        phase: game.phase,
        trigger,
    };

    match (game.phase, trigger) {
        (Lobby, LockRoom) => {
            let count = game.player_count();
            if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
                return Err(TransitionDenied::PlayerCountOutOfRange { count });
            }
            Ok(Locked)
        }
        (Locked, UnlockRoom) => {
            if !game.private.role_assignments.is_empty() {
                return Err(TransitionDenied::RolesAlreadyAssigned);
            }
            Ok(Lobby)
        }
        (Locked, StartRoleSelection) => Ok(RoleSelection),
        (RoleSelection, CancelRoleSelection) => Ok(Locked),
        // Role-configuration validation runs before the trigger is raised;
        // the machine itself only orders the phases.
        (RoleSelection, ConfirmRoles) => Ok(RoleDistribution),
        (RoleDistribution, RolesDistributed) => {
            let missing = game
                .player_count()
                .saturating_sub(game.private.role_assignments.len());
            if missing > 0 {
                return Err(TransitionDenied::RolesIncomplete { missing });
            }
            Ok(RoomAssignment)
        }
        (RoomAssignment, StartGame) => {
            if game.rooms.size_skew() > 1 {
                return Err(TransitionDenied::RoomsUnbalanced {
                    room_a: game.rooms.a.size(),
                    room_b: game.rooms.b.size(),
                });
            }
            Ok(Round(1))
        }
        (Round(k), RoundComplete) => {
            let unfinished = |room: &super::entities::RoomState| {
                room.hostages_locked || !room.hostage_candidates.is_empty()
            };
            if unfinished(&game.rooms.a) || unfinished(&game.rooms.b) {
                return Err(TransitionDenied::ExchangeIncomplete);
            }
            if k < game.config.total_rounds {
                Ok(Round(k + 1))
            } else {
                Ok(Resolution)
            }
        }
        (Round(_), InstantWin) => Ok(Resolution),
        (Resolution, WinConditionsResolved) => Ok(Finished),
        _ => Err(denied()),
    }
}
