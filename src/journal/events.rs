//! Typed events and their payloads.
//!
//! One closed enum covers everything a subscriber can receive. Variants
//! carrying a character id are only ever published on a single-player
//! scope; the journal tests enforce that property over whole games.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{CharacterId, Team};
use crate::game::entities::{PlayerId, PublicPlayerInfo, RoomId, SyncSnapshot};
use crate::game::phase::{Phase, Trigger};
use crate::round::timer::TimerState;

/// How a leader came to power. Carried on `LEADER_ELECTED`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionMethod {
    Majority,
    RandomSelection,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundEndReason {
    HostagesExchanged,
    EndedEarly,
    InstantWin,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEvent {
    // Lifecycle
    GameCreated {
        code: String,
        host: PublicPlayerInfo,
    },
    PlayerJoined {
        player: PublicPlayerInfo,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    RoomLocked,
    RoomUnlocked,

    // Role configuration and distribution
    RolesSelected {
        roles: Vec<CharacterId>,
    },
    GameConfigUpdated {
        total_rounds: u8,
        round_duration_secs: Vec<u64>,
        bury_card: bool,
    },
    /// Player-scoped only: the single place a role assignment is visible.
    RoleAssigned {
        player_id: PlayerId,
        character: CharacterId,
        name: String,
        description: String,
        team: Team,
    },

    // Phase and rounds
    PhaseChanged {
        from: Phase,
        to: Phase,
        trigger: Trigger,
    },
    RoomsAssigned {
        assignments: BTreeMap<PlayerId, RoomId>,
    },
    RoundStarted {
        round: u8,
        duration_secs: u64,
    },
    RoundEnded {
        round: u8,
        reason: RoundEndReason,
    },
    TimerUpdate {
        remaining_secs: u64,
        state: TimerState,
    },

    // Leadership
    VoteCast {
        room: RoomId,
        voter: PlayerId,
        candidate: PlayerId,
        votes_cast: usize,
        room_size: usize,
    },
    LeaderVoteTied {
        room: RoomId,
        tie_count: u8,
        tied: Vec<PlayerId>,
    },
    NewLeaderVote {
        room: RoomId,
        initiated_by: PlayerId,
    },
    LeaderElected {
        room: RoomId,
        leader: PlayerId,
        method: ElectionMethod,
        tie_count: u8,
    },
    LeaderUsurped {
        room: RoomId,
        old_leader: PlayerId,
        new_leader: PlayerId,
    },
    LeaderAbdicated {
        room: RoomId,
        old_leader: PlayerId,
        new_leader: PlayerId,
    },
    LeaderDisconnected {
        room: RoomId,
        leader: PlayerId,
    },

    // Hostages and parlay
    HostageSelected {
        room: RoomId,
        target: PlayerId,
        selected: bool,
        count: usize,
        required: usize,
    },
    HostagesLocked {
        room: RoomId,
    },
    ParlayStarted {
        leader_a: PlayerId,
        leader_b: PlayerId,
    },
    ParlayEnded,
    HostagesExchanged {
        from_a: Vec<PlayerId>,
        from_b: Vec<PlayerId>,
    },

    // Flow
    GamePaused {
        reason: String,
    },
    GameResumed {
        reason: String,
    },
    GameFinished {
        winning_team: Option<Team>,
    },

    // Knowledge transfer. Character-bearing variants are player-scoped.
    CardShared {
        with: PlayerId,
        character: CharacterId,
        team: Team,
    },
    ColorShared {
        with: PlayerId,
        team: Team,
    },
    RoleRevealed {
        by: PlayerId,
        character: CharacterId,
        team: Team,
    },
    /// Room-scoped public reveal: colour only, never the character.
    TeamRevealed {
        player_id: PlayerId,
        team: Team,
    },
    ConditionApplied {
        player_id: PlayerId,
        condition: String,
    },
    ConditionRemoved {
        player_id: PlayerId,
        condition: String,
    },

    // Connection
    PlayerDisconnected {
        player_id: PlayerId,
    },
    PlayerReconnected {
        player_id: PlayerId,
    },

    // Sync
    StateSync {
        state: Box<SyncSnapshot>,
    },
    DesyncDetected {
        journal_head: u64,
        acked: u64,
    },
}

impl GameEvent {
    /// The wire `type` tag, e.g. `LEADER_ELECTED`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::GameCreated { .. } => "GAME_CREATED",
            Self::PlayerJoined { .. } => "PLAYER_JOINED",
            Self::PlayerLeft { .. } => "PLAYER_LEFT",
            Self::RoomLocked => "ROOM_LOCKED",
            Self::RoomUnlocked => "ROOM_UNLOCKED",
            Self::RolesSelected { .. } => "ROLES_SELECTED",
            Self::GameConfigUpdated { .. } => "GAME_CONFIG_UPDATED",
            Self::RoleAssigned { .. } => "ROLE_ASSIGNED",
            Self::PhaseChanged { .. } => "PHASE_CHANGED",
            Self::RoomsAssigned { .. } => "ROOMS_ASSIGNED",
            Self::RoundStarted { .. } => "ROUND_STARTED",
            Self::RoundEnded { .. } => "ROUND_ENDED",
            Self::TimerUpdate { .. } => "TIMER_UPDATE",
            Self::VoteCast { .. } => "VOTE_CAST",
            Self::LeaderVoteTied { .. } => "LEADER_VOTE_TIED",
            Self::NewLeaderVote { .. } => "NEW_LEADER_VOTE",
            Self::LeaderElected { .. } => "LEADER_ELECTED",
            Self::LeaderUsurped { .. } => "LEADER_USURPED",
            Self::LeaderAbdicated { .. } => "LEADER_ABDICATED",
            Self::LeaderDisconnected { .. } => "LEADER_DISCONNECTED",
            Self::HostageSelected { .. } => "HOSTAGE_SELECTED",
            Self::HostagesLocked { .. } => "HOSTAGES_LOCKED",
            Self::ParlayStarted { .. } => "PARLAY_STARTED",
            Self::ParlayEnded => "PARLAY_ENDED",
            Self::HostagesExchanged { .. } => "HOSTAGES_EXCHANGED",
            Self::GamePaused { .. } => "GAME_PAUSED",
            Self::GameResumed { .. } => "GAME_RESUMED",
            Self::GameFinished { .. } => "GAME_FINISHED",
            Self::CardShared { .. } => "CARD_SHARED",
            Self::ColorShared { .. } => "COLOR_SHARED",
            Self::RoleRevealed { .. } => "ROLE_REVEALED",
            Self::TeamRevealed { .. } => "TEAM_REVEALED",
            Self::ConditionApplied { .. } => "CONDITION_APPLIED",
            Self::ConditionRemoved { .. } => "CONDITION_REMOVED",
            Self::PlayerDisconnected { .. } => "PLAYER_DISCONNECTED",
            Self::PlayerReconnected { .. } => "PLAYER_RECONNECTED",
            Self::StateSync { .. } => "STATE_SYNC",
            Self::DesyncDetected { .. } => "DESYNC_DETECTED",
        }
    }
}
