//! The `Game` aggregate and its partitioned state.
//!
//! State is partitioned by who may observe it: the public snapshot, the two
//! room views, the server-private block, and the per-player private view.
//! Rooms and players reference each other by id through the aggregate; there
//! are no bidirectional pointers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::catalog::{CharacterId, Team};
use crate::round::timer::TimerView;

use super::constants::MAX_PLAYERS;
use super::phase::Phase;

pub type GameId = Uuid;
pub type PlayerId = Uuid;

/// One of the two venues a game's players are partitioned into.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum RoomId {
    A,
    B,
}

impl RoomId {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "ROOM_A"),
            Self::B => write!(f, "ROOM_B"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Something a player has learned about another player through a share or
/// reveal. Only ever serialised inside that player's private view.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KnownInformation {
    pub about: PlayerId,
    pub learned: Knowledge,
    pub round: u8,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Knowledge {
    Character(CharacterId),
    Team(Team),
}

/// A named condition applied by the ability engine.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Condition {
    pub name: String,
    pub round: u8,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,

    pub connection: ConnectionStatus,
    pub connection_token: Option<Uuid>,
    pub last_seen: DateTime<Utc>,
    pub acked_sequence: u64,

    pub current_role: Option<CharacterId>,
    pub original_role: Option<CharacterId>,
    pub current_room: Option<RoomId>,
    pub is_leader: bool,
    pub can_be_hostage: bool,
    pub is_alive: bool,

    pub conditions: Vec<Condition>,
    pub collected_cards: Vec<CharacterId>,
    pub known_information: Vec<KnownInformation>,

    pub was_sent_as_hostage: bool,
    pub usurped_leaders: u32,
}

impl Player {
    pub fn new(name: &str, is_host: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            is_host,
            connection: ConnectionStatus::Connected,
            connection_token: Some(Uuid::new_v4()),
            last_seen: Utc::now(),
            acked_sequence: 0,
            current_role: None,
            original_role: None,
            current_room: None,
            is_leader: false,
            can_be_hostage: true,
            is_alive: true,
            conditions: Vec::new(),
            collected_cards: Vec::new(),
            known_information: Vec::new(),
            was_sent_as_hostage: false,
            usurped_leaders: 0,
        }
    }

    pub fn public_info(&self) -> PublicPlayerInfo {
        PublicPlayerInfo {
            id: self.id,
            name: self.name.clone(),
            is_host: self.is_host,
            connection: self.connection,
            is_leader: self.is_leader,
            current_room: self.current_room,
        }
    }

    pub fn private_view(&self) -> PlayerPrivateView {
        PlayerPrivateView {
            current_role: self.current_role.clone(),
            original_role: self.original_role.clone(),
            conditions: self.conditions.clone(),
            collected_cards: self.collected_cards.clone(),
            known_information: self.known_information.clone(),
        }
    }
}

/// Per-round state of one room.
#[derive(Clone, Debug, Default)]
pub struct RoomState {
    pub members: Vec<PlayerId>,
    pub leader: Option<PlayerId>,
    pub leader_votes: HashMap<PlayerId, PlayerId>,
    pub leader_voting_active: bool,
    pub leader_voting_tie_count: u8,
    pub hostage_candidates: Vec<PlayerId>,
    pub hostages_locked: bool,
    pub parlay_complete: bool,
}

impl RoomState {
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.contains(&player_id)
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Reset everything that does not survive a round boundary.
    pub fn clear_round_state(&mut self) {
        self.leader_votes.clear();
        self.leader_voting_active = false;
        self.leader_voting_tie_count = 0;
        self.hostage_candidates.clear();
        self.hostages_locked = false;
        self.parlay_complete = false;
    }

    pub fn snapshot(&self, room: RoomId) -> RoomSnapshot {
        RoomSnapshot {
            room,
            members: self.members.clone(),
            leader: self.leader,
            leader_voting_active: self.leader_voting_active,
            leader_voting_tie_count: self.leader_voting_tie_count,
            votes_cast: self.leader_votes.len(),
            hostage_candidates: self.hostage_candidates.clone(),
            hostages_locked: self.hostages_locked,
            parlay_complete: self.parlay_complete,
        }
    }
}

/// Both rooms, indexable by `RoomId`.
#[derive(Clone, Debug, Default)]
pub struct Rooms {
    pub a: RoomState,
    pub b: RoomState,
}

impl Rooms {
    pub fn get(&self, room: RoomId) -> &RoomState {
        match room {
            RoomId::A => &self.a,
            RoomId::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, room: RoomId) -> &mut RoomState {
        match room {
            RoomId::A => &mut self.a,
            RoomId::B => &mut self.b,
        }
    }

    pub fn size_skew(&self) -> usize {
        self.a.size().abs_diff(self.b.size())
    }
}

/// Immutable-once-started game configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameConfig {
    pub total_rounds: u8,
    pub round_durations: Vec<std::time::Duration>,
    pub bury_card: bool,
    pub selected_roles: Vec<CharacterId>,
}

impl GameConfig {
    /// Default descending schedule for the supported round counts.
    pub fn default_durations(total_rounds: u8) -> Vec<std::time::Duration> {
        let secs: &[u64] = match total_rounds {
            3 => &[300, 180, 60],
            _ => &[300, 240, 180, 120, 60],
        };
        secs.iter().map(|&s| std::time::Duration::from_secs(s)).collect()
    }

    pub fn for_rounds(total_rounds: u8) -> Self {
        Self {
            total_rounds,
            round_durations: Self::default_durations(total_rounds),
            bury_card: false,
            selected_roles: Vec::new(),
        }
    }

    /// Duration of round `k` (1-based), saturating at the last entry.
    pub fn round_duration(&self, round: u8) -> std::time::Duration {
        let idx = usize::from(round.saturating_sub(1));
        self.round_durations
            .get(idx)
            .or_else(|| self.round_durations.last())
            .copied()
            .unwrap_or(std::time::Duration::from_secs(180))
    }

    /// Deck size this configuration demands for `player_count` players.
    pub fn required_deck_size(&self, player_count: usize) -> usize {
        if self.bury_card {
            player_count + 1
        } else {
            player_count
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::for_rounds(3)
    }
}

/// How a card or colour was shown, for the private share history.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    Card,
    Color,
    PrivateReveal,
    PublicReveal,
}

#[derive(Clone, Debug)]
pub struct CardShareRecord {
    pub round: u8,
    pub initiator: PlayerId,
    pub target: Option<PlayerId>,
    pub kind: ShareKind,
}

/// Server-private state. Nothing in this struct may be serialised into any
/// event that is not scoped to the single player it concerns.
#[derive(Clone, Debug)]
pub struct PrivateState {
    pub role_assignments: HashMap<PlayerId, CharacterId>,
    /// The shuffled deck order used at distribution, for diagnostics.
    pub deck: Vec<CharacterId>,
    pub buried_card: Option<CharacterId>,
    pub host: PlayerId,
    pub seed: [u8; 32],
    pub usurpations: BTreeMap<u8, Vec<PlayerId>>,
    pub card_shares: Vec<CardShareRecord>,
}

/// The aggregate root for one live game.
#[derive(Clone, Debug)]
pub struct Game {
    pub id: GameId,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped once per committed unit of work; used for optimistic checks
    /// and stale-timer detection.
    pub version: u64,

    pub config: GameConfig,
    pub players: HashMap<PlayerId, Player>,
    /// Join order; role distribution iterates players in this order.
    pub join_order: Vec<PlayerId>,

    pub phase: Phase,
    pub current_round: u8,
    pub rooms: Rooms,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub parlay_active: bool,
    pub winning_team: Option<Team>,

    pub private: PrivateState,
}

impl Game {
    /// Create a game with its host already joined.
    pub fn new(code: String, host_name: &str, seed: [u8; 32]) -> Self {
        let host = Player::new(host_name, true);
        let host_id = host.id;
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            created_at: now,
            updated_at: now,
            version: 0,
            config: GameConfig::default(),
            players: HashMap::from([(host_id, host)]),
            join_order: vec![host_id],
            phase: Phase::Lobby,
            current_round: 0,
            rooms: Rooms::default(),
            paused: false,
            pause_reason: None,
            parlay_active: false,
            winning_team: None,
            private: PrivateState {
                role_assignments: HashMap::new(),
                deck: Vec::new(),
                buried_card: None,
                host: host_id,
                seed,
                usurpations: BTreeMap::new(),
                card_shares: Vec::new(),
            },
        }
    }

    pub fn host_id(&self) -> PlayerId {
        self.private.host
    }

    pub fn is_host(&self, player_id: PlayerId) -> bool {
        self.private.host == player_id
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Commit one unit of work: bump the version and refresh `updated_at`.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn add_player(&mut self, name: &str) -> PlayerId {
        let player = Player::new(name, false);
        let id = player.id;
        self.players.insert(id, player);
        self.join_order.push(id);
        id
    }

    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<Player> {
        self.join_order.retain(|id| *id != player_id);
        self.players.remove(&player_id)
    }

    pub fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.players.get(&player_id).and_then(|p| p.current_room)
    }

    pub fn both_rooms_have_leaders(&self) -> bool {
        self.rooms.a.leader.is_some() && self.rooms.b.leader.is_some()
    }

    pub fn roles_assigned(&self) -> bool {
        !self.players.is_empty()
            && self.private.role_assignments.len() == self.players.len()
    }

    /// Public room-assignment map, in stable player order.
    pub fn room_assignments(&self) -> BTreeMap<PlayerId, RoomId> {
        self.players
            .values()
            .filter_map(|p| p.current_room.map(|r| (p.id, r)))
            .collect()
    }

    /// Roster in join order.
    pub fn roster(&self) -> Vec<PublicPlayerInfo> {
        self.join_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(Player::public_info)
            .collect()
    }

    pub fn public_snapshot(&self, timer: TimerView) -> PublicSnapshot {
        PublicSnapshot {
            game_id: self.id,
            code: self.code.clone(),
            phase: self.phase,
            current_round: self.current_round,
            total_rounds: self.config.total_rounds,
            room_assignments: self.room_assignments(),
            leader_a: self.rooms.a.leader,
            leader_b: self.rooms.b.leader,
            timer,
            paused: self.paused,
            pause_reason: self.pause_reason.clone(),
            parlay_active: self.parlay_active,
            roster: self.roster(),
        }
    }
}

/// Roster entry visible to everyone.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PublicPlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub connection: ConnectionStatus,
    pub is_leader: bool,
    pub current_room: Option<RoomId>,
}

/// Everything any participant may see.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PublicSnapshot {
    pub game_id: GameId,
    pub code: String,
    pub phase: Phase,
    pub current_round: u8,
    pub total_rounds: u8,
    pub room_assignments: BTreeMap<PlayerId, RoomId>,
    pub leader_a: Option<PlayerId>,
    pub leader_b: Option<PlayerId>,
    pub timer: TimerView,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub parlay_active: bool,
    pub roster: Vec<PublicPlayerInfo>,
}

/// What members of one room may see about it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub room: RoomId,
    pub members: Vec<PlayerId>,
    pub leader: Option<PlayerId>,
    pub leader_voting_active: bool,
    pub leader_voting_tie_count: u8,
    pub votes_cast: usize,
    pub hostage_candidates: Vec<PlayerId>,
    pub hostages_locked: bool,
    pub parlay_complete: bool,
}

/// Sent only to the player it describes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerPrivateView {
    pub current_role: Option<CharacterId>,
    pub original_role: Option<CharacterId>,
    pub conditions: Vec<Condition>,
    pub collected_cards: Vec<CharacterId>,
    pub known_information: Vec<KnownInformation>,
}

/// Full personal resynchronisation payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub public: PublicSnapshot,
    pub room: Option<RoomSnapshot>,
    pub private: PlayerPrivateView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_first_player() {
        let game = Game::new("ABCDEF".to_string(), "alice", [0; 32]);
        assert_eq!(game.player_count(), 1);
        let host = game.players.get(&game.host_id()).unwrap();
        assert!(host.is_host);
        assert_eq!(host.name, "alice");
    }

    #[test]
    fn join_order_is_stable() {
        let mut game = Game::new("ABCDEF".to_string(), "alice", [0; 32]);
        let bob = game.add_player("bob");
        let carol = game.add_player("carol");
        assert_eq!(game.join_order, vec![game.host_id(), bob, carol]);

        game.remove_player(bob);
        assert_eq!(game.join_order, vec![game.host_id(), carol]);
    }

    #[test]
    fn default_durations_match_round_counts() {
        assert_eq!(GameConfig::default_durations(3).len(), 3);
        assert_eq!(GameConfig::default_durations(5).len(), 5);
        let config = GameConfig::for_rounds(3);
        assert_eq!(config.round_duration(1).as_secs(), 300);
        assert_eq!(config.round_duration(3).as_secs(), 60);
        // Out-of-range rounds saturate rather than panic.
        assert_eq!(config.round_duration(9).as_secs(), 60);
    }

    #[test]
    fn bury_card_grows_required_deck() {
        let mut config = GameConfig::default();
        assert_eq!(config.required_deck_size(8), 8);
        config.bury_card = true;
        assert_eq!(config.required_deck_size(8), 9);
    }

    #[test]
    fn room_state_round_reset_preserves_membership_and_leader() {
        let mut room = RoomState::default();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        room.members = vec![p1, p2];
        room.leader = Some(p1);
        room.leader_votes.insert(p2, p1);
        room.leader_voting_tie_count = 2;
        room.hostage_candidates.push(p2);
        room.hostages_locked = true;

        room.clear_round_state();
        assert_eq!(room.members.len(), 2);
        assert_eq!(room.leader, Some(p1));
        assert!(room.leader_votes.is_empty());
        assert_eq!(room.leader_voting_tie_count, 0);
        assert!(room.hostage_candidates.is_empty());
        assert!(!room.hostages_locked);
    }
}
