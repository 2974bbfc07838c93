//! Round engine: timers, leader elections, hostage selection, parlay, and
//! the hostage exchange.
//!
//! The engine owns the per-game timers and every round sub-phase mutation.
//! It is only ever driven by the owning game actor (commands and the 100 ms
//! tick), so all methods take `&mut Game` and stay synchronous. Events are
//! pushed onto the caller's outbox in causal order; the actor publishes
//! them under one version bump per unit of work.

use log::{debug, info, warn};
use rand::seq::IndexedRandom;
use thiserror::Error;

use crate::game::constants::{PARLAY_DURATION, TIE_LIMIT};
use crate::game::entities::{Game, PlayerId, RoomId};
use crate::journal::events::{ElectionMethod, GameEvent};
use crate::journal::Scope;

pub mod timer;

use timer::{GameTimer, TimerState, TimerView};

/// Reason strings carried on pause/resume events.
pub const PAUSE_HOSTAGE_SELECTION: &str = "hostage selection phase";
pub const RESUME_BOTH_LEADERS: &str = "both leaders elected";
pub const RESUME_VOTE_COMPLETE: &str = "leader vote complete";

/// Events queued for publication, in causal order.
pub type Outbox = Vec<(Scope, GameEvent)>;

/// Non-fatal refusals raised by round mechanics.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RoundFlowError {
    #[error("leader vote tied {tie_count} time(s)")]
    VoteTied { tie_count: u8, tied: Vec<PlayerId> },
    #[error("hostage limit of {required} reached")]
    HostageLimitReached { required: usize },
    #[error("{current} of {required} hostages selected")]
    HostageCountShort { current: usize, required: usize },
}

/// Hostages each leader must send, by game size and round number.
///
/// Single source of truth; the validator and the engine both call this.
pub fn hostage_quota(player_count: usize, round: u8) -> usize {
    match (player_count, round) {
        (0..=10, _) => 1,
        (11..=21, 1) => 2,
        (11..=21, _) => 1,
        (_, 1) => 3,
        (_, 2) => 2,
        (_, _) => 1,
    }
}

/// What a concluded leader vote produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VoteProgress {
    /// More ballots outstanding.
    Pending,
    /// A leader was elected; the caller may need to advance the round.
    Elected(PlayerId),
}

/// Who moved where in a completed hostage exchange.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExchangeSummary {
    pub from_a: Vec<PlayerId>,
    pub from_b: Vec<PlayerId>,
}

impl ExchangeSummary {
    pub fn moved(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.from_a.iter().chain(self.from_b.iter()).copied()
    }
}

#[derive(Debug, Default)]
pub struct RoundEngine {
    round_timer: Option<GameTimer>,
    parlay_timer: Option<GameTimer>,
    last_broadcast_secs: Option<u64>,
}

impl RoundEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer_view(&self) -> TimerView {
        self.round_timer
            .as_ref()
            .map(GameTimer::view)
            .unwrap_or_else(TimerView::idle)
    }

    /// Enter round `round`, resetting per-round room state.
    ///
    /// Round 1 prepares the timer paused at full duration; it ignites only
    /// once both rooms have elected a leader. Later rounds start ticking
    /// immediately.
    pub fn begin_round(&mut self, game: &mut Game, round: u8, out: &mut Outbox) {
        game.current_round = round;
        game.rooms.a.clear_round_state();
        game.rooms.b.clear_round_state();

        let duration = game.config.round_duration(round);
        if round == 1 {
            game.rooms.a.leader_voting_active = true;
            game.rooms.b.leader_voting_active = true;
            self.round_timer = Some(GameTimer::prepared(duration));
        } else {
            self.round_timer = Some(GameTimer::running(duration));
        }
        self.parlay_timer = None;
        self.last_broadcast_secs = None;

        info!("game {} starting round {round}", game.code);
        out.push((
            Scope::Public,
            GameEvent::RoundStarted {
                round,
                duration_secs: duration.as_secs(),
            },
        ));
    }

    /// Record one leader ballot and resolve the poll when every member has
    /// voted. Three consecutive ties force a uniform random pick.
    pub fn cast_leader_vote(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        voter: PlayerId,
        candidate: PlayerId,
        out: &mut Outbox,
    ) -> Result<VoteProgress, RoundFlowError> {
        let room = game.rooms.get_mut(room_id);
        room.leader_votes.insert(voter, candidate);
        let votes_cast = room.leader_votes.len();
        let room_size = room.size();
        out.push((
            Scope::Room(room_id),
            GameEvent::VoteCast {
                room: room_id,
                voter,
                candidate,
                votes_cast,
                room_size,
            },
        ));

        if votes_cast < room_size {
            return Ok(VoteProgress::Pending);
        }

        // Poll complete: count ballots per candidate.
        let mut counts: Vec<(PlayerId, usize)> = Vec::new();
        for cast in room.leader_votes.values() {
            match counts.iter_mut().find(|(id, _)| id == cast) {
                Some((_, n)) => *n += 1,
                None => counts.push((*cast, 1)),
            }
        }
        let max_votes = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        let mut winners: Vec<PlayerId> = counts
            .into_iter()
            .filter(|(_, n)| *n == max_votes)
            .map(|(id, _)| id)
            .collect();
        // Stable order for event payloads and tests.
        winners.sort_by_key(|id| room.members.iter().position(|m| m == id));

        if winners.len() == 1 {
            let tie_count = room.leader_voting_tie_count;
            let winner = winners[0];
            self.elect(game, room_id, winner, ElectionMethod::Majority, tie_count, out);
            return Ok(VoteProgress::Elected(winner));
        }

        let room = game.rooms.get_mut(room_id);
        room.leader_voting_tie_count += 1;
        let tie_count = room.leader_voting_tie_count;
        if tie_count >= TIE_LIMIT {
            let winner = winners
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or(winners[0]);
            debug!(
                "game {} room {room_id}: {tie_count} ties, random pick {winner}",
                game.code
            );
            self.elect(
                game,
                room_id,
                winner,
                ElectionMethod::RandomSelection,
                tie_count,
                out,
            );
            return Ok(VoteProgress::Elected(winner));
        }

        room.leader_votes.clear();
        out.push((
            Scope::Room(room_id),
            GameEvent::LeaderVoteTied {
                room: room_id,
                tie_count,
                tied: winners.clone(),
            },
        ));
        Err(RoundFlowError::VoteTied {
            tie_count,
            tied: winners,
        })
    }

    /// Seat `winner` as the room's leader and clear the poll. Handles the
    /// round-1 ignition rule and re-vote timer resumption.
    fn elect(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        winner: PlayerId,
        method: ElectionMethod,
        tie_count: u8,
        out: &mut Outbox,
    ) {
        self.transfer_leadership(game, room_id, winner);
        let room = game.rooms.get_mut(room_id);
        room.leader_votes.clear();
        room.leader_voting_tie_count = 0;
        room.leader_voting_active = false;

        out.push((
            Scope::Room(room_id),
            GameEvent::LeaderElected {
                room: room_id,
                leader: winner,
                method,
                tie_count,
            },
        ));

        let timer_paused = self
            .round_timer
            .as_ref()
            .is_some_and(|t| t.state() == TimerState::Paused);
        if game.current_round == 1 {
            if game.both_rooms_have_leaders() && timer_paused {
                if let Some(timer) = self.round_timer.as_mut() {
                    timer.start();
                }
                out.push((
                    Scope::Public,
                    GameEvent::GameResumed {
                        reason: RESUME_BOTH_LEADERS.to_string(),
                    },
                ));
            }
        } else if timer_paused {
            if let Some(timer) = self.round_timer.as_mut() {
                timer.start();
            }
            out.push((
                Scope::Public,
                GameEvent::GameResumed {
                    reason: RESUME_VOTE_COMPLETE.to_string(),
                },
            ));
        }
    }

    /// Swap the `is_leader` / `can_be_hostage` flags over to `new_leader`
    /// and return the previous leader, if any.
    fn transfer_leadership(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        new_leader: PlayerId,
    ) -> Option<PlayerId> {
        let old = game.rooms.get(room_id).leader;
        if let Some(old_id) = old {
            if let Some(player) = game.players.get_mut(&old_id) {
                player.is_leader = false;
                player.can_be_hostage = true;
            }
        }
        if let Some(player) = game.players.get_mut(&new_leader) {
            player.is_leader = true;
            player.can_be_hostage = false;
        }
        game.rooms.get_mut(room_id).leader = Some(new_leader);
        old
    }

    /// Open a replacement leader vote (rounds after the first). Pauses the
    /// round timer until the poll concludes.
    pub fn initiate_revote(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        initiated_by: PlayerId,
        out: &mut Outbox,
    ) {
        if let Some(timer) = self.round_timer.as_mut() {
            timer.pause();
        }
        let room = game.rooms.get_mut(room_id);
        room.leader_voting_active = true;
        room.leader_votes.clear();
        room.leader_voting_tie_count = 0;
        out.push((
            Scope::Room(room_id),
            GameEvent::NewLeaderVote {
                room: room_id,
                initiated_by,
            },
        ));
    }

    /// Record a usurpation ballot; seizes leadership at a strict majority
    /// (`floor(size / 2) + 1`) for one candidate.
    pub fn vote_usurp(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        voter: PlayerId,
        candidate: PlayerId,
        out: &mut Outbox,
    ) -> bool {
        let room = game.rooms.get_mut(room_id);
        room.leader_votes.insert(voter, candidate);
        let supporters = room
            .leader_votes
            .values()
            .filter(|cast| **cast == candidate)
            .count();
        let threshold = room.size() / 2 + 1;
        if supporters < threshold {
            let votes_cast = room.leader_votes.len();
            let room_size = room.size();
            out.push((
                Scope::Room(room_id),
                GameEvent::VoteCast {
                    room: room_id,
                    voter,
                    candidate,
                    votes_cast,
                    room_size,
                },
            ));
            return false;
        }

        let old_leader = self.transfer_leadership(game, room_id, candidate);
        if let Some(player) = game.players.get_mut(&candidate) {
            player.usurped_leaders += 1;
        }
        game.private
            .usurpations
            .entry(game.current_round)
            .or_default()
            .push(candidate);
        game.rooms.get_mut(room_id).leader_votes.clear();

        info!(
            "game {} room {room_id}: {candidate} usurped {old_leader:?}",
            game.code
        );
        out.push((
            Scope::Room(room_id),
            GameEvent::LeaderUsurped {
                room: room_id,
                old_leader: old_leader.unwrap_or(candidate),
                new_leader: candidate,
            },
        ));
        true
    }

    /// Immediate leadership handover from the current leader.
    pub fn abdicate(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        successor: PlayerId,
        out: &mut Outbox,
    ) {
        let old_leader = self.transfer_leadership(game, room_id, successor);
        out.push((
            Scope::Room(room_id),
            GameEvent::LeaderAbdicated {
                room: room_id,
                old_leader: old_leader.unwrap_or(successor),
                new_leader: successor,
            },
        ));
    }

    /// Toggle a hostage candidate for the room's leader.
    pub fn select_hostage(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        target: PlayerId,
        out: &mut Outbox,
    ) -> Result<(), RoundFlowError> {
        let required = hostage_quota(game.player_count(), game.current_round);
        let room = game.rooms.get_mut(room_id);

        let selected = if let Some(idx) = room.hostage_candidates.iter().position(|c| *c == target)
        {
            room.hostage_candidates.swap_remove(idx);
            false
        } else {
            if room.hostage_candidates.len() >= required {
                return Err(RoundFlowError::HostageLimitReached { required });
            }
            room.hostage_candidates.push(target);
            true
        };

        out.push((
            Scope::Room(room_id),
            GameEvent::HostageSelected {
                room: room_id,
                target,
                selected,
                count: room.hostage_candidates.len(),
                required,
            },
        ));
        Ok(())
    }

    /// Lock the room's hostage selection; starts the parlay once both rooms
    /// are locked.
    pub fn lock_hostages(
        &mut self,
        game: &mut Game,
        room_id: RoomId,
        out: &mut Outbox,
    ) -> Result<(), RoundFlowError> {
        let required = hostage_quota(game.player_count(), game.current_round);
        let room = game.rooms.get_mut(room_id);
        let current = room.hostage_candidates.len();
        if current != required {
            return Err(RoundFlowError::HostageCountShort { current, required });
        }
        room.hostages_locked = true;
        out.push((Scope::Room(room_id), GameEvent::HostagesLocked { room: room_id }));

        if game.rooms.a.hostages_locked && game.rooms.b.hostages_locked {
            self.start_parlay(game, out);
        }
        Ok(())
    }

    fn start_parlay(&mut self, game: &mut Game, out: &mut Outbox) {
        let (Some(leader_a), Some(leader_b)) = (game.rooms.a.leader, game.rooms.b.leader) else {
            warn!("game {}: parlay requested without two leaders", game.code);
            return;
        };
        if let Some(timer) = self.round_timer.as_mut() {
            timer.stop();
        }
        game.parlay_active = true;
        self.parlay_timer = Some(GameTimer::running(PARLAY_DURATION));
        info!("game {} parlay started", game.code);
        out.push((
            Scope::Public,
            GameEvent::ParlayStarted { leader_a, leader_b },
        ));
    }

    /// Perform the hostage exchange at parlay expiry. The caller must end
    /// the round afterwards.
    pub fn complete_exchange(&mut self, game: &mut Game, out: &mut Outbox) -> ExchangeSummary {
        self.parlay_timer = None;
        game.parlay_active = false;
        out.push((Scope::Public, GameEvent::ParlayEnded));

        let from_a = std::mem::take(&mut game.rooms.a.hostage_candidates);
        let from_b = std::mem::take(&mut game.rooms.b.hostage_candidates);

        game.rooms.a.members.retain(|m| !from_a.contains(m));
        game.rooms.b.members.retain(|m| !from_b.contains(m));
        for hostage in &from_a {
            game.rooms.b.members.push(*hostage);
            if let Some(player) = game.players.get_mut(hostage) {
                player.current_room = Some(RoomId::B);
                player.was_sent_as_hostage = true;
            }
        }
        for hostage in &from_b {
            game.rooms.a.members.push(*hostage);
            if let Some(player) = game.players.get_mut(hostage) {
                player.current_room = Some(RoomId::A);
                player.was_sent_as_hostage = true;
            }
        }

        game.rooms.a.hostages_locked = false;
        game.rooms.b.hostages_locked = false;
        game.rooms.a.parlay_complete = true;
        game.rooms.b.parlay_complete = true;
        game.paused = false;
        game.pause_reason = None;

        info!(
            "game {} exchanged {} + {} hostages",
            game.code,
            from_a.len(),
            from_b.len()
        );
        out.push((
            Scope::Public,
            GameEvent::HostagesExchanged {
                from_a: from_a.clone(),
                from_b: from_b.clone(),
            },
        ));
        ExchangeSummary { from_a, from_b }
    }

    /// Cut the round short: clear any pending hostage selection and stop
    /// both timers so the round can end without an exchange.
    pub fn abort_round(&mut self, game: &mut Game) {
        self.parlay_timer = None;
        if let Some(timer) = self.round_timer.as_mut() {
            timer.stop();
        }
        game.parlay_active = false;
        game.paused = false;
        game.pause_reason = None;
        game.rooms.a.hostage_candidates.clear();
        game.rooms.b.hostage_candidates.clear();
        game.rooms.a.hostages_locked = false;
        game.rooms.b.hostages_locked = false;
    }

    /// Drive the timers from the actor's tick. Returns the exchange summary
    /// when the parlay expired and the exchange ran, meaning the round must
    /// end.
    ///
    /// Expiry handling is state-guarded: a stopped or already-handled timer
    /// observes nothing to do, so duplicate or late ticks are no-ops.
    pub fn poll(&mut self, game: &mut Game, out: &mut Outbox) -> Option<ExchangeSummary> {
        if self.parlay_timer.as_ref().is_some_and(GameTimer::is_expired) {
            return Some(self.complete_exchange(game, out));
        }

        let Some(timer) = self.round_timer.as_mut() else {
            return None;
        };
        if timer.is_expired() {
            timer.stop();
            game.paused = true;
            game.pause_reason = Some(PAUSE_HOSTAGE_SELECTION.to_string());
            info!("game {} round {} timer expired", game.code, game.current_round);
            out.push((
                Scope::Public,
                GameEvent::GamePaused {
                    reason: PAUSE_HOSTAGE_SELECTION.to_string(),
                },
            ));
            return None;
        }

        if timer.is_running() {
            let remaining_secs = timer.remaining().as_secs();
            if self.last_broadcast_secs != Some(remaining_secs) {
                self.last_broadcast_secs = Some(remaining_secs);
                out.push((
                    Scope::Public,
                    GameEvent::TimerUpdate {
                        remaining_secs,
                        state: TimerState::Running,
                    },
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Game;

    fn game_in_round(members_per_room: usize, round: u8) -> (Game, RoundEngine, Outbox) {
        let mut game = Game::new("ABCDEF".to_string(), "host", [0; 32]);
        for i in 1..members_per_room * 2 {
            game.add_player(&format!("p{i}"));
        }
        let ids = game.join_order.clone();
        for (i, id) in ids.iter().enumerate() {
            let room = if i < members_per_room { RoomId::A } else { RoomId::B };
            game.rooms.get_mut(room).members.push(*id);
            if let Some(p) = game.players.get_mut(id) {
                p.current_room = Some(room);
            }
        }
        game.phase = crate::game::phase::Phase::Round(round);
        let mut engine = RoundEngine::new();
        let mut out = Outbox::new();
        engine.begin_round(&mut game, round, &mut out);
        (game, engine, out)
    }

    #[test]
    fn quota_table_by_game_size_and_round() {
        for round in 1..=5u8 {
            assert_eq!(hostage_quota(6, round), 1);
            assert_eq!(hostage_quota(10, round), 1);
        }
        assert_eq!(hostage_quota(11, 1), 2);
        assert_eq!(hostage_quota(11, 2), 1);
        assert_eq!(hostage_quota(21, 1), 2);
        assert_eq!(hostage_quota(22, 1), 3);
        assert_eq!(hostage_quota(22, 2), 2);
        assert_eq!(hostage_quota(22, 3), 1);
        assert_eq!(hostage_quota(30, 4), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unanimous_vote_elects_majority_leader() {
        let (mut game, mut engine, _) = game_in_round(3, 1);
        let members = game.rooms.a.members.clone();
        let mut out = Outbox::new();

        for voter in &members[..2] {
            let progress = engine
                .cast_leader_vote(&mut game, RoomId::A, *voter, members[0], &mut out)
                .unwrap();
            assert_eq!(progress, VoteProgress::Pending);
        }
        let progress = engine
            .cast_leader_vote(&mut game, RoomId::A, members[2], members[0], &mut out)
            .unwrap();
        assert_eq!(progress, VoteProgress::Elected(members[0]));

        assert_eq!(game.rooms.a.leader, Some(members[0]));
        let leader = game.players.get(&members[0]).unwrap();
        assert!(leader.is_leader);
        assert!(!leader.can_be_hostage);
        assert!(!game.rooms.a.leader_voting_active);
        assert!(out.iter().any(|(scope, e)| matches!(
            (scope, e),
            (
                Scope::Room(RoomId::A),
                GameEvent::LeaderElected {
                    method: ElectionMethod::Majority,
                    ..
                }
            )
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn round_one_timer_ignites_when_both_rooms_elect() {
        let (mut game, mut engine, _) = game_in_round(3, 1);
        assert_eq!(engine.timer_view().state, TimerState::Paused);

        let mut out = Outbox::new();
        let a = game.rooms.a.members.clone();
        for voter in &a {
            let _ = engine.cast_leader_vote(&mut game, RoomId::A, *voter, a[0], &mut out);
        }
        // One room elected: still waiting.
        assert_eq!(engine.timer_view().state, TimerState::Paused);

        let b = game.rooms.b.members.clone();
        for voter in &b {
            let _ = engine.cast_leader_vote(&mut game, RoomId::B, *voter, b[0], &mut out);
        }
        assert_eq!(engine.timer_view().state, TimerState::Running);
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            GameEvent::GameResumed { reason } if reason == RESUME_BOTH_LEADERS
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn third_tie_elects_randomly() {
        let (mut game, mut engine, _) = game_in_round(2, 1);
        let members = game.rooms.a.members.clone();
        let mut elected = None;

        for attempt in 1..=3u8 {
            let mut out = Outbox::new();
            let _ = engine.cast_leader_vote(&mut game, RoomId::A, members[0], members[0], &mut out);
            let result =
                engine.cast_leader_vote(&mut game, RoomId::A, members[1], members[1], &mut out);
            if attempt < 3 {
                assert_eq!(
                    result,
                    Err(RoundFlowError::VoteTied {
                        tie_count: attempt,
                        tied: members.clone(),
                    })
                );
                assert!(game.rooms.a.leader_votes.is_empty());
                assert!(game.rooms.a.leader_voting_active);
            } else {
                match result {
                    Ok(VoteProgress::Elected(winner)) => {
                        assert!(members.contains(&winner));
                        elected = Some(winner);
                    }
                    other => panic!("expected random election, got {other:?}"),
                }
                let random_pick = out.iter().any(|(_, e)| {
                    matches!(
                        e,
                        GameEvent::LeaderElected {
                            method: ElectionMethod::RandomSelection,
                            tie_count: 3,
                            ..
                        }
                    )
                });
                assert!(random_pick);
            }
        }
        assert_eq!(game.rooms.a.leader, elected);
    }

    #[tokio::test(start_paused = true)]
    async fn usurpation_needs_strict_majority() {
        let (mut game, mut engine, _) = game_in_round(3, 2);
        let members = game.rooms.a.members.clone();
        let mut out = Outbox::new();
        // Seat a leader first.
        engine.abdicate(&mut game, RoomId::A, members[0], &mut out);
        game.players.get_mut(&members[0]).unwrap().is_leader = true;

        assert!(!engine.vote_usurp(&mut game, RoomId::A, members[1], members[1], &mut out));
        assert_eq!(game.rooms.a.leader, Some(members[0]));

        assert!(engine.vote_usurp(&mut game, RoomId::A, members[2], members[1], &mut out));
        assert_eq!(game.rooms.a.leader, Some(members[1]));
        assert_eq!(game.players.get(&members[1]).unwrap().usurped_leaders, 1);
        assert_eq!(game.private.usurpations.get(&2).map(Vec::len), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn hostage_toggle_and_limit() {
        let (mut game, mut engine, _) = game_in_round(3, 1);
        game.current_round = 1;
        let members = game.rooms.a.members.clone();
        let mut out = Outbox::new();

        engine
            .select_hostage(&mut game, RoomId::A, members[1], &mut out)
            .unwrap();
        assert_eq!(
            engine.select_hostage(&mut game, RoomId::A, members[2], &mut out),
            Err(RoundFlowError::HostageLimitReached { required: 1 })
        );
        // Toggling the selected player off frees the slot.
        engine
            .select_hostage(&mut game, RoomId::A, members[1], &mut out)
            .unwrap();
        assert!(game.rooms.a.hostage_candidates.is_empty());
        engine
            .select_hostage(&mut game, RoomId::A, members[2], &mut out)
            .unwrap();
        assert_eq!(game.rooms.a.hostage_candidates, vec![members[2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_swaps_rooms_and_clears_state() {
        let (mut game, mut engine, _) = game_in_round(3, 1);
        let a_hostage = game.rooms.a.members[1];
        let b_hostage = game.rooms.b.members[2];
        let mut out = Outbox::new();
        let a_member = game.rooms.a.members[0];
        let b_member = game.rooms.b.members[0];
        engine.abdicate(&mut game, RoomId::A, a_member, &mut out);
        engine.abdicate(&mut game, RoomId::B, b_member, &mut out);

        engine
            .select_hostage(&mut game, RoomId::A, a_hostage, &mut out)
            .unwrap();
        engine
            .select_hostage(&mut game, RoomId::B, b_hostage, &mut out)
            .unwrap();
        engine.lock_hostages(&mut game, RoomId::A, &mut out).unwrap();
        engine.lock_hostages(&mut game, RoomId::B, &mut out).unwrap();
        assert!(game.parlay_active);

        engine.complete_exchange(&mut game, &mut out);
        assert!(!game.parlay_active);
        assert!(game.rooms.b.contains(a_hostage));
        assert!(game.rooms.a.contains(b_hostage));
        assert_eq!(game.room_of(a_hostage), Some(RoomId::B));
        assert!(game.players.get(&a_hostage).unwrap().was_sent_as_hostage);
        assert!(!game.rooms.a.hostages_locked);
        assert!(game.rooms.a.hostage_candidates.is_empty());
        assert_eq!(game.rooms.size_skew(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_pauses_game_at_round_expiry_once() {
        let (mut game, mut engine, _) = game_in_round(3, 2);
        let mut out = Outbox::new();
        tokio::time::advance(game.config.round_duration(2)).await;

        assert!(engine.poll(&mut game, &mut out).is_none());
        assert!(game.paused);
        let pauses = out
            .iter()
            .filter(|(_, e)| matches!(e, GameEvent::GamePaused { .. }))
            .count();
        assert_eq!(pauses, 1);

        // A second poll observes the stopped timer and does nothing.
        let mut out2 = Outbox::new();
        assert!(engine.poll(&mut game, &mut out2).is_none());
        assert!(out2.is_empty());
    }
}
