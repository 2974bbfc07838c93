//! The per-game actor: the single writer for one live game.
//!
//! Every mutation (external command, timer expiry, ability effect) runs
//! on this actor's task, so game state needs no further locking. Commands
//! are short and non-blocking; long waits live in the timers polled by the
//! 100 ms tick.

use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use rand::RngCore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::abilities::{AbilityEngine, EffectApplication, TriggerPoint};
use crate::catalog::{Catalog, CharacterDefinition, CharacterId};
use crate::game::command::{Command, CommandKind};
use crate::game::constants::TICK_INTERVAL;
use crate::game::entities::{
    CardShareRecord, ConnectionStatus, Game, GameId, Knowledge, KnownInformation, PlayerId,
    PlayerPrivateView, PublicSnapshot, RoomId, RoomSnapshot, ShareKind, SyncSnapshot,
};
use crate::game::phase::{transition, Phase, Trigger};
use crate::game::validator::{validate, ValidationError};
use crate::journal::events::RoundEndReason;
use crate::journal::{Audience, EventBus, EventJournal, EventRecord, GameEvent, Scope,
    SUBSCRIBER_BUFFER};
use crate::round::{Outbox, RoundEngine};

use super::messages::{CommandError, CommandOutcome, GameMessage, GameStatus, JoinedGame};

/// Cloneable address of a game actor.
#[derive(Clone, Debug)]
pub struct GameHandle {
    sender: mpsc::Sender<GameMessage>,
    game_id: GameId,
    code: String,
}

impl GameHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, message: GameMessage) -> Result<(), CommandError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| CommandError::GameClosed)
    }

    /// Submit one in-game command and wait for its outcome.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, CommandError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::Execute {
            command,
            response: tx,
        })
        .await?;
        rx.await.map_err(|_| CommandError::GameClosed)?
    }

    pub async fn join(&self, name: &str) -> Result<JoinedGame, CommandError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::Join {
            name: name.to_string(),
            response: tx,
        })
        .await?;
        rx.await.map_err(|_| CommandError::GameClosed)?
    }

    /// Attach an event subscription, replaying everything past `acked`.
    pub async fn subscribe(
        &self,
        player_id: PlayerId,
        acked: u64,
    ) -> Result<mpsc::Receiver<EventRecord>, CommandError> {
        let (event_tx, event_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::Subscribe {
            player_id,
            acked,
            sender: event_tx,
            response: tx,
        })
        .await?;
        rx.await.map_err(|_| CommandError::GameClosed)??;
        Ok(event_rx)
    }

    pub async fn unsubscribe(&self, player_id: PlayerId) {
        let _ = self.send(GameMessage::Unsubscribe { player_id }).await;
    }

    pub async fn connection_lost(&self, player_id: PlayerId) {
        let _ = self.send(GameMessage::ConnectionLost { player_id }).await;
    }

    /// Rebind a returning player, replaying missed events first.
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        acked: u64,
    ) -> Result<(JoinedGame, mpsc::Receiver<EventRecord>), CommandError> {
        let (event_tx, event_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::Reconnect {
            player_id,
            acked,
            sender: event_tx,
            response: tx,
        })
        .await?;
        let joined = rx.await.map_err(|_| CommandError::GameClosed)??;
        Ok((joined, event_rx))
    }

    pub async fn status(&self) -> Result<GameStatus, CommandError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::Status { response: tx }).await?;
        rx.await.map_err(|_| CommandError::GameClosed)
    }

    pub async fn public_state(&self) -> Result<PublicSnapshot, CommandError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::PublicState { response: tx }).await?;
        rx.await.map_err(|_| CommandError::GameClosed)
    }

    pub async fn room_state(&self, player_id: PlayerId) -> Result<RoomSnapshot, CommandError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::RoomState {
            player_id,
            response: tx,
        })
        .await?;
        rx.await.map_err(|_| CommandError::GameClosed)?
    }

    pub async fn private_view(
        &self,
        player_id: PlayerId,
    ) -> Result<PlayerPrivateView, CommandError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameMessage::PrivateView {
            player_id,
            response: tx,
        })
        .await?;
        rx.await.map_err(|_| CommandError::GameClosed)?
    }

    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(GameMessage::Close { response: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

pub struct GameActor {
    game: Game,
    catalog: Arc<Catalog>,
    abilities: Arc<dyn AbilityEngine>,
    journal: EventJournal,
    bus: EventBus,
    engine: RoundEngine,
    inbox: mpsc::Receiver<GameMessage>,
    closed: bool,
    ending_round: bool,
}

impl GameActor {
    /// Build the actor with its host already joined and `GAME_CREATED`
    /// journaled. The caller spawns `run`.
    pub fn new(
        code: String,
        host_name: &str,
        catalog: Arc<Catalog>,
        abilities: Arc<dyn AbilityEngine>,
    ) -> (Self, GameHandle, JoinedGame) {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);

        let game = Game::new(code.clone(), host_name, seed);
        let (sender, inbox) = mpsc::channel(64);
        let handle = GameHandle {
            sender,
            game_id: game.id,
            code,
        };

        let host_id = game.host_id();
        let host_info = game.players.get(&host_id).map(|p| p.public_info());
        let host_token = game
            .players
            .get(&host_id)
            .and_then(|p| p.connection_token)
            .unwrap_or_else(Uuid::new_v4);
        let joined = JoinedGame {
            game_id: game.id,
            code: game.code.clone(),
            player_id: host_id,
            connection_token: host_token,
        };

        let mut actor = Self {
            game,
            catalog,
            abilities,
            journal: EventJournal::default(),
            bus: EventBus::default(),
            engine: RoundEngine::new(),
            inbox,
            closed: false,
            ending_round: false,
        };
        if let Some(host) = host_info {
            actor.publish(
                Scope::Public,
                GameEvent::GameCreated {
                    code: actor.game.code.clone(),
                    host,
                },
            );
        }
        actor.game.touch();

        (actor, handle, joined)
    }

    /// Actor event loop: inbox messages interleaved with the engine tick.
    pub async fn run(mut self) {
        info!("game {} actor started", self.game.code);
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = self.inbox.recv() => match maybe {
                    Some(message) => {
                        self.handle_message(message);
                        if self.closed {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tick.tick() => self.on_tick(),
            }
        }
        info!("game {} actor stopped", self.game.code);
    }

    fn handle_message(&mut self, message: GameMessage) {
        match message {
            GameMessage::Execute { command, response } => {
                let result = self.execute(command);
                let _ = response.send(result);
            }
            GameMessage::Join { name, response } => {
                let result = self.handle_join(&name);
                let _ = response.send(result);
            }
            GameMessage::Subscribe {
                player_id,
                acked,
                sender,
                response,
            } => {
                let result = self.handle_subscribe(player_id, acked, sender);
                let _ = response.send(result);
            }
            GameMessage::Unsubscribe { player_id } => {
                self.bus.unsubscribe(player_id);
            }
            GameMessage::ConnectionLost { player_id } => {
                self.handle_connection_lost(player_id);
            }
            GameMessage::Reconnect {
                player_id,
                acked,
                sender,
                response,
            } => {
                let result = self.handle_reconnect(player_id, acked, sender);
                let _ = response.send(result);
            }
            GameMessage::Status { response } => {
                let _ = response.send(self.status());
            }
            GameMessage::PublicState { response } => {
                let _ = response.send(self.game.public_snapshot(self.engine.timer_view()));
            }
            GameMessage::RoomState {
                player_id,
                response,
            } => {
                let result = if !self.game.players.contains_key(&player_id) {
                    Err(CommandError::UnknownPlayer)
                } else {
                    self.game
                        .room_of(player_id)
                        .map(|room| self.game.rooms.get(room).snapshot(room))
                        .ok_or_else(|| {
                            CommandError::Internal("player is not in a room yet".to_string())
                        })
                };
                let _ = response.send(result);
            }
            GameMessage::PrivateView {
                player_id,
                response,
            } => {
                let result = self
                    .game
                    .players
                    .get(&player_id)
                    .map(|p| p.private_view())
                    .ok_or(CommandError::UnknownPlayer);
                let _ = response.send(result);
            }
            GameMessage::Close { response } => {
                self.closed = true;
                let _ = response.send(());
            }
        }
    }

    fn status(&self) -> GameStatus {
        GameStatus {
            id: self.game.id,
            code: self.game.code.clone(),
            phase: self.game.phase,
            player_count: self.game.player_count(),
            version: self.game.version,
            updated_at: self.game.updated_at,
        }
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Append to the journal with the audience resolved now, then fan out.
    fn publish(&mut self, scope: Scope, event: GameEvent) {
        let audience = match scope {
            Scope::Public => Audience::Everyone,
            Scope::Room(room) => Audience::Players(self.game.rooms.get(room).members.clone()),
            Scope::Player(player_id) => Audience::Players(vec![player_id]),
        };
        let record = self.journal.append(scope, event, audience);
        self.bus.deliver(&record);
    }

    fn flush(&mut self, out: Outbox) {
        for (scope, event) in out {
            self.publish(scope, event);
        }
    }

    // ------------------------------------------------------------------
    // Command execution
    // ------------------------------------------------------------------

    /// Validator gate, mutation, publication, single version bump.
    fn execute(&mut self, command: Command) -> Result<CommandOutcome, CommandError> {
        let report = validate(&self.catalog, &self.game, &command);
        if !report.is_accepted() {
            debug!(
                "game {}: {} rejected ({} errors)",
                self.game.code,
                command.kind.type_name(),
                report.errors().len()
            );
            return Err(CommandError::Rejected(report.errors()));
        }
        let warnings = report.warnings();

        let result = self.apply(command);
        self.game.touch();
        result.map(|()| CommandOutcome { warnings })
    }

    fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        let player_id = command.player_id;
        match command.kind {
            CommandKind::LeaveGame => self.handle_leave(player_id),
            CommandKind::LockRoom => {
                self.apply_transition(Trigger::LockRoom)?;
                self.publish(Scope::Public, GameEvent::RoomLocked);
                Ok(())
            }
            CommandKind::UnlockRoom => {
                self.apply_transition(Trigger::UnlockRoom)?;
                self.publish(Scope::Public, GameEvent::RoomUnlocked);
                Ok(())
            }
            CommandKind::StartRoleSelection => self.apply_transition(Trigger::StartRoleSelection),
            CommandKind::CancelRoleSelection => {
                self.apply_transition(Trigger::CancelRoleSelection)
            }
            CommandKind::SelectRoles { roles } => {
                // Bury is driven by the deck size: one card over the
                // player count means one card goes under.
                let player_count = self.game.player_count();
                let was_buried = self.game.config.bury_card;
                if roles.len() == player_count + 1 {
                    self.game.config.bury_card = true;
                } else if roles.len() == player_count {
                    self.game.config.bury_card = false;
                }
                self.game.config.selected_roles = roles.clone();
                self.publish(Scope::Public, GameEvent::RolesSelected { roles });
                if self.game.config.bury_card != was_buried {
                    let total_rounds = self.game.config.total_rounds;
                    let round_duration_secs: Vec<u64> = self
                        .game
                        .config
                        .round_durations
                        .iter()
                        .map(|d| d.as_secs())
                        .collect();
                    let bury_card = self.game.config.bury_card;
                    self.publish(
                        Scope::Public,
                        GameEvent::GameConfigUpdated {
                            total_rounds,
                            round_duration_secs,
                            bury_card,
                        },
                    );
                }
                Ok(())
            }
            CommandKind::SetRounds { total_rounds } => {
                let config = &mut self.game.config;
                config.total_rounds = total_rounds;
                config.round_durations =
                    crate::game::entities::GameConfig::default_durations(total_rounds);
                let round_duration_secs =
                    config.round_durations.iter().map(|d| d.as_secs()).collect();
                let bury_card = config.bury_card;
                self.publish(
                    Scope::Public,
                    GameEvent::GameConfigUpdated {
                        total_rounds,
                        round_duration_secs,
                        bury_card,
                    },
                );
                Ok(())
            }
            CommandKind::ConfirmRoles => self.handle_confirm_roles(),
            CommandKind::StartGame => {
                self.apply_transition(Trigger::StartGame)?;
                let mut out = Outbox::new();
                self.engine.begin_round(&mut self.game, 1, &mut out);
                self.flush(out);
                self.run_ability_trigger(TriggerPoint::RoundStart { round: 1 });
                Ok(())
            }
            CommandKind::NominateLeader { room, candidate } => {
                let mut out = Outbox::new();
                let result =
                    self.engine
                        .cast_leader_vote(&mut self.game, room, player_id, candidate, &mut out);
                self.flush(out);
                match result {
                    Ok(crate::round::VoteProgress::Elected(leader)) => {
                        self.run_ability_trigger(TriggerPoint::BecameLeader { player: leader });
                        Ok(())
                    }
                    Ok(crate::round::VoteProgress::Pending) => Ok(()),
                    Err(err) => Err(CommandError::Rejected(vec![
                        ValidationError::from_round_flow(&err),
                    ])),
                }
            }
            CommandKind::InitiateNewLeaderVote { room } => {
                let mut out = Outbox::new();
                self.engine
                    .initiate_revote(&mut self.game, room, player_id, &mut out);
                self.flush(out);
                Ok(())
            }
            CommandKind::VoteUsurp { room, candidate } => {
                let mut out = Outbox::new();
                let usurped =
                    self.engine
                        .vote_usurp(&mut self.game, room, player_id, candidate, &mut out);
                self.flush(out);
                if usurped {
                    self.run_ability_trigger(TriggerPoint::BecameLeader { player: candidate });
                }
                Ok(())
            }
            CommandKind::Abdicate { room, successor } => {
                let mut out = Outbox::new();
                self.engine
                    .abdicate(&mut self.game, room, successor, &mut out);
                self.flush(out);
                self.run_ability_trigger(TriggerPoint::BecameLeader { player: successor });
                Ok(())
            }
            CommandKind::SelectHostage { room, target } => {
                let mut out = Outbox::new();
                let result = self
                    .engine
                    .select_hostage(&mut self.game, room, target, &mut out);
                self.flush(out);
                result.map_err(|err| {
                    CommandError::Rejected(vec![ValidationError::from_round_flow(&err)])
                })
            }
            CommandKind::LockHostages { room } => {
                let mut out = Outbox::new();
                let result = self.engine.lock_hostages(&mut self.game, room, &mut out);
                self.flush(out);
                result.map_err(|err| {
                    CommandError::Rejected(vec![ValidationError::from_round_flow(&err)])
                })
            }
            CommandKind::CardShare { target } => {
                self.handle_share(player_id, Some(target), ShareKind::Card)
            }
            CommandKind::ColorShare { target } => {
                self.handle_share(player_id, Some(target), ShareKind::Color)
            }
            CommandKind::PrivateReveal { target } => {
                self.handle_share(player_id, Some(target), ShareKind::PrivateReveal)
            }
            CommandKind::PublicReveal => {
                self.handle_share(player_id, None, ShareKind::PublicReveal)
            }
            CommandKind::ActivateAbility { ability, targets } => {
                debug!(
                    "game {}: {player_id} activates `{ability}`",
                    self.game.code
                );
                self.run_ability_trigger(TriggerPoint::ManualActivation {
                    player: player_id,
                    targets_len: targets.len(),
                });
                Ok(())
            }
        }
    }

    /// Ask the state machine for the next phase and publish the change.
    fn apply_transition(&mut self, trigger: Trigger) -> Result<(), CommandError> {
        let from = self.game.phase;
        let to = transition(&self.game, trigger).map_err(|denied| {
            CommandError::Rejected(vec![ValidationError::error(
                crate::game::validator::ErrorCode::InvalidState,
                denied.to_string(),
            )])
        })?;
        self.game.phase = to;
        self.publish(Scope::Public, GameEvent::PhaseChanged { from, to, trigger });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lobby
    // ------------------------------------------------------------------

    fn handle_join(&mut self, name: &str) -> Result<JoinedGame, CommandError> {
        if self.game.phase != Phase::Lobby {
            return Err(CommandError::Rejected(vec![ValidationError::error(
                crate::game::validator::ErrorCode::InvalidState,
                "the game is no longer accepting players",
            )]));
        }
        if self.game.is_full() {
            return Err(CommandError::Rejected(vec![ValidationError::error(
                crate::game::validator::ErrorCode::TooManyPlayers,
                "the game is full",
            )]));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::Rejected(vec![ValidationError::error(
                crate::game::validator::ErrorCode::MissingTarget,
                "a player needs a name",
            )]));
        }

        let player_id = self.game.add_player(name);
        let player = self
            .game
            .players
            .get(&player_id)
            .cloned()
            .ok_or_else(|| CommandError::Internal("player vanished on join".to_string()))?;
        info!("game {}: {} joined", self.game.code, player.name);
        self.publish(
            Scope::Public,
            GameEvent::PlayerJoined {
                player: player.public_info(),
            },
        );
        self.game.touch();
        Ok(JoinedGame {
            game_id: self.game.id,
            code: self.game.code.clone(),
            player_id,
            connection_token: player.connection_token.unwrap_or_else(Uuid::new_v4),
        })
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), CommandError> {
        if self.game.phase == Phase::Lobby {
            let was_host = self.game.is_host(player_id);
            if self.game.remove_player(player_id).is_none() {
                return Err(CommandError::UnknownPlayer);
            }
            self.bus.unsubscribe(player_id);
            self.publish(Scope::Public, GameEvent::PlayerLeft { player_id });

            if self.game.players.is_empty() {
                info!("game {}: lobby emptied, closing", self.game.code);
                self.closed = true;
            } else if was_host {
                // Earliest remaining player inherits the lobby.
                if let Some(next_host) = self.game.join_order.first().copied() {
                    self.game.private.host = next_host;
                    if let Some(player) = self.game.players.get_mut(&next_host) {
                        player.is_host = true;
                    }
                }
            }
            return Ok(());
        }

        // Players persist once the game has started; leaving just drops
        // the connection.
        self.publish(Scope::Public, GameEvent::PlayerLeft { player_id });
        self.handle_connection_lost(player_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Role distribution and room assignment
    // ------------------------------------------------------------------

    fn handle_confirm_roles(&mut self) -> Result<(), CommandError> {
        self.apply_transition(Trigger::ConfirmRoles)?;
        self.distribute_roles()?;
        self.apply_transition(Trigger::RolesDistributed)?;
        self.assign_rooms();
        Ok(())
    }

    /// Fisher-Yates shuffle of the configured deck, then one secret,
    /// player-scoped assignment per player.
    fn distribute_roles(&mut self) -> Result<(), CommandError> {
        let mut deck: Vec<CharacterId> = self.game.config.selected_roles.clone();
        let mut rng = rand::rng();
        deck.shuffle(&mut rng);

        self.game.private.deck = deck.clone();
        if self.game.config.bury_card && deck.len() > self.game.player_count() {
            self.game.private.buried_card = deck.pop();
        }
        if deck.len() != self.game.player_count() {
            return Err(CommandError::Internal(format!(
                "deck of {} cannot cover {} players",
                deck.len(),
                self.game.player_count()
            )));
        }

        // Resolve every definition before mutating anything, so a bad deck
        // aborts without publishing a single assignment.
        let order = self.game.join_order.clone();
        let mut assignments: Vec<(PlayerId, CharacterDefinition)> = Vec::with_capacity(order.len());
        for (player_id, role) in order.iter().zip(deck.iter()) {
            let def = self
                .catalog
                .get(role)
                .cloned()
                .ok_or_else(|| CommandError::Internal(format!("unknown character `{role}`")))?;
            assignments.push((*player_id, def));
        }

        for (player_id, def) in assignments {
            if let Some(player) = self.game.players.get_mut(&player_id) {
                player.current_role = Some(def.id.clone());
                player.original_role = Some(def.id.clone());
            }
            self.game
                .private
                .role_assignments
                .insert(player_id, def.id.clone());
            self.publish(
                Scope::Player(player_id),
                GameEvent::RoleAssigned {
                    player_id,
                    character: def.id.clone(),
                    name: def.name.clone(),
                    description: def.description.clone(),
                    team: def.team,
                },
            );
        }
        info!(
            "game {}: {} roles distributed{}",
            self.game.code,
            self.game.private.role_assignments.len(),
            if self.game.private.buried_card.is_some() {
                ", one buried"
            } else {
                ""
            }
        );
        Ok(())
    }

    /// Shuffle the roster and split it down the middle into the two rooms.
    fn assign_rooms(&mut self) {
        let mut order = self.game.join_order.clone();
        order.shuffle(&mut rand::rng());
        let mid = order.len() / 2;

        self.game.rooms.a.members = order[..mid].to_vec();
        self.game.rooms.b.members = order[mid..].to_vec();
        for (idx, player_id) in order.iter().enumerate() {
            let room = if idx < mid { RoomId::A } else { RoomId::B };
            if let Some(player) = self.game.players.get_mut(player_id) {
                player.current_room = Some(room);
            }
        }

        self.publish(
            Scope::Public,
            GameEvent::RoomsAssigned {
                assignments: self.game.room_assignments(),
            },
        );
    }

    // ------------------------------------------------------------------
    // Shares and reveals
    // ------------------------------------------------------------------

    fn role_and_team(
        &self,
        player_id: PlayerId,
    ) -> Result<(CharacterId, crate::catalog::Team), CommandError> {
        let role = self
            .game
            .players
            .get(&player_id)
            .and_then(|p| p.current_role.clone())
            .ok_or_else(|| CommandError::Internal("player has no role".to_string()))?;
        let team = self
            .catalog
            .get(&role)
            .map(|def| def.team)
            .ok_or_else(|| CommandError::Internal(format!("unknown character `{role}`")))?;
        Ok((role, team))
    }

    fn learn(&mut self, learner: PlayerId, about: PlayerId, knowledge: Knowledge) {
        let round = self.game.current_round;
        if let Some(player) = self.game.players.get_mut(&learner) {
            let entry = KnownInformation {
                about,
                learned: knowledge,
                round,
            };
            if !player.known_information.contains(&entry) {
                player.known_information.push(entry);
            }
        }
    }

    fn handle_share(
        &mut self,
        initiator: PlayerId,
        target: Option<PlayerId>,
        kind: ShareKind,
    ) -> Result<(), CommandError> {
        let (initiator_role, initiator_team) = self.role_and_team(initiator)?;

        match (kind, target) {
            (ShareKind::Card, Some(target_id)) => {
                let (target_role, target_team) = self.role_and_team(target_id)?;
                self.learn(
                    initiator,
                    target_id,
                    Knowledge::Character(target_role.clone()),
                );
                self.learn(
                    target_id,
                    initiator,
                    Knowledge::Character(initiator_role.clone()),
                );
                self.publish(
                    Scope::Player(initiator),
                    GameEvent::CardShared {
                        with: target_id,
                        character: target_role,
                        team: target_team,
                    },
                );
                self.publish(
                    Scope::Player(target_id),
                    GameEvent::CardShared {
                        with: initiator,
                        character: initiator_role,
                        team: initiator_team,
                    },
                );
            }
            (ShareKind::Color, Some(target_id)) => {
                let (_, target_team) = self.role_and_team(target_id)?;
                self.learn(initiator, target_id, Knowledge::Team(target_team));
                self.learn(target_id, initiator, Knowledge::Team(initiator_team));
                self.publish(
                    Scope::Player(initiator),
                    GameEvent::ColorShared {
                        with: target_id,
                        team: target_team,
                    },
                );
                self.publish(
                    Scope::Player(target_id),
                    GameEvent::ColorShared {
                        with: initiator,
                        team: initiator_team,
                    },
                );
            }
            (ShareKind::PrivateReveal, Some(target_id)) => {
                self.learn(
                    target_id,
                    initiator,
                    Knowledge::Character(initiator_role.clone()),
                );
                self.publish(
                    Scope::Player(target_id),
                    GameEvent::RoleRevealed {
                        by: initiator,
                        character: initiator_role,
                        team: initiator_team,
                    },
                );
            }
            (ShareKind::PublicReveal, None) => {
                let Some(room) = self.game.room_of(initiator) else {
                    return Err(CommandError::Internal("player is not in a room".to_string()));
                };
                // Colour only on the room scope; the character id itself
                // never leaves the single-player scopes.
                for member in self.game.rooms.get(room).members.clone() {
                    if member != initiator {
                        self.learn(member, initiator, Knowledge::Team(initiator_team));
                    }
                }
                self.publish(
                    Scope::Room(room),
                    GameEvent::TeamRevealed {
                        player_id: initiator,
                        team: initiator_team,
                    },
                );
            }
            _ => {
                return Err(CommandError::Internal(
                    "share command missing its target".to_string(),
                ))
            }
        }

        self.game.private.card_shares.push(CardShareRecord {
            round: self.game.current_round,
            initiator,
            target,
            kind,
        });
        self.run_ability_trigger(TriggerPoint::Share {
            initiator,
            target,
            kind,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    fn handle_subscribe(
        &mut self,
        player_id: PlayerId,
        acked: u64,
        sender: mpsc::Sender<EventRecord>,
    ) -> Result<(), CommandError> {
        if !self.game.players.contains_key(&player_id) {
            return Err(CommandError::UnknownPlayer);
        }
        self.bus.subscribe(player_id, sender);

        if acked > self.journal.head_sequence() {
            warn!(
                "game {}: {player_id} acked {acked} beyond head {}",
                self.game.code,
                self.journal.head_sequence()
            );
            self.publish(
                Scope::Player(player_id),
                GameEvent::DesyncDetected {
                    journal_head: self.journal.head_sequence(),
                    acked,
                },
            );
        } else {
            let backlog = self.journal.entries_after(acked, player_id);
            self.bus.replay(player_id, backlog);
        }
        if let Some(player) = self.game.players.get_mut(&player_id) {
            player.acked_sequence = acked.min(self.journal.head_sequence());
        }

        let sync = self.sync_snapshot(player_id)?;
        self.publish(
            Scope::Player(player_id),
            GameEvent::StateSync {
                state: Box::new(sync),
            },
        );
        Ok(())
    }

    fn handle_connection_lost(&mut self, player_id: PlayerId) {
        let Some(player) = self.game.players.get_mut(&player_id) else {
            return;
        };
        if player.connection == ConnectionStatus::Disconnected {
            return;
        }
        player.connection = ConnectionStatus::Disconnected;
        player.last_seen = chrono::Utc::now();
        let name = player.name.clone();
        self.bus.unsubscribe(player_id);

        info!("game {}: {name} disconnected", self.game.code);
        self.publish(Scope::Public, GameEvent::PlayerDisconnected { player_id });
        for room in [RoomId::A, RoomId::B] {
            if self.game.rooms.get(room).leader == Some(player_id) {
                // No auto-demotion; the room may re-vote.
                self.publish(
                    Scope::Room(room),
                    GameEvent::LeaderDisconnected {
                        room,
                        leader: player_id,
                    },
                );
            }
        }
        self.game.touch();
    }

    fn handle_reconnect(
        &mut self,
        player_id: PlayerId,
        acked: u64,
        sender: mpsc::Sender<EventRecord>,
    ) -> Result<JoinedGame, CommandError> {
        let token = Uuid::new_v4();
        {
            let player = self
                .game
                .players
                .get_mut(&player_id)
                .ok_or(CommandError::UnknownPlayer)?;
            player.connection = ConnectionStatus::Connected;
            player.connection_token = Some(token);
            player.last_seen = chrono::Utc::now();
        }

        // Journaled before the subscription attaches, so the returning
        // player sees their own reconnection inside the replayed backlog.
        self.publish(Scope::Public, GameEvent::PlayerReconnected { player_id });
        self.handle_subscribe(player_id, acked, sender)?;
        self.game.touch();

        Ok(JoinedGame {
            game_id: self.game.id,
            code: self.game.code.clone(),
            player_id,
            connection_token: token,
        })
    }

    fn sync_snapshot(&self, player_id: PlayerId) -> Result<SyncSnapshot, CommandError> {
        let player = self
            .game
            .players
            .get(&player_id)
            .ok_or(CommandError::UnknownPlayer)?;
        let room = player
            .current_room
            .map(|room| self.game.rooms.get(room).snapshot(room));
        Ok(SyncSnapshot {
            public: self.game.public_snapshot(self.engine.timer_view()),
            room,
            private: player.private_view(),
        })
    }

    // ------------------------------------------------------------------
    // Round flow driven by the tick
    // ------------------------------------------------------------------

    fn on_tick(&mut self) {
        if !self.game.phase.is_round() {
            return;
        }
        let mut out = Outbox::new();
        let exchange = self.engine.poll(&mut self.game, &mut out);
        let mutated = exchange.is_some()
            || out
                .iter()
                .any(|(_, e)| !matches!(e, GameEvent::TimerUpdate { .. }));
        self.flush(out);

        if let Some(summary) = exchange {
            for hostage in summary.moved() {
                self.run_ability_trigger(TriggerPoint::BecameHostage { player: hostage });
            }
            self.end_round(RoundEndReason::HostagesExchanged);
        }
        if mutated {
            self.game.touch();
        }
    }

    /// Close the current round and advance the machine. Re-entrant calls
    /// (an ability ending the round we are already ending) are ignored.
    fn end_round(&mut self, reason: RoundEndReason) {
        if self.ending_round {
            return;
        }
        self.ending_round = true;
        let round = self.game.current_round;
        self.publish(Scope::Public, GameEvent::RoundEnded { round, reason });
        self.run_ability_trigger(TriggerPoint::RoundEnd { round });

        if self.game.phase.is_round() {
            match transition(&self.game, Trigger::RoundComplete) {
                Ok(Phase::Round(next)) => {
                    let from = self.game.phase;
                    self.game.phase = Phase::Round(next);
                    self.publish(
                        Scope::Public,
                        GameEvent::PhaseChanged {
                            from,
                            to: self.game.phase,
                            trigger: Trigger::RoundComplete,
                        },
                    );
                    let mut out = Outbox::new();
                    self.engine.begin_round(&mut self.game, next, &mut out);
                    self.flush(out);
                    self.run_ability_trigger(TriggerPoint::RoundStart { round: next });
                }
                Ok(Phase::Resolution) => {
                    let from = self.game.phase;
                    self.game.phase = Phase::Resolution;
                    self.publish(
                        Scope::Public,
                        GameEvent::PhaseChanged {
                            from,
                            to: Phase::Resolution,
                            trigger: Trigger::RoundComplete,
                        },
                    );
                    self.resolve();
                }
                Ok(other) => {
                    error!(
                        "game {}: round_complete produced unexpected phase {other}",
                        self.game.code
                    );
                }
                Err(denied) => {
                    // Stale trigger after the game advanced; stay silent.
                    debug!("game {}: round_complete denied: {denied}", self.game.code);
                }
            }
        }
        self.ending_round = false;
    }

    /// RESOLUTION: run the win-condition evaluation and finish the game.
    fn resolve(&mut self) {
        self.run_ability_trigger(TriggerPoint::Resolution);
        if self.game.winning_team.is_none() {
            self.game.winning_team = self.abilities.resolve_winner(&self.game, &self.catalog);
        }

        let from = self.game.phase;
        match transition(&self.game, Trigger::WinConditionsResolved) {
            Ok(to) => {
                self.game.phase = to;
                self.publish(
                    Scope::Public,
                    GameEvent::PhaseChanged {
                        from,
                        to,
                        trigger: Trigger::WinConditionsResolved,
                    },
                );
            }
            Err(denied) => {
                error!("game {}: resolution blocked: {denied}", self.game.code);
                return;
            }
        }
        info!(
            "game {} finished, winner {:?}",
            self.game.code, self.game.winning_team
        );
        self.publish(
            Scope::Public,
            GameEvent::GameFinished {
                winning_team: self.game.winning_team,
            },
        );
    }

    // ------------------------------------------------------------------
    // Ability engine
    // ------------------------------------------------------------------

    fn run_ability_trigger(&mut self, trigger: TriggerPoint) {
        let engine = Arc::clone(&self.abilities);
        let effects = engine.evaluate(&self.game, &self.catalog, &trigger);
        if !effects.is_empty() {
            debug!(
                "game {}: {} ability effect(s) for {trigger:?}",
                self.game.code,
                effects.len()
            );
            self.apply_effects(effects);
        }
    }

    /// Apply engine effects in their returned order, each publishing its
    /// own scoped event.
    fn apply_effects(&mut self, effects: Vec<EffectApplication>) {
        for effect in effects {
            match effect {
                EffectApplication::ApplyCondition { player, condition } => {
                    let round = self.game.current_round;
                    if let Some(p) = self.game.players.get_mut(&player) {
                        if !p.conditions.iter().any(|c| c.name == condition) {
                            p.conditions.push(crate::game::entities::Condition {
                                name: condition.clone(),
                                round,
                            });
                        }
                    }
                    self.publish(
                        Scope::Player(player),
                        GameEvent::ConditionApplied {
                            player_id: player,
                            condition,
                        },
                    );
                }
                EffectApplication::RemoveCondition { player, condition } => {
                    if let Some(p) = self.game.players.get_mut(&player) {
                        p.conditions.retain(|c| c.name != condition);
                    }
                    self.publish(
                        Scope::Player(player),
                        GameEvent::ConditionRemoved {
                            player_id: player,
                            condition,
                        },
                    );
                }
                EffectApplication::ForceReveal { player } => {
                    if let Ok((_, team)) = self.role_and_team(player) {
                        if let Some(room) = self.game.room_of(player) {
                            self.publish(
                                Scope::Room(room),
                                GameEvent::TeamRevealed {
                                    player_id: player,
                                    team,
                                },
                            );
                        }
                    }
                }
                EffectApplication::SwapCard { first, second } => {
                    self.swap_cards(first, second);
                }
                EffectApplication::EndRoundEarly => {
                    if self.game.phase.is_round() && !self.ending_round {
                        self.engine.abort_round(&mut self.game);
                        self.end_round(RoundEndReason::EndedEarly);
                    }
                }
                EffectApplication::InstantWin { team } => {
                    self.game.winning_team = Some(team);
                    if self.game.phase.is_round() {
                        let from = self.game.phase;
                        if let Ok(to) = transition(&self.game, Trigger::InstantWin) {
                            self.engine.abort_round(&mut self.game);
                            self.game.phase = to;
                            self.publish(
                                Scope::Public,
                                GameEvent::PhaseChanged {
                                    from,
                                    to,
                                    trigger: Trigger::InstantWin,
                                },
                            );
                            self.resolve();
                        }
                    }
                }
            }
        }
    }

    /// Swap two players' current (not original) cards, re-notifying each
    /// on their own scope.
    fn swap_cards(&mut self, first: PlayerId, second: PlayerId) {
        let first_role = self
            .game
            .players
            .get(&first)
            .and_then(|p| p.current_role.clone());
        let second_role = self
            .game
            .players
            .get(&second)
            .and_then(|p| p.current_role.clone());
        let (Some(first_role), Some(second_role)) = (first_role, second_role) else {
            warn!("game {}: card swap with unassigned player", self.game.code);
            return;
        };

        if let Some(p) = self.game.players.get_mut(&first) {
            p.current_role = Some(second_role.clone());
        }
        if let Some(p) = self.game.players.get_mut(&second) {
            p.current_role = Some(first_role.clone());
        }
        self.game
            .private
            .role_assignments
            .insert(first, second_role.clone());
        self.game
            .private
            .role_assignments
            .insert(second, first_role.clone());

        for (player_id, role) in [(first, second_role), (second, first_role)] {
            if let Some(def) = self.catalog.get(&role) {
                self.publish(
                    Scope::Player(player_id),
                    GameEvent::RoleAssigned {
                        player_id,
                        character: def.id.clone(),
                        name: def.name.clone(),
                        description: def.description.clone(),
                        team: def.team,
                    },
                );
            }
        }
    }
}
