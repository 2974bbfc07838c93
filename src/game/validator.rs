//! Phase-indexed command validation.
//!
//! Every phase contributes its own rule set; a command is accepted only if
//! no rule reports an error-severity finding. Warnings ride along with
//! acceptance and are forwarded to the caller. Rule sets are dispatched
//! over the current phase with `enum_dispatch`.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::catalog::{Catalog, CharacterId, Team};
use crate::round::{hostage_quota, RoundFlowError};

use super::command::{Command, CommandKind};
use super::constants::{MAX_PLAYERS, MIN_PLAYERS};
use super::entities::{Game, Player, RoomId};
use super::phase::Phase;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    InvalidState,
    MissingTarget,
    WrongRoom,
    LimitReached,
    MissingDependency,
    MutuallyExclusive,
    RoleCountMismatch,
    TiedVote,
    InsufficientPlayers,
    TooManyPlayers,
    TeamImbalance,
}

/// One structured finding. Errors block the command; warnings and info do
/// not.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl ValidationError {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            suggestion: None,
            context: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Lift a round-mechanics refusal into the structured error shape.
    pub fn from_round_flow(err: &RoundFlowError) -> Self {
        match err {
            RoundFlowError::VoteTied { tie_count, tied } => {
                Self::error(ErrorCode::TiedVote, err.to_string())
                    .with_suggestion("vote again; the third tie is broken randomly")
                    .with_context(serde_json::json!({
                        "tie_count": tie_count,
                        "tied": tied,
                    }))
            }
            RoundFlowError::HostageLimitReached { required } => {
                Self::error(ErrorCode::LimitReached, err.to_string())
                    .with_suggestion("deselect a hostage before choosing another")
                    .with_context(serde_json::json!({ "required": required }))
            }
            RoundFlowError::HostageCountShort { current, required } => {
                Self::error(ErrorCode::LimitReached, err.to_string())
                    .with_suggestion("select the required number of hostages before locking")
                    .with_context(serde_json::json!({
                        "current": current,
                        "required": required,
                    }))
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Accumulated findings for one command.
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    findings: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn push(&mut self, finding: ValidationError) {
        self.findings.push(finding);
    }

    pub fn is_accepted(&self) -> bool {
        !self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn errors(&self) -> Vec<ValidationError> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .cloned()
            .collect()
    }

    pub fn warnings(&self) -> Vec<ValidationError> {
        self.findings
            .iter()
            .filter(|f| f.severity != Severity::Error)
            .cloned()
            .collect()
    }

    pub fn findings(&self) -> &[ValidationError] {
        &self.findings
    }
}

struct ValidationContext<'a> {
    catalog: &'a Catalog,
    game: &'a Game,
    command: &'a Command,
    player: &'a Player,
}

impl ValidationContext<'_> {
    fn require_host(&self, report: &mut ValidationReport) -> bool {
        if self.game.is_host(self.player.id) {
            true
        } else {
            report.push(
                ValidationError::error(ErrorCode::Unauthorized, "only the host may do this")
                    .with_suggestion("ask the host to perform this action"),
            );
            false
        }
    }

    fn require_member(&self, room: RoomId, report: &mut ValidationReport) -> bool {
        if self.game.rooms.get(room).contains(self.player.id) {
            true
        } else {
            report.push(ValidationError::error(
                ErrorCode::WrongRoom,
                format!("you are not in {room}"),
            ));
            false
        }
    }

    fn require_leader(&self, room: RoomId, report: &mut ValidationReport) -> bool {
        if self.game.rooms.get(room).leader == Some(self.player.id) {
            true
        } else {
            report.push(
                ValidationError::error(
                    ErrorCode::Unauthorized,
                    format!("only the leader of {room} may do this"),
                )
                .with_suggestion("the room's leader must perform this action"),
            );
            false
        }
    }

    fn require_target_in_room(
        &self,
        room: RoomId,
        target: super::entities::PlayerId,
        report: &mut ValidationReport,
    ) -> bool {
        if !self.game.players.contains_key(&target) {
            report.push(ValidationError::error(
                ErrorCode::MissingTarget,
                "target player does not exist",
            ));
            false
        } else if !self.game.rooms.get(room).contains(target) {
            report.push(ValidationError::error(
                ErrorCode::WrongRoom,
                format!("target player is not in {room}"),
            ));
            false
        } else {
            true
        }
    }

    fn wrong_phase(&self, report: &mut ValidationReport) {
        report.push(
            ValidationError::error(
                ErrorCode::InvalidState,
                format!(
                    "{} is not legal in phase {}",
                    self.command.kind.type_name(),
                    self.game.phase
                ),
            )
            .with_context(serde_json::json!({ "phase": self.game.phase.to_string() })),
        );
    }
}

#[enum_dispatch]
trait CommandGate {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport);
}

#[enum_dispatch(CommandGate)]
enum PhaseRules {
    LobbyRules,
    LockedRules,
    RoleSelectionRules,
    RoleDistributionRules,
    RoomAssignmentRules,
    RoundRules,
    TerminalRules,
}

fn rules_for(phase: Phase) -> PhaseRules {
    match phase {
        Phase::Lobby => PhaseRules::LobbyRules(LobbyRules),
        Phase::Locked => PhaseRules::LockedRules(LockedRules),
        Phase::RoleSelection => PhaseRules::RoleSelectionRules(RoleSelectionRules),
        Phase::RoleDistribution => PhaseRules::RoleDistributionRules(RoleDistributionRules),
        Phase::RoomAssignment => PhaseRules::RoomAssignmentRules(RoomAssignmentRules),
        Phase::Round(_) => PhaseRules::RoundRules(RoundRules),
        Phase::Resolution | Phase::Finished => PhaseRules::TerminalRules(TerminalRules),
    }
}

struct LobbyRules;

impl CommandGate for LobbyRules {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport) {
        match &cx.command.kind {
            CommandKind::LockRoom => {
                if !cx.require_host(report) {
                    return;
                }
                let count = cx.game.player_count();
                if count < MIN_PLAYERS {
                    report.push(
                        ValidationError::error(
                            ErrorCode::InsufficientPlayers,
                            format!("{count} players joined, {MIN_PLAYERS} required"),
                        )
                        .with_suggestion("wait for more players before locking"),
                    );
                } else if count > MAX_PLAYERS {
                    report.push(ValidationError::error(
                        ErrorCode::TooManyPlayers,
                        format!("{count} players joined, at most {MAX_PLAYERS} allowed"),
                    ));
                }
            }
            _ => cx.wrong_phase(report),
        }
    }
}

struct LockedRules;

impl CommandGate for LockedRules {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport) {
        match &cx.command.kind {
            CommandKind::UnlockRoom | CommandKind::StartRoleSelection => {
                cx.require_host(report);
            }
            CommandKind::SelectRoles { roles } => {
                if cx.require_host(report) {
                    check_roles_known(cx.catalog, roles, report);
                }
            }
            CommandKind::SetRounds { total_rounds } => {
                if cx.require_host(report) {
                    check_round_count(*total_rounds, report);
                }
            }
            _ => cx.wrong_phase(report),
        }
    }
}

struct RoleSelectionRules;

impl CommandGate for RoleSelectionRules {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport) {
        match &cx.command.kind {
            CommandKind::CancelRoleSelection => {
                cx.require_host(report);
            }
            CommandKind::SelectRoles { roles } => {
                if cx.require_host(report) {
                    check_roles_known(cx.catalog, roles, report);
                }
            }
            CommandKind::SetRounds { total_rounds } => {
                if cx.require_host(report) {
                    check_round_count(*total_rounds, report);
                }
            }
            CommandKind::ConfirmRoles => {
                if cx.require_host(report) {
                    check_role_configuration(
                        cx.catalog,
                        &cx.game.config.selected_roles,
                        cx.game.config.required_deck_size(cx.game.player_count()),
                        report,
                    );
                }
            }
            _ => cx.wrong_phase(report),
        }
    }
}

struct RoleDistributionRules;

impl CommandGate for RoleDistributionRules {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport) {
        // Distribution is fully internal; no external command applies.
        cx.wrong_phase(report);
    }
}

struct RoomAssignmentRules;

impl CommandGate for RoomAssignmentRules {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport) {
        match &cx.command.kind {
            CommandKind::StartGame => {
                cx.require_host(report);
            }
            _ => cx.wrong_phase(report),
        }
    }
}

struct RoundRules;

impl CommandGate for RoundRules {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport) {
        match &cx.command.kind {
            CommandKind::NominateLeader { room, candidate } => {
                if !cx.require_member(*room, report) {
                    return;
                }
                if !cx.game.rooms.get(*room).leader_voting_active {
                    report.push(
                        ValidationError::error(
                            ErrorCode::InvalidState,
                            "no leader vote is running in this room",
                        )
                        .with_suggestion("start one with INITIATE_NEW_LEADER_VOTE"),
                    );
                    return;
                }
                cx.require_target_in_room(*room, *candidate, report);
            }
            CommandKind::InitiateNewLeaderVote { room } => {
                if !cx.require_member(*room, report) {
                    return;
                }
                if cx.game.current_round <= 1 {
                    report.push(ValidationError::error(
                        ErrorCode::InvalidState,
                        "round 1 elects its leaders through the opening vote",
                    ));
                    return;
                }
                let state = cx.game.rooms.get(*room);
                if state.leader.is_none() {
                    report.push(ValidationError::error(
                        ErrorCode::MissingTarget,
                        "the room has no leader to replace",
                    ));
                } else if state.leader_voting_active {
                    report.push(ValidationError::error(
                        ErrorCode::InvalidState,
                        "a leader vote is already running",
                    ));
                }
            }
            CommandKind::VoteUsurp { room, candidate } => {
                if !cx.require_member(*room, report) {
                    return;
                }
                let state = cx.game.rooms.get(*room);
                if state.leader.is_none() {
                    report.push(ValidationError::error(
                        ErrorCode::MissingTarget,
                        "the room has no leader to usurp",
                    ));
                    return;
                }
                if state.leader == Some(*candidate) {
                    report.push(ValidationError::error(
                        ErrorCode::InvalidState,
                        "the current leader cannot usurp themselves",
                    ));
                    return;
                }
                cx.require_target_in_room(*room, *candidate, report);
            }
            CommandKind::Abdicate { room, successor } => {
                if !cx.require_leader(*room, report) {
                    return;
                }
                if *successor == cx.player.id {
                    report.push(ValidationError::error(
                        ErrorCode::MissingTarget,
                        "abdication needs a different successor",
                    ));
                    return;
                }
                cx.require_target_in_room(*room, *successor, report);
            }
            CommandKind::SelectHostage { room, target } => {
                if !cx.require_leader(*room, report) || !require_hostage_phase(cx, report) {
                    return;
                }
                if cx.game.rooms.get(*room).hostages_locked {
                    report.push(ValidationError::error(
                        ErrorCode::InvalidState,
                        "hostages are already locked",
                    ));
                    return;
                }
                if !cx.require_target_in_room(*room, *target, report) {
                    return;
                }
                let is_leader = cx.game.rooms.get(*room).leader == Some(*target);
                let eligible = cx
                    .game
                    .players
                    .get(target)
                    .is_some_and(|p| p.can_be_hostage);
                if is_leader || !eligible {
                    report.push(ValidationError::error(
                        ErrorCode::InvalidState,
                        "the leader cannot be sent as a hostage",
                    ));
                }
            }
            CommandKind::LockHostages { room } => {
                if cx.require_leader(*room, report) {
                    let _ = require_hostage_phase(cx, report);
                    if cx.game.rooms.get(*room).hostages_locked {
                        report.push(ValidationError::error(
                            ErrorCode::InvalidState,
                            "hostages are already locked",
                        ));
                        return;
                    }
                    let required = hostage_quota(cx.game.player_count(), cx.game.current_round);
                    let current = cx.game.rooms.get(*room).hostage_candidates.len();
                    if current != required {
                        report.push(ValidationError::from_round_flow(
                            &RoundFlowError::HostageCountShort { current, required },
                        ));
                    }
                }
            }
            CommandKind::CardShare { target }
            | CommandKind::ColorShare { target }
            | CommandKind::PrivateReveal { target } => {
                check_share(cx, *target, report);
            }
            CommandKind::PublicReveal => {
                if cx.player.current_room.is_none() {
                    report.push(ValidationError::error(
                        ErrorCode::WrongRoom,
                        "you are not in a room",
                    ));
                }
            }
            CommandKind::ActivateAbility { ability, .. } => {
                check_ability_activation(cx, ability, report);
            }
            _ => cx.wrong_phase(report),
        }
    }
}

struct TerminalRules;

impl CommandGate for TerminalRules {
    fn check(&self, cx: &ValidationContext<'_>, report: &mut ValidationReport) {
        cx.wrong_phase(report);
    }
}

fn require_hostage_phase(cx: &ValidationContext<'_>, report: &mut ValidationReport) -> bool {
    if cx.game.paused && !cx.game.parlay_active {
        true
    } else {
        report.push(
            ValidationError::error(
                ErrorCode::InvalidState,
                "hostage selection opens when the round timer expires",
            )
            .with_suggestion("wait for the round timer to run out"),
        );
        false
    }
}

fn check_share(
    cx: &ValidationContext<'_>,
    target: super::entities::PlayerId,
    report: &mut ValidationReport,
) {
    let Some(room) = cx.player.current_room else {
        report.push(ValidationError::error(
            ErrorCode::WrongRoom,
            "you are not in a room",
        ));
        return;
    };
    if target == cx.player.id {
        report.push(ValidationError::error(
            ErrorCode::MissingTarget,
            "sharing with yourself reveals nothing",
        ));
        return;
    }
    cx.require_target_in_room(room, target, report);
}

fn check_ability_activation(
    cx: &ValidationContext<'_>,
    ability: &str,
    report: &mut ValidationReport,
) {
    let Some(role) = cx.player.current_role.as_ref() else {
        report.push(ValidationError::error(
            ErrorCode::Unauthorized,
            "no role assigned yet",
        ));
        return;
    };
    let has_manual = cx.catalog.get(role).is_some_and(|def| {
        def.abilities
            .iter()
            .any(|a| a.trigger == crate::catalog::AbilityTrigger::Manual)
    });
    if !has_manual {
        report.push(
            ValidationError::error(
                ErrorCode::Unauthorized,
                format!("your character has no activatable ability `{ability}`"),
            )
            .with_context(serde_json::json!({ "ability": ability })),
        );
    }
}

fn check_round_count(total_rounds: u8, report: &mut ValidationReport) {
    if !matches!(total_rounds, 3 | 5) {
        report.push(ValidationError::error(
            ErrorCode::InvalidState,
            format!("a game runs 3 or 5 rounds, not {total_rounds}"),
        ));
    }
}

fn check_roles_known(catalog: &Catalog, roles: &[CharacterId], report: &mut ValidationReport) {
    for role in roles {
        if !catalog.contains(role) {
            report.push(ValidationError::error(
                ErrorCode::MissingTarget,
                format!("unknown character `{role}`"),
            ));
        }
    }
}

/// Full deck validation applied on `CONFIRM_ROLES`.
fn check_role_configuration(
    catalog: &Catalog,
    roles: &[CharacterId],
    required_size: usize,
    report: &mut ValidationReport,
) {
    check_roles_known(catalog, roles, report);
    let deck: HashSet<&CharacterId> = roles.iter().collect();

    for primary in catalog.primaries() {
        if !deck.contains(&primary.id) {
            report.push(
                ValidationError::error(
                    ErrorCode::MissingDependency,
                    format!("the deck must include `{}`", primary.id),
                )
                .with_suggestion("add every PRIMARY character to the deck"),
            );
        }
    }

    if roles.len() != required_size {
        report.push(
            ValidationError::error(
                ErrorCode::RoleCountMismatch,
                format!("deck has {} roles, {required_size} required", roles.len()),
            )
            .with_context(serde_json::json!({
                "selected": roles.len(),
                "required": required_size,
            })),
        );
    }

    for role in &deck {
        let Some(def) = catalog.get(role) else {
            continue;
        };
        for required in &def.requires {
            if !deck.contains(required) {
                report.push(ValidationError::error(
                    ErrorCode::MissingDependency,
                    format!("`{role}` requires `{required}` in the deck"),
                ));
            }
        }
        for excluded in &def.mutually_exclusive {
            if deck.contains(excluded) {
                report.push(ValidationError::error(
                    ErrorCode::MutuallyExclusive,
                    format!("`{role}` cannot share a deck with `{excluded}`"),
                ));
            }
        }
    }

    let team_count = |team: Team| {
        roles
            .iter()
            .filter(|r| catalog.get(r).is_some_and(|d| d.team == team))
            .count()
    };
    let red = team_count(Team::Red);
    let blue = team_count(Team::Blue);
    if red.abs_diff(blue) > 2 {
        report.push(
            ValidationError::warning(
                ErrorCode::TeamImbalance,
                format!("deck has {red} red and {blue} blue characters"),
            )
            .with_suggestion("consider balancing the red and blue teams"),
        );
    }
}

/// Gate an external command against the current game state.
pub fn validate(catalog: &Catalog, game: &Game, command: &Command) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(player) = game.players.get(&command.player_id) else {
        report.push(ValidationError::error(
            ErrorCode::Unauthorized,
            "unknown player",
        ));
        return report;
    };

    // Leaving is always legal for a known player, in any phase.
    if matches!(command.kind, CommandKind::LeaveGame) {
        return report;
    }

    let cx = ValidationContext {
        catalog,
        game,
        command,
        player,
    };
    rules_for(game.phase).check(&cx, &mut report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::standard::standard_catalog;
    use crate::game::command::Command;
    use crate::game::entities::Game;

    fn fixture(player_count: usize) -> (Catalog, Game) {
        let catalog = standard_catalog().unwrap();
        let mut game = Game::new("ABCDEF".to_string(), "host", [0; 32]);
        for i in 1..player_count {
            game.add_player(&format!("p{i}"));
        }
        (catalog, game)
    }

    fn cmd(game: &Game, player: super::super::entities::PlayerId, kind: CommandKind) -> Command {
        let _ = game;
        Command::new(player, kind)
    }

    #[test]
    fn lock_rejects_five_players() {
        let (catalog, game) = fixture(5);
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, game.host_id(), CommandKind::LockRoom),
        );
        assert!(!report.is_accepted());
        assert_eq!(report.errors()[0].code, ErrorCode::InsufficientPlayers);
    }

    #[test]
    fn lock_rejects_thirty_one_players() {
        let (catalog, game) = fixture(31);
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, game.host_id(), CommandKind::LockRoom),
        );
        assert_eq!(report.errors()[0].code, ErrorCode::TooManyPlayers);
    }

    #[test]
    fn lock_is_host_only() {
        let (catalog, game) = fixture(6);
        let not_host = game.join_order[1];
        let report = validate(&catalog, &game, &cmd(&game, not_host, CommandKind::LockRoom));
        assert_eq!(report.errors()[0].code, ErrorCode::Unauthorized);
    }

    #[test]
    fn unknown_player_is_unauthorized() {
        let (catalog, game) = fixture(6);
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, uuid::Uuid::new_v4(), CommandKind::LockRoom),
        );
        assert_eq!(report.errors()[0].code, ErrorCode::Unauthorized);
    }

    #[test]
    fn leave_game_is_legal_in_any_phase() {
        let (catalog, mut game) = fixture(6);
        for phase in [Phase::Lobby, Phase::Locked, Phase::Round(2), Phase::Finished] {
            game.phase = phase;
            let report = validate(
                &catalog,
                &game,
                &cmd(&game, game.join_order[2], CommandKind::LeaveGame),
            );
            assert!(report.is_accepted(), "leave rejected in {phase}");
        }
    }

    #[test]
    fn confirm_requires_primaries_and_count() {
        let (catalog, mut game) = fixture(6);
        game.phase = Phase::RoleSelection;
        game.config.selected_roles = vec![
            CharacterId::new("president"),
            CharacterId::new("doctor"),
            CharacterId::new("blue_agent"),
            CharacterId::new("red_agent"),
            CharacterId::new("gambler"),
        ];
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, game.host_id(), CommandKind::ConfirmRoles),
        );
        let codes: Vec<ErrorCode> = report.errors().iter().map(|e| e.code).collect();
        // Missing the bomber primary and one card short of the player count.
        assert!(codes.contains(&ErrorCode::MissingDependency));
        assert!(codes.contains(&ErrorCode::RoleCountMismatch));
    }

    #[test]
    fn confirm_checks_requires_closure() {
        let (catalog, mut game) = fixture(6);
        game.phase = Phase::RoleSelection;
        // Doctor requires the president, which is absent.
        game.config.selected_roles = ["bomber", "doctor", "blue_agent", "red_agent", "gambler", "traveler"]
            .iter()
            .map(|s| CharacterId::new(s))
            .collect();
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, game.host_id(), CommandKind::ConfirmRoles),
        );
        assert!(report
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::MissingDependency
                && e.message.contains("president")));
    }

    #[test]
    fn confirm_rejects_mutually_exclusive_pairs() {
        use crate::catalog::{CharacterClass, CharacterDefinition, Team as TeamColour};
        let catalog = Catalog::new(vec![
            CharacterDefinition::basic("president", "President", TeamColour::Blue, CharacterClass::Primary),
            CharacterDefinition::basic("bomber", "Bomber", TeamColour::Red, CharacterClass::Primary),
            CharacterDefinition::basic("zealot", "Zealot", TeamColour::Grey, CharacterClass::Regular)
                .with_mutually_exclusive(["sceptic"]),
            CharacterDefinition::basic("sceptic", "Sceptic", TeamColour::Grey, CharacterClass::Regular),
            CharacterDefinition::basic("bystander", "Bystander", TeamColour::Grey, CharacterClass::Regular),
            CharacterDefinition::basic("wanderer", "Wanderer", TeamColour::Grey, CharacterClass::Regular),
        ])
        .unwrap();

        let mut game = Game::new("ABCDEF".to_string(), "host", [0; 32]);
        for i in 1..6 {
            game.add_player(&format!("p{i}"));
        }
        game.phase = Phase::RoleSelection;
        game.config.selected_roles = ["president", "bomber", "zealot", "sceptic", "bystander", "wanderer"]
            .iter()
            .map(|s| CharacterId::new(s))
            .collect();
        let report = validate(
            &catalog,
            &game,
            &Command::new(game.host_id(), CommandKind::ConfirmRoles),
        );
        assert!(report
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::MutuallyExclusive));
    }

    #[test]
    fn team_imbalance_is_warning_not_error() {
        let (catalog, mut game) = fixture(6);
        game.phase = Phase::RoleSelection;
        game.config.selected_roles = [
            "president",
            "bomber",
            "blue_agent",
            "blue_citizen",
            "vice_president",
            "doctor",
        ]
        .iter()
        .map(|s| CharacterId::new(s))
        .collect();
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, game.host_id(), CommandKind::ConfirmRoles),
        );
        assert!(report.is_accepted());
        assert!(report
            .warnings()
            .iter()
            .any(|w| w.code == ErrorCode::TeamImbalance));
    }

    #[test]
    fn set_rounds_accepts_only_three_or_five() {
        let (catalog, mut game) = fixture(6);
        game.phase = Phase::Locked;
        for (value, accepted) in [(3u8, true), (5, true), (4, false), (0, false)] {
            let report = validate(
                &catalog,
                &game,
                &cmd(
                    &game,
                    game.host_id(),
                    CommandKind::SetRounds {
                        total_rounds: value,
                    },
                ),
            );
            assert_eq!(report.is_accepted(), accepted, "SET_ROUNDS {value}");
        }
    }

    fn seat_rooms(game: &mut Game) {
        let ids = game.join_order.clone();
        let mid = ids.len() / 2;
        for (i, id) in ids.iter().enumerate() {
            let room = if i < mid { RoomId::A } else { RoomId::B };
            game.rooms.get_mut(room).members.push(*id);
            game.players.get_mut(id).unwrap().current_room = Some(room);
        }
    }

    #[test]
    fn hostage_selection_gated_on_pause_and_leader() {
        let (catalog, mut game) = fixture(6);
        seat_rooms(&mut game);
        game.phase = Phase::Round(1);
        game.current_round = 1;
        let leader = game.rooms.a.members[0];
        let target = game.rooms.a.members[1];
        game.rooms.a.leader = Some(leader);
        game.players.get_mut(&leader).unwrap().is_leader = true;

        // Timer still running: not hostage phase yet.
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, leader, CommandKind::SelectHostage { room: RoomId::A, target }),
        );
        assert_eq!(report.errors()[0].code, ErrorCode::InvalidState);

        game.paused = true;
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, leader, CommandKind::SelectHostage { room: RoomId::A, target }),
        );
        assert!(report.is_accepted());

        // A non-leader cannot select.
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, target, CommandKind::SelectHostage { room: RoomId::A, target: leader }),
        );
        assert_eq!(report.errors()[0].code, ErrorCode::Unauthorized);

        // The leader cannot be a hostage target.
        game.players.get_mut(&leader).unwrap().can_be_hostage = false;
        let other_leader_cmd = cmd(
            &game,
            leader,
            CommandKind::SelectHostage { room: RoomId::A, target: leader },
        );
        let report = validate(&catalog, &game, &other_leader_cmd);
        assert!(!report.is_accepted());
    }

    #[test]
    fn shares_require_same_room() {
        let (catalog, mut game) = fixture(6);
        seat_rooms(&mut game);
        game.phase = Phase::Round(1);
        game.current_round = 1;
        let in_a = game.rooms.a.members[0];
        let in_b = game.rooms.b.members[0];

        let report = validate(
            &catalog,
            &game,
            &cmd(&game, in_a, CommandKind::CardShare { target: in_b }),
        );
        assert_eq!(report.errors()[0].code, ErrorCode::WrongRoom);

        let same_room = game.rooms.a.members[1];
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, in_a, CommandKind::CardShare { target: same_room }),
        );
        assert!(report.is_accepted());
    }

    #[test]
    fn revote_requires_later_round_and_existing_leader() {
        let (catalog, mut game) = fixture(6);
        seat_rooms(&mut game);
        game.phase = Phase::Round(1);
        game.current_round = 1;
        let member = game.rooms.a.members[0];
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, member, CommandKind::InitiateNewLeaderVote { room: RoomId::A }),
        );
        assert_eq!(report.errors()[0].code, ErrorCode::InvalidState);

        game.phase = Phase::Round(2);
        game.current_round = 2;
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, member, CommandKind::InitiateNewLeaderVote { room: RoomId::A }),
        );
        assert_eq!(report.errors()[0].code, ErrorCode::MissingTarget);

        game.rooms.a.leader = Some(member);
        let report = validate(
            &catalog,
            &game,
            &cmd(&game, member, CommandKind::InitiateNewLeaderVote { room: RoomId::A }),
        );
        assert!(report.is_accepted());
    }
}
