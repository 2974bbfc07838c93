//! Character definition models.
//!
//! Characters are pure data: the core never interprets an ability beyond
//! handing it to the ability engine. Everything here is immutable once the
//! catalogue is built.

use serde::{Deserialize, Serialize};
use std::{
    borrow::Borrow,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Catalogue-level identifier for a character card, e.g. `president`.
///
/// Character ids are authored data, not generated, so they stay semantic
/// strings rather than opaque ids.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new(s: &str) -> Self {
        Self(s.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for CharacterId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Team colour carried by every character and used by win-condition
/// evaluation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Red,
    Grey,
    Green,
    Purple,
    Black,
    Pink,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Grey => "grey",
            Self::Green => "green",
            Self::Purple => "purple",
            Self::Black => "black",
            Self::Pink => "pink",
        };
        write!(f, "{repr}")
    }
}

/// Structural role of a character within a deck.
///
/// The two `Primary` cards designate the protagonist and antagonist; every
/// deck must contain all `Primary` entries of the catalogue. A `Backup`
/// inherits a primary's duties when its conditions fire.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CharacterClass {
    Primary,
    Backup,
    Regular,
}

/// When an ability fires.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityTrigger {
    RoundStart,
    RoundEnd,
    CardShare,
    ColorShare,
    Reveal,
    BecameHostage,
    BecameLeader,
    Resolution,
    /// Player-activated via `ACTIVATE_ABILITY`.
    Manual,
}

/// What an ability does, at the granularity the core understands.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityEffectKind {
    ApplyCondition,
    RemoveCondition,
    ForceReveal,
    SwapCard,
    EndRoundEarly,
    InstantWin,
}

/// Who an ability may target.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRule {
    #[default]
    None,
    SelfOnly,
    SameRoom,
    OtherRoom,
    AnyPlayer,
}

/// A single character ability. The core treats this as opaque data for the
/// ability engine; only `priority` matters to the core, for deterministic
/// ordering when several abilities fire on the same trigger.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Ability {
    pub trigger: AbilityTrigger,
    pub effect: AbilityEffectKind,
    #[serde(default)]
    pub targeting: TargetRule,
    /// Usage limit per game; `None` is unlimited.
    #[serde(default)]
    pub uses: Option<u8>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub priority: i32,
}

/// Typed win-condition predicate.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinPredicate {
    /// Wins with the team result for `team`.
    TeamVictory,
    /// Ends the game in the same room as a named character.
    SameRoomAsCharacter,
    /// Ends the game in a different room from a named character.
    DifferentRoomFromCharacter,
    /// Was relocated as a hostage at least once.
    WasSentAsHostage,
    /// Usurped at least `count` leaders.
    UsurpedLeaders,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WinCondition {
    pub predicate: WinPredicate,
    #[serde(default)]
    pub priority: i32,
    /// When true this condition replaces the team result for its holder.
    #[serde(default)]
    pub overrides_team_victory: bool,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// One character card as loaded into the catalogue.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CharacterDefinition {
    pub id: CharacterId,
    pub name: String,
    pub team: Team,
    pub class: CharacterClass,
    pub description: String,
    /// 1 (teachable in a sentence) through 5 (read the rulebook twice).
    pub complexity: u8,
    #[serde(default)]
    pub requires: BTreeSet<CharacterId>,
    #[serde(default)]
    pub mutually_exclusive: BTreeSet<CharacterId>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub win_conditions: Vec<WinCondition>,
}

impl CharacterDefinition {
    /// Minimal definition with no constraints or abilities.
    pub fn basic(id: &str, name: &str, team: Team, class: CharacterClass) -> Self {
        Self {
            id: CharacterId::new(id),
            name: name.to_string(),
            team,
            class,
            description: String::new(),
            complexity: 1,
            requires: BTreeSet::new(),
            mutually_exclusive: BTreeSet::new(),
            abilities: Vec::new(),
            win_conditions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_requires<I: IntoIterator<Item = &'static str>>(mut self, ids: I) -> Self {
        self.requires = ids.into_iter().map(CharacterId::new).collect();
        self
    }

    pub fn with_mutually_exclusive<I: IntoIterator<Item = &'static str>>(
        mut self,
        ids: I,
    ) -> Self {
        self.mutually_exclusive = ids.into_iter().map(CharacterId::new).collect();
        self
    }

    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.abilities.push(ability);
        self
    }

    pub fn with_win_condition(mut self, win: WinCondition) -> Self {
        self.win_conditions.push(win);
        self
    }
}
