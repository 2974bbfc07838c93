//! Built-in starter character set.
//!
//! Enough to run a full game out of the box: the two primary designators,
//! their backups, and a spread of regular characters across the team
//! colours. Embedders with their own catalogue never need this module.

use std::collections::BTreeMap;

use super::definition::{
    Ability, AbilityEffectKind, AbilityTrigger, CharacterClass, CharacterDefinition, TargetRule,
    Team, WinCondition, WinPredicate,
};
use super::{Catalog, CatalogError};

fn param(key: &str, value: &str) -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([(key.to_string(), serde_json::Value::String(value.to_string()))])
}

/// The starter catalogue. Infallible in practice; the `Result` keeps the
/// signature honest about construction-time validation.
pub fn standard_catalog() -> Result<Catalog, CatalogError> {
    Catalog::new(standard_definitions())
}

pub fn standard_definitions() -> Vec<CharacterDefinition> {
    vec![
        CharacterDefinition::basic("president", "President", Team::Blue, CharacterClass::Primary)
            .with_description("The blue team wins if the President survives the game.")
            .with_win_condition(WinCondition {
                predicate: WinPredicate::TeamVictory,
                priority: 0,
                overrides_team_victory: false,
                parameters: BTreeMap::new(),
            }),
        CharacterDefinition::basic("bomber", "Bomber", Team::Red, CharacterClass::Primary)
            .with_description("The red team wins if the Bomber ends the game with the President.")
            .with_win_condition(WinCondition {
                predicate: WinPredicate::SameRoomAsCharacter,
                priority: 10,
                overrides_team_victory: false,
                parameters: param("character", "president"),
            }),
        CharacterDefinition::basic(
            "vice_president",
            "Vice President",
            Team::Blue,
            CharacterClass::Backup,
        )
        .with_description("Becomes the President if the President is out of play.")
        .with_requires(["president"])
        .with_complexity(2),
        CharacterDefinition::basic("martyr", "Martyr", Team::Red, CharacterClass::Backup)
            .with_description("Becomes the Bomber if the Bomber is out of play.")
            .with_requires(["bomber"])
            .with_complexity(2),
        CharacterDefinition::basic("doctor", "Doctor", Team::Blue, CharacterClass::Regular)
            .with_description("The President must card share with the Doctor before the end.")
            .with_requires(["president"])
            .with_complexity(2)
            .with_ability(Ability {
                trigger: AbilityTrigger::CardShare,
                effect: AbilityEffectKind::RemoveCondition,
                targeting: TargetRule::SameRoom,
                uses: None,
                conditions: Vec::new(),
                parameters: param("condition", "untreated"),
                priority: 0,
            }),
        CharacterDefinition::basic("engineer", "Engineer", Team::Red, CharacterClass::Regular)
            .with_description("The Bomber must card share with the Engineer before the end.")
            .with_requires(["bomber"])
            .with_complexity(2)
            .with_ability(Ability {
                trigger: AbilityTrigger::CardShare,
                effect: AbilityEffectKind::RemoveCondition,
                targeting: TargetRule::SameRoom,
                uses: None,
                conditions: Vec::new(),
                parameters: param("condition", "unwired"),
                priority: 0,
            }),
        CharacterDefinition::basic("blue_agent", "Blue Agent", Team::Blue, CharacterClass::Regular)
            .with_description("May force a colour share once per round.")
            .with_ability(Ability {
                trigger: AbilityTrigger::Manual,
                effect: AbilityEffectKind::ForceReveal,
                targeting: TargetRule::SameRoom,
                uses: Some(3),
                conditions: Vec::new(),
                parameters: BTreeMap::new(),
                priority: 0,
            }),
        CharacterDefinition::basic("red_agent", "Red Agent", Team::Red, CharacterClass::Regular)
            .with_description("May force a colour share once per round.")
            .with_ability(Ability {
                trigger: AbilityTrigger::Manual,
                effect: AbilityEffectKind::ForceReveal,
                targeting: TargetRule::SameRoom,
                uses: Some(3),
                conditions: Vec::new(),
                parameters: BTreeMap::new(),
                priority: 0,
            }),
        CharacterDefinition::basic("gambler", "Gambler", Team::Grey, CharacterClass::Regular)
            .with_description("Wins by predicting the winning team at the end of the last round.")
            .with_complexity(3)
            .with_win_condition(WinCondition {
                predicate: WinPredicate::TeamVictory,
                priority: 0,
                overrides_team_victory: true,
                parameters: param("mode", "prediction"),
            }),
        CharacterDefinition::basic("traveler", "Traveler", Team::Grey, CharacterClass::Regular)
            .with_description("Wins by being sent as a hostage at least once.")
            .with_complexity(2)
            .with_win_condition(WinCondition {
                predicate: WinPredicate::WasSentAsHostage,
                priority: 0,
                overrides_team_victory: true,
                parameters: BTreeMap::new(),
            }),
        CharacterDefinition::basic("usurper", "Usurper", Team::Green, CharacterClass::Regular)
            .with_description("Wins by usurping at least one leader.")
            .with_complexity(3)
            .with_win_condition(WinCondition {
                predicate: WinPredicate::UsurpedLeaders,
                priority: 0,
                overrides_team_victory: true,
                parameters: param("count", "1"),
            }),
        CharacterDefinition::basic("recluse", "Recluse", Team::Purple, CharacterClass::Regular)
            .with_description("Wins by ending the game in a different room from the President.")
            .with_complexity(3)
            .with_win_condition(WinCondition {
                predicate: WinPredicate::DifferentRoomFromCharacter,
                priority: 0,
                overrides_team_victory: true,
                parameters: param("character", "president"),
            }),
        CharacterDefinition::basic("nihilist", "Nihilist", Team::Black, CharacterClass::Regular)
            .with_description("Wins only if nobody else achieves their goal.")
            .with_complexity(4),
        CharacterDefinition::basic("matchmaker", "Matchmaker", Team::Pink, CharacterClass::Regular)
            .with_description("Wins by ending the game in the same room as the Gambler.")
            .with_complexity(3)
            .with_win_condition(WinCondition {
                predicate: WinPredicate::SameRoomAsCharacter,
                priority: 0,
                overrides_team_victory: true,
                parameters: param("character", "gambler"),
            }),
        CharacterDefinition::basic("blue_citizen", "Blue Citizen", Team::Blue, CharacterClass::Regular)
            .with_description("No special ability. Protect the President."),
        CharacterDefinition::basic("red_citizen", "Red Citizen", Team::Red, CharacterClass::Regular)
            .with_description("No special ability. Help the Bomber."),
    ]
}
