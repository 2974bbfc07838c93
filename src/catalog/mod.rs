//! Character catalogue: validated, immutable character definitions.
//!
//! Built once from embedder-supplied definitions and shared via `Arc`.
//! Changing the catalogue requires a restart.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod definition;
pub mod standard;

pub use definition::{
    Ability, AbilityEffectKind, AbilityTrigger, CharacterClass, CharacterDefinition, CharacterId,
    TargetRule, Team, WinCondition, WinPredicate,
};

/// Errors raised while building a catalogue. These are fatal at startup,
/// before any game runs.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum CatalogError {
    #[error("catalogue contains no characters")]
    Empty,
    #[error("character with empty id")]
    EmptyId,
    #[error("duplicate character id `{0}`")]
    DuplicateId(CharacterId),
    #[error("character `{id}` has complexity {complexity}, expected 1-5")]
    ComplexityOutOfRange { id: CharacterId, complexity: u8 },
    #[error("character `{id}` references unknown character `{referenced}` in `{field}`")]
    UnknownReference {
        id: CharacterId,
        referenced: CharacterId,
        field: &'static str,
    },
}

/// Immutable character catalogue with id lookup and simple filters.
#[derive(Debug, PartialEq)]
pub struct Catalog {
    ordered: Vec<Arc<CharacterDefinition>>,
    by_id: HashMap<CharacterId, Arc<CharacterDefinition>>,
}

impl Catalog {
    /// Validate and index the supplied definitions.
    pub fn new(definitions: Vec<CharacterDefinition>) -> Result<Self, CatalogError> {
        if definitions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut ordered = Vec::with_capacity(definitions.len());
        let mut by_id = HashMap::with_capacity(definitions.len());
        for def in definitions {
            if def.id.is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if !(1..=5).contains(&def.complexity) {
                return Err(CatalogError::ComplexityOutOfRange {
                    id: def.id.clone(),
                    complexity: def.complexity,
                });
            }
            let def = Arc::new(def);
            if by_id.insert(def.id.clone(), Arc::clone(&def)).is_some() {
                return Err(CatalogError::DuplicateId(def.id.clone()));
            }
            ordered.push(def);
        }

        // Cross-references are only checkable once every id is indexed.
        for def in &ordered {
            for (field, refs) in [
                ("requires", &def.requires),
                ("mutually_exclusive", &def.mutually_exclusive),
            ] {
                for referenced in refs {
                    if !by_id.contains_key(referenced) {
                        return Err(CatalogError::UnknownReference {
                            id: def.id.clone(),
                            referenced: referenced.clone(),
                            field,
                        });
                    }
                }
            }
        }

        Ok(Self { ordered, by_id })
    }

    pub fn get(&self, id: &CharacterId) -> Option<&CharacterDefinition> {
        self.by_id.get(id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &CharacterId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterDefinition> {
        self.ordered.iter().map(Arc::as_ref)
    }

    /// Every definition on the given team, in catalogue order.
    pub fn team_members(&self, team: Team) -> Vec<&CharacterDefinition> {
        self.iter().filter(|d| d.team == team).collect()
    }

    /// Definitions at or below the given complexity.
    pub fn with_max_complexity(&self, max: u8) -> Vec<&CharacterDefinition> {
        self.iter().filter(|d| d.complexity <= max).collect()
    }

    /// The `PRIMARY`-class designators every deck must include.
    pub fn primaries(&self) -> Vec<&CharacterDefinition> {
        self.iter()
            .filter(|d| d.class == CharacterClass::Primary)
            .collect()
    }
}
