//! Ability engine contract.
//!
//! Character abilities are data (`catalog::Ability`); evaluating them is
//! delegated to an engine behind this trait. The core invokes the engine at
//! typed trigger points and applies the returned effects in order, each
//! under the owning game's serialised execution. The default engine does
//! nothing, which yields a complete game with only the built-in mechanics.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Team};
use crate::game::entities::{Game, PlayerId, ShareKind};

/// Where in the game flow the engine is being consulted.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPoint {
    RoundStart { round: u8 },
    RoundEnd { round: u8 },
    Share { initiator: PlayerId, target: Option<PlayerId>, kind: ShareKind },
    BecameHostage { player: PlayerId },
    BecameLeader { player: PlayerId },
    ManualActivation { player: PlayerId, targets_len: usize },
    Resolution,
}

/// One effect the core knows how to apply.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectApplication {
    ApplyCondition { player: PlayerId, condition: String },
    RemoveCondition { player: PlayerId, condition: String },
    /// Reveal the player's team colour to their current room.
    ForceReveal { player: PlayerId },
    /// Swap the current (not original) roles of two players.
    SwapCard { first: PlayerId, second: PlayerId },
    EndRoundEarly,
    InstantWin { team: Team },
}

/// Evaluates character abilities and win conditions.
///
/// Implementations must be pure with respect to the game: they read state
/// and return effects, never mutating directly. Priority ordering between
/// simultaneous abilities is the engine's responsibility; the core applies
/// the returned list front to back.
pub trait AbilityEngine: Send + Sync {
    fn evaluate(
        &self,
        game: &Game,
        catalog: &Catalog,
        trigger: &TriggerPoint,
    ) -> Vec<EffectApplication>;

    /// Called once at RESOLUTION; the returned team wins (if any).
    fn resolve_winner(&self, game: &Game, catalog: &Catalog) -> Option<Team> {
        let _ = (game, catalog);
        None
    }
}

/// Engine that fires no abilities and names no special winner.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAbilityEngine;

impl AbilityEngine for NoopAbilityEngine {
    fn evaluate(
        &self,
        _game: &Game,
        _catalog: &Catalog,
        _trigger: &TriggerPoint,
    ) -> Vec<EffectApplication> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::standard::standard_catalog;

    #[test]
    fn noop_engine_returns_nothing() {
        let catalog = standard_catalog().unwrap();
        let game = Game::new("ABCDEF".to_string(), "host", [0; 32]);
        let engine = NoopAbilityEngine;
        assert!(engine
            .evaluate(&game, &catalog, &TriggerPoint::Resolution)
            .is_empty());
        assert_eq!(engine.resolve_winner(&game, &catalog), None);
    }
}
