//! # Two Rooms
//!
//! Authoritative, in-memory core for a two-room hidden-role social
//! deduction game: a lobby, secret role distribution, timed rounds with
//! leader elections, hostage selection, a thirty-second parlay between
//! leaders, and a hostage exchange, all fanned out to observers over a
//! scoped, replayable event journal.
//!
//! ## Architecture
//!
//! Each live game is owned by a single actor task; every mutation (command,
//! timer expiry, ability effect) runs there, so games need no locks of
//! their own. The pieces:
//!
//! - [`catalog`]: immutable character definitions with dependency and
//!   exclusion constraints
//! - [`game`]: the aggregate, the phase machine, and the phase-indexed
//!   command validator
//! - [`journal`]: append-only scoped event journal with replay on
//!   reconnect
//! - [`round`]: timers, leader elections, hostages, parlay, exchange
//! - [`abilities`]: the ability-engine contract (effects as data)
//! - [`controller`]: the game actor, its message surface, and the store
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use two_rooms::catalog::standard::standard_catalog;
//! use two_rooms::controller::GameStore;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(standard_catalog()?);
//! let store = GameStore::new(catalog);
//! let (_handle, host) = store.create_game("alice").await?;
//! let _bob = store.join_game(&host.code, "bob").await?;
//! # Ok(())
//! # }
//! ```

/// Ability engine contract and effect applications.
pub mod abilities;

/// Character catalogue: definitions, validation, lookups.
pub mod catalog;

/// Game actor, command surface, and the in-memory store.
pub mod controller;

/// Data model, phase machine, commands, validation.
pub mod game;

/// Scoped event journal and delivery bus.
pub mod journal;

/// Round mechanics: timers, elections, hostages, parlay.
pub mod round;

pub use abilities::{AbilityEngine, EffectApplication, NoopAbilityEngine, TriggerPoint};
pub use catalog::{Catalog, CatalogError, CharacterDefinition, CharacterId, Team};
pub use controller::{
    CommandError, CommandOutcome, GameHandle, GameStatus, GameStore, JoinedGame, StoreError,
};
pub use game::{Command, CommandKind, Phase, PlayerId, RoomId, Trigger};
pub use journal::{EventRecord, GameEvent, Scope};
pub use round::hostage_quota;
