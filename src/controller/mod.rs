//! Controller: the single public entry point over live games.
//!
//! `GameStore` creates and finds games; `GameHandle` is the address of one
//! game's actor; `GameActor` is the single writer that validates, mutates,
//! and publishes.

pub mod actor;
pub mod messages;
pub mod persist;
pub mod store;

pub use actor::{GameActor, GameHandle};
pub use messages::{CommandError, CommandOutcome, GameMessage, GameStatus, JoinedGame};
pub use persist::{NoPersistence, WriteThrough};
pub use store::{GameStore, StoreConfig, StoreError};
