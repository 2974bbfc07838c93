//! Game data model, phase machine, command surface, and validation.

pub mod command;
pub mod constants;
pub mod entities;
pub mod phase;
pub mod validator;

pub use command::{Command, CommandKind};
pub use entities::{Game, GameConfig, GameId, Player, PlayerId, RoomId};
pub use phase::{transition, Phase, Trigger};
pub use validator::{validate, ErrorCode, Severity, ValidationError, ValidationReport};
