//! Game-wide constants.

use std::time::Duration;

/// Fewest participants a game can lock with.
pub const MIN_PLAYERS: usize = 6;

/// Most participants a game can hold.
pub const MAX_PLAYERS: usize = 30;

/// Length of the human-visible room code.
pub const CODE_LENGTH: usize = 6;

/// Confusion-reduced alphabet for room codes (no `I`, `O`, `0`, `1`).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Collision retries before code generation fails fast.
pub const CODE_GENERATION_RETRIES: usize = 100;

/// Fixed length of the parlay window between leaders.
pub const PARLAY_DURATION: Duration = Duration::from_secs(30);

/// Granularity of the round engine's internal tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum number of journal entries retained per game.
pub const JOURNAL_RETENTION: usize = 1000;

/// How long a finished game lingers in the store before reaping.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Consecutive tied leader votes before a random break.
pub const TIE_LIMIT: u8 = 3;
