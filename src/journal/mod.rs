//! Per-game event journal and scoped delivery bus.
//!
//! The journal is the append-only source of truth: a gapless sequence of
//! scoped events starting at 1. Room-scoped audiences are resolved at
//! publish time, so a later hostage exchange can never leak a room's
//! earlier events to its new members. The bus fans records out to live
//! subscribers and drains the backlog on (re)subscribe.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::constants::JOURNAL_RETENTION;
use crate::game::entities::PlayerId;

pub mod events;

pub use events::{ElectionMethod, GameEvent, RoundEndReason};

/// Audience filter attached to an event.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Public,
    Room(crate::game::entities::RoomId),
    Player(PlayerId),
}

/// Concrete recipients of a record, fixed at publish time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Audience {
    Everyone,
    Players(Vec<PlayerId>),
}

impl Audience {
    pub fn includes(&self, player_id: PlayerId) -> bool {
        match self {
            Self::Everyone => true,
            Self::Players(ids) => ids.contains(&player_id),
        }
    }
}

/// One journal entry.
#[derive(Clone, Debug)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub sequence: u64,
    pub scope: Scope,
    pub event: GameEvent,
    pub timestamp: DateTime<Utc>,
    audience: Audience,
}

impl EventRecord {
    pub fn visible_to(&self, player_id: PlayerId) -> bool {
        self.audience.includes(player_id)
    }

    /// Canonical JSON projection: `{type, payload, timestamp,
    /// sequence_number}`. Transports may re-encode but must preserve order.
    pub fn wire(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.event)
            .unwrap_or_else(|_| serde_json::json!({ "type": self.event.type_name() }));
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "sequence_number".to_string(),
                serde_json::Value::from(self.sequence),
            );
            object.insert(
                "timestamp".to_string(),
                serde_json::Value::String(self.timestamp.to_rfc3339()),
            );
        }
        value
    }
}

/// Append-only, bounded journal for one game.
#[derive(Debug)]
pub struct EventJournal {
    entries: VecDeque<EventRecord>,
    next_sequence: u64,
    retain: usize,
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new(JOURNAL_RETENTION)
    }
}

impl EventJournal {
    pub fn new(retain: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(retain.min(256)),
            next_sequence: 1,
            retain: retain.max(JOURNAL_RETENTION),
        }
    }

    /// Sequence of the most recent entry, 0 when empty.
    pub fn head_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an event with its audience resolved by the caller.
    pub fn append(&mut self, scope: Scope, event: GameEvent, audience: Audience) -> EventRecord {
        let record = EventRecord {
            event_id: Uuid::new_v4(),
            sequence: self.next_sequence,
            scope,
            event,
            timestamp: Utc::now(),
            audience,
        };
        self.next_sequence += 1;
        self.entries.push_back(record.clone());
        while self.entries.len() > self.retain {
            self.entries.pop_front();
        }
        record
    }

    /// Retained entries with `sequence > after`, oldest first, filtered to
    /// what `player_id` may see.
    pub fn entries_after(&self, after: u64, player_id: PlayerId) -> Vec<EventRecord> {
        self.entries
            .iter()
            .filter(|record| record.sequence > after && record.visible_to(player_id))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter()
    }
}

/// Live fan-out to per-player subscriber channels.
///
/// A slow subscriber loses live pushes once its channel fills (the journal
/// replay on resubscribe recovers them); a closed channel drops the
/// subscription entirely.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: HashMap<PlayerId, mpsc::Sender<EventRecord>>,
}

/// Buffered events per subscriber channel before live pushes are shed.
/// Sized to absorb a full journal replay in one burst.
pub const SUBSCRIBER_BUFFER: usize = 2 * JOURNAL_RETENTION;

impl EventBus {
    /// Register (or replace) the live channel for a player.
    pub fn subscribe(&mut self, player_id: PlayerId, sender: mpsc::Sender<EventRecord>) {
        self.subscribers.insert(player_id, sender);
    }

    pub fn unsubscribe(&mut self, player_id: PlayerId) {
        self.subscribers.remove(&player_id);
    }

    pub fn is_subscribed(&self, player_id: PlayerId) -> bool {
        self.subscribers.contains_key(&player_id)
    }

    /// Deliver one record to every subscriber in its audience.
    pub fn deliver(&mut self, record: &EventRecord) {
        self.subscribers.retain(|player_id, sender| {
            if !record.visible_to(*player_id) {
                return true;
            }
            match sender.try_send(record.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        "subscriber {player_id} channel full, shedding seq {}",
                        record.sequence
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("subscriber {player_id} gone, dropping subscription");
                    false
                }
            }
        });
    }

    /// Push a backlog of records to one subscriber, oldest first.
    pub fn replay(&mut self, player_id: PlayerId, backlog: Vec<EventRecord>) {
        if let Some(sender) = self.subscribers.get(&player_id) {
            for record in backlog {
                if sender.try_send(record).is_err() {
                    warn!("subscriber {player_id} could not absorb replay backlog");
                    break;
                }
            }
        }
    }
}
