//! In-memory store of live games.
//!
//! Owns code generation (confusion-reduced alphabet, bounded retries),
//! handle lookup by id or case-insensitive code, and the reaper that
//! removes finished games after their retention window.

use log::{info, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::abilities::{AbilityEngine, NoopAbilityEngine};
use crate::catalog::Catalog;
use crate::game::constants::{
    CODE_ALPHABET, CODE_GENERATION_RETRIES, CODE_LENGTH, FINISHED_RETENTION,
};
use crate::game::entities::GameId;
use crate::game::phase::Phase;

use super::actor::{GameActor, GameHandle};
use super::messages::{CommandError, GameStatus, JoinedGame};
use super::persist::{NoPersistence, WriteThrough};

/// Generate one room code from the confusion-reduced alphabet.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Uppercase-normalise a user-supplied code for lookup.
fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// How long a FINISHED game lingers before reaping.
    pub finished_retention: Duration,
    /// Cadence of the background reaper.
    pub reap_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            finished_retention: FINISHED_RETENTION,
            reap_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not generate a unique room code after {CODE_GENERATION_RETRIES} attempts")]
    CodeSpaceExhausted,
    #[error("no live game with code `{0}`")]
    UnknownCode(String),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Concurrency-safe map of live game actors.
pub struct GameStore {
    catalog: Arc<Catalog>,
    abilities: Arc<dyn AbilityEngine>,
    write_through: Arc<dyn WriteThrough>,
    config: StoreConfig,
    games: RwLock<HashMap<GameId, GameHandle>>,
    codes: RwLock<HashMap<String, GameId>>,
    finished_notified: RwLock<HashSet<GameId>>,
}

impl GameStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            abilities: Arc::new(NoopAbilityEngine),
            write_through: Arc::new(NoPersistence),
            config: StoreConfig::default(),
            games: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            finished_notified: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_ability_engine(mut self, engine: Arc<dyn AbilityEngine>) -> Self {
        self.abilities = engine;
        self
    }

    pub fn with_write_through(mut self, write_through: Arc<dyn WriteThrough>) -> Self {
        self.write_through = write_through;
        self
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a game, spawn its actor, and return the host's credentials.
    pub async fn create_game(
        &self,
        host_name: &str,
    ) -> Result<(GameHandle, JoinedGame), StoreError> {
        // Codes are generated and reserved under one write lock so two
        // concurrent creates can never race into the same code.
        let mut codes = self.codes.write().await;
        let mut code = None;
        for _ in 0..CODE_GENERATION_RETRIES {
            let candidate = generate_room_code();
            if !codes.contains_key(&candidate) {
                code = Some(candidate);
                break;
            }
        }
        let code = code.ok_or(StoreError::CodeSpaceExhausted)?;

        let (actor, handle, joined) = GameActor::new(
            code.clone(),
            host_name,
            Arc::clone(&self.catalog),
            Arc::clone(&self.abilities),
        );
        codes.insert(code.clone(), handle.game_id());
        drop(codes);

        self.games
            .write()
            .await
            .insert(handle.game_id(), handle.clone());
        tokio::spawn(actor.run());
        info!("created game {code} ({})", handle.game_id());

        if let Ok(status) = handle.status().await {
            self.write_through.game_created(&status).await;
        }
        Ok((handle, joined))
    }

    /// Join by room code; accepts any case.
    pub async fn join_game(&self, code: &str, player_name: &str) -> Result<JoinedGame, StoreError> {
        let handle = self
            .handle_by_code(code)
            .await
            .ok_or_else(|| StoreError::UnknownCode(normalize_code(code)))?;
        Ok(handle.join(player_name).await?)
    }

    pub async fn handle(&self, game_id: GameId) -> Option<GameHandle> {
        self.games.read().await.get(&game_id).cloned()
    }

    pub async fn handle_by_code(&self, code: &str) -> Option<GameHandle> {
        let code = normalize_code(code);
        let game_id = *self.codes.read().await.get(&code)?;
        self.handle(game_id).await
    }

    pub async fn live_game_count(&self) -> usize {
        self.games.read().await.len()
    }

    /// Status of every live game (skips actors that already stopped).
    pub async fn statuses(&self) -> Vec<GameStatus> {
        let handles: Vec<GameHandle> = self.games.read().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(status) = handle.status().await {
                statuses.push(status);
            }
        }
        statuses
    }

    /// One reaper sweep: drop dead actors and finished games past their
    /// retention window. Returns how many games were removed.
    pub async fn reap_finished(&self) -> usize {
        let handles: Vec<GameHandle> = self.games.read().await.values().cloned().collect();
        let mut to_remove: Vec<(GameId, String)> = Vec::new();

        for handle in handles {
            if handle.is_closed() {
                to_remove.push((handle.game_id(), handle.code().to_string()));
                continue;
            }
            let Ok(status) = handle.status().await else {
                to_remove.push((handle.game_id(), handle.code().to_string()));
                continue;
            };
            if status.phase != Phase::Finished {
                continue;
            }
            if self.finished_notified.write().await.insert(status.id) {
                self.write_through.game_finished(&status).await;
            }
            let idle = chrono::Utc::now().signed_duration_since(status.updated_at);
            let retention = chrono::Duration::from_std(self.config.finished_retention)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
            if idle > retention {
                handle.close().await;
                to_remove.push((status.id, status.code.clone()));
            }
        }

        let removed = to_remove.len();
        if removed > 0 {
            let mut games = self.games.write().await;
            let mut codes = self.codes.write().await;
            let mut notified = self.finished_notified.write().await;
            for (game_id, code) in &to_remove {
                games.remove(game_id);
                codes.remove(code);
                notified.remove(game_id);
            }
            drop(codes);
            drop(games);
            drop(notified);
            for (game_id, code) in to_remove {
                info!("reaped game {code}");
                self.write_through.game_removed(game_id).await;
            }
        }
        removed
    }

    /// Background reaper loop; aborts with the returned handle.
    pub fn spawn_reaper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(store.config.reap_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let removed = store.reap_finished().await;
                if removed > 0 {
                    warn!("reaper removed {removed} game(s)");
                }
            }
        })
    }
}
