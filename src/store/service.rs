//! Running games and their subscribers
//!
//! A `GameHandle` owns one game's state behind an async mutex. Whoever holds
//! the lock owns the turn; every phase is saved and then broadcast to
//! subscribers through `update_game`.

use std::sync::Arc;

use ahash::AHashMap;
use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::core::config::GameConfig;
use crate::core::error::{CivError, Result};
use crate::policy::PolicyProvider;
use crate::rules::Ruleset;
use crate::state::game::CivGameState;
use crate::store::GameStore;
use crate::turn::phase::{PhaseEvent, PhaseUpdate};
use crate::turn::TurnOrchestrator;
use crate::world::create_game;

/// Buffered phase updates per game before slow subscribers start lagging
const UPDATE_CAPACITY: usize = 64;

pub struct GameHandle {
    id: String,
    state: Mutex<CivGameState>,
    updates: broadcast::Sender<PhaseUpdate>,
    store: Arc<dyn GameStore>,
}

impl GameHandle {
    pub fn new(state: CivGameState, store: Arc<dyn GameStore>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            id: state.id.clone(),
            state: Mutex::new(state),
            updates,
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for exclusive access to the game
    pub async fn lock(&self) -> MutexGuard<'_, CivGameState> {
        self.state.lock().await
    }

    /// Exclusive access, or `TurnInProgress` if someone else holds it
    pub fn try_lock(&self) -> Result<MutexGuard<'_, CivGameState>> {
        self.state
            .try_lock()
            .map_err(|_| CivError::TurnInProgress(self.id.clone()))
    }

    /// Copy of the current state; waits for a running turn to finish
    pub async fn snapshot(&self) -> CivGameState {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseUpdate> {
        self.updates.subscribe()
    }

    /// Save the state and publish the phase to subscribers.
    ///
    /// Subscribers are notified even when the save fails; the save error is
    /// still returned.
    pub async fn update_game(&self, state: &CivGameState, event: PhaseEvent) -> Result<()> {
        let saved = self.store.save(state, event).await;
        // No subscribers is fine
        let _ = self.updates.send(PhaseUpdate::from_state(state, event));
        tracing::debug!(game = %state.id, turn = state.turn, ?event, "phase update");
        saved
    }
}

/// Entry point for creating, finding and driving games
pub struct GameService {
    store: Arc<dyn GameStore>,
    rules: Arc<Ruleset>,
    config: GameConfig,
    games: RwLock<AHashMap<String, Arc<GameHandle>>>,
}

impl GameService {
    pub fn new(store: Arc<dyn GameStore>, rules: Arc<Ruleset>, config: GameConfig) -> Self {
        Self {
            store,
            rules,
            config,
            games: RwLock::new(AHashMap::new()),
        }
    }

    pub fn rules(&self) -> Arc<Ruleset> {
        self.rules.clone()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub async fn create_game(&self, seed: u64, max_turns: u32, grid_size: usize) -> Result<Arc<GameHandle>> {
        let mut state = create_game(seed, max_turns, grid_size, &self.config, &self.rules)?;
        state.id = Uuid::new_v4().to_string();

        let handle = Arc::new(GameHandle::new(state.clone(), self.store.clone()));
        handle.update_game(&state, PhaseEvent::GameCreated).await?;
        self.games.write().await.insert(state.id.clone(), handle.clone());
        tracing::info!(game = %state.id, seed, grid_size, max_turns, "game created");
        Ok(handle)
    }

    /// A running game, or one restored from the store
    pub async fn get_game(&self, id: &str) -> Result<Arc<GameHandle>> {
        if let Some(handle) = self.games.read().await.get(id) {
            return Ok(handle.clone());
        }
        let state = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| CivError::GameNotFound(id.to_string()))?;

        let mut games = self.games.write().await;
        let handle = games
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(GameHandle::new(state, self.store.clone())));
        Ok(handle.clone())
    }

    pub async fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<PhaseUpdate>> {
        Ok(self.get_game(id).await?.subscribe())
    }

    pub fn orchestrator(&self, policy: Arc<dyn PolicyProvider>) -> TurnOrchestrator {
        TurnOrchestrator::new(policy, self.rules.clone(), self.config.policy.clone())
    }
}
