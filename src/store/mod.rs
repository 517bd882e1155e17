//! Game persistence and the game service

pub mod service;

use ahash::AHashMap;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::error::Result;
use crate::state::game::CivGameState;
use crate::turn::phase::PhaseEvent;

pub use service::{GameHandle, GameService};

/// Where games are saved after every phase
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn save(&self, state: &CivGameState, event: PhaseEvent) -> Result<()>;

    /// `None` if no game with that id was ever saved
    async fn load(&self, id: &str) -> Result<Option<CivGameState>>;
}

/// Volatile store keeping the latest snapshot of each game
#[derive(Default)]
pub struct InMemoryStore {
    games: RwLock<AHashMap<String, CivGameState>>,
    history: RwLock<Vec<(String, u32, PhaseEvent)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every save so far as `(game id, turn, event)`
    pub async fn history(&self) -> Vec<(String, u32, PhaseEvent)> {
        self.history.read().await.clone()
    }
}

#[async_trait]
impl GameStore for InMemoryStore {
    async fn save(&self, state: &CivGameState, event: PhaseEvent) -> Result<()> {
        self.games.write().await.insert(state.id.clone(), state.clone());
        self.history.write().await.push((state.id.clone(), state.turn, event));
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<CivGameState>> {
        Ok(self.games.read().await.get(id).cloned())
    }
}
