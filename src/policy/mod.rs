//! Decision providers
//!
//! The orchestrator asks a `PolicyProvider` three things each turn: which
//! diplomatic messages a civilization sends, which actions it plans, and how
//! the turn should be narrated. Providers may be slow or wrong; the
//! orchestrator bounds every call with a timeout and validates everything
//! they return, so an implementation never needs to be trusted.

pub mod heuristic;
pub mod llm;
pub mod local;
pub mod scripted;

use async_trait::async_trait;

use crate::actions::Action;
use crate::core::error::Result;
use crate::core::types::CivId;
use crate::state::diplomacy::{DiplomacyMessage, OutgoingMessage};
use crate::state::events::TurnEvent;
use crate::state::game::CivGameState;

pub use llm::LlmPolicy;
pub use local::LocalPolicy;
pub use scripted::{Scripted, ScriptedPolicy};

/// Source of decisions for every civilization in a game
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// Messages `civ` sends this turn, given what it has received
    async fn diplomacy_messages(
        &self,
        civ: &CivId,
        state: &CivGameState,
        inbox: &[DiplomacyMessage],
    ) -> Result<Vec<OutgoingMessage>>;

    /// Actions `civ` wants to take, given this turn's diplomacy transcript
    async fn planned_actions(
        &self,
        civ: &CivId,
        state: &CivGameState,
        transcript: &[DiplomacyMessage],
    ) -> Result<Vec<Action>>;

    /// Prose summary of the turn
    async fn narration(&self, events: &[TurnEvent], state: &CivGameState) -> Result<String>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
