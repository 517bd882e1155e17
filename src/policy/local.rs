//! Deterministic in-process policy

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::Action;
use crate::core::error::Result;
use crate::core::types::CivId;
use crate::policy::heuristic::{plan_actions, plan_diplomacy};
use crate::policy::PolicyProvider;
use crate::rules::Ruleset;
use crate::state::diplomacy::{DiplomacyMessage, OutgoingMessage};
use crate::state::events::TurnEvent;
use crate::state::game::CivGameState;
use crate::turn::narration::default_narration;
use crate::turn::{derive_seed, PLAN_STREAM};

/// Heuristic policy needing no network; the planner behind `advance_turn_local`
pub struct LocalPolicy {
    rules: Arc<Ruleset>,
}

impl LocalPolicy {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }
}

/// Seed for `civ`'s plan this turn
pub fn plan_seed(state: &CivGameState, civ: &CivId) -> u64 {
    let index = state.civ_order.iter().position(|c| c == civ).unwrap_or(0);
    derive_seed(state.seed, state.turn, PLAN_STREAM, index as u64)
}

#[async_trait]
impl PolicyProvider for LocalPolicy {
    async fn diplomacy_messages(
        &self,
        civ: &CivId,
        state: &CivGameState,
        inbox: &[DiplomacyMessage],
    ) -> Result<Vec<OutgoingMessage>> {
        Ok(plan_diplomacy(state, &self.rules, civ, inbox))
    }

    async fn planned_actions(
        &self,
        civ: &CivId,
        state: &CivGameState,
        _transcript: &[DiplomacyMessage],
    ) -> Result<Vec<Action>> {
        Ok(plan_actions(state, &self.rules, civ, plan_seed(state, civ)))
    }

    async fn narration(&self, events: &[TurnEvent], state: &CivGameState) -> Result<String> {
        Ok(default_narration(state, events))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
