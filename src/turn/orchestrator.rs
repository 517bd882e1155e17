//! Async turn orchestrator
//!
//! Drives one game through `diplomacy → planning → resolution → narration`
//! against a policy provider. Provider calls are bounded by the configured
//! budget; a failed, late or empty answer degrades that civilization only
//! (no messages, no actions, default narration). Nothing is rolled back once
//! applied.

use std::future::Future;
use std::sync::Arc;

use crate::actions::{execute, Action};
use crate::core::config::PolicyConfig;
use crate::core::error::Result;
use crate::core::types::CivId;
use crate::diplomacy::{inbox, resolve_message};
use crate::policy::PolicyProvider;
use crate::rules::Ruleset;
use crate::state::diplomacy::{DiplomacyMessage, OutgoingMessage};
use crate::state::game::{CivGameState, TurnPhase};
use crate::state::invariants::enforce_invariants;
use crate::store::GameHandle;
use crate::turn::end_of_turn::run_end_of_turn;
use crate::turn::narration::default_narration;
use crate::turn::phase::PhaseEvent;
use crate::turn::derive_seed;

pub struct TurnOrchestrator {
    policy: Arc<dyn PolicyProvider>,
    rules: Arc<Ruleset>,
    config: PolicyConfig,
}

impl TurnOrchestrator {
    pub fn new(policy: Arc<dyn PolicyProvider>, rules: Arc<Ruleset>, config: PolicyConfig) -> Self {
        Self { policy, rules, config }
    }

    /// Run one full turn, waiting for any turn already in progress
    pub async fn advance_turn(&self, handle: &GameHandle) -> Result<()> {
        let mut state = handle.lock().await;
        self.run_turn(&mut state, Some(handle)).await
    }

    /// Run one full turn, or fail with `TurnInProgress` if one is running
    pub async fn try_advance_turn(&self, handle: &GameHandle) -> Result<()> {
        let mut state = handle.try_lock()?;
        self.run_turn(&mut state, Some(handle)).await
    }

    /// Run one turn on `state`, publishing phases through `handle` if given
    pub async fn run_turn(&self, state: &mut CivGameState, handle: Option<&GameHandle>) -> Result<()> {
        if state.is_over() {
            tracing::debug!(game = %state.id, "game is over; turn not advanced");
            return Ok(());
        }
        let turn = state.turn;
        tracing::info!(game = %state.id, turn, policy = self.policy.name(), "turn started");

        begin_turn(state);
        state.phase = TurnPhase::Diplomacy;
        publish(handle, state, PhaseEvent::DiplomacyStart).await;
        self.diplomacy_phase(state).await;
        enforce_invariants(state, "diplomacy");
        publish(handle, state, PhaseEvent::DiplomacyComplete).await;

        state.phase = TurnPhase::Planning;
        publish(handle, state, PhaseEvent::PlanningStart).await;
        let plans = self.planning_phase(state).await;
        publish(handle, state, PhaseEvent::PlanningComplete).await;

        state.phase = TurnPhase::Resolution;
        resolve_plans(state, &self.rules, &plans);
        let events = run_end_of_turn(state, &self.rules)?;
        state.record_events(&events);
        enforce_invariants(state, "resolution");
        publish(handle, state, PhaseEvent::ResolutionComplete).await;

        state.phase = TurnPhase::Narration;
        state.narration = self.narrate(state).await;
        publish(handle, state, PhaseEvent::NarrationComplete).await;

        finish_turn(state);
        enforce_invariants(state, "turn");
        publish(handle, state, PhaseEvent::TurnComplete).await;
        Ok(())
    }

    async fn diplomacy_phase(&self, state: &mut CivGameState) {
        for civ in state.living_civs() {
            let inbox = inbox(state, &civ);
            let drafts = self
                .guarded(&civ, "diplomacy", self.policy.diplomacy_messages(&civ, state, &inbox))
                .await
                .unwrap_or_default();
            let drafts = cap(drafts, self.config.max_messages_per_turn, &civ, "messages");
            resolve_drafts(state, &civ, drafts);
        }
    }

    async fn planning_phase(&self, state: &CivGameState) -> Vec<(CivId, Vec<Action>)> {
        let mut plans = Vec::new();
        for civ in state.living_civs() {
            let transcript = transcript_for(state, &civ);
            let actions = self
                .guarded(&civ, "planning", self.policy.planned_actions(&civ, state, &transcript))
                .await
                .unwrap_or_default();
            let actions = cap(actions, self.config.max_actions_per_turn, &civ, "actions");
            tracing::debug!(civ = %civ, actions = actions.len(), "plan received");
            plans.push((civ, actions));
        }
        plans
    }

    async fn narrate(&self, state: &CivGameState) -> String {
        let narration = match tokio::time::timeout(
            self.config.call_budget(),
            self.policy.narration(&state.turn_events, state),
        )
        .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "narration failed; using default");
                None
            }
            Err(_) => {
                tracing::warn!("narration timed out; using default");
                None
            }
        };
        narration
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| default_narration(state, &state.turn_events))
    }

    /// Await a provider call within the budget; `None` on error or timeout
    async fn guarded<T, F>(&self, civ: &CivId, call: &'static str, future: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.call_budget(), future).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(civ = %civ, call, policy = self.policy.name(), error = %e, "policy call failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    civ = %civ,
                    call,
                    policy = self.policy.name(),
                    budget_ms = self.config.call_budget().as_millis() as u64,
                    "policy call timed out"
                );
                None
            }
        }
    }
}

fn cap<T>(mut items: Vec<T>, max: usize, civ: &CivId, what: &str) -> Vec<T> {
    if items.len() > max {
        tracing::debug!(civ = %civ, got = items.len(), max, "dropping excess {}", what);
        items.truncate(max);
    }
    items
}

/// This turn's messages sent by or visible to `civ`
pub(crate) fn transcript_for(state: &CivGameState, civ: &CivId) -> Vec<DiplomacyMessage> {
    state
        .diplomacy_log
        .iter()
        .filter(|m| m.turn == state.turn)
        .filter(|m| &m.from == civ || m.to.includes(civ))
        .cloned()
        .collect()
}

/// Clear the previous turn's output
pub(crate) fn begin_turn(state: &mut CivGameState) {
    state.turn_events.clear();
    state.narration.clear();
}

/// Run each draft through the diplomacy resolver; invalid drafts are dropped
pub(crate) fn resolve_drafts(state: &mut CivGameState, civ: &CivId, drafts: Vec<OutgoingMessage>) {
    for draft in drafts {
        let kind = draft.kind;
        match resolve_message(state, civ, draft) {
            Ok(events) => state.record_events(&events),
            Err(rejection) => {
                tracing::debug!(civ = %civ, ?kind, %rejection, "dropping diplomacy draft");
            }
        }
    }
}

/// Execute every plan in order with per-action seeds
pub(crate) fn resolve_plans(state: &mut CivGameState, rules: &Ruleset, plans: &[(CivId, Vec<Action>)]) {
    for (civ, actions) in plans {
        let civ_index = state.civ_order.iter().position(|c| c == civ).unwrap_or(0) as u64;
        for (i, action) in actions.iter().enumerate() {
            let seed = derive_seed(state.seed, state.turn, civ_index, i as u64);
            let events = execute(state, rules, action, civ, seed);
            state.record_events(&events);
        }
    }
}

/// Close the turn: the counter moves on even when a winner was just decided
pub(crate) fn finish_turn(state: &mut CivGameState) {
    state.turn += 1;
    state.phase = TurnPhase::Idle;
    if let (Some(winner), Some(kind)) = (&state.winner, state.victory_type) {
        tracing::info!(game = %state.id, winner = %winner, victory = ?kind, "game over");
    }
}

/// Save and broadcast a phase; a failed save is logged and the turn goes on
async fn publish(handle: Option<&GameHandle>, state: &CivGameState, event: PhaseEvent) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(e) = handle.update_game(state, event).await {
        tracing::warn!(game = %state.id, turn = state.turn, ?event, error = %e, "failed to save phase");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConfig;
    use crate::policy::{LocalPolicy, Scripted, ScriptedPolicy};
    use crate::world::create_game;

    fn setup() -> (CivGameState, Arc<Ruleset>, PolicyConfig) {
        let rules = Arc::new(Ruleset::load_default().unwrap());
        let config = GameConfig::load_default().unwrap();
        let state = create_game(21, 60, 20, &config, &rules).unwrap();
        let policy = PolicyConfig {
            timeout_ms: 50,
            retries: 0,
            ..config.policy
        };
        (state, rules, policy)
    }

    #[tokio::test]
    async fn test_turn_advances_and_returns_to_idle() {
        let (mut state, rules, config) = setup();
        let orchestrator = TurnOrchestrator::new(Arc::new(LocalPolicy::new(rules.clone())), rules, config);
        orchestrator.run_turn(&mut state, None).await.unwrap();
        assert_eq!(state.turn, 2);
        assert_eq!(state.phase, TurnPhase::Idle);
        assert!(!state.narration.is_empty());
    }

    #[tokio::test]
    async fn test_failing_policy_degrades() {
        let (mut state, rules, config) = setup();
        let policy = ScriptedPolicy::new();
        let rome = CivId::new("rome");
        policy
            .push_messages(&rome, Scripted::Fail("offline".into()))
            .push_actions(&rome, Scripted::Hang)
            .push_narration(Scripted::Fail("offline".into()));
        let orchestrator = TurnOrchestrator::new(Arc::new(policy), rules, config);

        orchestrator.run_turn(&mut state, None).await.unwrap();
        assert_eq!(state.turn, 2);
        assert!(state.narration.starts_with("Turn 1."));
    }

    #[tokio::test]
    async fn test_excess_actions_are_capped() {
        let (mut state, rules, config) = setup();
        let rome = CivId::new("rome");
        let capital = state.civ(&rome).unwrap().cities[0].clone();
        let build = |target: &str| Action::Build {
            city_id: capital.clone(),
            target: target.to_string(),
        };
        let mut actions: Vec<Action> = (0..config.max_actions_per_turn).map(|_| build("warrior")).collect();
        actions.push(build("monument"));

        let policy = ScriptedPolicy::new();
        policy.push_actions(&rome, Scripted::Reply(actions));
        let orchestrator = TurnOrchestrator::new(Arc::new(policy), rules, config);
        orchestrator.run_turn(&mut state, None).await.unwrap();

        let order = state.city(&capital).unwrap().current_production.clone();
        assert_eq!(order.map(|o| o.target), Some("warrior".to_string()));
    }

    #[tokio::test]
    async fn test_finished_game_is_untouched() {
        let (mut state, rules, config) = setup();
        state.winner = Some(CivId::new("rome"));
        let before = state.clone();
        let orchestrator = TurnOrchestrator::new(Arc::new(LocalPolicy::new(rules.clone())), rules, config);
        orchestrator.run_turn(&mut state, None).await.unwrap();
        assert_eq!(state, before);
    }
}
