//! Synchronous turn with the built-in planner
//!
//! Same phases as the orchestrator without a provider, a store or a
//! runtime. Used when no LLM is configured and as the reference path in
//! tests.

use crate::core::error::Result;
use crate::diplomacy::inbox;
use crate::policy::heuristic::{plan_actions, plan_diplomacy};
use crate::policy::local::plan_seed;
use crate::rules::Ruleset;
use crate::state::game::{CivGameState, TurnPhase};
use crate::state::invariants::enforce_invariants;
use crate::turn::end_of_turn::run_end_of_turn;
use crate::turn::narration::default_narration;
use crate::turn::orchestrator::{begin_turn, finish_turn, resolve_drafts, resolve_plans};

/// Advance `state` by one turn; a no-op once the game has a winner
pub fn advance_turn_local(state: &mut CivGameState, rules: &Ruleset) -> Result<()> {
    if state.is_over() {
        return Ok(());
    }
    begin_turn(state);

    state.phase = TurnPhase::Diplomacy;
    for civ in state.living_civs() {
        let inbox = inbox(state, &civ);
        let drafts = plan_diplomacy(state, rules, &civ, &inbox);
        resolve_drafts(state, &civ, drafts);
    }
    enforce_invariants(state, "diplomacy");

    state.phase = TurnPhase::Planning;
    let plans: Vec<_> = state
        .living_civs()
        .into_iter()
        .map(|civ| {
            let actions = plan_actions(state, rules, &civ, plan_seed(state, &civ));
            (civ, actions)
        })
        .collect();

    state.phase = TurnPhase::Resolution;
    resolve_plans(state, rules, &plans);
    let events = run_end_of_turn(state, rules)?;
    state.record_events(&events);
    enforce_invariants(state, "resolution");

    state.phase = TurnPhase::Narration;
    state.narration = default_narration(state, &state.turn_events);

    finish_turn(state);
    enforce_invariants(state, "turn");
    tracing::debug!(game = %state.id, turn = state.turn, "local turn complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConfig;
    use crate::core::types::CivId;
    use crate::world::create_game;

    fn setup(seed: u64) -> (CivGameState, Ruleset) {
        let rules = Ruleset::load_default().unwrap();
        let config = GameConfig::load_default().unwrap();
        let state = create_game(seed, 40, 20, &config, &rules).unwrap();
        (state, rules)
    }

    #[test]
    fn test_local_turn_is_deterministic() {
        let (mut a, rules) = setup(8);
        let mut b = a.clone();
        for _ in 0..5 {
            advance_turn_local(&mut a, &rules).unwrap();
            advance_turn_local(&mut b, &rules).unwrap();
        }
        assert_eq!(a, b);
        assert_eq!(a.turn, 6);
    }

    #[test]
    fn test_local_turn_grows_the_empire() {
        let (mut state, rules) = setup(13);
        for _ in 0..15 {
            advance_turn_local(&mut state, &rules).unwrap();
        }
        let rome = state.civ(&CivId::new("rome")).unwrap();
        assert!(!rome.research.researched.is_empty());
        assert!(state.turn_events.len() + state.notifications.len() > 0);
        assert!(!state.narration.is_empty());
    }

    #[test]
    fn test_winner_freezes_the_game() {
        let (mut state, rules) = setup(2);
        state.winner = Some(CivId::new("egypt"));
        let before = state.clone();
        advance_turn_local(&mut state, &rules).unwrap();
        assert_eq!(state, before);
    }
}
