//! Score and victory conditions
//!
//! Checked in order: conquest (one civilization left), science (a complete
//! spaceship), score (turn limit reached, highest score wins, earlier roster
//! position wins ties).

use crate::core::types::{CivId, VictoryType};
use crate::state::events::{TurnEvent, TurnEventKind};
use crate::state::game::CivGameState;

pub fn compute_score(state: &CivGameState, civ: &CivId) -> i64 {
    let Some(civilization) = state.civilizations.get(civ) else {
        return 0;
    };
    let cities: Vec<_> = state.cities.values().filter(|c| &c.owner == civ).collect();
    let population: i64 = cities.iter().map(|c| c.population as i64).sum();
    let buildings: i64 = cities.iter().map(|c| c.buildings.len() as i64).sum();

    cities.len() as i64 * 10
        + population * 4
        + civilization.research.researched.len() as i64 * 6
        + buildings * 2
        + civilization.spaceship.count() as i64 * 25
        + civilization.golden_age.completed as i64 * 10
}

/// Decide the game if a victory condition holds
pub fn find_winner(state: &CivGameState) -> Option<(CivId, VictoryType)> {
    let living = state.living_civs();

    if state.civ_order.len() >= 2 && living.len() == 1 {
        return Some((living[0].clone(), VictoryType::Conquest));
    }

    if let Some(civ) = living.iter().find(|id| {
        state
            .civilizations
            .get(*id)
            .map(|c| c.spaceship.is_complete())
            .unwrap_or(false)
    }) {
        return Some((civ.clone(), VictoryType::Science));
    }

    if state.turn >= state.max_turns {
        let candidates = if living.is_empty() {
            state.civ_order.clone()
        } else {
            living
        };
        let mut best: Option<(CivId, i64)> = None;
        for civ in candidates {
            let score = state.civilizations.get(&civ).map(|c| c.score).unwrap_or(0);
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((civ, score));
            }
        }
        return best.map(|(civ, _)| (civ, VictoryType::Score));
    }

    None
}

/// Record the winner on the state and return the victory event
pub fn check_victory(state: &mut CivGameState) -> Option<TurnEvent> {
    if state.is_over() {
        return None;
    }
    let (winner, victory_type) = find_winner(state)?;
    let name = state
        .civilizations
        .get(&winner)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| winner.to_string());

    state.winner = Some(winner.clone());
    state.victory_type = Some(victory_type);
    tracing::info!(winner = %winner, victory = ?victory_type, turn = state.turn, "game decided");

    Some(TurnEvent::new(
        state.turn,
        TurnEventKind::Victory,
        Some(winner),
        format!("{} achieved a {:?} victory", name, victory_type).to_lowercase(),
    ))
}
