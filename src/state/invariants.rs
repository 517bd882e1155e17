//! State invariants - consistency checks that detect engine bugs.
//!
//! None of these should ever trigger from untrusted policy input: invalid
//! actions are rejected before they mutate anything. A violation means a
//! defect in the engine itself.

use std::collections::BTreeSet;

use crate::core::types::Coord;
use crate::state::game::CivGameState;

/// Invariant violation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

fn violation(message: String) -> InvariantViolation {
    InvariantViolation { message }
}

/// Check all state invariants.
///
/// Returns every violation found, or an empty list when the state is sound.
#[must_use]
pub fn check_invariants(state: &CivGameState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if state.grid.len() != state.grid_size
        || state.grid.iter().any(|row| row.len() != state.grid_size)
    {
        violations.push(violation(format!("grid is not {0}x{0}", state.grid_size)));
        return violations;
    }

    // Tile occupancy must agree with unit/city positions in both directions
    let mut occupied = BTreeSet::new();
    for (id, unit) in &state.units {
        if unit.hp == 0 || unit.hp > unit.max_hp {
            violations.push(violation(format!(
                "unit {} has hp {} outside (0, {}]",
                id, unit.hp, unit.max_hp
            )));
        }
        if !occupied.insert(unit.position) {
            violations.push(violation(format!("two units share tile {}", unit.position)));
        }
        match state.tile(unit.position) {
            Some(tile) if tile.unit_id.as_ref() == Some(id) => {}
            _ => violations.push(violation(format!(
                "unit {} at {} is not registered on its tile",
                id, unit.position
            ))),
        }
        if !unit.owner.is_barbarian() {
            let listed = state
                .civilizations
                .get(&unit.owner)
                .map(|c| c.units.contains(id))
                .unwrap_or(false);
            if !listed {
                violations.push(violation(format!(
                    "unit {} missing from owner {}'s unit list",
                    id, unit.owner
                )));
            }
        }
    }

    for (id, city) in &state.cities {
        match state.tile(city.position) {
            Some(tile) if tile.city_id.as_ref() == Some(id) => {}
            _ => violations.push(violation(format!(
                "city {} at {} is not registered on its tile",
                id, city.position
            ))),
        }
        if let Some(order) = &city.current_production {
            if order.progress > order.cost {
                violations.push(violation(format!(
                    "city {} production progress {} exceeds cost {}",
                    id, order.progress, order.cost
                )));
            }
        }
        if city.population == 0 {
            violations.push(violation(format!("city {} has zero population", id)));
        }
    }

    for tile in state.tiles() {
        let coord = Coord::new(tile.x, tile.y);
        if let Some(unit_id) = &tile.unit_id {
            if state.units.get(unit_id).map(|u| u.position) != Some(coord) {
                violations.push(violation(format!(
                    "tile {} references unit {} that is elsewhere or gone",
                    coord, unit_id
                )));
            }
        }
        if let Some(city_id) = &tile.city_id {
            if state.cities.get(city_id).map(|c| c.position) != Some(coord) {
                violations.push(violation(format!(
                    "tile {} references city {} that is elsewhere or gone",
                    coord, city_id
                )));
            }
        }
    }

    // Relationships are stored per civ but must agree pairwise
    for (a_id, a) in &state.civilizations {
        for (b_id, rel) in &a.relationships {
            let mirrored = state
                .civilizations
                .get(b_id)
                .map(|b| b.relationship(a_id));
            if mirrored != Some(*rel) {
                violations.push(violation(format!(
                    "relationship {}->{} is {:?} but reverse is {:?}",
                    a_id, b_id, rel, mirrored
                )));
            }
        }
        for city_id in &a.cities {
            if state.cities.get(city_id).map(|c| &c.owner) != Some(a_id) {
                violations.push(violation(format!(
                    "civ {} lists city {} it does not own",
                    a_id, city_id
                )));
            }
        }
        for unit_id in &a.units {
            if state.units.get(unit_id).map(|u| &u.owner) != Some(a_id) {
                violations.push(violation(format!(
                    "civ {} lists unit {} it does not own",
                    a_id, unit_id
                )));
            }
        }
    }

    violations
}

/// Check invariants after a phase: panic in debug builds, log in release.
pub fn enforce_invariants(state: &CivGameState, context: &str) {
    let violations = check_invariants(state);
    if violations.is_empty() {
        return;
    }
    for v in &violations {
        tracing::error!(game = %state.id, turn = state.turn, "{} ({})", v, context);
    }
    if cfg!(debug_assertions) {
        panic!(
            "{} invariant violation(s) after {}: {}",
            violations.len(),
            context,
            violations[0]
        );
    }
}
