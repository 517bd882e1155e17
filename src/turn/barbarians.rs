//! Barbarian spawning and behavior
//!
//! Barbarians appear periodically on unclaimed land away from cities. Each
//! turn every barbarian attacks an adjacent civilization unit or city if it
//! can, otherwise it closes in on the nearest one.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::actions::combat::{resolve_attack, target_at};
use crate::actions::execute::spawn_unit;
use crate::actions::movement::reachable;
use crate::core::error::Result;
use crate::core::types::{CivId, Coord, UnitId};
use crate::rules::Ruleset;
use crate::state::events::{TurnEvent, TurnEventKind};
use crate::state::game::CivGameState;
use crate::state::unit::AnimationHint;

/// Minimum distance between a spawn point and any city
const SPAWN_CITY_DISTANCE: u32 = 3;
/// Barbarians ignore targets farther away than this
const AGGRO_RANGE: u32 = 8;

pub fn spawn_due(rules: &Ruleset, turn: u32) -> bool {
    let general = &rules.general;
    turn >= general.barbarian_first_turn
        && (turn - general.barbarian_first_turn) % general.barbarian_spawn_interval.max(1) == 0
}

pub fn barbarian_units(state: &CivGameState) -> Vec<UnitId> {
    state
        .units
        .values()
        .filter(|u| u.owner.is_barbarian())
        .map(|u| u.id.clone())
        .collect()
}

/// Spawn (when due) and move every barbarian
pub fn run_barbarians(state: &mut CivGameState, rules: &Ruleset, rng: &mut ChaCha8Rng) -> Result<Vec<TurnEvent>> {
    let mut events = Vec::new();
    if spawn_due(rules, state.turn) {
        events.extend(spawn(state, rules, rng)?);
    }
    for id in barbarian_units(state) {
        if state.units.contains_key(&id) {
            events.extend(act(state, rules, &id, rng)?);
        }
    }
    Ok(events)
}

fn spawn_candidates(state: &CivGameState, rules: &Ruleset) -> Vec<Coord> {
    state
        .tiles()
        .filter(|t| t.owner.is_none() && t.unit_id.is_none() && t.city_id.is_none())
        .filter(|t| t.terrain.is_land() && rules.terrain(t.terrain).passable)
        .map(|t| t.coord())
        .filter(|c| {
            state
                .cities
                .values()
                .all(|city| city.position.chebyshev(*c) >= SPAWN_CITY_DISTANCE)
        })
        .collect()
}

fn spawn(state: &mut CivGameState, rules: &Ruleset, rng: &mut ChaCha8Rng) -> Result<Vec<TurnEvent>> {
    if barbarian_units(state).len() >= rules.general.barbarian_max_units {
        return Ok(Vec::new());
    }
    let candidates = spawn_candidates(state, rules);
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let position = candidates[rng.gen_range(0..candidates.len())];
    let id = spawn_unit(state, rules, &CivId::barbarians(), &rules.general.barbarian_unit, position)?;
    tracing::info!(unit = %id, position = %position, "barbarians spawned");
    Ok(vec![TurnEvent::new(
        state.turn,
        TurnEventKind::BarbarianSpawned,
        None,
        format!("Barbarians appeared at {}", position),
    )
    .at(position)])
}

/// Positions of every civilization unit and city, nearest first
fn targets_by_distance(state: &CivGameState, from: Coord) -> Vec<Coord> {
    let mut targets: Vec<Coord> = state
        .units
        .values()
        .filter(|u| !u.owner.is_barbarian())
        .map(|u| u.position)
        .chain(state.cities.values().map(|c| c.position))
        .filter(|c| c.chebyshev(from) <= AGGRO_RANGE)
        .collect();
    targets.sort_by_key(|c| (c.chebyshev(from), *c));
    targets
}

fn act(state: &mut CivGameState, rules: &Ruleset, id: &UnitId, rng: &mut ChaCha8Rng) -> Result<Vec<TurnEvent>> {
    let unit = state.unit(id)?.clone();
    if !unit.can_act() {
        return Ok(Vec::new());
    }

    let adjacent = unit
        .position
        .neighbors(state.grid_size)
        .into_iter()
        .filter(|c| matches!(target_at(state, *c), Some((_, owner)) if !owner.is_barbarian()))
        .min_by_key(|c| {
            state
                .unit_at(*c)
                .map(|u| u.hp)
                .or_else(|| state.city_at(*c).map(|city| city.hp))
                .unwrap_or(u32::MAX)
        });
    if let Some(coord) = adjacent {
        return resolve_attack(state, rules, id, coord, false, rng);
    }

    let Some(goal) = targets_by_distance(state, unit.position).first().copied() else {
        return Ok(Vec::new());
    };
    let options = reachable(state, rules, &unit.owner, unit.position, unit.movement_left);
    let Some((dest, cost)) = options
        .into_iter()
        .min_by_key(|(c, cost)| (c.chebyshev(goal), *cost, *c))
    else {
        return Ok(Vec::new());
    };
    if dest == unit.position || dest.chebyshev(goal) >= unit.position.chebyshev(goal) {
        return Ok(Vec::new());
    }

    state.relocate_unit(id, dest);
    if let Some(moved) = state.units.get_mut(id) {
        moved.movement_left = moved.movement_left.saturating_sub(cost);
        moved.fortified = false;
        moved.animation = Some(AnimationHint {
            kind: "move".into(),
            from: unit.position,
            to: dest,
        });
    }
    Ok(vec![TurnEvent::new(
        state.turn,
        TurnEventKind::UnitMoved,
        None,
        format!("Barbarians advanced to {}", dest),
    )
    .at(dest)])
}
