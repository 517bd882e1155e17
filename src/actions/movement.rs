//! Movement costs and bounded shortest paths

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::core::types::{CivId, Coord};
use crate::rules::Ruleset;
use crate::state::game::CivGameState;

/// Whether a unit of `owner` may enter `coord`
///
/// Water and impassable terrain block, as do other units and foreign cities.
pub fn can_enter(state: &CivGameState, rules: &Ruleset, owner: &CivId, coord: Coord) -> bool {
    let Some(tile) = state.tile(coord) else {
        return false;
    };
    if !rules.terrain(tile.terrain).passable || tile.unit_id.is_some() {
        return false;
    }
    match &tile.city_id {
        Some(city_id) => state.cities.get(city_id).map_or(false, |c| &c.owner == owner),
        None => true,
    }
}

/// Cost of entering `coord`: terrain cost, or one on a road
pub fn entry_cost(state: &CivGameState, rules: &Ruleset, coord: Coord) -> u32 {
    state
        .tile(coord)
        .map(|t| rules.move_cost(t.terrain, t.has_road()))
        .unwrap_or(u32::MAX)
}

/// Dijkstra from `from` over enterable tiles, never expanding past `budget`
///
/// Returns the cheapest known cost of every tile reached within the budget.
/// The origin itself is included at cost zero.
pub fn reachable(
    state: &CivGameState,
    rules: &Ruleset,
    owner: &CivId,
    from: Coord,
    budget: u32,
) -> BTreeMap<Coord, u32> {
    let mut best: BTreeMap<Coord, u32> = BTreeMap::new();
    let mut queue = BinaryHeap::new();
    best.insert(from, 0);
    queue.push(Reverse((0u32, from)));

    while let Some(Reverse((cost, coord))) = queue.pop() {
        if best.get(&coord).map_or(false, |b| cost > *b) {
            continue;
        }
        for next in coord.neighbors(state.grid_size) {
            if !can_enter(state, rules, owner, next) {
                continue;
            }
            let next_cost = cost.saturating_add(entry_cost(state, rules, next));
            if next_cost > budget {
                continue;
            }
            if best.get(&next).map_or(true, |b| next_cost < *b) {
                best.insert(next, next_cost);
                queue.push(Reverse((next_cost, next)));
            }
        }
    }
    best
}

/// Cheapest cost from `from` to `to`, or `None` if no path exists
pub fn path_cost(
    state: &CivGameState,
    rules: &Ruleset,
    owner: &CivId,
    from: Coord,
    to: Coord,
) -> Option<u32> {
    // Any simple path costs at most the worst terrain cost per tile
    let bound = rules
        .move_cost(crate::core::types::Terrain::Mountain, false)
        .max(4)
        .saturating_mul((state.grid_size * state.grid_size) as u32);
    reachable(state, rules, owner, from, bound).get(&to).copied()
}
