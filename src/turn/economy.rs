//! City economy: worked tiles, yields and defense
//!
//! A city always works its own tile plus its best `population` tiles inside
//! its borders. Tile output is terrain + resource + completed improvement.
//! Building output is added flat, then government and golden age modifiers
//! apply as percentages. Anarchy zeroes production and science.

use crate::core::error::Result;
use crate::core::types::{apply_pct, CityId, CivId, Coord, Metric, Yields};
use crate::rules::Ruleset;
use crate::state::city::City;
use crate::state::game::CivGameState;

/// Science generated by each citizen
pub const SCIENCE_PER_CITIZEN: i32 = 1;

/// Base defense of a city with the given buildings
pub fn city_defense(rules: &Ruleset, buildings: &[String]) -> i32 {
    rules.general.city_base_defense
        + buildings
            .iter()
            .filter_map(|b| rules.building(b).ok())
            .map(|b| b.defense)
            .sum::<i32>()
}

/// Output of a single tile
pub fn tile_yields(state: &CivGameState, rules: &Ruleset, coord: Coord) -> Yields {
    let Some(tile) = state.tile(coord) else {
        return Yields::default();
    };
    let mut yields = rules.terrain(tile.terrain).yields;
    if let Some(def) = tile.resource.and_then(|r| rules.resource(r)) {
        yields += def.yields;
    }
    if let Some(def) = tile
        .completed_improvement()
        .and_then(|kind| rules.improvement(kind).ok())
    {
        yields += def.yields;
    }
    yields
}

/// Tiles the city works this turn, center first
pub fn worked_tiles(state: &CivGameState, rules: &Ruleset, city: &City) -> Vec<Coord> {
    let mut candidates: Vec<(i32, i32, Coord)> = city
        .position
        .within(city.border_radius, Metric::Chebyshev, state.grid_size)
        .into_iter()
        .filter(|c| *c != city.position)
        .filter(|c| {
            state
                .tile(*c)
                .map(|t| t.owner.as_ref() == Some(&city.owner) && t.city_id.is_none())
                .unwrap_or(false)
        })
        .map(|c| {
            let y = tile_yields(state, rules, c);
            (y.food, y.total(), c)
        })
        .collect();

    // Food first so cities keep growing, then overall output; coordinates break ties
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

    let mut worked = vec![city.position];
    worked.extend(
        candidates
            .into_iter()
            .take(city.population as usize)
            .map(|(_, _, c)| c),
    );
    worked
}

/// Yields before government and golden age modifiers
pub fn base_city_yields(state: &CivGameState, rules: &Ruleset, city: &City) -> Yields {
    let mut yields = Yields::default();
    for coord in worked_tiles(state, rules, city) {
        yields += tile_yields(state, rules, coord);
    }
    for building in &city.buildings {
        if let Ok(def) = rules.building(building) {
            yields += def.yields;
        }
    }
    yields.science += SCIENCE_PER_CITIZEN * city.population as i32;
    yields
}

/// Recompute `city.yields` and city happiness from the current state
pub fn refresh_city_yields(state: &mut CivGameState, rules: &Ruleset, city_id: &CityId) -> Result<()> {
    let city = state.city(city_id)?;
    let mut yields = base_city_yields(state, rules, city);
    let civ = state.civ(&city.owner)?;
    let government = rules.government(&civ.government)?;

    yields.gold = apply_pct(yields.gold, government.gold_pct);
    yields.production = apply_pct(yields.production, government.production_pct);
    yields.science = apply_pct(yields.science, government.science_pct);

    if civ.golden_age.is_active() {
        yields.gold = apply_pct(yields.gold, rules.general.golden_age_yield_pct);
        yields.production = apply_pct(yields.production, rules.general.golden_age_yield_pct);
    }
    if civ.in_anarchy() {
        yields.production = 0;
        yields.science = 0;
    }

    let building_happiness: i32 = city
        .buildings
        .iter()
        .filter_map(|b| rules.building(b).ok())
        .map(|b| b.happiness)
        .sum();
    let happiness = building_happiness - city.population as i32 / 4;

    let city = state.city_mut(city_id)?;
    city.yields = yields;
    city.happiness = happiness;
    Ok(())
}

/// Recompute every city of `civ`
pub fn refresh_civ_yields(state: &mut CivGameState, rules: &Ruleset, civ: &CivId) -> Result<()> {
    let cities = state.civ(civ)?.cities.clone();
    for city_id in &cities {
        refresh_city_yields(state, rules, city_id)?;
    }
    Ok(())
}

/// Sum of current city yields for a civilization
pub fn civ_yields(state: &CivGameState, civ: &CivId) -> Yields {
    let mut total = Yields::default();
    for city in state.cities.values().filter(|c| &c.owner == civ) {
        total += city.yields;
    }
    total
}

/// Per-turn gold spent on units beyond the free allowance and on buildings
pub fn upkeep(state: &CivGameState, rules: &Ruleset, civ: &CivId) -> i64 {
    let units = state.units.values().filter(|u| &u.owner == civ).count();
    let unit_cost = units.saturating_sub(rules.general.free_units) as i64 * rules.general.unit_upkeep;
    let building_cost: i64 = state
        .cities
        .values()
        .filter(|c| &c.owner == civ)
        .flat_map(|c| c.buildings.iter())
        .filter_map(|b| rules.building(b).ok())
        .map(|b| b.maintenance)
        .sum();
    unit_cost + building_cost
}
