//! New game bootstrap: map, civilizations, capitals and starting units

use std::collections::BTreeMap;

use crate::actions::execute::{establish_city, spawn_unit};
use crate::core::config::GameConfig;
use crate::core::error::{CivError, Result};
use crate::core::types::{CivId, Coord, GreatPersonKind, Relationship};
use crate::fog;
use crate::rules::Ruleset;
use crate::state::civilization::{
    Civilization, GoldenAgeState, GreatPeopleState, ResearchState, SpaceshipState,
};
use crate::state::game::CivGameState;
use crate::world::generator::{generate, start_positions};

pub const MIN_GRID_SIZE: usize = 8;

/// Create a fully initialized game
///
/// Each civilization receives a capital on its start tile, its starting units
/// on adjacent land, claimed territory, starting gold and initial vision.
pub fn create_game(
    seed: u64,
    max_turns: u32,
    grid_size: usize,
    config: &GameConfig,
    rules: &Ruleset,
) -> Result<CivGameState> {
    if grid_size < MIN_GRID_SIZE {
        return Err(CivError::Generation(format!(
            "grid size {} is below the minimum of {}",
            grid_size, MIN_GRID_SIZE
        )));
    }
    if config.civilizations.len() < 2 {
        return Err(CivError::Generation("at least two civilizations are required".into()));
    }
    if max_turns == 0 {
        return Err(CivError::Generation("max turns must be positive".into()));
    }

    let starts = start_positions(grid_size, &config.civilizations);
    for (i, a) in starts.iter().enumerate() {
        if !a.in_bounds(grid_size) {
            return Err(CivError::Generation(format!("start {} is off the grid", a)));
        }
        if starts[..i].contains(a) {
            return Err(CivError::Generation(format!(
                "two civilizations share start {} on a {}x{} grid",
                a, grid_size, grid_size
            )));
        }
    }

    let grid = generate(seed, grid_size, config);
    let mut state = CivGameState::new(format!("game-{}", seed), seed, max_turns, grid);

    let ids: Vec<CivId> = config.civilizations.iter().map(|c| CivId::new(&c.id)).collect();
    for (def, start) in config.civilizations.iter().zip(&starts) {
        let id = CivId::new(&def.id);
        let relationships: BTreeMap<CivId, Relationship> = ids
            .iter()
            .filter(|other| **other != id)
            .map(|other| (other.clone(), Relationship::Neutral))
            .collect();
        let great_people = GreatPeopleState {
            thresholds: GreatPersonKind::ALL
                .iter()
                .map(|k| (*k, rules.great_person_threshold(*k)))
                .collect(),
            ..GreatPeopleState::default()
        };

        state.civ_order.push(id.clone());
        state.civilizations.insert(
            id.clone(),
            Civilization {
                id,
                name: def.name.clone(),
                leader: def.leader.clone(),
                gold: rules.general.starting_gold,
                cities: Vec::new(),
                units: Vec::new(),
                known_tiles: Default::default(),
                relationships,
                research: ResearchState::default(),
                golden_age: GoldenAgeState::default(),
                great_people,
                government: rules.general.default_government.clone(),
                anarchy_turns: 0,
                happiness: rules.general.base_happiness,
                war_weariness: 0,
                spaceship: SpaceshipState::default(),
                trade_routes: Vec::new(),
                combat_buff: None,
                alive: true,
                score: 0,
                start_position: *start,
                city_names: def.city_names.clone(),
            },
        );
    }

    for (civ_id, start) in ids.iter().zip(&starts) {
        let name = state
            .civ(civ_id)?
            .next_city_name(|n| state.cities.values().any(|c| c.name == n));
        establish_city(&mut state, rules, civ_id, *start, name)?;

        for unit_type in &rules.general.starting_units {
            let spot = free_neighbor(&state, rules, *start).ok_or_else(|| {
                CivError::Generation(format!("no free tile near {} for {}", start, unit_type))
            })?;
            spawn_unit(&mut state, rules, civ_id, unit_type, spot)?;
        }

        fog::refresh_vision(&mut state, rules, civ_id)?;
    }

    tracing::info!(
        game = %state.id,
        seed,
        grid_size,
        civs = state.civ_order.len(),
        "created game"
    );
    Ok(state)
}

/// First walkable, empty, city-free tile around `center`
fn free_neighbor(state: &CivGameState, rules: &Ruleset, center: Coord) -> Option<Coord> {
    center.neighbors(state.grid_size).into_iter().find(|c| {
        state.tile(*c).map_or(false, |t| {
            rules.terrain(t.terrain).passable && t.unit_id.is_none() && t.city_id.is_none()
        })
    })
}
