//! Fog of war - per-civilization tile knowledge
//!
//! A civilization's knowledge is the set of `"x,y"` keys it has ever seen.
//! Knowledge only grows: nothing in the engine removes a key once revealed.

use crate::core::error::Result;
use crate::core::types::{CivId, Coord, Metric};
use crate::rules::Ruleset;
use crate::state::civilization::Civilization;
use crate::state::game::CivGameState;

/// Reveal every in-bounds tile within `radius` of `center`
///
/// Returns the number of tiles that were previously unknown.
pub fn reveal(civ: &mut Civilization, center: Coord, radius: u32, metric: Metric, grid_size: usize) -> usize {
    center
        .within(radius, metric, grid_size)
        .into_iter()
        .filter(|c| civ.known_tiles.insert(c.key()))
        .count()
}

/// The single definition of "known"
pub fn is_known(civ: &Civilization, coord: Coord) -> bool {
    civ.knows(coord)
}

/// Re-reveal around every city and unit the civilization owns
pub fn refresh_vision(state: &mut CivGameState, rules: &Ruleset, civ_id: &CivId) -> Result<usize> {
    let grid_size = state.grid_size;
    let bonus = rules.general.city_vision_bonus;

    let mut sources: Vec<(Coord, u32, Metric)> = Vec::new();
    {
        let civ = state.civ(civ_id)?;
        for city_id in &civ.cities {
            let city = state.city(city_id)?;
            sources.push((city.position, city.border_radius + bonus, Metric::Chebyshev));
        }
        for unit_id in &civ.units {
            let unit = state.unit(unit_id)?;
            let def = rules.unit(&unit.unit_type)?;
            sources.push((unit.position, def.vision, def.vision_metric));
        }
    }

    let civ = state.civ_mut(civ_id)?;
    Ok(sources
        .into_iter()
        .map(|(center, radius, metric)| reveal(civ, center, radius, metric, grid_size))
        .sum())
}

/// Refresh vision for every living civilization
pub fn refresh_all(state: &mut CivGameState, rules: &Ruleset) -> Result<()> {
    for civ_id in state.living_civs() {
        refresh_vision(state, rules, &civ_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConfig;
    use crate::world::create_game;

    fn game() -> (CivGameState, Ruleset) {
        let rules = Ruleset::load_default().unwrap();
        let config = GameConfig::load_default().unwrap();
        let state = create_game(11, 50, 20, &config, &rules).unwrap();
        (state, rules)
    }

    #[test]
    fn test_reveal_counts_only_new_tiles() {
        let (mut state, _) = game();
        let civ = state.civilizations.values_mut().next().unwrap();
        civ.known_tiles.clear();
        assert_eq!(reveal(civ, Coord::new(5, 5), 1, Metric::Chebyshev, 20), 9);
        assert_eq!(reveal(civ, Coord::new(5, 5), 1, Metric::Chebyshev, 20), 0);
        assert_eq!(reveal(civ, Coord::new(6, 5), 1, Metric::Chebyshev, 20), 3);
    }

    #[test]
    fn test_reveal_clips_at_edges() {
        let (mut state, _) = game();
        let civ = state.civilizations.values_mut().next().unwrap();
        civ.known_tiles.clear();
        assert_eq!(reveal(civ, Coord::new(0, 0), 2, Metric::Chebyshev, 20), 9);
        assert!(civ.known_tiles.iter().all(|k| Coord::from_key(k).unwrap().in_bounds(20)));
    }

    #[test]
    fn test_manhattan_vision_is_diamond() {
        let (mut state, _) = game();
        let civ = state.civilizations.values_mut().next().unwrap();
        civ.known_tiles.clear();
        reveal(civ, Coord::new(10, 10), 2, Metric::Manhattan, 20);
        assert!(is_known(civ, Coord::new(10, 12)));
        assert!(!is_known(civ, Coord::new(12, 12)));
    }

    #[test]
    fn test_starting_civs_know_their_surroundings() {
        let (state, _) = game();
        for civ in state.civilizations.values() {
            assert!(is_known(civ, civ.start_position));
            for unit_id in &civ.units {
                assert!(is_known(civ, state.units[unit_id].position));
            }
        }
    }

    #[test]
    fn test_refresh_never_forgets() {
        let (mut state, rules) = game();
        let civ_id = state.civ_order[0].clone();
        let before = state.civilizations[&civ_id].known_tiles.clone();
        let unit_id = state.civilizations[&civ_id].units[0].clone();
        state.remove_unit(&unit_id);
        refresh_vision(&mut state, &rules, &civ_id).unwrap();
        assert!(before.is_subset(&state.civilizations[&civ_id].known_tiles));
    }
}
