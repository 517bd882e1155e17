//! Integration tests for new games
//!
//! A new game must be fully reproducible from its seed and start every
//! civilization on equal footing: one capital, the starting units, claimed
//! territory and initial vision.

use civ_council::core::config::GameConfig;
use civ_council::core::error::CivError;
use civ_council::core::types::{CivId, Metric, Relationship};
use civ_council::rules::Ruleset;
use civ_council::state::check_invariants;
use civ_council::world::{create_game, MIN_GRID_SIZE};

fn setup() -> (GameConfig, Ruleset) {
    (GameConfig::load_default().unwrap(), Ruleset::load_default().unwrap())
}

#[test]
fn test_same_seed_same_world() {
    let (config, rules) = setup();
    let a = create_game(1234, 60, 24, &config, &rules).unwrap();
    let b = create_game(1234, 60, 24, &config, &rules).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_different_seed_different_terrain() {
    let (config, rules) = setup();
    let a = create_game(1, 60, 24, &config, &rules).unwrap();
    let b = create_game(2, 60, 24, &config, &rules).unwrap();
    let terrain = |s: &civ_council::state::CivGameState| s.tiles().map(|t| t.terrain).collect::<Vec<_>>();
    assert_ne!(terrain(&a), terrain(&b));
}

#[test]
fn test_every_civ_starts_with_capital_and_units() {
    let (config, rules) = setup();
    let state = create_game(77, 60, 24, &config, &rules).unwrap();

    assert_eq!(state.civ_order.len(), config.civilizations.len());
    for id in &state.civ_order {
        let civ = state.civ(id).unwrap();
        assert!(civ.alive);
        assert_eq!(civ.cities.len(), 1);
        assert_eq!(civ.units.len(), rules.general.starting_units.len());
        assert_eq!(civ.gold, rules.general.starting_gold);

        let capital = state.city(&civ.cities[0]).unwrap();
        assert!(capital.is_capital);
        assert!(capital.has_building(&rules.general.capital_building));
        assert!(civ.knows(capital.position));
        assert_eq!(state.tile(capital.position).unwrap().owner.as_ref(), Some(id));

        for unit_id in &civ.units {
            let unit = state.unit(unit_id).unwrap();
            assert!(unit.position.chebyshev(capital.position) <= 2);
            assert!(state.tile(unit.position).unwrap().terrain.is_land());
        }
    }
}

#[test]
fn test_start_relationships_are_neutral() {
    let (config, rules) = setup();
    let state = create_game(5, 60, 24, &config, &rules).unwrap();
    for a in &state.civ_order {
        for b in state.civ_order.iter().filter(|b| *b != a) {
            assert_eq!(state.relationship(a, b), Relationship::Neutral);
        }
    }
}

#[test]
fn test_capital_surroundings_are_known() {
    let (config, rules) = setup();
    let state = create_game(9, 60, 24, &config, &rules).unwrap();
    let rome = state.civ(&CivId::new("rome")).unwrap();
    let capital = state.city(&rome.cities[0]).unwrap();
    for coord in capital.position.within(1, Metric::Chebyshev, state.grid_size) {
        assert!(rome.knows(coord), "{} should be visible", coord);
    }
}

#[test]
fn test_new_game_satisfies_invariants() {
    let (config, rules) = setup();
    for seed in [3, 17, 512] {
        let state = create_game(seed, 60, 20, &config, &rules).unwrap();
        assert!(check_invariants(&state).is_empty(), "seed {}", seed);
    }
}

#[test]
fn test_tiny_grid_is_rejected() {
    let (config, rules) = setup();
    let result = create_game(1, 60, MIN_GRID_SIZE - 1, &config, &rules);
    assert!(matches!(result, Err(CivError::Generation(_))));
}
