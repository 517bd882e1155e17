//! Integration tests for the serialized form
//!
//! A game mid-play must survive a JSON round trip exactly, and the wire
//! shape must use plain string ids, camelCase fields and sets as arrays.

use civ_council::core::config::GameConfig;
use civ_council::rules::Ruleset;
use civ_council::state::CivGameState;
use civ_council::turn::advance_turn_local;
use civ_council::world::create_game;

fn played_game(turns: usize) -> CivGameState {
    let config = GameConfig::load_default().unwrap();
    let rules = Ruleset::load_default().unwrap();
    let mut state = create_game(99, 60, 20, &config, &rules).unwrap();
    for _ in 0..turns {
        advance_turn_local(&mut state, &rules).unwrap();
    }
    state
}

#[test]
fn test_round_trip_after_play() {
    let state = played_game(12);
    let json = serde_json::to_string(&state).unwrap();
    let restored: CivGameState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);
    assert_eq!(serde_json::to_string(&restored).unwrap(), json);
}

#[test]
fn test_restored_game_continues_identically() {
    let rules = Ruleset::load_default().unwrap();
    let mut original = played_game(5);
    let mut restored: CivGameState =
        serde_json::from_str(&serde_json::to_string(&original).unwrap()).unwrap();

    for _ in 0..3 {
        advance_turn_local(&mut original, &rules).unwrap();
        advance_turn_local(&mut restored, &rules).unwrap();
    }
    assert_eq!(original, restored);
}

#[test]
fn test_wire_shape() {
    let state = played_game(1);
    let value = serde_json::to_value(&state).unwrap();

    assert!(value["gridSize"].is_number());
    assert!(value["civOrder"].is_array());
    assert_eq!(value["phase"], "idle");

    let rome = &value["civilizations"]["rome"];
    assert!(rome["knownTiles"].is_array());
    assert!(rome["knownTiles"][0].is_string());
    assert!(rome["research"]["researched"].is_array());
    assert!(rome["cities"][0].is_string());

    let (unit_id, unit) = value["units"].as_object().unwrap().iter().next().unwrap();
    assert!(unit_id.starts_with("unit-"));
    assert!(unit["movementLeft"].is_number());
}
