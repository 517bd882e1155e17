//! Phase notifications published to subscribers
//!
//! Serialized as `{"type": "<event>", "data": <game state>}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::game::CivGameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEvent {
    GameCreated,
    DiplomacyStart,
    DiplomacyComplete,
    PlanningStart,
    PlanningComplete,
    ResolutionComplete,
    NarrationComplete,
    TurnComplete,
}

/// One phase boundary and the full game state as it stood there.
///
/// The state is shared behind an `Arc` so every subscriber reads the same
/// snapshot without touching the turn lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseUpdate {
    #[serde(rename = "type")]
    pub event: PhaseEvent,
    pub data: Arc<CivGameState>,
}

impl PhaseUpdate {
    pub fn from_state(state: &CivGameState, event: PhaseEvent) -> Self {
        Self {
            event,
            data: Arc::new(state.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConfig;
    use crate::rules::Ruleset;
    use crate::world::create_game;

    #[test]
    fn test_update_wire_shape() {
        let rules = Ruleset::load_default().unwrap();
        let config = GameConfig::load_default().unwrap();
        let state = create_game(2, 20, 16, &config, &rules).unwrap();

        let update = PhaseUpdate::from_state(&state, PhaseEvent::DiplomacyStart);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "diplomacy_start");
        assert_eq!(json["data"]["id"], state.id.as_str());
        assert_eq!(json["data"]["turn"], 1);
        assert_eq!(json["data"]["phase"], "idle");
        assert!(json["data"]["grid"].is_array());
        assert!(json["data"]["units"].is_object());
        assert!(json["data"]["civilizations"]["rome"].is_object());

        let restored: PhaseUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(*restored.data, state);
    }

    #[test]
    fn test_event_names() {
        let names: Vec<String> = [
            PhaseEvent::DiplomacyStart,
            PhaseEvent::DiplomacyComplete,
            PhaseEvent::PlanningStart,
            PhaseEvent::PlanningComplete,
            PhaseEvent::ResolutionComplete,
            PhaseEvent::NarrationComplete,
            PhaseEvent::TurnComplete,
        ]
        .iter()
        .map(|e| serde_json::to_value(e).unwrap().as_str().unwrap().to_string())
        .collect();
        assert_eq!(
            names,
            [
                "diplomacy_start",
                "diplomacy_complete",
                "planning_start",
                "planning_complete",
                "resolution_complete",
                "narration_complete",
                "turn_complete"
            ]
        );
    }
}
