//! Fallback narration built from the turn's events

use crate::state::events::{TurnEvent, TurnEventKind};
use crate::state::game::CivGameState;

/// Events worth a sentence, most dramatic first
const HEADLINES: [TurnEventKind; 14] = [
    TurnEventKind::Victory,
    TurnEventKind::CivEliminated,
    TurnEventKind::CityCaptured,
    TurnEventKind::WarDeclared,
    TurnEventKind::PeaceMade,
    TurnEventKind::AllianceFormed,
    TurnEventKind::CityFounded,
    TurnEventKind::SpaceshipPartBuilt,
    TurnEventKind::GoldenAgeStarted,
    TurnEventKind::GreatPersonBorn,
    TurnEventKind::TechResearched,
    TurnEventKind::GovernmentChanged,
    TurnEventKind::BarbarianSpawned,
    TurnEventKind::BuildingCompleted,
];

const MAX_HEADLINES: usize = 6;

/// Summary of the turn; never empty
pub fn default_narration(state: &CivGameState, events: &[TurnEvent]) -> String {
    let mut lines = vec![format!("Turn {}.", state.turn)];

    let mut picked = 0;
    for kind in HEADLINES {
        for event in events.iter().filter(|e| e.kind == kind) {
            if picked == MAX_HEADLINES {
                break;
            }
            lines.push(format!("{}.", event.description.trim_end_matches('.')));
            picked += 1;
        }
    }

    let battles = events.iter().filter(|e| e.kind == TurnEventKind::Combat).count();
    if battles > 0 {
        lines.push(format!(
            "{} battle{} raged across the map.",
            battles,
            if battles == 1 { "" } else { "s" }
        ));
    }

    if picked == 0 && battles == 0 {
        let living = state.living_civs().len();
        lines.push(format!(
            "The {} civilizations tended their fields and watched their borders.",
            living
        ));
    }
    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConfig;
    use crate::core::types::CivId;
    use crate::rules::Ruleset;
    use crate::world::create_game;

    fn state() -> CivGameState {
        let rules = Ruleset::load_default().unwrap();
        let config = GameConfig::load_default().unwrap();
        create_game(1, 20, 16, &config, &rules).unwrap()
    }

    #[test]
    fn test_quiet_turn_still_narrated() {
        let state = state();
        let text = default_narration(&state, &[]);
        assert!(text.starts_with("Turn 1."));
        assert!(text.len() > "Turn 1.".len());
    }

    #[test]
    fn test_headlines_ordered_by_drama() {
        let state = state();
        let events = vec![
            TurnEvent::new(1, TurnEventKind::TechResearched, Some(CivId::new("rome")), "Rome discovered pottery"),
            TurnEvent::new(1, TurnEventKind::WarDeclared, Some(CivId::new("egypt")), "Egypt declared war on Rome"),
            TurnEvent::new(1, TurnEventKind::Combat, None, "skirmish"),
        ];
        let text = default_narration(&state, &events);
        let war = text.find("Egypt declared war").unwrap();
        let tech = text.find("Rome discovered pottery").unwrap();
        assert!(war < tech);
        assert!(text.contains("1 battle raged"));
    }
}
