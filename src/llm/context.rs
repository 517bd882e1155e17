//! Gather a civilization's view of the game for LLM prompts
//!
//! Only what the civilization could know goes in: its own cities and units,
//! tiles it has revealed, and foreign units near its own holdings. The
//! summary is plain text; action and message formats are described by the
//! prompts in `policy::llm`.

use crate::core::error::Result;
use crate::core::types::{CivId, Coord, GreatPersonKind, Relationship};
use crate::rules::Ruleset;
use crate::state::diplomacy::DiplomacyMessage;
use crate::state::game::CivGameState;

/// How far from its own units and cities a civilization spots foreign units
const SIGHT: u32 = 3;
const MAX_NOTES: usize = 5;

pub struct CityView {
    pub id: String,
    pub name: String,
    pub position: Coord,
    pub population: u32,
    pub production: Option<String>,
    pub buildings: Vec<String>,
    pub hp: u32,
}

pub struct UnitView {
    pub id: String,
    pub unit_type: String,
    pub position: Coord,
    pub hp: u32,
    pub movement_left: u32,
    pub fortified: bool,
}

pub struct ForeignView {
    pub owner: String,
    pub kind: String,
    pub position: Coord,
}

/// A civilization's knowledge, ready for prompting
pub struct CivContext {
    pub civ_id: CivId,
    pub name: String,
    pub leader: String,
    pub turn: u32,
    pub max_turns: u32,
    pub grid_size: usize,
    pub gold: i64,
    pub government: String,
    pub anarchy_turns: u32,
    pub happiness: i32,
    pub war_weariness: i32,
    pub research: Option<(String, u32, u32)>,
    pub researched: Vec<String>,
    pub available_techs: Vec<String>,
    pub build_options: Vec<String>,
    pub governments: Vec<String>,
    pub great_people: Vec<GreatPersonKind>,
    pub cities: Vec<CityView>,
    pub units: Vec<UnitView>,
    pub relationships: Vec<(CivId, Relationship)>,
    pub foreign: Vec<ForeignView>,
    pub known_tiles: usize,
    pub notes: Vec<String>,
}

impl CivContext {
    pub fn build(state: &CivGameState, rules: &Ruleset, civ_id: &CivId) -> Result<Self> {
        let civ = state.civ(civ_id)?;
        let has = |tech: &Option<String>| tech.as_ref().map_or(true, |t| civ.research.has(t));

        let cities: Vec<CityView> = civ
            .cities
            .iter()
            .filter_map(|id| state.cities.get(id))
            .map(|c| CityView {
                id: c.id.to_string(),
                name: c.name.clone(),
                position: c.position,
                population: c.population,
                production: c
                    .current_production
                    .as_ref()
                    .map(|o| format!("{} {}/{}", o.target, o.progress, o.cost)),
                buildings: c.buildings.clone(),
                hp: c.hp,
            })
            .collect();

        let units: Vec<UnitView> = civ
            .units
            .iter()
            .filter_map(|id| state.units.get(id))
            .map(|u| UnitView {
                id: u.id.to_string(),
                unit_type: u.unit_type.clone(),
                position: u.position,
                hp: u.hp,
                movement_left: u.movement_left,
                fortified: u.fortified,
            })
            .collect();

        let watch_points: Vec<Coord> = cities
            .iter()
            .map(|c| c.position)
            .chain(units.iter().map(|u| u.position))
            .collect();
        let near = |p: Coord| watch_points.iter().any(|w| w.chebyshev(p) <= SIGHT);

        let mut foreign: Vec<ForeignView> = state
            .units
            .values()
            .filter(|u| &u.owner != civ_id && near(u.position))
            .map(|u| ForeignView {
                owner: u.owner.to_string(),
                kind: u.unit_type.clone(),
                position: u.position,
            })
            .collect();
        foreign.extend(
            state
                .cities
                .values()
                .filter(|c| &c.owner != civ_id && civ.knows(c.position))
                .map(|c| ForeignView {
                    owner: c.owner.to_string(),
                    kind: format!("city {} ({}) size {}", c.name, c.id, c.population),
                    position: c.position,
                }),
        );

        let available_techs = rules
            .techs()
            .filter(|t| !civ.research.has(&t.id))
            .filter(|t| t.prerequisites.iter().all(|p| civ.research.has(p)))
            .map(|t| format!("{} ({})", t.id, t.cost))
            .collect();

        let build_options = rules
            .units()
            .filter(|u| has(&u.requires))
            .map(|u| format!("{} ({})", u.id, u.cost))
            .chain(
                rules
                    .buildings()
                    .filter(|b| b.buildable && has(&b.requires))
                    .map(|b| format!("{} ({})", b.id, b.cost)),
            )
            .collect();

        let governments = rules
            .governments()
            .filter(|g| has(&g.requires))
            .map(|g| g.id.clone())
            .collect();

        let notes = state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.civ_id.as_ref().map_or(true, |c| c == civ_id))
            .take(MAX_NOTES)
            .map(|n| format!("turn {}: {}", n.turn, n.message))
            .collect();

        Ok(Self {
            civ_id: civ_id.clone(),
            name: civ.name.clone(),
            leader: civ.leader.clone(),
            turn: state.turn,
            max_turns: state.max_turns,
            grid_size: state.grid_size,
            gold: civ.gold,
            government: civ.government.clone(),
            anarchy_turns: civ.anarchy_turns,
            happiness: civ.happiness,
            war_weariness: civ.war_weariness,
            research: civ
                .research
                .current
                .as_ref()
                .map(|t| (t.clone(), civ.research.progress, civ.research.cost)),
            researched: civ.research.researched.iter().cloned().collect(),
            available_techs,
            build_options,
            governments,
            great_people: civ.great_people.available.clone(),
            cities,
            units,
            relationships: state
                .living_civs()
                .into_iter()
                .filter(|other| other != civ_id)
                .map(|other| {
                    let r = civ.relationship(&other);
                    (other, r)
                })
                .collect(),
            foreign,
            known_tiles: civ.known_tiles.len(),
            notes,
        })
    }

    /// Text summary for the prompt
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str(&format!(
            "You lead {} ({}) as {}. Turn {} of {}. Map {}x{}, {} tiles explored.\n",
            self.name, self.civ_id, self.leader, self.turn, self.max_turns, self.grid_size, self.grid_size, self.known_tiles
        ));
        s.push_str(&format!(
            "Gold {}, happiness {}, war weariness {}, government {}",
            self.gold, self.happiness, self.war_weariness, self.government
        ));
        if self.anarchy_turns > 0 {
            s.push_str(&format!(" (anarchy for {} more turns)", self.anarchy_turns));
        }
        s.push('\n');

        match &self.research {
            Some((tech, progress, cost)) => s.push_str(&format!("Researching {} ({}/{})\n", tech, progress, cost)),
            None => s.push_str("Not researching anything\n"),
        }
        if !self.researched.is_empty() {
            s.push_str(&format!("Known techs: {}\n", self.researched.join(", ")));
        }
        s.push_str(&format!("Available techs: {}\n", self.available_techs.join(", ")));
        s.push_str(&format!("Can build: {}\n", self.build_options.join(", ")));
        s.push_str(&format!("Governments: {}\n", self.governments.join(", ")));
        if !self.great_people.is_empty() {
            let names: Vec<String> = self
                .great_people
                .iter()
                .map(|k| format!("{:?}", k).to_lowercase())
                .collect();
            s.push_str(&format!("Great people ready: {}\n", names.join(", ")));
        }

        s.push_str("\nCities:\n");
        for c in &self.cities {
            s.push_str(&format!(
                "- {} \"{}\" at ({},{}) size {} hp {} building {} [{}]\n",
                c.id,
                c.name,
                c.position.x,
                c.position.y,
                c.population,
                c.hp,
                c.production.as_deref().unwrap_or("nothing"),
                c.buildings.join(", ")
            ));
        }

        s.push_str("\nUnits:\n");
        for u in &self.units {
            s.push_str(&format!(
                "- {} {} at ({},{}) hp {} moves {}{}\n",
                u.id,
                u.unit_type,
                u.position.x,
                u.position.y,
                u.hp,
                u.movement_left,
                if u.fortified { " fortified" } else { "" }
            ));
        }

        if !self.relationships.is_empty() {
            s.push_str("\nRelations:\n");
            for (civ, r) in &self.relationships {
                s.push_str(&format!("- {}: {:?}\n", civ, r).to_lowercase());
            }
        }

        if !self.foreign.is_empty() {
            s.push_str("\nSighted:\n");
            for f in &self.foreign {
                s.push_str(&format!("- {} {} at ({},{})\n", f.owner, f.kind, f.position.x, f.position.y));
            }
        }

        if !self.notes.is_empty() {
            s.push_str("\nRecent Events:\n");
            for note in &self.notes {
                s.push_str(&format!("- {}\n", note));
            }
        }

        s
    }
}

/// Render diplomacy messages for a prompt
pub fn transcript(messages: &[DiplomacyMessage]) -> String {
    if messages.is_empty() {
        return "(no messages)\n".to_string();
    }
    let mut s = String::new();
    for m in messages {
        let to: String = m.to.clone().into();
        s.push_str(&format!("- [{}] {} -> {} ({:?}", m.id, m.from, to, m.kind).to_lowercase());
        if let Some(response) = m.response {
            s.push_str(&format!(", {:?}", response).to_lowercase());
        }
        s.push_str(&format!("): {}\n", m.content));
    }
    s
}
