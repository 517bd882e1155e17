//! End-of-turn processing
//!
//! Runs once per turn after all planned actions resolved. Each living
//! civilization is processed in roster order:
//!
//! yields -> production -> growth -> borders -> treasury -> happiness ->
//! golden age -> anarchy -> trade routes -> research -> great people ->
//! combat buff -> score
//!
//! followed by the world-level steps: barbarians, unit refresh, city healing,
//! elimination, vision and the victory check.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::actions::execute::spawn_unit;
use crate::actions::movement::can_enter;
use crate::core::error::Result;
use crate::core::types::{CityId, CivId, Coord, GreatPersonKind, Relationship};
use crate::fog;
use crate::rules::Ruleset;
use crate::state::city::ProductionKind;
use crate::state::events::{TurnEvent, TurnEventKind};
use crate::state::game::CivGameState;
use crate::turn::{barbarians, derive_seed, economy, victory};

/// Seed stream reserved for barbarian decisions
const BARBARIAN_STREAM: u64 = 0xBA4B_A41A;

/// Run every end-of-turn step and return the events produced
pub fn run_end_of_turn(state: &mut CivGameState, rules: &Ruleset) -> Result<Vec<TurnEvent>> {
    let mut events = Vec::new();

    for civ in state.living_civs() {
        events.extend(process_civ(state, rules, &civ)?);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(state.seed, state.turn, BARBARIAN_STREAM, 0));
    events.extend(barbarians::run_barbarians(state, rules, &mut rng)?);

    refresh_units(state, rules);
    heal_cities(state, rules);
    events.extend(eliminate_defeated(state));
    fog::refresh_all(state, rules)?;

    for civ in state.living_civs() {
        let score = victory::compute_score(state, &civ);
        state.civ_mut(&civ)?.score = score;
    }
    if let Some(event) = victory::check_victory(state) {
        events.push(event);
    }

    tracing::debug!(turn = state.turn, events = events.len(), "end of turn processed");
    Ok(events)
}

fn process_civ(state: &mut CivGameState, rules: &Ruleset, civ: &CivId) -> Result<Vec<TurnEvent>> {
    let mut events = Vec::new();
    economy::refresh_civ_yields(state, rules, civ)?;

    let cities = state.civ(civ)?.cities.clone();
    for city_id in &cities {
        events.extend(complete_production(state, rules, city_id)?);
        events.extend(grow_city(state, rules, city_id)?);
        events.extend(expand_borders(state, rules, city_id)?);
    }

    // Totals are taken once so later steps see the same economy
    let totals = economy::civ_yields(state, civ);

    events.extend(settle_treasury(state, rules, civ, totals.gold as i64)?);
    update_happiness(state, rules, civ)?;
    events.extend(advance_golden_age(state, rules, civ)?);
    events.extend(advance_anarchy(state, civ)?);
    events.extend(collect_trade(state, civ)?);
    events.extend(advance_research(state, civ, totals.science.max(0) as u32)?);

    let contributions = [
        (GreatPersonKind::Scientist, totals.science),
        (GreatPersonKind::Engineer, totals.production),
        (GreatPersonKind::Merchant, totals.gold),
        (GreatPersonKind::Artist, totals.culture),
    ];
    events.extend(advance_great_people(state, rules, civ, &contributions)?);

    let civilization = state.civ_mut(civ)?;
    if let Some(buff) = civilization.combat_buff.as_mut() {
        buff.turns_remaining = buff.turns_remaining.saturating_sub(1);
        if buff.turns_remaining == 0 {
            civilization.combat_buff = None;
        }
    }

    Ok(events)
}

/// First free tile for a newly trained unit: the city itself, then neighbors
fn spawn_site(state: &CivGameState, rules: &Ruleset, owner: &CivId, city_pos: Coord) -> Option<Coord> {
    if can_enter(state, rules, owner, city_pos) {
        return Some(city_pos);
    }
    city_pos
        .neighbors(state.grid_size)
        .into_iter()
        .find(|c| can_enter(state, rules, owner, *c))
}

fn complete_production(state: &mut CivGameState, rules: &Ruleset, city_id: &CityId) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let (owner, position, name, production) = {
        let city = state.city(city_id)?;
        (
            city.owner.clone(),
            city.position,
            city.name.clone(),
            city.yields.production.max(0) as u32,
        )
    };

    let Some(order) = state.city_mut(city_id)?.current_production.as_mut() else {
        return Ok(Vec::new());
    };
    order.advance(production);
    if !order.is_complete() {
        return Ok(Vec::new());
    }
    let order = order.clone();

    let mut events = Vec::new();
    match order.kind {
        ProductionKind::Unit => {
            // A finished unit waits in the queue until there is room for it
            let Some(site) = spawn_site(state, rules, &owner, position) else {
                tracing::debug!(city = %city_id, unit = %order.target, "no room to place unit");
                return Ok(events);
            };
            spawn_unit(state, rules, &owner, &order.target, site)?;
            state.city_mut(city_id)?.current_production = None;
            events.push(
                TurnEvent::new(
                    turn,
                    TurnEventKind::UnitCreated,
                    Some(owner.clone()),
                    format!("{} trained a {}", name, order.target),
                )
                .at(site),
            );
        }
        ProductionKind::Building => {
            let def = rules.building(&order.target)?;
            let city = state.city_mut(city_id)?;
            city.current_production = None;
            if !city.has_building(&def.id) {
                city.buildings.push(def.id.clone());
            }
            city.defense = economy::city_defense(rules, &city.buildings);
            events.push(
                TurnEvent::new(
                    turn,
                    TurnEventKind::BuildingCompleted,
                    Some(owner.clone()),
                    format!("{} completed a {}", name, def.id),
                )
                .at(position),
            );
            if let Some(part) = def.spaceship_part {
                let civ = state.civ_mut(&owner)?;
                civ.spaceship.set(part);
                events.push(
                    TurnEvent::new(
                        turn,
                        TurnEventKind::SpaceshipPartBuilt,
                        Some(owner.clone()),
                        format!("{} built the spaceship {:?} ({}/3)", civ.name, part, civ.spaceship.count()),
                    )
                    .at(position),
                );
            }
        }
    }
    Ok(events)
}

fn grow_city(state: &mut CivGameState, rules: &Ruleset, city_id: &CityId) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let general = &rules.general;
    let unhappy = {
        let owner = &state.city(city_id)?.owner;
        state.civ(owner)?.happiness < 0
    };

    let city = state.city_mut(city_id)?;
    let mut surplus = city.yields.food - city.population as i32 * general.food_per_pop;
    if unhappy && surplus > 0 {
        surplus = 0;
    }
    city.stored_food += surplus;

    let threshold = general.growth_threshold(city.population);
    if city.stored_food >= threshold {
        city.stored_food -= threshold;
        city.population += 1;
        return Ok(vec![TurnEvent::new(
            turn,
            TurnEventKind::CityGrew,
            Some(city.owner.clone()),
            format!("{} grew to size {}", city.name, city.population),
        )
        .at(city.position)]);
    }
    if city.stored_food < 0 {
        city.stored_food = 0;
        if city.population > 1 {
            city.population -= 1;
            return Ok(vec![TurnEvent::new(
                turn,
                TurnEventKind::CityStarved,
                Some(city.owner.clone()),
                format!("{} is starving and shrank to size {}", city.name, city.population),
            )
            .at(city.position)]);
        }
    }
    Ok(Vec::new())
}

fn expand_borders(state: &mut CivGameState, rules: &Ruleset, city_id: &CityId) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let city = state.city_mut(city_id)?;
    city.stored_culture += city.yields.culture.max(0);
    if city.border_radius >= rules.general.max_border_radius {
        return Ok(Vec::new());
    }
    let threshold = rules.general.border_threshold(city.border_radius);
    if city.stored_culture < threshold {
        return Ok(Vec::new());
    }
    city.stored_culture -= threshold;
    city.border_radius += 1;
    let (center, radius, owner, name) = (city.position, city.border_radius, city.owner.clone(), city.name.clone());
    let claimed = state.claim_territory(center, radius, &owner);
    Ok(vec![TurnEvent::new(
        turn,
        TurnEventKind::BordersExpanded,
        Some(owner),
        format!("{} borders expanded by {} tiles", name, claimed),
    )
    .at(center)])
}

/// Income minus upkeep; a negative treasury disbands the newest unit
fn settle_treasury(state: &mut CivGameState, rules: &Ruleset, civ: &CivId, income: i64) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let upkeep = economy::upkeep(state, rules, civ);
    let civilization = state.civ_mut(civ)?;
    civilization.gold += income - upkeep;
    if civilization.gold >= 0 {
        return Ok(Vec::new());
    }

    civilization.gold = 0;
    let Some(newest) = civilization.units.last().cloned() else {
        return Ok(Vec::new());
    };
    let name = civilization.name.clone();
    let Some(unit) = state.remove_unit(&newest) else {
        return Ok(Vec::new());
    };
    tracing::info!(civ = %civ, unit = %unit.id, "bankrupt, unit disbanded");
    Ok(vec![TurnEvent::new(
        turn,
        TurnEventKind::UnitDisbanded,
        Some(civ.clone()),
        format!("{} could not pay upkeep and disbanded a {}", name, unit.unit_type),
    )
    .at(unit.position)])
}

fn update_happiness(state: &mut CivGameState, rules: &Ruleset, civ: &CivId) -> Result<()> {
    let general = &rules.general;
    let city_happiness: i32 = state
        .cities
        .values()
        .filter(|c| &c.owner == civ)
        .map(|c| c.happiness)
        .sum();
    let city_count = state.cities.values().filter(|c| &c.owner == civ).count() as i32;

    let civilization = state.civ_mut(civ)?;
    let government = rules.government(&civilization.government)?;
    let wars = civilization.wars() as i32;
    if wars > 0 {
        civilization.war_weariness += general.war_weariness_per_war * wars * government.war_weariness_pct / 100;
    } else {
        civilization.war_weariness = (civilization.war_weariness - general.war_weariness_decay).max(0);
    }

    civilization.happiness = general.base_happiness + government.happiness + city_happiness
        - (city_count - 1).max(0)
        - civilization.war_weariness / 4;
    Ok(())
}

fn advance_golden_age(state: &mut CivGameState, rules: &Ruleset, civ: &CivId) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let civilization = state.civ_mut(civ)?;
    let golden_age = &mut civilization.golden_age;

    if golden_age.is_active() {
        golden_age.turns_remaining -= 1;
        if golden_age.turns_remaining == 0 {
            return Ok(vec![TurnEvent::new(
                turn,
                TurnEventKind::GoldenAgeEnded,
                Some(civ.clone()),
                format!("The golden age of {} has ended", civilization.name),
            )]);
        }
        return Ok(Vec::new());
    }

    golden_age.points += civilization.happiness.max(0);
    let threshold = rules.general.golden_age_threshold(golden_age.completed);
    if golden_age.points < threshold {
        return Ok(Vec::new());
    }
    golden_age.points -= threshold;
    golden_age.turns_remaining = rules.general.golden_age_duration;
    golden_age.completed += 1;
    tracing::info!(civ = %civ, "golden age started");
    Ok(vec![TurnEvent::new(
        turn,
        TurnEventKind::GoldenAgeStarted,
        Some(civ.clone()),
        format!("{} entered a golden age", civilization.name),
    )])
}

fn advance_anarchy(state: &mut CivGameState, civ: &CivId) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let civilization = state.civ_mut(civ)?;
    if civilization.anarchy_turns == 0 {
        return Ok(Vec::new());
    }
    civilization.anarchy_turns -= 1;
    if civilization.anarchy_turns > 0 {
        return Ok(Vec::new());
    }
    Ok(vec![TurnEvent::new(
        turn,
        TurnEventKind::AnarchyEnded,
        Some(civ.clone()),
        format!("Anarchy ended in {}; {} is in force", civilization.name, civilization.government),
    )])
}

fn collect_trade(state: &mut CivGameState, civ: &CivId) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let live_cities: Vec<CityId> = state.cities.keys().cloned().collect();
    let civilization = state.civ_mut(civ)?;

    civilization
        .trade_routes
        .retain(|r| live_cities.contains(&r.from_city) && live_cities.contains(&r.to_city));

    let mut events = Vec::new();
    let mut income = 0;
    for route in civilization.trade_routes.iter_mut() {
        income += route.gold_per_turn;
        route.turns_remaining = route.turns_remaining.saturating_sub(1);
        if route.turns_remaining == 0 {
            events.push(TurnEvent::new(
                turn,
                TurnEventKind::TradeRouteEnded,
                Some(civ.clone()),
                format!("Trade route {} expired", route.id),
            ));
        }
    }
    civilization.gold += income;
    civilization.trade_routes.retain(|r| r.turns_remaining > 0);
    Ok(events)
}

fn advance_research(state: &mut CivGameState, civ: &CivId, science: u32) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let civilization = state.civ_mut(civ)?;
    let research = &mut civilization.research;
    research.science_per_turn = science as i32;

    let Some(current) = research.current.clone() else {
        return Ok(Vec::new());
    };
    research.progress += science;
    if research.progress < research.cost {
        return Ok(Vec::new());
    }

    research.researched.insert(current.clone());
    research.current = None;
    research.progress = 0;
    research.cost = 0;
    tracing::info!(civ = %civ, tech = %current, "tech researched");
    Ok(vec![TurnEvent::new(
        turn,
        TurnEventKind::TechResearched,
        Some(civ.clone()),
        format!("{} discovered {}", civilization.name, current),
    )])
}

fn advance_great_people(
    state: &mut CivGameState,
    rules: &Ruleset,
    civ: &CivId,
    contributions: &[(GreatPersonKind, i32)],
) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let civilization = state.civ_mut(civ)?;
    let great = &mut civilization.great_people;

    for (kind, amount) in contributions {
        *great.progress.entry(*kind).or_insert(0) += (*amount).max(0) as u32;
    }

    let mut events = Vec::new();
    for kind in GreatPersonKind::ALL {
        let threshold = great
            .thresholds
            .get(&kind)
            .copied()
            .unwrap_or_else(|| rules.great_person_threshold(kind));
        let progress = great.progress.entry(kind).or_insert(0);
        if *progress < threshold {
            continue;
        }
        *progress -= threshold;
        great.available.push(kind);
        great.thresholds.insert(
            kind,
            threshold * (100 + rules.general.great_person_threshold_growth_pct) / 100,
        );
        events.push(TurnEvent::new(
            turn,
            TurnEventKind::GreatPersonBorn,
            Some(civ.clone()),
            format!(
                "A great {} was born in {}",
                format!("{:?}", kind).to_lowercase(),
                civilization.name
            ),
        ));
    }
    Ok(events)
}

/// Heal units that rested, then restore movement for everyone
fn refresh_units(state: &mut CivGameState, rules: &Ruleset) {
    let heals: Vec<_> = state
        .units
        .values()
        .map(|unit| {
            let in_territory = state
                .tile(unit.position)
                .map(|t| t.owner.as_ref() == Some(&unit.owner))
                .unwrap_or(false);
            let amount = if unit.acted_this_turn || unit.hp >= unit.max_hp {
                0
            } else if in_territory {
                rules.general.heal_in_territory
            } else {
                rules.general.heal_in_field
            };
            (unit.id.clone(), amount)
        })
        .collect();

    for (id, amount) in heals {
        if let Some(unit) = state.units.get_mut(&id) {
            unit.heal(amount);
            unit.refresh();
        }
    }
}

fn heal_cities(state: &mut CivGameState, rules: &Ruleset) {
    for city in state.cities.values_mut() {
        city.hp = (city.hp + rules.general.city_heal).min(city.max_hp);
    }
}

/// A civilization with no cities and no units is out of the game
fn eliminate_defeated(state: &mut CivGameState) -> Vec<TurnEvent> {
    let turn = state.turn;
    let mut events = Vec::new();
    for civ in state.living_civs() {
        let has_city = state.cities.values().any(|c| c.owner == civ);
        let has_unit = state.units.values().any(|u| u.owner == civ);
        if has_city || has_unit {
            continue;
        }
        let Some(civilization) = state.civilizations.get_mut(&civ) else {
            continue;
        };
        civilization.alive = false;
        civilization.trade_routes.clear();
        let name = civilization.name.clone();
        for other in state.civilizations.values_mut() {
            other.trade_routes.retain(|r| r.partner != civ);
        }
        // Nobody stays at war with a civ that no longer exists
        let others: Vec<CivId> = state.civ_order.iter().filter(|id| **id != civ).cloned().collect();
        for other in &others {
            state.set_relationship(&civ, other, Relationship::Neutral);
        }
        tracing::info!(civ = %civ, "civilization eliminated");
        events.push(TurnEvent::new(
            turn,
            TurnEventKind::CivEliminated,
            Some(civ.clone()),
            format!("{} has been eliminated", name),
        ));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConfig;
    use crate::state::city::ProductionOrder;
    use crate::state::invariants::check_invariants;
    use crate::world::create_game;

    fn setup() -> (CivGameState, Ruleset) {
        let rules = Ruleset::load_default().unwrap();
        let config = GameConfig::load_default().unwrap();
        let state = create_game(21, 60, 20, &config, &rules).unwrap();
        (state, rules)
    }

    fn capital(state: &CivGameState, civ: &str) -> CityId {
        state.civ(&CivId::new(civ)).unwrap().cities[0].clone()
    }

    #[test]
    fn test_production_completes_building() {
        let (mut state, rules) = setup();
        let city_id = capital(&state, "rome");
        let mut order = ProductionOrder::new(ProductionKind::Building, "monument", 30);
        order.progress = 29;
        state.city_mut(&city_id).unwrap().current_production = Some(order);

        let events = run_end_of_turn(&mut state, &rules).unwrap();
        let city = state.city(&city_id).unwrap();
        assert!(city.has_building("monument"));
        assert!(city.current_production.is_none());
        assert!(events.iter().any(|e| e.kind == TurnEventKind::BuildingCompleted));
    }

    #[test]
    fn test_spaceship_part_recorded() {
        let (mut state, rules) = setup();
        let city_id = capital(&state, "rome");
        let mut order = ProductionOrder::new(ProductionKind::Building, "ss_engine", 150);
        order.progress = 150;
        state.city_mut(&city_id).unwrap().current_production = Some(order);

        run_end_of_turn(&mut state, &rules).unwrap();
        assert!(state.civ(&CivId::new("rome")).unwrap().spaceship.engine);
    }

    #[test]
    fn test_unit_production_places_unit_nearby() {
        let (mut state, rules) = setup();
        let city_id = capital(&state, "egypt");
        let before = state.civ(&CivId::new("egypt")).unwrap().units.len();
        let mut order = ProductionOrder::new(ProductionKind::Unit, "warrior", 20);
        order.progress = 20;
        state.city_mut(&city_id).unwrap().current_production = Some(order);

        run_end_of_turn(&mut state, &rules).unwrap();
        assert_eq!(state.civ(&CivId::new("egypt")).unwrap().units.len(), before + 1);
        assert!(check_invariants(&state).is_empty());
    }

    #[test]
    fn test_research_completes() {
        let (mut state, rules) = setup();
        let rome = CivId::new("rome");
        {
            let civ = state.civ_mut(&rome).unwrap();
            civ.research.switch_to("pottery", 25);
            civ.research.progress = 24;
        }
        run_end_of_turn(&mut state, &rules).unwrap();
        let research = &state.civ(&rome).unwrap().research;
        assert!(research.has("pottery"));
        assert!(research.current.is_none());
    }

    #[test]
    fn test_bankruptcy_disbands_newest_unit() {
        let (mut state, rules) = setup();
        let rome = CivId::new("rome");
        let newest = state.civ(&rome).unwrap().units.last().cloned().unwrap();
        {
            let civ = state.civ_mut(&rome).unwrap();
            civ.gold = -500;
        }
        let events = run_end_of_turn(&mut state, &rules).unwrap();
        assert!(!state.units.contains_key(&newest));
        assert_eq!(state.civ(&rome).unwrap().gold, 0);
        assert!(events.iter().any(|e| e.kind == TurnEventKind::UnitDisbanded));
    }

    #[test]
    fn test_starvation_shrinks_city() {
        let (mut state, rules) = setup();
        let city_id = capital(&state, "rome");
        {
            let city = state.city_mut(&city_id).unwrap();
            city.population = 12;
            city.stored_food = 0;
        }
        let events = run_end_of_turn(&mut state, &rules).unwrap();
        assert_eq!(state.city(&city_id).unwrap().population, 11);
        assert!(events.iter().any(|e| e.kind == TurnEventKind::CityStarved));
    }

    #[test]
    fn test_war_weariness_accumulates() {
        let (mut state, rules) = setup();
        let rome = CivId::new("rome");
        let egypt = CivId::new("egypt");
        state.set_relationship(&rome, &egypt, crate::core::types::Relationship::War);
        run_end_of_turn(&mut state, &rules).unwrap();
        assert!(state.civ(&rome).unwrap().war_weariness > 0);
    }

    #[test]
    fn test_eliminates_empty_civ() {
        let (mut state, rules) = setup();
        let egypt = CivId::new("egypt");
        let units = state.civ(&egypt).unwrap().units.clone();
        for unit in units {
            state.remove_unit(&unit);
        }
        let city_id = capital(&state, "egypt");
        let rome = CivId::new("rome");
        crate::actions::combat::capture_city(&mut state, &rules, &city_id, &rome).unwrap();

        let events = run_end_of_turn(&mut state, &rules).unwrap();
        assert!(!state.civ(&egypt).unwrap().alive);
        assert!(events.iter().any(|e| e.kind == TurnEventKind::CivEliminated));
    }

    #[test]
    fn test_elimination_ends_wars_with_dead_civ() {
        let (mut state, mut rules) = setup();
        rules.general.barbarian_first_turn = u32::MAX;
        let rome = CivId::new("rome");
        let egypt = CivId::new("egypt");
        state.set_relationship(&rome, &egypt, Relationship::War);
        let units = state.civ(&egypt).unwrap().units.clone();
        for unit in units {
            state.remove_unit(&unit);
        }
        let city_id = capital(&state, "egypt");
        crate::actions::combat::capture_city(&mut state, &rules, &city_id, &rome).unwrap();

        run_end_of_turn(&mut state, &rules).unwrap();
        assert_eq!(state.relationship(&rome, &egypt), Relationship::Neutral);
        assert_eq!(state.relationship(&egypt, &rome), Relationship::Neutral);
        assert!(!state.civ(&rome).unwrap().is_at_war());

        let weariness = state.civ(&rome).unwrap().war_weariness;
        for _ in 0..10 {
            run_end_of_turn(&mut state, &rules).unwrap();
            state.turn += 1;
        }
        assert!(state.civ(&rome).unwrap().war_weariness <= weariness);
    }

    #[test]
    fn test_units_refreshed() {
        let (mut state, rules) = setup();
        for unit in state.units.values_mut() {
            unit.exhaust();
        }
        run_end_of_turn(&mut state, &rules).unwrap();
        assert!(state.units.values().all(|u| u.movement_left == u.movement));
    }
}
