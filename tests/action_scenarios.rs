//! Integration tests for action execution
//!
//! Scenarios run against a generated world:
//! - Combat between civilizations at war, and its refusal in peace
//! - Founding a city with a settler
//! - A city finishing a unit through end-of-turn production
//! - Unit upgrades, trade routes, government changes and great people
//! - Tile improvements worked to completion, and ranged attacks
//! - Invalid actions leaving the state untouched

use civ_council::actions::movement::can_enter;
use civ_council::actions::validate::check_city_site;
use civ_council::actions::{execute, is_valid, validate, Action, Rejection};
use civ_council::actions::combat::capture_city;
use civ_council::actions::execute::{establish_city, spawn_unit};
use civ_council::core::config::GameConfig;
use civ_council::core::types::{
    CityId, CivId, Coord, GreatPersonKind, ImprovementKind, Relationship, Terrain, UnitId,
};
use civ_council::diplomacy::declare_war;
use civ_council::rules::Ruleset;
use civ_council::state::{CivGameState, TurnEventKind};
use civ_council::turn::run_end_of_turn;
use civ_council::world::create_game;

fn setup(seed: u64) -> (CivGameState, Ruleset) {
    let config = GameConfig::load_default().unwrap();
    let rules = Ruleset::load_default().unwrap();
    let state = create_game(seed, 80, 24, &config, &rules).unwrap();
    (state, rules)
}

fn free(state: &CivGameState, rules: &Ruleset, coord: Coord) -> bool {
    state.tile(coord).map_or(false, |t| {
        t.terrain.is_land() && t.city_id.is_none() && can_enter(state, rules, &CivId::new("nobody"), coord)
    })
}

/// Two adjacent empty land tiles away from every city
fn free_pair(state: &CivGameState, rules: &Ruleset) -> (Coord, Coord) {
    state
        .tiles()
        .map(|t| t.coord())
        .filter(|c| state.cities.values().all(|city| city.position.chebyshev(*c) > 2))
        .filter(|c| free(state, rules, *c))
        .find_map(|a| {
            a.neighbors(state.grid_size)
                .into_iter()
                .find(|b| free(state, rules, *b))
                .map(|b| (a, b))
        })
        .expect("map has open land")
}

/// An empty land tile away from every city that satisfies `pred`
fn open_tile(state: &CivGameState, rules: &Ruleset, pred: impl Fn(Coord) -> bool) -> Coord {
    state
        .tiles()
        .map(|t| t.coord())
        .filter(|c| state.cities.values().all(|city| city.position.chebyshev(*c) > 2))
        .find(|c| free(state, rules, *c) && pred(*c))
        .expect("map has a matching tile")
}

fn capital(state: &CivGameState, civ: &str) -> CityId {
    state.civ(&CivId::new(civ)).unwrap().cities[0].clone()
}

/// A free land tile next to the civ's capital, inside its borders
fn beside_capital(state: &CivGameState, rules: &Ruleset, civ: &str) -> Coord {
    let center = state.city(&capital(state, civ)).unwrap().position;
    center
        .neighbors(state.grid_size)
        .into_iter()
        .find(|c| free(state, rules, *c) && state.unit_at(*c).is_none())
        .expect("capital has a free neighbour")
}

fn skirmish(state: &mut CivGameState, rules: &Ruleset) -> (UnitId, UnitId, Coord) {
    let (a, b) = free_pair(state, rules);
    let rome = CivId::new("rome");
    let egypt = CivId::new("egypt");
    let attacker = spawn_unit(state, rules, &rome, "warrior", a).unwrap();
    let defender = spawn_unit(state, rules, &egypt, "warrior", b).unwrap();
    (attacker, defender, b)
}

#[test]
fn test_attack_at_war_destroys_weak_defender() {
    let (mut state, rules) = setup(31);
    let (attacker, defender, target) = skirmish(&mut state, &rules);
    let rome = CivId::new("rome");
    let egypt = CivId::new("egypt");
    declare_war(&mut state, &rome, &egypt);
    state.units.get_mut(&defender).unwrap().hp = 1;

    let action = Action::Attack {
        unit_id: attacker.clone(),
        x: target.x,
        y: target.y,
    };
    let events = execute(&mut state, &rules, &action, &rome, 99);

    assert!(!state.units.contains_key(&defender));
    assert!(!state.civ(&egypt).unwrap().units.contains(&defender));
    assert!(events.iter().any(|e| e.kind == TurnEventKind::UnitDestroyed));
    assert_eq!(state.combat_log.len(), 1);
    assert!(state.combat_log[0].defender_destroyed);

    let unit = state.unit(&attacker).unwrap();
    assert!(unit.hp > 0 && unit.hp <= unit.max_hp);
    assert!(!unit.can_act());
}

#[test]
fn test_attack_in_peace_is_rejected() {
    let (mut state, rules) = setup(31);
    let (attacker, _, target) = skirmish(&mut state, &rules);
    let rome = CivId::new("rome");
    let action = Action::Attack {
        unit_id: attacker,
        x: target.x,
        y: target.y,
    };

    assert!(matches!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::NotAtWar(_))
    ));
    let before = state.clone();
    assert!(execute(&mut state, &rules, &action, &rome, 5).is_empty());
    assert_eq!(state, before);
}

#[test]
fn test_combat_is_deterministic_per_seed() {
    let (mut state, rules) = setup(8);
    let (attacker, _, target) = skirmish(&mut state, &rules);
    let rome = CivId::new("rome");
    declare_war(&mut state, &rome, &CivId::new("egypt"));
    let action = Action::Attack {
        unit_id: attacker,
        x: target.x,
        y: target.y,
    };

    let mut a = state.clone();
    let mut b = state;
    execute(&mut a, &rules, &action, &rome, 1234);
    execute(&mut b, &rules, &action, &rome, 1234);
    assert_eq!(a, b);
}

#[test]
fn test_war_is_symmetric() {
    let (mut state, _) = setup(4);
    let rome = CivId::new("rome");
    let egypt = CivId::new("egypt");
    declare_war(&mut state, &rome, &egypt);
    assert_eq!(state.relationship(&rome, &egypt), Relationship::War);
    assert_eq!(state.relationship(&egypt, &rome), Relationship::War);
}

#[test]
fn test_settler_founds_city() {
    let (mut state, rules) = setup(12);
    let rome = CivId::new("rome");
    let site = state
        .tiles()
        .map(|t| t.coord())
        .find(|c| free(&state, &rules, *c) && check_city_site(&state, &rules, &rome, *c).is_ok())
        .unwrap();
    let settler = spawn_unit(&mut state, &rules, &rome, "settler", site).unwrap();

    let action = Action::FoundCity {
        unit_id: settler.clone(),
        name: Some("Ostia".into()),
    };
    let events = execute(&mut state, &rules, &action, &rome, 0);

    assert!(events.iter().any(|e| e.kind == TurnEventKind::CityFounded));
    assert!(!state.units.contains_key(&settler));
    let civ = state.civ(&rome).unwrap();
    assert_eq!(civ.cities.len(), 2);
    let city = state.city(&civ.cities[1]).unwrap();
    assert_eq!(city.name, "Ostia");
    assert_eq!(city.position, site);
    assert!(!city.is_capital);
    assert_eq!(state.tile(site).unwrap().city_id.as_ref(), Some(&city.id));
    assert_eq!(state.tile(site).unwrap().owner.as_ref(), Some(&rome));
}

#[test]
fn test_found_city_too_close_is_rejected() {
    let (mut state, rules) = setup(12);
    let rome = CivId::new("rome");
    let capital = state.civ(&rome).unwrap().cities[0].clone();
    let center = state.city(&capital).unwrap().position;
    let spot = center
        .neighbors(state.grid_size)
        .into_iter()
        .find(|c| free(&state, &rules, *c))
        .unwrap();
    let settler = spawn_unit(&mut state, &rules, &rome, "settler", spot).unwrap();
    let action = Action::FoundCity {
        unit_id: settler,
        name: None,
    };
    assert!(!is_valid(&state, &rules, &action, &rome));
}

#[test]
fn test_production_completes_unit() {
    let (mut state, mut rules) = setup(19);
    rules.general.barbarian_first_turn = u32::MAX;
    let rome = CivId::new("rome");
    let capital = state.civ(&rome).unwrap().cities[0].clone();
    let units_before = state.civ(&rome).unwrap().units.len();

    let build = Action::Build {
        city_id: capital.clone(),
        target: "warrior".into(),
    };
    execute(&mut state, &rules, &build, &rome, 0);
    assert!(state.city(&capital).unwrap().current_production.is_some());

    let mut created = false;
    for _ in 0..12 {
        let events = run_end_of_turn(&mut state, &rules).unwrap();
        state.turn += 1;
        if events.iter().any(|e| e.kind == TurnEventKind::UnitCreated) {
            created = true;
            break;
        }
    }
    assert!(created, "warrior should finish within twelve turns");
    assert_eq!(state.civ(&rome).unwrap().units.len(), units_before + 1);
    assert!(state.city(&capital).unwrap().current_production.is_none());
}

#[test]
fn test_unknown_build_target_is_rejected() {
    let (mut state, rules) = setup(19);
    let rome = CivId::new("rome");
    let capital = state.civ(&rome).unwrap().cities[0].clone();
    let action = Action::Build {
        city_id: capital,
        target: "death_star".into(),
    };
    let before = state.clone();
    assert!(execute(&mut state, &rules, &action, &rome, 0).is_empty());
    assert_eq!(state, before);
}

#[test]
fn test_foreign_unit_cannot_be_commanded() {
    let (state, rules) = setup(19);
    let egypt_unit = state.civ(&CivId::new("egypt")).unwrap().units[0].clone();
    let action = Action::Fortify { unit_id: egypt_unit };
    assert!(!is_valid(&state, &rules, &action, &CivId::new("rome")));
}

#[test]
fn test_warrior_destroys_scout_on_plains() {
    let (mut state, rules) = setup(31);
    let rome = CivId::new("rome");
    let egypt = CivId::new("egypt");
    let target = open_tile(&state, &rules, |c| {
        state.tile(c).unwrap().terrain == Terrain::Plains
            && c.neighbors(state.grid_size).into_iter().any(|n| free(&state, &rules, n))
    });
    let origin = target
        .neighbors(state.grid_size)
        .into_iter()
        .find(|n| free(&state, &rules, *n))
        .unwrap();
    let warrior = spawn_unit(&mut state, &rules, &rome, "warrior", origin).unwrap();
    let scout = spawn_unit(&mut state, &rules, &egypt, "scout", target).unwrap();
    declare_war(&mut state, &rome, &egypt);

    let action = Action::Attack {
        unit_id: warrior.clone(),
        x: target.x,
        y: target.y,
    };
    let events = execute(&mut state, &rules, &action, &rome, 7);

    assert!(!state.units.contains_key(&scout));
    assert!(events
        .iter()
        .any(|e| e.kind == TurnEventKind::UnitDestroyed && e.civ_id.as_ref() == Some(&egypt)));
    let record = &state.combat_log[0];
    assert!(record.damage_to_defender >= 60);
    let unit = state.unit(&warrior).unwrap();
    assert!(unit.acted_this_turn);
    assert!(unit.hp > 0 && unit.hp < unit.max_hp);
}

#[test]
fn test_ranged_attack_damages_defender_only() {
    let (mut state, rules) = setup(31);
    let (a, b) = free_pair(&state, &rules);
    let rome = CivId::new("rome");
    let egypt = CivId::new("egypt");
    let archer = spawn_unit(&mut state, &rules, &rome, "archer", a).unwrap();
    let warrior = spawn_unit(&mut state, &rules, &egypt, "warrior", b).unwrap();
    declare_war(&mut state, &rome, &egypt);

    let action = Action::RangedAttack {
        unit_id: archer.clone(),
        x: b.x,
        y: b.y,
    };
    execute(&mut state, &rules, &action, &rome, 3);

    let archer_unit = state.unit(&archer).unwrap();
    assert_eq!(archer_unit.hp, archer_unit.max_hp);
    assert!(archer_unit.acted_this_turn);
    let target = state.unit(&warrior).unwrap();
    assert!(target.hp < target.max_hp);
    assert!(state.combat_log[0].ranged);
    assert_eq!(state.combat_log[0].damage_to_attacker, 0);
}

#[test]
fn test_ranged_attack_out_of_range_is_rejected() {
    let (mut state, rules) = setup(31);
    let (a, _) = free_pair(&state, &rules);
    let rome = CivId::new("rome");
    let archer = spawn_unit(&mut state, &rules, &rome, "archer", a).unwrap();
    let far = if a.x + 3 < state.grid_size as i32 {
        Coord::new(a.x + 3, a.y)
    } else {
        Coord::new(a.x - 3, a.y)
    };
    let action = Action::RangedAttack {
        unit_id: archer,
        x: far.x,
        y: far.y,
    };
    assert_eq!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::OutOfRange(far))
    );
}

#[test]
fn test_worker_completes_farm() {
    let (mut state, rules) = setup(12);
    let rome = CivId::new("rome");
    let site = open_tile(&state, &rules, |c| state.tile(c).unwrap().terrain == Terrain::Plains);
    let worker = spawn_unit(&mut state, &rules, &rome, "worker", site).unwrap();
    let action = Action::BuildImprovement {
        unit_id: worker.clone(),
        improvement: ImprovementKind::Farm,
    };

    let turns = rules.improvement(ImprovementKind::Farm).unwrap().turns;
    let mut last = Vec::new();
    for step in 1..=turns {
        state.units.get_mut(&worker).unwrap().refresh();
        last = execute(&mut state, &rules, &action, &rome, 0);
        let work = state.tile(site).unwrap().improvement.clone().unwrap();
        assert_eq!(work.progress, step);
        assert_eq!(work.complete, step == turns);
        assert!(state.unit(&worker).unwrap().acted_this_turn);
    }
    assert_eq!(last[0].kind, TurnEventKind::ImprovementCompleted);

    // A finished farm cannot be built again
    state.units.get_mut(&worker).unwrap().refresh();
    assert!(!is_valid(&state, &rules, &action, &rome));
}

#[test]
fn test_mine_on_plains_is_rejected() {
    let (mut state, rules) = setup(12);
    let rome = CivId::new("rome");
    let site = open_tile(&state, &rules, |c| state.tile(c).unwrap().terrain == Terrain::Plains);
    let worker = spawn_unit(&mut state, &rules, &rome, "worker", site).unwrap();
    let action = Action::BuildImprovement {
        unit_id: worker,
        improvement: ImprovementKind::Mine,
    };
    assert!(matches!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::InvalidSite(_))
    ));
}

#[test]
fn test_upgrade_needs_gold_then_succeeds() {
    let (mut state, rules) = setup(19);
    let rome = CivId::new("rome");
    let spot = beside_capital(&state, &rules, "rome");
    let warrior = spawn_unit(&mut state, &rules, &rome, "warrior", spot).unwrap();
    let action = Action::UpgradeUnit {
        unit_id: warrior.clone(),
    };

    assert_eq!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::TechRequired("bronze_working".into()))
    );
    {
        let civ = state.civ_mut(&rome).unwrap();
        civ.research.researched.insert("bronze_working".into());
        civ.gold = 10;
    }
    assert!(matches!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::NotEnoughGold { needed: 30, available: 10 })
    ));

    state.civ_mut(&rome).unwrap().gold = 100;
    let events = execute(&mut state, &rules, &action, &rome, 0);
    assert_eq!(events[0].kind, TurnEventKind::UnitUpgraded);
    let unit = state.unit(&warrior).unwrap();
    assert_eq!(unit.unit_type, "swordsman");
    assert_eq!(unit.position, spot);
    assert!(unit.acted_this_turn);
    assert_eq!(state.civ(&rome).unwrap().gold, 70);
}

#[test]
fn test_upgrade_outside_territory_is_rejected() {
    let (mut state, rules) = setup(19);
    let rome = CivId::new("rome");
    let site = open_tile(&state, &rules, |c| state.tile(c).unwrap().owner.is_none());
    let warrior = spawn_unit(&mut state, &rules, &rome, "warrior", site).unwrap();
    {
        let civ = state.civ_mut(&rome).unwrap();
        civ.research.researched.insert("bronze_working".into());
        civ.gold = 100;
    }
    let action = Action::UpgradeUnit { unit_id: warrior };
    assert_eq!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::OutsideTerritory)
    );
}

#[test]
fn test_caravan_establishes_trade_route() {
    let (mut state, rules) = setup(12);
    let rome = CivId::new("rome");
    let home = capital(&state, "rome");
    let home_pos = state.city(&home).unwrap().position;
    let range = rules.general.trade_route_range;
    let site = open_tile(&state, &rules, |c| {
        c.chebyshev(home_pos) <= range && check_city_site(&state, &rules, &rome, c).is_ok()
    });
    let colony = establish_city(&mut state, &rules, &rome, site, "Ostia".into()).unwrap();
    let spot = beside_capital(&state, &rules, "rome");
    let caravan = spawn_unit(&mut state, &rules, &rome, "caravan", spot).unwrap();

    let action = Action::EstablishTradeRoute {
        unit_id: caravan.clone(),
        target_city_id: colony.clone(),
    };
    let events = execute(&mut state, &rules, &action, &rome, 0);

    assert_eq!(events[0].kind, TurnEventKind::TradeRouteEstablished);
    assert!(!state.units.contains_key(&caravan));
    let route = &state.civ(&rome).unwrap().trade_routes[0];
    assert_eq!(route.from_city, home);
    assert_eq!(route.to_city, colony);
    assert_eq!(route.partner, rome);
    assert!(route.gold_per_turn >= rules.general.trade_route_base_gold);
}

#[test]
fn test_trade_route_to_enemy_is_rejected() {
    let (mut state, rules) = setup(12);
    let rome = CivId::new("rome");
    let egypt = CivId::new("egypt");
    let spot = beside_capital(&state, &rules, "rome");
    let caravan = spawn_unit(&mut state, &rules, &rome, "caravan", spot).unwrap();
    declare_war(&mut state, &rome, &egypt);

    let action = Action::EstablishTradeRoute {
        unit_id: caravan,
        target_city_id: capital(&state, "egypt"),
    };
    assert!(matches!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::InvalidTradeRoute(_))
    ));
}

#[test]
fn test_government_change_starts_anarchy() {
    let (mut state, rules) = setup(4);
    let rome = CivId::new("rome");
    let monarchy = Action::ChangeGovernment {
        government: "monarchy".into(),
    };
    assert_eq!(
        validate(&state, &rules, &monarchy, &rome),
        Err(Rejection::TechRequired("masonry".into()))
    );

    {
        let research = &mut state.civ_mut(&rome).unwrap().research.researched;
        research.insert("masonry".into());
        research.insert("philosophy".into());
    }
    let events = execute(&mut state, &rules, &monarchy, &rome, 0);
    assert_eq!(events[0].kind, TurnEventKind::GovernmentChanged);
    let civ = state.civ(&rome).unwrap();
    assert_eq!(civ.government, "monarchy");
    assert_eq!(civ.anarchy_turns, rules.general.anarchy_turns);

    let republic = Action::ChangeGovernment {
        government: "republic".into(),
    };
    assert_eq!(
        validate(&state, &rules, &republic, &rome),
        Err(Rejection::InAnarchy)
    );
}

#[test]
fn test_great_people_apply_their_effects() {
    let (mut state, rules) = setup(19);
    let rome = CivId::new("rome");
    let home = capital(&state, "rome");
    let g = &rules.general;

    let merchant = Action::ExpendGreatPerson {
        kind: GreatPersonKind::Merchant,
        city_id: None,
    };
    assert_eq!(
        validate(&state, &rules, &merchant, &rome),
        Err(Rejection::NoGreatPerson(GreatPersonKind::Merchant))
    );

    {
        let civ = state.civ_mut(&rome).unwrap();
        civ.great_people.available = vec![
            GreatPersonKind::Scientist,
            GreatPersonKind::Engineer,
            GreatPersonKind::Merchant,
            GreatPersonKind::Artist,
            GreatPersonKind::General,
        ];
        civ.research.switch_to("rocketry", 140);
    }
    execute(
        &mut state,
        &rules,
        &Action::Build {
            city_id: home.clone(),
            target: "monument".into(),
        },
        &rome,
        0,
    );
    let before = state.civ(&rome).unwrap().clone();
    let production_before = state.city(&home).unwrap().current_production.clone().unwrap().progress;

    for (kind, city_id) in [
        (GreatPersonKind::Scientist, None),
        (GreatPersonKind::Engineer, Some(home.clone())),
        (GreatPersonKind::Merchant, None),
        (GreatPersonKind::Artist, None),
        (GreatPersonKind::General, None),
    ] {
        let events = execute(&mut state, &rules, &Action::ExpendGreatPerson { kind, city_id }, &rome, 0);
        assert_eq!(events[0].kind, TurnEventKind::GreatPersonExpended, "{:?}", kind);
    }

    let civ = state.civ(&rome).unwrap();
    assert!(civ.great_people.available.is_empty());
    assert_eq!(civ.research.progress, (before.research.progress + g.scientist_research_bonus).min(140));
    assert_eq!(civ.gold, before.gold + g.merchant_gold);
    assert_eq!(civ.golden_age.points, before.golden_age.points + g.artist_golden_age_points);
    assert_eq!(civ.combat_bonus_pct(), g.general_combat_bonus_pct);
    let order = state.city(&home).unwrap().current_production.clone().unwrap();
    assert!(order.progress > production_before);
}

#[test]
fn test_engineer_needs_producing_city() {
    let (mut state, rules) = setup(19);
    let rome = CivId::new("rome");
    let home = capital(&state, "rome");
    state.civ_mut(&rome).unwrap().great_people.available = vec![GreatPersonKind::Engineer];
    state.city_mut(&home).unwrap().current_production = None;

    let action = Action::ExpendGreatPerson {
        kind: GreatPersonKind::Engineer,
        city_id: Some(home),
    };
    assert!(matches!(
        validate(&state, &rules, &action, &rome),
        Err(Rejection::NothingToApply(_))
    ));
}

#[test]
fn test_refounded_city_gets_fresh_name() {
    let (mut state, rules) = setup(12);
    let rome = CivId::new("rome");
    let egypt = CivId::new("egypt");

    let first_site = open_tile(&state, &rules, |c| check_city_site(&state, &rules, &rome, c).is_ok());
    let settler = spawn_unit(&mut state, &rules, &rome, "settler", first_site).unwrap();
    execute(&mut state, &rules, &Action::FoundCity { unit_id: settler, name: None }, &rome, 0);
    let lost = state.civ(&rome).unwrap().cities[1].clone();
    let lost_name = state.city(&lost).unwrap().name.clone();
    capture_city(&mut state, &rules, &lost, &egypt).unwrap();

    let second_site = open_tile(&state, &rules, |c| check_city_site(&state, &rules, &rome, c).is_ok());
    let settler = spawn_unit(&mut state, &rules, &rome, "settler", second_site).unwrap();
    execute(&mut state, &rules, &Action::FoundCity { unit_id: settler, name: None }, &rome, 0);

    let names: Vec<&str> = state.cities.values().map(|c| c.name.as_str()).collect();
    assert_eq!(names.iter().filter(|n| **n == lost_name).count(), 1);
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
}
