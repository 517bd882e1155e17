//! Turn events, notifications and the combat log
//!
//! All records here are immutable once appended to the game state.

use serde::{Deserialize, Serialize};

use crate::core::types::{CivId, Coord, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEventKind {
    UnitMoved,
    Combat,
    UnitDestroyed,
    CityFounded,
    CityCaptured,
    CityGrew,
    CityStarved,
    BordersExpanded,
    ProductionSet,
    BuildingCompleted,
    UnitCreated,
    SpaceshipPartBuilt,
    ImprovementStarted,
    ImprovementCompleted,
    ResearchSet,
    TechResearched,
    UnitFortified,
    UnitUpgraded,
    UnitDisbanded,
    TradeRouteEstablished,
    TradeRouteEnded,
    GovernmentChanged,
    AnarchyEnded,
    GreatPersonBorn,
    GreatPersonExpended,
    GoldenAgeStarted,
    GoldenAgeEnded,
    DiplomacyMessage,
    WarDeclared,
    PeaceMade,
    AllianceFormed,
    RelationsImproved,
    BarbarianSpawned,
    CivEliminated,
    Victory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnEvent {
    pub turn: u32,
    #[serde(rename = "type")]
    pub kind: TurnEventKind,
    pub civ_id: Option<CivId>,
    pub position: Option<Coord>,
    pub description: String,
}

impl TurnEvent {
    pub fn new(turn: u32, kind: TurnEventKind, civ_id: Option<CivId>, description: impl Into<String>) -> Self {
        Self {
            turn,
            kind,
            civ_id,
            position: None,
            description: description.into(),
        }
    }

    pub fn at(mut self, position: Coord) -> Self {
        self.position = Some(position);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Important,
    Critical,
}

/// UI-facing digest of a significant event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameNotification {
    pub id: String,
    pub turn: u32,
    pub civ_id: Option<CivId>,
    pub severity: Severity,
    pub message: String,
}

impl TurnEventKind {
    /// Severity of the notification this kind produces, if any
    pub fn notification_severity(&self) -> Option<Severity> {
        match self {
            TurnEventKind::WarDeclared
            | TurnEventKind::CityCaptured
            | TurnEventKind::CivEliminated
            | TurnEventKind::Victory => Some(Severity::Critical),
            TurnEventKind::PeaceMade
            | TurnEventKind::AllianceFormed
            | TurnEventKind::TechResearched
            | TurnEventKind::GoldenAgeStarted
            | TurnEventKind::GreatPersonBorn
            | TurnEventKind::CityFounded
            | TurnEventKind::SpaceshipPartBuilt
            | TurnEventKind::GovernmentChanged => Some(Severity::Important),
            TurnEventKind::BarbarianSpawned | TurnEventKind::UnitDisbanded => Some(Severity::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatRecord {
    pub turn: u32,
    pub attacker: UnitId,
    pub attacker_civ: CivId,
    /// Defending unit id, or the city id when a city was attacked
    pub defender: String,
    pub defender_civ: CivId,
    pub ranged: bool,
    pub damage_to_attacker: u32,
    pub damage_to_defender: u32,
    pub attacker_destroyed: bool,
    pub defender_destroyed: bool,
}
