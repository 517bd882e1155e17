//! Action intents submitted by policy providers

use serde::{Deserialize, Serialize};

use crate::core::types::{CityId, GreatPersonKind, ImprovementKind, UnitId};

/// A single intent from one civilization. Fully serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    MoveUnit { unit_id: UnitId, x: i32, y: i32 },
    #[serde(rename_all = "camelCase")]
    Attack { unit_id: UnitId, x: i32, y: i32 },
    #[serde(rename_all = "camelCase")]
    RangedAttack { unit_id: UnitId, x: i32, y: i32 },
    #[serde(rename_all = "camelCase")]
    FoundCity {
        unit_id: UnitId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Build { city_id: CityId, target: String },
    #[serde(rename_all = "camelCase")]
    BuildImprovement {
        unit_id: UnitId,
        improvement: ImprovementKind,
    },
    #[serde(rename_all = "camelCase")]
    SetResearch { tech_id: String },
    #[serde(rename_all = "camelCase")]
    Fortify { unit_id: UnitId },
    #[serde(rename_all = "camelCase")]
    UpgradeUnit { unit_id: UnitId },
    #[serde(rename_all = "camelCase")]
    EstablishTradeRoute {
        unit_id: UnitId,
        target_city_id: CityId,
    },
    ChangeGovernment { government: String },
    #[serde(rename_all = "camelCase")]
    ExpendGreatPerson {
        kind: GreatPersonKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        city_id: Option<CityId>,
    },
}

impl Action {
    /// Wire name of the action, as used in the `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            Action::MoveUnit { .. } => "move_unit",
            Action::Attack { .. } => "attack",
            Action::RangedAttack { .. } => "ranged_attack",
            Action::FoundCity { .. } => "found_city",
            Action::Build { .. } => "build",
            Action::BuildImprovement { .. } => "build_improvement",
            Action::SetResearch { .. } => "set_research",
            Action::Fortify { .. } => "fortify",
            Action::UpgradeUnit { .. } => "upgrade_unit",
            Action::EstablishTradeRoute { .. } => "establish_trade_route",
            Action::ChangeGovernment { .. } => "change_government",
            Action::ExpendGreatPerson { .. } => "expend_great_person",
        }
    }

    /// The unit performing the action, if any
    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            Action::MoveUnit { unit_id, .. }
            | Action::Attack { unit_id, .. }
            | Action::RangedAttack { unit_id, .. }
            | Action::FoundCity { unit_id, .. }
            | Action::BuildImprovement { unit_id, .. }
            | Action::Fortify { unit_id }
            | Action::UpgradeUnit { unit_id }
            | Action::EstablishTradeRoute { unit_id, .. } => Some(unit_id),
            _ => None,
        }
    }
}
