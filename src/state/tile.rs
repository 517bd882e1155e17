//! Map tiles

use serde::{Deserialize, Serialize};

use crate::core::types::{CityId, CivId, Coord, ImprovementKind, ResourceKind, Terrain, UnitId};

/// An improvement under construction or finished on a tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileImprovement {
    pub kind: ImprovementKind,
    pub progress: u32,
    pub turns_required: u32,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub terrain: Terrain,
    pub resource: Option<ResourceKind>,
    pub owner: Option<CivId>,
    pub city_id: Option<CityId>,
    pub unit_id: Option<UnitId>,
    pub improvement: Option<TileImprovement>,
    pub natural_wonder: Option<String>,
}

impl Tile {
    pub fn new(x: i32, y: i32, terrain: Terrain) -> Self {
        Self {
            x,
            y,
            terrain,
            resource: None,
            owner: None,
            city_id: None,
            unit_id: None,
            improvement: None,
            natural_wonder: None,
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    pub fn has_road(&self) -> bool {
        self.completed_improvement() == Some(ImprovementKind::Road)
    }

    pub fn completed_improvement(&self) -> Option<ImprovementKind> {
        self.improvement
            .as_ref()
            .filter(|imp| imp.complete)
            .map(|imp| imp.kind)
    }
}
