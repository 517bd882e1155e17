//! Cities and their production orders

use serde::{Deserialize, Serialize};

use crate::core::types::{CityId, CivId, Coord, Yields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionKind {
    Unit,
    Building,
}

/// What a city is currently building
///
/// `progress` only grows and never exceeds `cost`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionOrder {
    pub kind: ProductionKind,
    pub target: String,
    pub progress: u32,
    pub cost: u32,
}

impl ProductionOrder {
    pub fn new(kind: ProductionKind, target: impl Into<String>, cost: u32) -> Self {
        Self {
            kind,
            target: target.into(),
            progress: 0,
            cost,
        }
    }

    /// Add production, capped at the order's cost
    pub fn advance(&mut self, amount: u32) {
        self.progress = (self.progress + amount).min(self.cost);
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.cost
    }

    pub fn remaining(&self) -> u32 {
        self.cost.saturating_sub(self.progress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub owner: CivId,
    pub position: Coord,
    pub population: u32,
    pub stored_food: i32,
    pub yields: Yields,
    pub stored_culture: i32,
    pub border_radius: u32,
    pub buildings: Vec<String>,
    pub current_production: Option<ProductionOrder>,
    pub defense: i32,
    pub hp: u32,
    pub max_hp: u32,
    pub happiness: i32,
    pub is_capital: bool,
}

impl City {
    pub fn has_building(&self, id: &str) -> bool {
        self.buildings.iter().any(|b| b == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_progress_capped() {
        let mut order = ProductionOrder::new(ProductionKind::Building, "library", 50);
        order.advance(30);
        assert_eq!(order.progress, 30);
        assert!(!order.is_complete());
        order.advance(30);
        assert_eq!(order.progress, 50);
        assert!(order.is_complete());
        assert_eq!(order.remaining(), 0);
    }
}
