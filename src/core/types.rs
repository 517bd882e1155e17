//! Core type definitions used throughout the codebase

use derive_more::{Display, From};
use serde::de::value::StrDeserializer;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Serialize};

/// Reserved owner id for barbarian units
pub const BARBARIAN_ID: &str = "barbarians";

/// Identifier for civilizations
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct CivId(pub String);

impl CivId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn barbarians() -> Self {
        Self(BARBARIAN_ID.to_string())
    }

    pub fn is_barbarian(&self) -> bool {
        self.0 == BARBARIAN_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CivId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier for units
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier for cities
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct CityId(pub String);

impl From<&str> for CityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile key in `"x,y"` form, as stored in known-tile sets
    pub fn key(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let (x, y) = key.split_once(',')?;
        Some(Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }

    pub fn chebyshev(&self, other: Coord) -> u32 {
        (self.x - other.x).unsigned_abs().max((self.y - other.y).unsigned_abs())
    }

    pub fn manhattan(&self, other: Coord) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    pub fn in_bounds(&self, size: usize) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as usize) < size && (self.y as usize) < size
    }

    /// The eight surrounding coordinates, clipped to the grid
    pub fn neighbors(&self, size: usize) -> Vec<Coord> {
        let mut out = Vec::with_capacity(8);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let c = Coord::new(self.x + dx, self.y + dy);
                if c.in_bounds(size) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// All in-bounds coordinates within `radius` under `metric`, center included
    pub fn within(&self, radius: u32, metric: Metric, size: usize) -> Vec<Coord> {
        let r = radius as i32;
        let mut out = Vec::new();
        for y in (self.y - r)..=(self.y + r) {
            for x in (self.x - r)..=(self.x + r) {
                let c = Coord::new(x, y);
                if c.in_bounds(size) && metric.distance(*self, c) <= radius {
                    out.push(c);
                }
            }
        }
        out
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Distance metric used for vision and territory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Chebyshev,
    Manhattan,
}

impl Metric {
    pub fn distance(&self, a: Coord, b: Coord) -> u32 {
        match self {
            Metric::Chebyshev => a.chebyshev(b),
            Metric::Manhattan => a.manhattan(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Plains,
    Forest,
    Mountain,
    Water,
    Desert,
    Hills,
}

impl Terrain {
    pub const ALL: [Terrain; 6] = [
        Terrain::Plains,
        Terrain::Forest,
        Terrain::Mountain,
        Terrain::Water,
        Terrain::Desert,
        Terrain::Hills,
    ];

    pub fn is_land(&self) -> bool {
        !matches!(self, Terrain::Water)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Wheat,
    Fish,
    Horses,
    Iron,
    Stone,
    Gold,
    Gems,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementKind {
    Farm,
    Mine,
    Road,
}

/// Pairwise standing between two civilizations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    #[default]
    Neutral,
    Friendly,
    Allied,
    Hostile,
    War,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreatPersonKind {
    Scientist,
    Engineer,
    Merchant,
    Artist,
    General,
}

impl GreatPersonKind {
    pub const ALL: [GreatPersonKind; 5] = [
        GreatPersonKind::Scientist,
        GreatPersonKind::Engineer,
        GreatPersonKind::Merchant,
        GreatPersonKind::Artist,
        GreatPersonKind::General,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceshipPart {
    Booster,
    Cockpit,
    Engine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryType {
    Conquest,
    Science,
    Score,
}

/// Per-turn output of a tile, building or city
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Yields {
    pub food: i32,
    pub production: i32,
    pub gold: i32,
    pub science: i32,
    pub culture: i32,
}

impl Yields {
    pub fn total(&self) -> i32 {
        self.food + self.production + self.gold + self.science + self.culture
    }
}

impl std::ops::Add for Yields {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            food: self.food + rhs.food,
            production: self.production + rhs.production,
            gold: self.gold + rhs.gold,
            science: self.science + rhs.science,
            culture: self.culture + rhs.culture,
        }
    }
}

impl std::ops::AddAssign for Yields {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Apply a percentage modifier, rounding toward zero
pub fn apply_pct(value: i32, pct: i32) -> i32 {
    value * (100 + pct) / 100
}

/// Parse a snake_case key (as used in TOML tables) into a unit enum
pub fn parse_key<'de, T: Deserialize<'de>>(key: &'de str) -> Option<T> {
    let de: StrDeserializer<'de, serde::de::value::Error> = key.into_deserializer();
    T::deserialize(de).ok()
}
