pub mod config;
pub mod error;
pub mod types;

pub use config::{CivDefinition, GameConfig, PolicyConfig, WorldGenConfig};
pub use error::{CivError, Result};
pub use types::{CityId, CivId, Coord, Metric, Relationship, Terrain, UnitId, Yields};
