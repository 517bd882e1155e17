//! World generation and game bootstrap

pub mod bootstrap;
pub mod generator;
pub mod noise;

pub use bootstrap::{create_game, MIN_GRID_SIZE};
pub use generator::{generate, start_positions};
