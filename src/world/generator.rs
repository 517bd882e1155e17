//! Terrain, resource and wonder generation

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::config::{CivDefinition, GameConfig, WorldGenConfig};
use crate::core::types::{Coord, ResourceKind, Terrain};
use crate::state::tile::Tile;
use crate::world::noise::ValueNoise;

// Stream offsets so the noise fields and rolls never share a sequence
const MOISTURE_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;
const RESOURCE_STREAM: u64 = 0xD1B5_4A32_D192_ED03;
const START_STREAM: u64 = 0x94D0_49BB_1331_11EB;

/// Generate the tile grid (`grid[y][x]`) for a game
///
/// Identical inputs always produce identical grids. Every start position from
/// the civilization roster gets a 3x3 plains clearing with a food resource.
pub fn generate(seed: u64, grid_size: usize, config: &GameConfig) -> Vec<Vec<Tile>> {
    let mut grid = generate_terrain(seed, grid_size, &config.world);
    place_resources(&mut grid, seed, &config.world);
    let starts = start_positions(grid_size, &config.civilizations);
    clear_start_areas(&mut grid, seed, &starts);
    grid
}

/// Start positions from the roster's grid fractions
///
/// Positions are kept one tile off the border so the start clearing fits.
pub fn start_positions(grid_size: usize, civs: &[CivDefinition]) -> Vec<Coord> {
    let max = grid_size.saturating_sub(2).max(1) as i32;
    civs.iter()
        .map(|civ| {
            let x = (civ.start[0] * grid_size as f64).floor() as i32;
            let y = (civ.start[1] * grid_size as f64).floor() as i32;
            Coord::new(x.clamp(1, max), y.clamp(1, max))
        })
        .collect()
}

fn generate_terrain(seed: u64, grid_size: usize, config: &WorldGenConfig) -> Vec<Vec<Tile>> {
    let elevation = ValueNoise::new(seed);
    let moisture = ValueNoise::new(seed ^ MOISTURE_STREAM);
    let half = grid_size as f64 / 2.0;

    (0..grid_size)
        .map(|y| {
            (0..grid_size)
                .map(|x| {
                    let (fx, fy) = (x as f64, y as f64);
                    let mut elev =
                        elevation.fractal(fx, fy, config.noise_scale, config.octaves, config.persistence);
                    let moist =
                        moisture.fractal(fx, fy, config.noise_scale, config.octaves, config.persistence);

                    // Radial falloff: 0 at the center, 1 at the corners
                    let dx = (fx + 0.5 - half) / half;
                    let dy = (fy + 0.5 - half) / half;
                    let dist = ((dx * dx + dy * dy).sqrt() / std::f64::consts::SQRT_2).min(1.0);
                    elev *= 1.0 - config.edge_falloff * dist * dist;

                    Tile::new(x as i32, y as i32, classify(elev, moist, config))
                })
                .collect()
        })
        .collect()
}

fn classify(elevation: f64, moisture: f64, config: &WorldGenConfig) -> Terrain {
    if elevation < config.water_level {
        Terrain::Water
    } else if elevation > config.mountain_level {
        Terrain::Mountain
    } else if elevation > config.hills_level {
        Terrain::Hills
    } else if moisture < config.desert_moisture {
        Terrain::Desert
    } else if moisture > config.forest_moisture {
        Terrain::Forest
    } else {
        Terrain::Plains
    }
}

fn resource_for(terrain: Terrain, rng: &mut ChaCha8Rng) -> Option<ResourceKind> {
    let flip = rng.gen_bool(0.5);
    match terrain {
        Terrain::Desert => Some(ResourceKind::Gold),
        Terrain::Hills => Some(if flip { ResourceKind::Iron } else { ResourceKind::Stone }),
        Terrain::Plains => Some(if flip { ResourceKind::Wheat } else { ResourceKind::Horses }),
        Terrain::Water => Some(ResourceKind::Fish),
        Terrain::Mountain => Some(ResourceKind::Gems),
        Terrain::Forest => None,
    }
}

fn place_resources(grid: &mut [Vec<Tile>], seed: u64, config: &WorldGenConfig) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ RESOURCE_STREAM);
    let mut wonders = config.wonders.iter();

    for tile in grid.iter_mut().flatten() {
        // Fixed number of draws per tile keeps the stream aligned across terrain
        let resource_roll = rng.gen_range(0..100u32);
        let wonder_roll = rng.gen_range(0..1000u32);
        let kind = resource_for(tile.terrain, &mut rng);

        if resource_roll < config.resource_chance_pct {
            tile.resource = kind;
        }
        if matches!(tile.terrain, Terrain::Mountain | Terrain::Hills)
            && wonder_roll < config.wonder_chance_per_mille
        {
            tile.natural_wonder = wonders.next().cloned();
        }
    }
}

fn clear_start_areas(grid: &mut [Vec<Tile>], seed: u64, starts: &[Coord]) {
    let size = grid.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ START_STREAM);

    for start in starts {
        let mut area = vec![*start];
        area.extend(start.neighbors(size));
        for coord in &area {
            let tile = &mut grid[coord.y as usize][coord.x as usize];
            tile.terrain = Terrain::Plains;
            tile.natural_wonder = None;
            if !matches!(tile.resource, Some(ResourceKind::Wheat | ResourceKind::Horses)) {
                tile.resource = None;
            }
        }

        let has_food = area
            .iter()
            .any(|c| grid[c.y as usize][c.x as usize].resource == Some(ResourceKind::Wheat));
        if !has_food {
            let ring: Vec<Coord> = area[1..].to_vec();
            if let Some(spot) = ring.choose(&mut rng) {
                grid[spot.y as usize][spot.x as usize].resource = Some(ResourceKind::Wheat);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig::load_default().unwrap()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let config = config();
        assert_eq!(generate(99, 20, &config), generate(99, 20, &config));
    }

    #[test]
    fn test_different_seeds_give_different_maps() {
        let config = config();
        assert_ne!(generate(1, 20, &config), generate(2, 20, &config));
    }

    #[test]
    fn test_grid_shape_and_coordinates() {
        let grid = generate(5, 16, &config());
        assert_eq!(grid.len(), 16);
        for (y, row) in grid.iter().enumerate() {
            assert_eq!(row.len(), 16);
            for (x, tile) in row.iter().enumerate() {
                assert_eq!((tile.x, tile.y), (x as i32, y as i32));
                assert!(tile.owner.is_none());
            }
        }
    }

    #[test]
    fn test_start_areas_are_plains_with_food() {
        let config = config();
        let grid = generate(1234, 24, &config);
        for start in start_positions(24, &config.civilizations) {
            let mut area = vec![start];
            area.extend(start.neighbors(24));
            assert!(area
                .iter()
                .all(|c| grid[c.y as usize][c.x as usize].terrain == Terrain::Plains));
            assert!(area
                .iter()
                .any(|c| grid[c.y as usize][c.x as usize].resource == Some(ResourceKind::Wheat)));
        }
    }

    #[test]
    fn test_border_tends_to_water() {
        let grid = generate(77, 32, &config());
        let corners = [(0, 0), (31, 0), (0, 31), (31, 31)];
        let water = corners
            .iter()
            .filter(|(x, y)| grid[*y][*x].terrain == Terrain::Water)
            .count();
        assert!(water >= 2, "expected island falloff at corners, got {} water", water);
    }
}
