//! Seeded fractal value noise
//!
//! A lattice of random values indexed through a shuffled permutation table,
//! interpolated with a smoothstep curve and summed over octaves. The same
//! seed always yields the same field.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TABLE_SIZE: usize = 256;

pub struct ValueNoise {
    perm: Vec<usize>,
    values: Vec<f64>,
}

impl ValueNoise {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let values = (0..TABLE_SIZE).map(|_| rng.gen::<f64>()).collect();
        let mut perm: Vec<usize> = (0..TABLE_SIZE).collect();
        perm.shuffle(&mut rng);
        // Doubled so lookups never need a second wrap
        let doubled = perm.iter().chain(perm.iter()).copied().collect();
        Self {
            perm: doubled,
            values,
        }
    }

    fn lattice(&self, ix: i64, iy: i64) -> f64 {
        let xi = ix.rem_euclid(TABLE_SIZE as i64) as usize;
        let yi = iy.rem_euclid(TABLE_SIZE as i64) as usize;
        self.values[self.perm[self.perm[xi] + yi]]
    }

    /// Single-octave noise in [0, 1]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = smoothstep(x - x0);
        let ty = smoothstep(y - y0);
        let (ix, iy) = (x0 as i64, y0 as i64);

        let top = lerp(self.lattice(ix, iy), self.lattice(ix + 1, iy), tx);
        let bottom = lerp(self.lattice(ix, iy + 1), self.lattice(ix + 1, iy + 1), tx);
        lerp(top, bottom, ty)
    }

    /// Octave-summed noise, normalized back to [0, 1]
    pub fn fractal(&self, x: f64, y: f64, scale: f64, octaves: u32, persistence: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = scale;
        let mut norm = 0.0;
        for _ in 0..octaves {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            norm += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }
        if norm > 0.0 {
            total / norm
        } else {
            0.0
        }
    }
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_field() {
        let a = ValueNoise::new(42);
        let b = ValueNoise::new(42);
        for i in 0..20 {
            let (x, y) = (i as f64 * 0.37, i as f64 * 1.13);
            assert_eq!(a.fractal(x, y, 0.1, 4, 0.5), b.fractal(x, y, 0.1, 4, 0.5));
        }
    }

    #[test]
    fn test_values_in_unit_range() {
        let noise = ValueNoise::new(7);
        for y in 0..30 {
            for x in 0..30 {
                let v = noise.fractal(x as f64, y as f64, 0.15, 4, 0.5);
                assert!((0.0..=1.0).contains(&v), "noise out of range: {}", v);
            }
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = ValueNoise::new(1);
        let b = ValueNoise::new(2);
        let differs = (0..50).any(|i| {
            let p = i as f64 * 0.71;
            a.sample(p, p * 0.5) != b.sample(p, p * 0.5)
        });
        assert!(differs);
    }
}
