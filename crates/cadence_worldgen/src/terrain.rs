//! # Terrain
//!
//! Height field generation.
//!
//! Each cell's height is, in order:
//! 1. Fractal noise plus the lift of nearby local-area points
//! 2. Raised to `low_ground` (flattens lowland)
//! 3. Mirrored through `high_mountain` (sharpens peaks)
//! 4. Scaled down with distance from the map centre (edge fall-off)

use cadence_core::Monad;

use crate::config::{TerrainParams, WorldGenConfig};
use crate::field::{generate_grid, Field};
use crate::noise::{purpose, Fractal, PerlinNoise, SeedRng, WorldSeed};

const LOCAL_AREA_OCTAVES: u32 = 3;

/// Computes terrain height for normalised map coordinates.
pub struct TerrainShaper {
    params: TerrainParams,
    base: PerlinNoise,
    local: PerlinNoise,
    offset: (f64, f64),
    points: Vec<(f64, f64)>,
}

impl TerrainShaper {
    /// Builds a shaper for `params`, seeded from `seed`.
    #[must_use]
    pub fn new(params: &TerrainParams, seed: WorldSeed) -> Self {
        let terrain_seed = seed.derive(purpose::TERRAIN);
        let mut rng = SeedRng::new(seed.derive(purpose::LOCAL_AREAS));
        let offset = (rng.next_unit() * 256.0, rng.next_unit() * 256.0);
        let points = (0..params.local_areas.count)
            .map(|_| (rng.next_unit(), rng.next_unit()))
            .collect();

        Self {
            params: params.clone(),
            base: PerlinNoise::new(terrain_seed),
            local: PerlinNoise::new(terrain_seed.derive(purpose::LOCAL_AREAS)),
            offset,
            points,
        }
    }

    /// Height at `(x, y)`, both in `[0, 1]`. The result is in `[0, 1]`.
    #[must_use]
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let fractal = Fractal {
            scale: self.params.scale,
            octaves: self.params.octaves,
            growth: self.params.frequency_growth,
        };
        let raw = self.base.fractal(fractal, x, y, self.offset) + self.local_lift(x, y);

        let mut height = raw.clamp(0.0, 1.0).powf(self.params.low_ground);
        height = 1.0 - (1.0 - height).powf(self.params.high_mountain);
        (height * self.edge_factor(x, y)).clamp(0.0, 1.0)
    }

    /// Lift contributed by local-area points, growing exponentially inside
    /// `radius`.
    fn local_lift(&self, x: f64, y: f64) -> f64 {
        let areas = &self.params.local_areas;
        if self.points.is_empty() {
            return 0.0;
        }
        let fractal = Fractal {
            scale: areas.noise_scale,
            octaves: LOCAL_AREA_OCTAVES,
            growth: 2.0,
        };
        let texture = self.local.fractal(fractal, x, y, (0.0, 0.0));
        self.points
            .iter()
            .map(|&(px, py)| {
                let distance = (px - x).hypot(py - y);
                areas.lift * areas.steepness.powf(areas.radius - distance) * texture
            })
            .sum()
    }

    fn edge_factor(&self, x: f64, y: f64) -> f64 {
        let distance = (x - 0.5).hypot(y - 0.5) / 0.5;
        (1.0 - self.params.edge_falloff * distance.powf(self.params.edge_falloff_power)).max(0.0)
    }
}

/// Generates the height field, `samples_per_tick` cells per tick.
#[must_use]
pub fn terrain(config: &WorldGenConfig) -> Monad<Field> {
    let shaper = TerrainShaper::new(&config.terrain, WorldSeed::new(config.seed));
    generate_grid(
        config.width,
        config.height,
        config.samples_per_tick,
        move |_, x, y| shaper.height_at(x, y),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadence_core::{block_on, Executor};

    use super::*;

    fn small_config() -> WorldGenConfig {
        WorldGenConfig {
            width: 32,
            height: 24,
            samples_per_tick: 100,
            ..WorldGenConfig::default()
        }
    }

    fn run(monad: &Monad<Field>) -> (u64, Field) {
        let mut executor = Executor::new();
        executor.spawn(monad.run());
        let ticks = block_on(&mut executor, Duration::from_millis(16));
        (ticks, monad.take_result().unwrap())
    }

    #[test]
    fn test_heights_in_unit_range() {
        let (ticks, field) = run(&terrain(&small_config()));
        // 768 cells in slices of 100.
        assert_eq!(ticks, 8);
        let (lo, hi) = field.range().unwrap();
        assert!(lo >= 0.0 && hi <= 1.0);
    }

    #[test]
    fn test_same_seed_same_terrain() {
        let config = small_config();
        let (_, a) = run(&terrain(&config));
        let (_, b) = run(&terrain(&config));
        assert_eq!(a, b);

        let other = WorldGenConfig { seed: 99, ..small_config() };
        let (_, c) = run(&terrain(&other));
        assert_ne!(a, c);
    }

    #[test]
    fn test_full_falloff_flattens_corners() {
        let mut params = TerrainParams {
            edge_falloff: 1.0,
            edge_falloff_power: 1.0,
            ..TerrainParams::default()
        };
        params.local_areas.count = 0;
        let shaper = TerrainShaper::new(&params, WorldSeed::new(5));
        // Distance from the centre is exactly 0.5 on the edge midpoints.
        assert!(shaper.height_at(0.0, 0.5).abs() < 1e-12);
        assert!(shaper.height_at(0.0, 0.0).abs() < 1e-12);
    }
}
