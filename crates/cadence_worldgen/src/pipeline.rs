//! # World Pipeline
//!
//! Chains the generators into one cooperative computation:
//!
//! ```text
//! terrain ──then──▶ when_all2(humidity, temperature) ──map──▶ Climate
//!                                                              │
//!                                                     then ────┘
//!                                                              ▼
//!                                                          biomes ──▶ WorldMap
//! ```
//!
//! Humidity and temperature only start once terrain has settled, and run
//! side by side in the same ticks.

use std::collections::BTreeMap;
use std::rc::Rc;

use cadence_core::{when_all2, Monad};
use tracing::info;

use crate::biome::{biome_counts, biomes, Biome, BiomeMap};
use crate::config::WorldGenConfig;
use crate::field::Field;
use crate::temperature::temperature;
use crate::terrain::terrain;
use crate::weather::humidity;

/// The three fields biome classification reads.
#[derive(Clone, Debug, PartialEq)]
pub struct Climate {
    /// Terrain height.
    pub height: Field,
    /// Humidity.
    pub humidity: Field,
    /// Temperature.
    pub temperature: Field,
}

/// A finished world.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldMap {
    /// Terrain height.
    pub height: Field,
    /// Humidity.
    pub humidity: Field,
    /// Temperature.
    pub temperature: Field,
    /// Biome of every cell.
    pub biomes: BiomeMap,
}

impl WorldMap {
    /// Cells per biome, for biomes that occur.
    #[must_use]
    pub fn biome_counts(&self) -> BTreeMap<Biome, usize> {
        biome_counts(&self.biomes)
    }
}

/// Builds the whole world for `config`.
///
/// Settings that fail validation produce an already-failed monad carrying
/// the [`WorldGenError`](crate::WorldGenError).
#[must_use]
pub fn generate_world(config: &WorldGenConfig) -> Monad<WorldMap> {
    if let Err(error) = config.validate() {
        return Monad::err(error);
    }

    let climate_config = config.clone();
    let biome_params = config.biome.clone();
    let per_tick = config.samples_per_tick;

    terrain(config)
        .then(move |height| {
            info!(cells = height.len(), "terrain settled");
            let humidity = humidity(&climate_config);
            let temperature = temperature(&climate_config);
            when_all2(&humidity, &temperature).map(move |(humidity, temperature)| Climate {
                height,
                humidity,
                temperature,
            })
        })
        .then(move |climate| {
            info!("climate settled");
            let climate = Rc::new(climate);
            let fields = Rc::clone(&climate);
            biomes(climate, biome_params, per_tick).map(move |biomes| {
                let Climate {
                    height,
                    humidity,
                    temperature,
                } = Rc::try_unwrap(fields).unwrap_or_else(|shared| (*shared).clone());
                WorldMap {
                    height,
                    humidity,
                    temperature,
                    biomes,
                }
            })
        })
}
