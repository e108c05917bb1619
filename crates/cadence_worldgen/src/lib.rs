//! # CADENCE Worldgen
//!
//! Deterministic world generation spread across ticks.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use cadence_core::{block_on, Executor};
//! use cadence_worldgen::{generate_world, WorldGenConfig};
//!
//! let config = WorldGenConfig {
//!     width: 16,
//!     height: 16,
//!     samples_per_tick: 64,
//!     ..WorldGenConfig::default()
//! };
//! let world = generate_world(&config);
//!
//! let mut executor = Executor::new();
//! executor.spawn(world.run());
//! block_on(&mut executor, Duration::from_millis(16));
//!
//! let world = world.take_result().expect("world generated");
//! assert_eq!(world.biomes.len(), 256);
//! ```
//!
//! Every generator returns a [`cadence_core::Monad`]; the [`pipeline`]
//! module chains them.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod biome;
pub mod config;
pub mod error;
pub mod field;
pub mod noise;
pub mod pipeline;
pub mod temperature;
pub mod terrain;
pub mod weather;

pub use biome::{biomes, Biome, BiomeClassifier, BiomeMap};
pub use config::{
    BiomeParams, LocalAreaParams, TemperatureParams, TerrainParams, WeatherParams, WorldGenConfig,
};
pub use error::{WorldGenError, WorldGenResult};
pub use field::{generate_grid, Field, Grid};
pub use noise::{PerlinNoise, WorldSeed};
pub use pipeline::{generate_world, Climate, WorldMap};
pub use temperature::temperature;
pub use terrain::terrain;
pub use weather::{humidity, weather_field};
