//! # World Generation Settings
//!
//! Loaded once at startup from TOML. Every section has production defaults,
//! so a settings file only needs the keys it changes:
//!
//! ```toml
//! width = 512
//! height = 256
//! seed = 7
//!
//! [terrain]
//! low_ground = 3.0
//!
//! [frame]
//! tick_rate = 120
//! ```

use std::path::Path;

use cadence_core::FrameConfig;
use serde::{Deserialize, Serialize};

use crate::error::{WorldGenError, WorldGenResult};

/// Top-level world generation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldGenConfig {
    /// Map width in cells.
    pub width: usize,
    /// Map height in cells.
    pub height: usize,
    /// World seed. Every generator derives its own stream from it.
    pub seed: u64,
    /// Cells a generator computes before yielding for the tick.
    pub samples_per_tick: usize,
    /// Height field shaping.
    pub terrain: TerrainParams,
    /// Humidity field.
    pub humidity: WeatherParams,
    /// Temperature field.
    pub temperature: TemperatureParams,
    /// Biome band thresholds.
    pub biome: BiomeParams,
    /// Pacing of the generation loop.
    pub frame: FrameConfig,
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            seed: 0x5EED_CAFE,
            samples_per_tick: 4096,
            terrain: TerrainParams::default(),
            humidity: WeatherParams::default(),
            temperature: TemperatureParams::default(),
            biome: BiomeParams::default(),
            frame: FrameConfig::default(),
        }
    }
}

/// Height field settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Noise coordinate scale across the whole map.
    pub scale: f64,
    /// Noise octaves.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub frequency_growth: f64,
    /// Exponent flattening low ground. Higher means more lowland.
    pub low_ground: f64,
    /// Exponent sharpening peaks. Higher means steeper mountains.
    pub high_mountain: f64,
    /// How far heights drop at the map corners (0 disables).
    pub edge_falloff: f64,
    /// How quickly the drop grows with distance from the centre.
    pub edge_falloff_power: f64,
    /// Raised local areas scattered over the map.
    pub local_areas: LocalAreaParams,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            scale: 5.0,
            octaves: 5,
            frequency_growth: 2.0,
            low_ground: 4.0,
            high_mountain: 6.0,
            edge_falloff: 0.6,
            edge_falloff_power: 2.0,
            local_areas: LocalAreaParams::default(),
        }
    }
}

/// Raised local areas: seeded points that lift the terrain around them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalAreaParams {
    /// Number of points.
    pub count: usize,
    /// Distance at which a point lifts by exactly `lift`.
    pub radius: f64,
    /// Lift at `radius`.
    pub lift: f64,
    /// Base of the exponential growth toward the point.
    pub steepness: f64,
    /// Noise scale modulating the lift.
    pub noise_scale: f64,
}

impl Default for LocalAreaParams {
    fn default() -> Self {
        Self {
            count: 5,
            radius: 0.15,
            lift: 0.05,
            steepness: 8.0,
            noise_scale: 4.0,
        }
    }
}

/// A weather-like noise field with an offset and a warm/cold shift.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherParams {
    /// Noise coordinate scale.
    pub scale: f64,
    /// Noise octaves.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub frequency_growth: f64,
    /// Horizontal drift of the pattern.
    pub x_offset: f64,
    /// Vertical drift of the pattern.
    pub y_offset: f64,
    /// Warm (positive) or cold (negative) shift, in `[-1, 1]`.
    pub shift: f64,
}

impl Default for WeatherParams {
    fn default() -> Self {
        Self {
            scale: 3.0,
            octaves: 4,
            frequency_growth: 2.0,
            x_offset: 0.0,
            y_offset: 0.0,
            shift: 0.0,
        }
    }
}

/// Temperature field settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureParams {
    /// Temperature at the poles.
    pub min: f64,
    /// Temperature at the equator.
    pub max: f64,
    /// How far local weather moves temperature off the latitude band.
    pub variety: f64,
    /// Weather field supplying the local variety.
    pub weather: WeatherParams,
}

impl Default for TemperatureParams {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            variety: 0.4,
            weather: WeatherParams::default(),
        }
    }
}

/// Thresholds separating biome bands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeParams {
    /// Heights at or above this are highland.
    pub highland: f64,
    /// Upper bounds of the cold, subcold, temperate and subtropical bands.
    pub temperature_bands: [f64; 4],
    /// Upper bounds of the dry, semi-dry and semi-humid bands.
    pub humidity_bands: [f64; 3],
}

impl Default for BiomeParams {
    fn default() -> Self {
        Self {
            highland: 0.55,
            temperature_bands: [0.2, 0.4, 0.6, 0.8],
            humidity_bands: [0.3, 0.5, 0.7],
        }
    }
}

impl WorldGenConfig {
    /// Parses and validates settings from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`WorldGenError::Parse`] for malformed TOML and
    /// [`WorldGenError::InvalidConfig`] for settings that fail validation.
    pub fn from_toml_str(text: &str) -> WorldGenResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a settings file.
    ///
    /// # Errors
    ///
    /// Returns [`WorldGenError::Io`] if the file cannot be read, otherwise
    /// the errors of [`WorldGenConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> WorldGenResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| WorldGenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded world settings");
        Ok(config)
    }

    /// Checks that the settings describe a world that can be generated.
    ///
    /// # Errors
    ///
    /// Returns [`WorldGenError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> WorldGenResult<()> {
        if self.width == 0 || self.height == 0 {
            return invalid(format!("map size {}x{} is empty", self.width, self.height));
        }
        if self.samples_per_tick == 0 {
            return invalid("samples_per_tick must be at least 1");
        }
        if self.frame.tick_rate == 0 {
            return invalid("frame.tick_rate must be at least 1");
        }

        check_noise("terrain", self.terrain.octaves, self.terrain.frequency_growth)?;
        check_noise("humidity", self.humidity.octaves, self.humidity.frequency_growth)?;
        check_noise(
            "temperature.weather",
            self.temperature.weather.octaves,
            self.temperature.weather.frequency_growth,
        )?;
        if self.terrain.low_ground <= 0.0 || self.terrain.high_mountain <= 0.0 {
            return invalid("terrain shaping exponents must be positive");
        }
        for (name, shift) in [
            ("humidity", self.humidity.shift),
            ("temperature.weather", self.temperature.weather.shift),
        ] {
            if !(-1.0..=1.0).contains(&shift) {
                return invalid(format!("{name}.shift {shift} is outside [-1, 1]"));
            }
        }
        if self.temperature.min > self.temperature.max {
            return invalid("temperature.min is above temperature.max");
        }
        if !is_ascending_unit(&self.biome.temperature_bands) {
            return invalid("biome.temperature_bands must ascend within [0, 1]");
        }
        if !is_ascending_unit(&self.biome.humidity_bands) {
            return invalid("biome.humidity_bands must ascend within [0, 1]");
        }
        Ok(())
    }

    /// Number of cells in each generated field.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

fn invalid(reason: impl Into<String>) -> WorldGenResult<()> {
    Err(WorldGenError::InvalidConfig(reason.into()))
}

fn check_noise(section: &str, octaves: u32, growth: f64) -> WorldGenResult<()> {
    if octaves == 0 {
        return invalid(format!("{section}.octaves must be at least 1"));
    }
    if growth <= 0.0 {
        return invalid(format!("{section}.frequency_growth must be positive"));
    }
    Ok(())
}

fn is_ascending_unit(bands: &[f64]) -> bool {
    bands.iter().all(|b| (0.0..=1.0).contains(b)) && bands.windows(2).all(|w| w[0] <= w[1])
}
