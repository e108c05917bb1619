//! Weather-like noise fields: humidity, and the local variety under
//! temperature.

use cadence_core::Monad;

use crate::config::{WeatherParams, WorldGenConfig};
use crate::field::{generate_grid, Field};
use crate::noise::{purpose, Fractal, PerlinNoise, WorldSeed};

/// Pushes a `[0, 1]` sample toward 1 for a positive shift, toward 0 for a
/// negative one. `shift` is in `[-1, 1]`.
#[inline]
#[must_use]
pub fn apply_shift(sample: f64, shift: f64) -> f64 {
    if shift > 0.0 {
        shift + sample * (1.0 - shift)
    } else if shift < 0.0 {
        sample * (1.0 + shift)
    } else {
        sample
    }
}

/// Generates one weather field from `params`.
#[must_use]
pub fn weather_field(
    params: &WeatherParams,
    seed: WorldSeed,
    width: usize,
    height: usize,
    per_tick: usize,
) -> Monad<Field> {
    let noise = PerlinNoise::new(seed);
    let fractal = Fractal {
        scale: params.scale,
        octaves: params.octaves,
        growth: params.frequency_growth,
    };
    let offset = (params.x_offset, params.y_offset);
    let shift = params.shift;

    generate_grid(width, height, per_tick, move |_, x, y| {
        apply_shift(noise.fractal(fractal, x, y, offset), shift).clamp(0.0, 1.0)
    })
}

/// Generates the humidity field.
#[must_use]
pub fn humidity(config: &WorldGenConfig) -> Monad<Field> {
    weather_field(
        &config.humidity,
        WorldSeed::new(config.seed).derive(purpose::HUMIDITY),
        config.width,
        config.height,
        config.samples_per_tick,
    )
}
