//! Temperature: a latitude band warmest at the equator, moved off the band by
//! a weather field.

use cadence_core::Monad;

use crate::config::{TemperatureParams, WorldGenConfig};
use crate::field::Field;
use crate::noise::{purpose, WorldSeed};
use crate::weather::weather_field;

/// Temperature at latitude `y` (0 and 1 are the poles) for a weather sample.
#[must_use]
pub fn temperature_at(params: &TemperatureParams, y: f64, weather: f64) -> f64 {
    let latitude = 1.0 - (y - 0.5).abs() / 0.5;
    let band = params.min + (params.max - params.min) * latitude;
    (band + (weather - 0.5) * params.variety).clamp(0.0, 1.0)
}

/// Generates the temperature field.
///
/// Runs the weather field first, then maps it through the latitude band in
/// the tick the weather settles.
#[must_use]
pub fn temperature(config: &WorldGenConfig) -> Monad<Field> {
    let params = config.temperature.clone();
    weather_field(
        &params.weather,
        WorldSeed::new(config.seed).derive(purpose::TEMPERATURE),
        config.width,
        config.height,
        config.samples_per_tick,
    )
    .map(move |weather| weather.map_cells(|_, y, &sample| temperature_at(&params, y, sample)))
}
