//! # CADENCE World Generator
//!
//! Generates one world on a paced frame loop and prints its biome summary.
//!
//! ```bash
//! # Default world
//! worldgen
//!
//! # Custom settings, verbose scheduler logs
//! RUST_LOG=cadence_core=trace worldgen world.toml
//! ```

use std::process::ExitCode;

use cadence_core::{Executor, FrameLoop};
use cadence_worldgen::{generate_world, WorldGenConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match WorldGenConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(%path, error = %e, "could not load settings");
                return ExitCode::FAILURE;
            }
        },
        None => WorldGenConfig::default(),
    };

    info!(
        width = config.width,
        height = config.height,
        seed = config.seed,
        tick_rate = config.frame.tick_rate,
        "generating world"
    );

    let world = generate_world(&config);
    let mut executor = Executor::new();
    executor.spawn(world.run());

    let mut frame = FrameLoop::from_config(&config.frame);
    let ticks = match frame.drive(&mut executor) {
        Ok(ticks) => ticks,
        Err(e) => {
            error!(error = %e, "generation did not finish");
            return ExitCode::FAILURE;
        }
    };

    let stats = frame.stats();
    info!(
        ticks,
        avg_tick_us = stats.avg_tick_us,
        max_tick_us = stats.max_tick_us,
        late_ticks = stats.late_ticks,
        "frame loop finished"
    );

    match world.take_outcome() {
        Some(Ok(world)) => {
            println!("═══════════════════════════════════════════════");
            println!("  WORLD {}x{}  seed {:#x}", config.width, config.height, config.seed);
            println!("═══════════════════════════════════════════════");
            let total = world.biomes.len().max(1);
            for (biome, count) in world.biome_counts() {
                #[allow(clippy::cast_precision_loss)]
                let share = count as f64 * 100.0 / total as f64;
                println!("  {:<30} {:>7} {:>6.2}%", biome.name(), count, share);
            }
            ExitCode::SUCCESS
        }
        Some(Err(e)) => {
            error!(error = %e, "generation failed");
            ExitCode::FAILURE
        }
        None => {
            error!("generation finished without a result");
            ExitCode::FAILURE
        }
    }
}
