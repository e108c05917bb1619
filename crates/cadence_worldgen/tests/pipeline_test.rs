//! End-to-end world generation through the scheduler.

use std::time::Duration;

use cadence_core::{block_on, when_all2, Executor, MonadState, Resumable, TaskError};
use cadence_worldgen::{
    generate_world, humidity, temperature, terrain, WorldGenConfig, WorldGenError, WorldMap,
};
use proptest::prelude::*;

const DELTA: Duration = Duration::from_millis(16);

fn small(seed: u64, samples_per_tick: usize) -> WorldGenConfig {
    WorldGenConfig {
        width: 16,
        height: 8,
        seed,
        samples_per_tick,
        ..WorldGenConfig::default()
    }
}

fn build(config: &WorldGenConfig) -> (u64, WorldMap) {
    let world = generate_world(config);
    let mut executor = Executor::new();
    executor.spawn(world.run());
    let ticks = block_on(&mut executor, DELTA);
    (ticks, world.take_result().expect("world generated"))
}

#[test]
fn test_world_has_configured_shape() {
    let (_, world) = build(&small(1, 32));
    for field in [&world.height, &world.humidity, &world.temperature] {
        assert_eq!(field.width(), 16);
        assert_eq!(field.height(), 8);
        let (lo, hi) = field.range().unwrap();
        assert!(lo >= 0.0 && hi <= 1.0);
    }
    assert_eq!(world.biomes.len(), 128);
    assert_eq!(world.biome_counts().values().sum::<usize>(), 128);
}

#[test]
fn test_whole_world_fits_in_one_tick() {
    let (ticks, _) = build(&small(1, 4096));
    assert_eq!(ticks, 1);
}

#[test]
fn test_stages_are_tick_sliced() {
    // 128 cells in slices of 32: four ticks per stage. Each stage starts in
    // the tick the previous one settles.
    let (ticks, _) = build(&small(1, 32));
    assert_eq!(ticks, 4 + 3 + 3);
}

#[test]
fn test_nothing_observable_before_the_last_tick() {
    let world = generate_world(&small(2, 32));
    let mut executor = Executor::new();
    executor.spawn(world.run());
    for _ in 0..9 {
        executor.resume(DELTA);
        assert_eq!(world.state(), MonadState::Running);
        assert!(world.take_result().is_none());
    }
    executor.resume(DELTA);
    assert_eq!(world.state(), MonadState::Succeeded);
}

#[test]
fn test_slice_size_does_not_change_the_world() {
    let (_, coarse) = build(&small(5, 4096));
    let (_, fine) = build(&small(5, 7));
    assert_eq!(coarse, fine);
}

#[test]
fn test_pipeline_matches_stages_run_by_hand() {
    let config = small(11, 4096);
    let (_, world) = build(&config);

    let height = terrain(&config);
    let climate = when_all2(&humidity(&config), &temperature(&config));
    let mut executor = Executor::new();
    executor.spawn(height.run());
    executor.spawn(climate.run());
    block_on(&mut executor, DELTA);

    let (hu, te) = climate.take_result().unwrap();
    assert_eq!(height.take_result().unwrap(), world.height);
    assert_eq!(hu, world.humidity);
    assert_eq!(te, world.temperature);
}

#[test]
fn test_invalid_config_fails_without_ticking() {
    let config = WorldGenConfig {
        width: 0,
        ..WorldGenConfig::default()
    };
    let world = generate_world(&config);
    assert_eq!(world.state(), MonadState::Failed);

    match world.error() {
        Some(TaskError::External(inner)) => {
            let inner = inner.downcast_ref::<WorldGenError>().expect("world error");
            assert!(matches!(inner, WorldGenError::InvalidConfig(_)));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_same_seed_same_world(seed in any::<u64>()) {
        let (_, a) = build(&small(seed, 64));
        let (_, b) = build(&small(seed, 64));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_highland_biomes_only_on_highland(seed in any::<u64>()) {
        let config = small(seed, 128);
        let (_, world) = build(&config);
        for (height, biome) in world.height.cells().iter().zip(world.biomes.cells()) {
            prop_assert_eq!(biome.is_highland(), *height >= config.biome.highland);
        }
    }
}
