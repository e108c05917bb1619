//! # Biome Classification
//!
//! Determines biome from height, temperature and humidity.
//!
//! Height splits lowland from highland. Temperature picks one of five
//! columns (cold, subcold, temperate, subtropical, tropical) and humidity
//! one of four rows (dry, semi-dry, semi-humid, wet).

use std::collections::BTreeMap;
use std::rc::Rc;

use cadence_core::Monad;

use crate::config::BiomeParams;
use crate::field::{generate_grid, Grid};
use crate::pipeline::Climate;

/// Biome types in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Biome {
    /// Cold, wet lowland grass.
    ColdGrassland = 0,
    /// Subarctic conifer forest.
    Taiga = 1,
    /// Temperate mixed forest.
    MixedForest = 2,
    /// Subtropical evergreen forest.
    BroadLeavedForest = 3,
    /// Tropical rain forest.
    TropicalRainForest = 4,
    /// Frozen treeless plain.
    #[default]
    Tundra = 5,
    /// Low scrub.
    Shrubland = 6,
    /// Temperate deciduous forest.
    DeciduousForest = 7,
    /// Subtropical seasonal forest.
    SeasonalBroadLeavedForest = 8,
    /// Tropical seasonal forest.
    TropicalSeasonalForest = 9,
    /// Temperate grassland.
    TemperateGrassland = 10,
    /// Temperate savanna.
    TemperateSavanna = 11,
    /// Subtropical seasonal savanna.
    SeasonalSavanna = 12,
    /// Tropical savanna.
    TropicalSavanna = 13,
    /// Cold desert.
    ColdDesert = 14,
    /// Gravel plain.
    TemperateGravel = 15,
    /// Temperate desert.
    TemperateDesert = 16,
    /// Subtropical desert.
    SubtropicalDesert = 17,
    /// Tropical desert.
    TropicalDesert = 18,
    /// Highland ice.
    Glacier = 19,
    /// Highland forest.
    MountainForest = 20,
    /// Temperate plateau.
    TemperatePlateau = 21,
    /// Subtropical plateau.
    SubtropicalPlateau = 22,
    /// Tropical plateau.
    TropicalPlateau = 23,
    /// Cold bare rock.
    ColdBareRock = 24,
    /// Temperate bare rock.
    TemperateBareRock = 25,
    /// Tropical bare rock.
    TropicalBareRock = 26,
}

impl Biome {
    /// Every biome, in discriminant order.
    pub const ALL: [Self; 27] = [
        Self::ColdGrassland,
        Self::Taiga,
        Self::MixedForest,
        Self::BroadLeavedForest,
        Self::TropicalRainForest,
        Self::Tundra,
        Self::Shrubland,
        Self::DeciduousForest,
        Self::SeasonalBroadLeavedForest,
        Self::TropicalSeasonalForest,
        Self::TemperateGrassland,
        Self::TemperateSavanna,
        Self::SeasonalSavanna,
        Self::TropicalSavanna,
        Self::ColdDesert,
        Self::TemperateGravel,
        Self::TemperateDesert,
        Self::SubtropicalDesert,
        Self::TropicalDesert,
        Self::Glacier,
        Self::MountainForest,
        Self::TemperatePlateau,
        Self::SubtropicalPlateau,
        Self::TropicalPlateau,
        Self::ColdBareRock,
        Self::TemperateBareRock,
        Self::TropicalBareRock,
    ];

    /// Returns whether this biome only occurs on highland.
    #[must_use]
    pub const fn is_highland(self) -> bool {
        matches!(
            self,
            Self::Glacier
                | Self::MountainForest
                | Self::TemperatePlateau
                | Self::SubtropicalPlateau
                | Self::TropicalPlateau
                | Self::ColdBareRock
                | Self::TemperateBareRock
                | Self::TropicalBareRock
        )
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ColdGrassland => "Cold Grassland",
            Self::Taiga => "Taiga",
            Self::MixedForest => "Mixed Forest",
            Self::BroadLeavedForest => "Broad-leaved Forest",
            Self::TropicalRainForest => "Tropical Rain Forest",
            Self::Tundra => "Tundra",
            Self::Shrubland => "Shrubland",
            Self::DeciduousForest => "Deciduous Forest",
            Self::SeasonalBroadLeavedForest => "Seasonal Broad-leaved Forest",
            Self::TropicalSeasonalForest => "Tropical Seasonal Forest",
            Self::TemperateGrassland => "Temperate Grassland",
            Self::TemperateSavanna => "Temperate Savanna",
            Self::SeasonalSavanna => "Seasonal Savanna",
            Self::TropicalSavanna => "Tropical Savanna",
            Self::ColdDesert => "Cold Desert",
            Self::TemperateGravel => "Temperate Gravel",
            Self::TemperateDesert => "Temperate Desert",
            Self::SubtropicalDesert => "Subtropical Desert",
            Self::TropicalDesert => "Tropical Desert",
            Self::Glacier => "Glacier",
            Self::MountainForest => "Mountain Forest",
            Self::TemperatePlateau => "Temperate Plateau",
            Self::SubtropicalPlateau => "Subtropical Plateau",
            Self::TropicalPlateau => "Tropical Plateau",
            Self::ColdBareRock => "Cold Bare Rock",
            Self::TemperateBareRock => "Temperate Bare Rock",
            Self::TropicalBareRock => "Tropical Bare Rock",
        }
    }
}

/// A grid of biomes.
pub type BiomeMap = Grid<Biome>;

/// Counts cells per biome, skipping biomes that never occur.
#[must_use]
pub fn biome_counts(map: &BiomeMap) -> BTreeMap<Biome, usize> {
    let mut counts = BTreeMap::new();
    for &biome in map.cells() {
        *counts.entry(biome).or_insert(0) += 1;
    }
    counts
}

// Rows are humidity bands, wettest first; columns are temperature bands,
// coldest first.
#[allow(clippy::enum_glob_use)]
const LOWLAND: [[Biome; 5]; 4] = {
    use Biome::*;
    [
        [ColdGrassland, Taiga, MixedForest, BroadLeavedForest, TropicalRainForest],
        [Tundra, Shrubland, DeciduousForest, SeasonalBroadLeavedForest, TropicalSeasonalForest],
        [Tundra, TemperateGrassland, TemperateSavanna, SeasonalSavanna, TropicalSavanna],
        [ColdDesert, TemperateGravel, TemperateDesert, SubtropicalDesert, TropicalDesert],
    ]
};

#[allow(clippy::enum_glob_use)]
const HIGHLAND: [[Biome; 5]; 4] = {
    use Biome::*;
    [
        [Glacier, MountainForest, MountainForest, MountainForest, MountainForest],
        [Glacier, TemperatePlateau, TemperatePlateau, SubtropicalPlateau, TropicalPlateau],
        [Glacier, TemperatePlateau, TemperatePlateau, SubtropicalPlateau, TropicalPlateau],
        [ColdBareRock, TemperateBareRock, TemperateBareRock, TropicalBareRock, TropicalBareRock],
    ]
};

/// Biome classifier.
#[derive(Clone, Debug)]
pub struct BiomeClassifier {
    params: BiomeParams,
}

impl BiomeClassifier {
    /// Creates a classifier with the given band thresholds.
    #[must_use]
    pub const fn new(params: BiomeParams) -> Self {
        Self { params }
    }

    /// Classifies one cell.
    #[must_use]
    pub fn classify(&self, height: f64, temperature: f64, humidity: f64) -> Biome {
        let table = if height >= self.params.highland {
            &HIGHLAND
        } else {
            &LOWLAND
        };
        let column = band(temperature, &self.params.temperature_bands);
        // Band 0 is driest, table row 0 is wettest.
        let row = 3 - band(humidity, &self.params.humidity_bands);
        table[row][column]
    }
}

/// Index of the first bound `value` falls below, or `bounds.len()`.
fn band(value: f64, bounds: &[f64]) -> usize {
    bounds.iter().position(|&bound| value < bound).unwrap_or(bounds.len())
}

/// Classifies every cell of `climate`, `per_tick` cells per tick.
///
/// The fields are shared, not copied; the monad releases its handle once
/// the last cell is classified.
#[must_use]
pub fn biomes(climate: Rc<Climate>, params: BiomeParams, per_tick: usize) -> Monad<BiomeMap> {
    let classifier = BiomeClassifier::new(params);
    let (width, height) = (climate.height.width(), climate.height.height());
    generate_grid(width, height, per_tick, move |index, _, _| {
        classifier.classify(
            climate.height.cells()[index],
            climate.temperature.cells()[index],
            climate.humidity.cells()[index],
        )
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadence_core::{block_on, Executor};

    use super::*;
    use crate::field::Field;

    fn classifier() -> BiomeClassifier {
        BiomeClassifier::new(BiomeParams::default())
    }

    #[test]
    fn test_lowland_corners() {
        let c = classifier();
        assert_eq!(c.classify(0.1, 0.0, 1.0), Biome::ColdGrassland);
        assert_eq!(c.classify(0.1, 1.0, 1.0), Biome::TropicalRainForest);
        assert_eq!(c.classify(0.1, 0.0, 0.0), Biome::ColdDesert);
        assert_eq!(c.classify(0.1, 1.0, 0.0), Biome::TropicalDesert);
    }

    #[test]
    fn test_highland_corners() {
        let c = classifier();
        assert_eq!(c.classify(0.9, 0.0, 1.0), Biome::Glacier);
        assert_eq!(c.classify(0.9, 1.0, 1.0), Biome::MountainForest);
        assert_eq!(c.classify(0.9, 0.0, 0.0), Biome::ColdBareRock);
        assert_eq!(c.classify(0.9, 1.0, 0.0), Biome::TropicalBareRock);
    }

    #[test]
    fn test_band_bounds_are_exclusive() {
        let c = classifier();
        // 0.3 is the dry/semi-dry bound; 0.4 the subcold/temperate bound.
        assert_eq!(c.classify(0.1, 0.4, 0.3), Biome::TemperateSavanna);
        assert_eq!(c.classify(0.1, 0.39, 0.29), Biome::TemperateGravel);
        assert_eq!(c.classify(0.55, 0.5, 0.6), Biome::TemperatePlateau);
    }

    #[test]
    fn test_highland_flag_matches_tables() {
        for row in HIGHLAND {
            assert!(row.iter().all(|b| b.is_highland()));
        }
        for row in LOWLAND {
            assert!(row.iter().all(|b| !b.is_highland()));
        }
        assert_eq!(Biome::ALL.iter().filter(|b| b.is_highland()).count(), 8);
    }

    #[test]
    fn test_classifies_climate_grid() {
        let height = generate_constant(4, 2, 0.1);
        let climate = Climate {
            height,
            humidity: generate_constant(4, 2, 1.0),
            temperature: generate_constant(4, 2, 0.5),
        };
        let climate = Rc::new(climate);
        let map = biomes(Rc::clone(&climate), BiomeParams::default(), 3);
        let mut executor = Executor::new();
        executor.spawn(map.run());
        assert_eq!(block_on(&mut executor, Duration::from_millis(16)), 3);

        let map = map.take_result().unwrap();
        let counts = biome_counts(&map);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&Biome::MixedForest], 8);
        // The classifier let go of the fields.
        assert_eq!(Rc::strong_count(&climate), 1);
    }

    fn generate_constant(width: usize, height: usize, value: f64) -> Field {
        Field::new(width, height).map_cells(|_, _, _| value)
    }
}
