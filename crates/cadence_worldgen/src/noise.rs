//! # Gradient Noise
//!
//! Seeded 2D Perlin noise and its fractal sum.
//!
//! ## Determinism Guarantee
//!
//! Given the same [`WorldSeed`], every function here produces exactly the
//! same values on any platform, any time. There is no hidden global RNG.

/// World seed for deterministic generation.
///
/// Every generator derives its own stream from it with [`WorldSeed::derive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for one purpose.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }
}

/// Sub-seed purposes, one per generator.
pub mod purpose {
    /// Terrain base noise.
    pub const TERRAIN: u64 = 1;
    /// Terrain local-area points.
    pub const LOCAL_AREAS: u64 = 2;
    /// Humidity weather field.
    pub const HUMIDITY: u64 = 3;
    /// Temperature weather field.
    pub const TEMPERATURE: u64 = 4;
}

/// Deterministic xorshift64 stream.
#[derive(Clone, Debug)]
pub struct SeedRng {
    state: u64,
}

impl SeedRng {
    /// Starts a stream. A zero seed is remapped, since xorshift sticks at 0.
    #[must_use]
    pub const fn new(seed: WorldSeed) -> Self {
        let state = if seed.value() == 0 {
            0x9E37_79B9_7F4A_7C15
        } else {
            seed.value()
        };
        Self { state }
    }

    /// Next raw value.
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Next value in `[0, 1)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn next_unit(&mut self) -> f64 {
        // Top 53 bits fill an f64 mantissa exactly.
        (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
    }
}

/// Octave settings for [`PerlinNoise::fractal`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fractal {
    /// Coordinate scale of the first octave.
    pub scale: f64,
    /// Number of octaves summed.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub growth: f64,
}

/// 2D Perlin noise over a seeded permutation table.
///
/// Samples fall in `[0, 1]` and are continuous across cell borders.
///
/// ```rust
/// use cadence_worldgen::noise::{PerlinNoise, WorldSeed};
///
/// let noise = PerlinNoise::new(WorldSeed::new(42));
/// let value = noise.sample(10.5, 3.25);
/// assert!((0.0..=1.0).contains(&value));
/// ```
pub struct PerlinNoise {
    /// 256-entry permutation, doubled so `perm[i + 1]` never wraps.
    perm: [u8; 512],
}

impl PerlinNoise {
    /// Creates noise whose permutation is shuffled from `seed`.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        let mut table = [0_u8; 256];
        for (slot, value) in table.iter_mut().zip(0_u8..=255) {
            *slot = value;
        }

        // Fisher-Yates with the seeded stream.
        let mut rng = SeedRng::new(seed);
        for i in (1..256_usize).rev() {
            let j = usize::try_from(rng.next_u64() % (i as u64 + 1)).unwrap_or(0);
            table.swap(i, j);
        }

        let mut perm = [0_u8; 512];
        perm[..256].copy_from_slice(&table);
        perm[256..].copy_from_slice(&table);
        Self { perm }
    }

    /// Samples noise at `(x, y)`. Integer lattice points map to 0.5.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let (x_floor, y_floor) = (x.floor(), y.floor());
        // Wrap to the 256-cell period; rem_euclid keeps negatives in range.
        let xi = (x_floor.rem_euclid(256.0)) as usize;
        let yi = (y_floor.rem_euclid(256.0)) as usize;
        let (xf, yf) = (x - x_floor, y - y_floor);

        let aa = self.hash(xi, yi);
        let ab = self.hash(xi, yi + 1);
        let ba = self.hash(xi + 1, yi);
        let bb = self.hash(xi + 1, yi + 1);

        let (u, v) = (fade(xf), fade(yf));
        let bottom = lerp(gradient(aa, xf, yf), gradient(ba, xf - 1.0, yf), u);
        let top = lerp(gradient(ab, xf, yf - 1.0), gradient(bb, xf - 1.0, yf - 1.0), u);

        // Raw range is [-1, 1] for these gradients.
        (0.5 * (lerp(bottom, top, v) + 1.0)).clamp(0.0, 1.0)
    }

    /// Sums octaves weighted by `1 / frequency` and normalises the result.
    ///
    /// `x` and `y` are map coordinates in `[0, 1]`; `offset` shifts every
    /// octave by the same amount after scaling.
    #[must_use]
    pub fn fractal(&self, fractal: Fractal, x: f64, y: f64, offset: (f64, f64)) -> f64 {
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        let mut frequency = 1.0;

        for _ in 0..fractal.octaves {
            let sx = fractal.scale * x * frequency + offset.0;
            let sy = fractal.scale * y * frequency + offset.1;
            let weight = 1.0 / frequency;
            total += weight * self.sample(sx, sy);
            weight_sum += weight;
            frequency *= fractal.growth;
        }

        if weight_sum > 0.0 {
            total / weight_sum
        } else {
            0.0
        }
    }

    #[inline]
    fn hash(&self, xi: usize, yi: usize) -> u8 {
        let row = usize::from(self.perm[yi & 511]);
        self.perm[(xi + row) & 511]
    }
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product with one of eight unit-axis and diagonal gradients, scaled so
/// the interpolated result stays within `[-1, 1]`.
#[inline]
fn gradient(hash: u8, x: f64, y: f64) -> f64 {
    const DIAGONAL: f64 = std::f64::consts::FRAC_1_SQRT_2;
    let dot = match hash & 7 {
        0 => x,
        1 => -x,
        2 => y,
        3 => -y,
        4 => DIAGONAL * (x + y),
        5 => DIAGONAL * (x - y),
        6 => DIAGONAL * (-x + y),
        _ => DIAGONAL * (-x - y),
    };
    dot * std::f64::consts::SQRT_2
}
