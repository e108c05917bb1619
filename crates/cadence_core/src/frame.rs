//! # Frame Loop
//!
//! Fixed-timestep pacing for a resumable.
//!
//! ## Design
//!
//! The frame loop:
//! - Resumes its target at a fixed rate, each time with the fixed tick length
//!   as `delta`, so simulation time is independent of wall-clock jitter
//! - Catches up on missed ticks instead of stretching `delta`
//! - Records how long each tick took against its budget

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{TaskError, TaskResult};
use crate::executor::Resumable;

/// Default tick rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Frame loop settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Give up after this many ticks. `None` runs until the target finishes.
    pub max_ticks: Option<u64>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_ticks: None,
        }
    }
}

impl FrameConfig {
    /// Parses settings from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the parser error if `text` is not valid TOML for this type.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Fixed-timestep frame controller.
#[derive(Debug)]
pub struct FrameLoop {
    /// Simulated time per tick.
    tick: Duration,
    /// Give up after this many ticks of one `drive` call.
    max_ticks: Option<u64>,
    stats: FrameStats,
}

/// Wall-clock cost of the ticks run so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Ticks measured.
    pub total_ticks: u64,
    /// Ticks whose resume took longer than the tick itself.
    pub late_ticks: u64,
    /// Longest resume (µs).
    pub max_tick_us: u64,
    /// Mean resume (µs).
    pub avg_tick_us: u64,
    busy_us: u64,
}

impl FrameStats {
    fn record(&mut self, busy: Duration, tick: Duration) {
        let busy_us = u64::try_from(busy.as_micros()).unwrap_or(u64::MAX);
        self.total_ticks += 1;
        self.busy_us = self.busy_us.saturating_add(busy_us);
        self.avg_tick_us = self.busy_us / self.total_ticks;
        self.max_tick_us = self.max_tick_us.max(busy_us);
        if busy > tick {
            self.late_ticks += 1;
        }
    }
}

impl FrameLoop {
    /// Creates a frame loop ticking `tick_rate` times per second.
    ///
    /// A rate of zero is treated as one tick per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick: Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1))),
            max_ticks: None,
            stats: FrameStats::default(),
        }
    }

    /// Creates a frame loop from settings.
    #[must_use]
    pub fn from_config(config: &FrameConfig) -> Self {
        Self {
            max_ticks: config.max_ticks,
            ..Self::new(config.tick_rate)
        }
    }

    /// Resumes `target` once per due tick until it finishes.
    ///
    /// Every resume receives the fixed tick duration as `delta`. A resume
    /// that overruns its slot does not stretch the next `delta`; the ticks
    /// owed run back to back until the loop is on schedule again. Returns
    /// the number of ticks run.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TickBudgetExhausted`] if the configured
    /// `max_ticks` runs out first. The target is left as it was.
    pub fn drive<R: Resumable + ?Sized>(&mut self, target: &mut R) -> TaskResult<u64> {
        let mut ticks = 0;
        let mut due = Instant::now();
        while !target.finished() {
            if let Some(max) = self.max_ticks {
                if ticks >= max {
                    tracing::debug!(ticks, "frame loop budget exhausted");
                    return Err(TaskError::TickBudgetExhausted(max));
                }
            }
            let wait = due.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }

            let start = Instant::now();
            target.resume(self.tick);
            self.stats.record(start.elapsed(), self.tick);
            due += self.tick;
            ticks += 1;
        }
        tracing::debug!(ticks, late = self.stats.late_ticks, "frame loop drained");
        Ok(ticks)
    }

    /// Timing of every tick driven so far.
    #[must_use]
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Simulated time per tick, also the `delta` passed to the target.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::block::{self, Yield};
    use crate::executor::Executor;

    #[test]
    fn test_frame_loop_creation() {
        let frame = FrameLoop::new(60);
        assert_eq!(frame.stats().total_ticks, 0);
        assert_eq!(frame.tick_duration(), Duration::from_micros(16666));
        assert_eq!(FrameLoop::new(0).tick_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_stats_mean_and_late_ticks() {
        let tick = Duration::from_millis(2);
        let mut stats = FrameStats::default();
        stats.record(Duration::from_millis(1), tick);
        stats.record(Duration::from_millis(3), tick);
        stats.record(Duration::from_millis(2), tick);
        assert_eq!(stats.total_ticks, 3);
        assert_eq!(stats.late_ticks, 1);
        assert_eq!(stats.max_tick_us, 3000);
        assert_eq!(stats.avg_tick_us, 2000);
    }

    #[test]
    fn test_overrun_keeps_delta_fixed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let mut step = 0;
        let mut executor = Executor::new();
        executor.spawn(block::from_fn(move |delta| {
            s.borrow_mut().push(delta);
            step += 1;
            if step == 1 {
                std::thread::sleep(Duration::from_millis(5));
            }
            (step < 3).then_some(Yield::Suspend)
        }));

        let mut frame = FrameLoop::new(1000);
        assert_eq!(frame.drive(&mut executor).unwrap(), 3);
        assert_eq!(*seen.borrow(), vec![Duration::from_millis(1); 3]);
        assert!(frame.stats().late_ticks >= 1);
        assert!(frame.stats().max_tick_us >= 5000);
    }

    #[test]
    fn test_drive_passes_fixed_delta() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let mut left = 3;
        let mut executor = Executor::new();
        executor.spawn(block::from_fn(move |delta| {
            s.borrow_mut().push(delta);
            left -= 1;
            (left > 0).then_some(Yield::Suspend)
        }));

        let mut frame = FrameLoop::new(1000);
        assert_eq!(frame.drive(&mut executor).unwrap(), 3);
        assert_eq!(*seen.borrow(), vec![Duration::from_millis(1); 3]);
        assert_eq!(frame.stats().total_ticks, 3);
    }

    #[test]
    fn test_drive_respects_budget() {
        let config = FrameConfig {
            tick_rate: 1000,
            max_ticks: Some(4),
        };
        let mut executor = Executor::new();
        executor.spawn(block::sleep(Duration::from_secs(60)));

        let mut frame = FrameLoop::from_config(&config);
        let err = frame.drive(&mut executor).unwrap_err();
        assert!(matches!(err, TaskError::TickBudgetExhausted(4)));
        assert!(!executor.finished());
    }

    #[test]
    fn test_config_from_toml() {
        let config = FrameConfig::from_toml_str("tick_rate = 120").unwrap();
        assert_eq!(config.tick_rate, 120);
        assert_eq!(config.max_ticks, None);

        let config = FrameConfig::from_toml_str("").unwrap();
        assert_eq!(config, FrameConfig::default());
    }
}
