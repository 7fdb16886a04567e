//! Clock and timing utilities for the frame pipeline.
//!
//! Every pipeline instance is anchored to a monotonic clock epoch recorded
//! when it starts. This module provides:
//! - The stream epoch and elapsed time
//! - Per-frame budget checks used for overrun reporting

use std::time::{Duration, Instant};

/// A stream clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment the pipeline started).
#[derive(Debug, Clone)]
pub struct StreamClock {
    /// The instant the stream started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl StreamClock {
    /// Create a new stream clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since stream start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at stream start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Convert a duration to fractional milliseconds.
    pub fn duration_ms(duration: Duration) -> f64 {
        duration.as_secs_f64() * 1_000.0
    }
}

/// Advisory per-frame time budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameBudget {
    budget: Duration,
}

/// Outcome of measuring one frame against its budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetCheck {
    /// Time the frame actually took.
    pub elapsed: Duration,
    /// The budget it was measured against.
    pub budget: Duration,
}

impl FrameBudget {
    /// Create a budget from fractional milliseconds.
    ///
    /// Non-finite or negative values yield a zero budget, which reports
    /// every frame as an overrun.
    pub fn from_millis_f64(ms: f64) -> Self {
        let budget = if ms.is_finite() && ms > 0.0 {
            Duration::from_nanos((ms * 1_000_000.0).round() as u64)
        } else {
            Duration::ZERO
        };
        Self { budget }
    }

    /// The budget as a duration.
    pub fn duration(&self) -> Duration {
        self.budget
    }

    /// Measure time elapsed since `started` against the budget.
    pub fn check(&self, started: Instant) -> BudgetCheck {
        self.check_elapsed(started.elapsed())
    }

    /// Measure an already-known elapsed duration against the budget.
    pub fn check_elapsed(&self, elapsed: Duration) -> BudgetCheck {
        BudgetCheck {
            elapsed,
            budget: self.budget,
        }
    }
}

impl BudgetCheck {
    /// Whether the frame took longer than its budget.
    pub fn is_overrun(&self) -> bool {
        self.elapsed > self.budget
    }

    /// How far past the budget the frame ran (zero if within budget).
    pub fn overrun_by(&self) -> Duration {
        self.elapsed.saturating_sub(self.budget)
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        StreamClock::duration_ms(self.elapsed)
    }
}
