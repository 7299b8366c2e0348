//! Per-player turn clock.

use std::time::{Duration, Instant};

/// A stopwatch that accumulates elapsed time across start/pause cycles.
///
/// Built on [`Instant`], Rust's monotonic clock, so system clock changes
/// cannot corrupt time billing. The room starts the mover's clock and
/// pauses it when the move arrives; the two clocks in a room are never
/// running at the same time.
#[derive(Debug, Default)]
pub struct TurnClock {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl TurnClock {
    /// Creates a stopped clock with zero elapsed time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the clock. No-op if already running.
    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Pauses the clock, banking the time since the last start.
    /// No-op if already paused.
    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    /// Resets to zero and stops.
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running_since = None;
    }

    /// Returns `true` while the clock is accruing time.
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Total accrued time, including the current running stretch.
    pub fn elapsed(&self) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + since.elapsed(),
            None => self.accumulated,
        }
    }

    /// Total accrued time in whole milliseconds.
    pub fn elapsed_millis(&self) -> i64 {
        i64::try_from(self.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}
