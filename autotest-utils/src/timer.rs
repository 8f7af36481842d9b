//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use tokio::time::Instant;

/// Resettable stopwatch.
///
/// Starting a running timer, or stopping a timer that isn't running, is a
/// usage error.
#[derive(Debug, Default)]
pub struct Timer {
    elapsed: Duration,
    start: Option<Instant>,
}

/// Scoped measurement: stops the timer when dropped.
#[derive(Debug)]
pub struct TimerScope<'a> {
    timer: &'a mut Timer,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerError {
    AlreadyStarted,
    NotStarted,
}

// ===== impl Timer =====

impl Timer {
    pub fn start(&mut self) -> Result<(), TimerError> {
        if self.is_running() {
            return Err(TimerError::AlreadyStarted);
        }
        self.start = Some(Instant::now());
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), TimerError> {
        let start = self.start.take().ok_or(TimerError::NotStarted)?;
        self.elapsed += start.elapsed();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        self.start.is_some()
    }

    // Accumulated time of all completed start/stop cycles.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn scope(&mut self) -> Result<TimerScope<'_>, TimerError> {
        self.start()?;
        Ok(TimerScope { timer: self })
    }
}

// ===== impl TimerScope =====

impl Drop for TimerScope<'_> {
    fn drop(&mut self) {
        // The scope is only ever created from a running timer.
        let _ = self.timer.stop();
    }
}

// ===== impl TimerError =====

impl std::fmt::Display for TimerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerError::AlreadyStarted => write!(f, "timer already started"),
            TimerError::NotStarted => write!(f, "timer has not started"),
        }
    }
}

impl std::error::Error for TimerError {}

// ===== unit tests =====
