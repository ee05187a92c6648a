//! Acknowledgement deadlines.
//!
//! The transmitter never measures time itself. A [`Deadline`] is armed each
//! time a frame goes out and polled once per scheduling round; when it
//! reports expiry the driver raises the transmitter's timeout input.
//!
//! - [`StepDeadline`] counts scheduling rounds and is fully deterministic.
//! - [`ClockDeadline`] measures wall-clock time with [`Instant`].

use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep taken by [`ClockDeadline::idle`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Source of the "has this wait exceeded its deadline" signal.
pub trait Deadline {
    /// Start (or restart) the wait.
    fn arm(&mut self);

    /// Stop waiting; `expired` reports `false` until re-armed.
    fn disarm(&mut self);

    /// Poll the deadline. Called at most once per scheduling round.
    fn expired(&mut self) -> bool;

    /// Called between rounds while the driver has nothing to do but wait.
    /// Deadlines that track real time block here instead of letting the
    /// driver spin.
    fn idle(&mut self) {}
}

/// Expires after a fixed number of polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDeadline {
    limit: u32,
    remaining: Option<u32>,
}

impl StepDeadline {
    /// Expire on the `steps`-th poll after arming (at least one).
    pub fn new(steps: u32) -> Self {
        Self {
            limit: steps.max(1),
            remaining: None,
        }
    }

    /// Polls between arming and expiry.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether the deadline is armed.
    pub fn is_armed(&self) -> bool {
        self.remaining.is_some()
    }
}

impl Default for StepDeadline {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Deadline for StepDeadline {
    fn arm(&mut self) {
        self.remaining = Some(self.limit);
    }

    fn disarm(&mut self) {
        self.remaining = None;
    }

    fn expired(&mut self) -> bool {
        match self.remaining {
            None => false,
            Some(0) => true,
            Some(n) => {
                self.remaining = Some(n - 1);
                n == 1
            }
        }
    }
}

/// Expires once a wall-clock timeout has elapsed since arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDeadline {
    timeout: Duration,
    poll_interval: Duration,
    started: Option<Instant>,
}

impl ClockDeadline {
    pub fn new(timeout: Duration) -> Self {
        Self::with_poll_interval(timeout, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`ClockDeadline::new`], sleeping at most `poll_interval` per
    /// idle round.
    pub fn with_poll_interval(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            started: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Deadline for ClockDeadline {
    fn arm(&mut self) {
        self.started = Some(Instant::now());
    }

    fn disarm(&mut self) {
        self.started = None;
    }

    fn expired(&mut self) -> bool {
        self.started
            .is_some_and(|started| started.elapsed() >= self.timeout)
    }

    fn idle(&mut self) {
        let Some(started) = self.started else {
            return;
        };
        let remaining = self.timeout.saturating_sub(started.elapsed());
        let nap = remaining.min(self.poll_interval);
        if !nap.is_zero() {
            thread::sleep(nap);
        }
    }
}

impl<D: Deadline + ?Sized> Deadline for Box<D> {
    fn arm(&mut self) {
        (**self).arm();
    }

    fn disarm(&mut self) {
        (**self).disarm();
    }

    fn expired(&mut self) -> bool {
        (**self).expired()
    }

    fn idle(&mut self) {
        (**self).idle();
    }
}
