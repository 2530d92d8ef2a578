// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Deadline-based retransmission timing.
//!
//! Every open/send/close owns a [`Retransmission`] context: a retry counter and
//! an optional deadline checked against a monotonic [`Clock`] on each poll.

use std::time::{Duration, Instant};

pub trait Clock: Send {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// What a retry loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Frame outstanding, keep listening for at most this long
    Wait(Duration),
    /// (Re)transmit now; `timed_out` is set when the previous attempt expired
    Transmit { timed_out: bool },
    /// All attempts used up; `timed_out` is set when the last attempt expired
    Exhausted { timed_out: bool },
}

#[derive(Debug)]
pub struct Retransmission {
    limit: u32,
    timeout: Duration,
    attempts: u32,
    deadline: Option<Instant>,
}

impl Retransmission {
    pub fn new(limit: u32, timeout: Duration) -> Self {
        Retransmission { limit, timeout, attempts: 0, deadline: None }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn tick(&mut self, now: Instant) -> Tick {
        match self.deadline {
            Some(deadline) if now < deadline => Tick::Wait(deadline - now),
            previous if self.attempts >= self.limit => Tick::Exhausted { timed_out: previous.is_some() },
            previous => {
                self.attempts += 1;
                self.deadline = Some(now + self.timeout);
                Tick::Transmit { timed_out: previous.is_some() }
            }
        }
    }

    /// Drop the running deadline so the next tick retransmits immediately.
    /// The attempt counter is left alone.
    pub fn expire(&mut self) {
        self.deadline = None;
    }
}

// ============================================================================
// Manual Clock for Testing
// ============================================================================

#[cfg(test)]
#[derive(Clone)]
pub struct ManualClock {
    start: Instant,
    elapsed: std::sync::Arc<std::sync::Mutex<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            start: Instant::now(),
            elapsed: Default::default(),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap()
    }
}
