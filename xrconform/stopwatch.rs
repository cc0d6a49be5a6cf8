/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Elapsed-time measurement and precise waits.

use std::thread;
use std::time::Duration;

fn now_ns() -> u64 {
    time::precise_time_ns()
}

/// Measures elapsed monotonic time. A stopped stopwatch keeps reporting the
/// time between its last start and the stop.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    start_ns: u64,
    stop_ns: Option<u64>,
    started: bool,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Stopwatch::new()
    }
}

impl Stopwatch {
    /// A stopwatch that has not been started and reads zero.
    pub fn new() -> Stopwatch {
        Stopwatch {
            start_ns: 0,
            stop_ns: Some(0),
            started: false,
        }
    }

    pub fn started() -> Stopwatch {
        let mut stopwatch = Stopwatch::new();
        stopwatch.restart();
        stopwatch
    }

    pub fn restart(&mut self) {
        self.start_ns = now_ns();
        self.stop_ns = None;
        self.started = true;
    }

    pub fn stop(&mut self) {
        if self.stop_ns.is_none() {
            self.stop_ns = Some(now_ns());
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_running(&self) -> bool {
        self.started && self.stop_ns.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        let end = self.stop_ns.unwrap_or_else(now_ns);
        Duration::from_nanos(end.saturating_sub(self.start_ns))
    }
}

/// Counts down from a timeout set by `restart`.
#[derive(Clone, Copy, Debug)]
pub struct CountdownTimer {
    stopwatch: Stopwatch,
    timeout: Duration,
}

impl CountdownTimer {
    pub fn new(timeout: Duration) -> CountdownTimer {
        CountdownTimer {
            stopwatch: Stopwatch::started(),
            timeout,
        }
    }

    pub fn restart(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.stopwatch.restart();
    }

    pub fn is_started(&self) -> bool {
        self.stopwatch.is_started()
    }

    pub fn is_time_up(&self) -> bool {
        self.stopwatch.elapsed() >= self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.timeout
            .checked_sub(self.stopwatch.elapsed())
            .unwrap_or_default()
    }
}

/// Spins for `duration`, yielding between checks.
///
/// `thread::sleep` can overshoot by a millisecond or more, which is as large
/// as the frame timing effects this is used to simulate.
pub fn busy_wait(duration: Duration) {
    let stopwatch = Stopwatch::started();
    while stopwatch.elapsed() < duration {
        thread::yield_now();
    }
}

/// Polls `predicate` every `delay` until it holds or `timeout` passes.
/// Returns whether the predicate held.
pub fn wait_until_predicate_with_timeout<F>(mut predicate: F, timeout: Duration, delay: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let timer = CountdownTimer::new(timeout);
    loop {
        if predicate() {
            return true;
        }
        if timer.is_time_up() {
            return false;
        }
        thread::sleep(delay.min(timer.remaining()));
    }
}
