// SPDX-License-Identifier: LGPL-2.1-or-later
//! tic/toc timing of wall clock and process CPU time.
//!
//! Readings go through a [`Clock`] so tests can drive time by hand; there is
//! no global timer state.

use serde::Serialize;

/// Differences below this many seconds are reported as zero.
pub const NOISE_FLOOR: f64 = 1e-4;

pub trait Clock {
    /// Seconds since an arbitrary fixed epoch.
    fn wall_seconds(&self) -> f64;
    /// CPU seconds consumed by this process.
    fn cpu_seconds(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_seconds(&self) -> f64 {
        let now = chrono::Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9
    }

    fn cpu_seconds(&self) -> f64 {
        process_cpu_seconds()
    }
}

#[cfg(unix)]
fn process_cpu_seconds() -> f64 {
    // SAFETY: timespec is plain old data and clock_gettime only writes into it.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return 0.0;
    }
    ts.tv_sec as f64 + ts.tv_nsec as f64 * 1e-9
}

#[cfg(not(unix))]
fn process_cpu_seconds() -> f64 {
    0.0
}

/// Readings taken by [`tic`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRecord {
    pub wall: f64,
    pub cpu: f64,
}

/// Seconds elapsed since a [`TimeRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Elapsed {
    pub wall: f64,
    pub cpu: f64,
}

impl std::ops::Add for Elapsed {
    type Output = Elapsed;

    fn add(self, rhs: Elapsed) -> Elapsed {
        Elapsed {
            wall: self.wall + rhs.wall,
            cpu: self.cpu + rhs.cpu,
        }
    }
}

fn clamp_noise(seconds: f64) -> f64 {
    if seconds < NOISE_FLOOR || seconds.is_nan() {
        0.0
    } else {
        seconds
    }
}

pub fn tic_with<C: Clock + ?Sized>(clock: &C) -> TimeRecord {
    TimeRecord {
        wall: clock.wall_seconds(),
        cpu: clock.cpu_seconds(),
    }
}

pub fn toc_with<C: Clock + ?Sized>(clock: &C, start: &TimeRecord) -> Elapsed {
    Elapsed {
        wall: clamp_noise(clock.wall_seconds() - start.wall),
        cpu: clamp_noise(clock.cpu_seconds() - start.cpu),
    }
}

pub fn tic() -> TimeRecord {
    tic_with(&SystemClock)
}

pub fn toc(start: &TimeRecord) -> Elapsed {
    toc_with(&SystemClock, start)
}

/// A started timer, read once with [`Stopwatch::stop`].
#[derive(Debug)]
pub struct Stopwatch<'a, C: Clock + ?Sized = SystemClock> {
    clock: &'a C,
    start: TimeRecord,
}

impl Stopwatch<'static, SystemClock> {
    pub fn start() -> Self {
        Self::start_with(&SystemClock)
    }
}

impl<'a, C: Clock + ?Sized> Stopwatch<'a, C> {
    pub fn start_with(clock: &'a C) -> Self {
        Self {
            clock,
            start: tic_with(clock),
        }
    }

    pub fn stop(self) -> Elapsed {
        toc_with(self.clock, &self.start)
    }
}
