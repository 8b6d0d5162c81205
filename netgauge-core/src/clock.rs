// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Time sources
//!
//! The rate limiter and catalog never read the system clock directly; they
//! go through [`Clock`] so tests can drive refill, daily-boundary, and TTL
//! logic deterministically. Monotonic time anchors token refill and cache
//! age; wall-clock time is only consulted for the daily boundary and for
//! envelope timestamps.

use chrono::{DateTime, Days, Duration, Local, LocalResult, NaiveTime, TimeZone};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Injectable time source.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed on a monotonic clock since an arbitrary origin.
    fn monotonic_ms(&self) -> u64;

    /// Current wall-clock time in the local timezone.
    fn wall(&self) -> DateTime<Local>;
}

/// Production clock backed by `Instant` and the system wall clock.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Hand-cranked clock for tests.
///
/// `advance` moves both the monotonic and wall readings forward together;
/// `set_wall` repositions the wall clock alone (daily-boundary tests).
pub struct ManualClock {
    monotonic_ms: AtomicU64,
    wall: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start_wall: DateTime<Local>) -> Self {
        Self {
            monotonic_ms: AtomicU64::new(0),
            wall: Mutex::new(start_wall),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.monotonic_ms.fetch_add(ms, Ordering::SeqCst);
        let mut wall = self.wall.lock().expect("wall lock poisoned");
        *wall = *wall + Duration::milliseconds(ms as i64);
    }

    pub fn set_wall(&self, wall: DateTime<Local>) {
        *self.wall.lock().expect("wall lock poisoned") = wall;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

impl Clock for ManualClock {
    fn monotonic_ms(&self) -> u64 {
        self.monotonic_ms.load(Ordering::SeqCst)
    }

    fn wall(&self) -> DateTime<Local> {
        *self.wall.lock().expect("wall lock poisoned")
    }
}

/// Next local-midnight boundary strictly after `now`.
///
/// DST transitions can make local midnight ambiguous or nonexistent; the
/// earliest valid interpretation wins, and a skipped midnight falls back to
/// `now + 24h` so the boundary always advances.
pub fn start_of_next_local_day(now: DateTime<Local>) -> DateTime<Local> {
    let next_date = now.date_naive() + Days::new(1);
    let midnight = next_date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => now + Duration::hours(24),
    }
}
