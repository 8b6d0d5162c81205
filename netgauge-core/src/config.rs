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

//! Bounded environment-variable parsing
//!
//! Every tunable read from the environment has a compiled-in default and an
//! upper bound. A malformed value (non-numeric, negative, zero where a
//! positive count is required, or above the bound) is rejected with a single
//! `warn!` line and the default is used instead. Absent variables are
//! silent.

use std::ops::RangeInclusive;

/// Read an integer from `name`, accepting only values inside `bounds`.
pub fn env_u64(name: &str, bounds: RangeInclusive<u64>, default: u64) -> u64 {
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(_) => return default,
    };

    match raw.trim().parse::<u64>() {
        Ok(value) if bounds.contains(&value) => value,
        _ => {
            tracing::warn!(
                var = name,
                value = %raw,
                default,
                "ignoring invalid environment value (expected integer in {}..={})",
                bounds.start(),
                bounds.end()
            );
            default
        }
    }
}

/// Read a float from `name`, accepting only finite values inside `bounds`.
pub fn env_f64(name: &str, bounds: RangeInclusive<f64>, default: f64) -> f64 {
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(_) => return default,
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && bounds.contains(&value) => value,
        _ => {
            tracing::warn!(
                var = name,
                value = %raw,
                default,
                "ignoring invalid environment value (expected number in {}..={})",
                bounds.start(),
                bounds.end()
            );
            default
        }
    }
}
