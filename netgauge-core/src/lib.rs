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

//! Netgauge Core
//!
//! Fundamental data structures and algorithms for the netgauge diagnostic
//! tool server: operation classes, admission-control configuration,
//! result envelopes, edge-server catalog entries, geographic math, and
//! the clock abstraction the rate limiter is driven by.

pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod geo;
pub mod limits;
pub mod operation;
pub mod server_entry;

pub use clock::{start_of_next_local_day, Clock, ManualClock, SystemClock};
pub use envelope::ToolEnvelope;
pub use error::{codes, ToolError};
pub use geo::{continent_for_country, haversine_km, valid_coordinates, Continent, EARTH_RADIUS_KM};
pub use limits::{
    AdmissionResult, BackoffConfig, BucketConfig, BucketStatus, DenialReason, RateLimitSettings,
};
pub use operation::OperationClass;
pub use server_entry::{
    CacheStatus, CatalogFilter, CatalogStats, ServerEntry, ServerStatus, UserLocation,
};
