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

//! Edge-server catalog entries and filters

use crate::geo::Continent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One edge server in the remote location catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    /// Unique airport-style code (e.g. `LAX`).
    pub name: String,
    pub city: String,
    pub region: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    /// Human-readable placement, `City, Country`.
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent: Option<Continent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub status: ServerStatus,
    /// RFC 3339 timestamp of the fetch that produced this entry.
    pub last_checked: String,
}

/// Liveness as reported by the catalog fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Active,
    Unknown,
}

/// Catalog filter; all provided fields are conjunctive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent: Option<Continent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Prunes only entries that have a computed distance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
}

impl CatalogFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.continent.is_none()
            && self.country.is_none()
            && self.region.is_none()
            && self.max_distance.is_none()
    }

    /// Whether an (already enriched) entry passes every provided field.
    pub fn matches(&self, entry: &ServerEntry) -> bool {
        if let Some(ref name) = self.name {
            if entry.name != *name {
                return false;
            }
        }
        if let Some(continent) = self.continent {
            // Entries with no derived continent never match a continent filter.
            if entry.continent != Some(continent) {
                return false;
            }
        }
        if let Some(ref country) = self.country {
            if !entry.country.eq_ignore_ascii_case(country) {
                return false;
            }
        }
        if let Some(ref region) = self.region {
            if !entry.region.eq_ignore_ascii_case(region) {
                return false;
            }
        }
        if let Some(max_distance) = self.max_distance {
            if let Some(distance) = entry.distance_km {
                if distance > max_distance {
                    return false;
                }
            }
        }
        true
    }
}

/// Controller-supplied vantage point for distance enrichment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Aggregate view over the cached catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total: usize,
    pub by_continent: BTreeMap<String, usize>,
    pub by_country: BTreeMap<String, usize>,
    pub cache_status: CacheStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Valid,
    Stale,
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, city: &str, country: &str, region: &str) -> ServerEntry {
        ServerEntry {
            name: name.to_string(),
            city: city.to_string(),
            region: region.to_string(),
            country: country.to_string(),
            location: format!("{}, {}", city, country),
            latitude: None,
            longitude: None,
            continent: crate::geo::continent_for_country(country),
            distance_km: None,
            status: ServerStatus::Active,
            last_checked: "2025-06-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_conjunctive_filter() {
        let lax = entry("LAX", "Los Angeles", "US", "CA");
        let filter = CatalogFilter {
            country: Some("US".to_string()),
            region: Some("CA".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&lax));

        let jfk = entry("JFK", "New York", "US", "NY");
        assert!(!filter.matches(&jfk));
    }

    #[test]
    fn test_max_distance_spares_entries_without_distance() {
        let mut near = entry("SFO", "San Francisco", "US", "CA");
        near.distance_km = Some(10.0);
        let mut far = entry("JFK", "New York", "US", "NY");
        far.distance_km = Some(4_000.0);
        let unknown = entry("EWR", "Newark", "US", "NJ");

        let filter = CatalogFilter {
            max_distance: Some(100.0),
            ..Default::default()
        };
        assert!(filter.matches(&near));
        assert!(!filter.matches(&far));
        assert!(filter.matches(&unknown));
    }

    #[test]
    fn test_unmapped_country_never_matches_continent() {
        let mystery = entry("XXX", "Somewhere", "XX", "");
        let filter = CatalogFilter {
            continent: Some(Continent::Europe),
            ..Default::default()
        };
        assert!(!filter.matches(&mystery));
    }
}
