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

//! Server catalog
//!
//! Fetch-once-then-cache view of the edge network's location list, with
//! geographic enrichment and filtering. The cache cell sits behind a
//! `tokio::sync::Mutex` held across the upstream fetch, so at most one
//! fetch is in flight and a second concurrent caller awaits its result.
//! A fetch consumes a `connection_info` admission token; when a refresh
//! fails and a stale copy exists, the stale copy is served with a
//! diagnostic instead of an error.

use crate::probe::{ProbeClient, ProbeError};
use crate::rate_limiter::{RateLimiter, RateLimiterError};
use netgauge_core::{
    haversine_km, valid_coordinates, CacheStatus, CatalogFilter, CatalogStats, Clock,
    DenialReason, OperationClass, ServerEntry, ToolError, UserLocation,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// How long a fetched catalog stays fresh.
pub const CACHE_TTL_MS: u64 = 300_000;

/// Deadline for the upstream locations fetch.
const FETCH_DEADLINE_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("server discovery denied: {0}")]
    Admission(#[from] RateLimiterError),
    #[error("server discovery failed: {0}")]
    Probe(#[from] ProbeError),
}

impl From<CatalogError> for ToolError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Admission(inner) => inner.into(),
            CatalogError::Probe(inner) => inner.into(),
        }
    }
}

struct CatalogCache {
    entries: Vec<ServerEntry>,
    fetched_at_ms: u64,
}

/// Cached, filterable catalog of edge servers.
pub struct ServerCatalog {
    probe: Arc<dyn ProbeClient>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    cache: Mutex<Option<CatalogCache>>,
}

impl ServerCatalog {
    pub fn new(
        probe: Arc<dyn ProbeClient>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            probe,
            limiter,
            clock,
            cache: Mutex::new(None),
        }
    }

    /// Cached entries, refreshed when the TTL has lapsed.
    async fn ensure_entries(&self) -> Result<Vec<ServerEntry>, CatalogError> {
        let mut cache = self.cache.lock().await;
        let now_ms = self.clock.monotonic_ms();

        if let Some(ref cached) = *cache {
            if now_ms.saturating_sub(cached.fetched_at_ms) <= CACHE_TTL_MS {
                return Ok(cached.entries.clone());
            }
        }

        let admission = self
            .limiter
            .check_and_consume(OperationClass::ConnectionInfo)?;
        if !admission.allowed {
            return Err(CatalogError::Admission(
                RateLimiterError::RateLimitExceeded {
                    class: OperationClass::ConnectionInfo,
                    wait_time_ms: admission.wait_time_ms.unwrap_or(0),
                    reason: admission.reason.unwrap_or(DenialReason::TokenBucket),
                },
            ));
        }

        match self.probe.list_servers(FETCH_DEADLINE_MS).await {
            Ok(entries) => {
                tracing::debug!(count = entries.len(), "server catalog refreshed");
                *cache = Some(CatalogCache {
                    entries: entries.clone(),
                    fetched_at_ms: now_ms,
                });
                Ok(entries)
            }
            Err(err) => {
                if let Some(ref stale) = *cache {
                    let age_ms = now_ms.saturating_sub(stale.fetched_at_ms);
                    tracing::warn!(
                        error = %err,
                        age_ms,
                        "catalog refresh failed, serving stale entries"
                    );
                    Ok(stale.entries.clone())
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Filtered entries, distance-enriched when the caller's coordinates
    /// are usable, sorted nearest-first with unknown distances last.
    pub async fn list(
        &self,
        filter: &CatalogFilter,
        user_location: Option<UserLocation>,
    ) -> Result<Vec<ServerEntry>, CatalogError> {
        let mut entries = self.ensure_entries().await?;

        if let Some(location) = user_location {
            if let (Some(lat), Some(lon)) = (location.latitude, location.longitude) {
                if valid_coordinates(lat, lon) {
                    for entry in &mut entries {
                        if let (Some(entry_lat), Some(entry_lon)) =
                            (entry.latitude, entry.longitude)
                        {
                            entry.distance_km = haversine_km(lat, lon, entry_lat, entry_lon);
                        }
                    }
                }
            }
        }

        entries.retain(|entry| filter.matches(entry));
        entries.sort_by(|a, b| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });

        Ok(entries)
    }

    /// Exact, case-sensitive lookup by server code.
    pub async fn get(&self, name: &str) -> Result<Option<ServerEntry>, CatalogError> {
        let entries = self.ensure_entries().await?;
        Ok(entries.into_iter().find(|entry| entry.name == name))
    }

    /// Conjunctive match on whichever of city/country/region are provided.
    pub async fn by_location(
        &self,
        city: Option<&str>,
        country: Option<&str>,
        region: Option<&str>,
    ) -> Result<Vec<ServerEntry>, CatalogError> {
        let entries = self.ensure_entries().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                city.map_or(true, |c| entry.city.eq_ignore_ascii_case(c))
                    && country.map_or(true, |c| entry.country.eq_ignore_ascii_case(c))
                    && region.map_or(true, |r| entry.region.eq_ignore_ascii_case(r))
            })
            .collect())
    }

    /// Aggregate counts over whatever is cached; never triggers a fetch.
    pub async fn stats(&self) -> CatalogStats {
        let cache = self.cache.lock().await;
        match *cache {
            None => CatalogStats {
                total: 0,
                by_continent: BTreeMap::new(),
                by_country: BTreeMap::new(),
                cache_status: CacheStatus::Empty,
            },
            Some(ref cached) => {
                let age_ms = self.clock.monotonic_ms().saturating_sub(cached.fetched_at_ms);
                let mut by_continent = BTreeMap::new();
                let mut by_country = BTreeMap::new();
                for entry in &cached.entries {
                    if let Some(continent) = entry.continent {
                        *by_continent.entry(continent.to_string()).or_insert(0) += 1;
                    }
                    *by_country.entry(entry.country.clone()).or_insert(0) += 1;
                }
                CatalogStats {
                    total: cached.entries.len(),
                    by_continent,
                    by_country,
                    cache_status: if age_ms <= CACHE_TTL_MS {
                        CacheStatus::Valid
                    } else {
                        CacheStatus::Stale
                    },
                }
            }
        }
    }

    /// Drop the cache; the next call fetches fresh.
    pub async fn clear(&self) {
        *self.cache.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ConnectionTrace, ProbeOptions, ProbeResults, ProbeShape};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use netgauge_core::{
        BucketConfig, Continent, ManualClock, RateLimitSettings, ServerStatus,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

    fn entry(name: &str, city: &str, country: &str, region: &str, coords: Option<(f64, f64)>) -> ServerEntry {
        ServerEntry {
            name: name.to_string(),
            city: city.to_string(),
            region: region.to_string(),
            country: country.to_string(),
            location: format!("{}, {}", city, country),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            continent: netgauge_core::continent_for_country(country),
            distance_km: None,
            status: ServerStatus::Active,
            last_checked: "2025-06-01T00:00:00Z".to_string(),
        }
    }

    fn fixture_servers() -> Vec<ServerEntry> {
        vec![
            entry("LAX", "Los Angeles", "US", "CA", Some((33.94, -118.40))),
            entry("SFO", "San Francisco", "US", "CA", Some((37.62, -122.38))),
            entry("JFK", "New York", "US", "NY", Some((40.64, -73.78))),
            entry("EWR", "Newark", "US", "NJ", None),
        ]
    }

    struct MockProbe {
        servers: Vec<ServerEntry>,
        fail: AtomicBool,
        fetches: AtomicUsize,
    }

    impl MockProbe {
        fn new(servers: Vec<ServerEntry>) -> Self {
            Self {
                servers,
                fail: AtomicBool::new(false),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProbeClient for MockProbe {
        async fn run_probe(
            &self,
            _shape: ProbeShape,
            _options: ProbeOptions,
            _deadline_ms: u64,
        ) -> Result<ProbeResults, ProbeError> {
            Err(ProbeError::execution("not under test", false))
        }

        async fn get_trace(&self, _deadline_ms: u64) -> Result<ConnectionTrace, ProbeError> {
            Ok(ConnectionTrace::default())
        }

        async fn list_servers(&self, _deadline_ms: u64) -> Result<Vec<ServerEntry>, ProbeError> {
            self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail.load(AtomicOrdering::SeqCst) {
                Err(ProbeError::execution("NETWORK_ERROR: upstream down", true))
            } else {
                Ok(self.servers.clone())
            }
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn catalog_with(servers: Vec<ServerEntry>) -> (ServerCatalog, Arc<MockProbe>, Arc<ManualClock>) {
        let start = chrono::Local
            .with_ymd_and_hms(2025, 6, 1, 8, 0, 0)
            .single()
            .expect("fixed test instant");
        let clock = Arc::new(ManualClock::new(start));
        let probe = Arc::new(MockProbe::new(servers));
        let mut settings = RateLimitSettings::defaults();
        settings.backoff.jitter_factor = 0.0;
        let limiter = Arc::new(RateLimiter::new(settings, clock.clone()));
        let catalog = ServerCatalog::new(probe.clone(), limiter, clock.clone());
        (catalog, probe, clock)
    }

    #[tokio::test]
    async fn test_country_region_filter() {
        let (catalog, _probe, _clock) = catalog_with(fixture_servers());
        let filter = CatalogFilter {
            country: Some("US".to_string()),
            region: Some("CA".to_string()),
            ..Default::default()
        };
        let result = catalog.list(&filter, None).await.unwrap();
        let mut names: Vec<_> = result.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["LAX", "SFO"]);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upstream() {
        let (catalog, probe, _clock) = catalog_with(fixture_servers());
        let filter = CatalogFilter::default();
        catalog.list(&filter, None).await.unwrap();
        catalog.list(&filter, None).await.unwrap();
        assert_eq!(probe.fetches.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_refetches() {
        let (catalog, probe, clock) = catalog_with(fixture_servers());
        let filter = CatalogFilter::default();
        catalog.list(&filter, None).await.unwrap();
        clock.advance_ms(CACHE_TTL_MS + 1);
        catalog.list(&filter, None).await.unwrap();
        assert_eq!(probe.fetches.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_served_on_refresh_failure() {
        let (catalog, probe, clock) = catalog_with(fixture_servers());
        let filter = CatalogFilter::default();
        catalog.list(&filter, None).await.unwrap();

        clock.advance_ms(CACHE_TTL_MS + 1);
        probe.fail.store(true, AtomicOrdering::SeqCst);
        let result = catalog.list(&filter, None).await.unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(catalog.stats().await.cache_status, CacheStatus::Stale);
    }

    #[tokio::test]
    async fn test_cold_failure_propagates() {
        let (catalog, probe, _clock) = catalog_with(fixture_servers());
        probe.fail.store(true, AtomicOrdering::SeqCst);
        let err = catalog.list(&CatalogFilter::default(), None).await.unwrap_err();
        assert!(matches!(err, CatalogError::Probe(_)));
    }

    #[tokio::test]
    async fn test_distance_enrichment_and_sort() {
        let (catalog, _probe, _clock) = catalog_with(fixture_servers());
        // Vantage point in downtown San Francisco.
        let user = UserLocation {
            latitude: Some(37.77),
            longitude: Some(-122.42),
        };
        let result = catalog
            .list(&CatalogFilter::default(), Some(user))
            .await
            .unwrap();
        let names: Vec<_> = result.iter().map(|e| e.name.as_str()).collect();
        // Nearest first; EWR has no coordinates and sorts last.
        assert_eq!(names, vec!["SFO", "LAX", "JFK", "EWR"]);
        assert!(result[0].distance_km.unwrap() < 30.0);
        assert!(result[3].distance_km.is_none());
    }

    #[tokio::test]
    async fn test_invalid_user_coordinates_skip_enrichment() {
        let (catalog, _probe, _clock) = catalog_with(fixture_servers());
        let user = UserLocation {
            latitude: Some(95.0),
            longitude: Some(-122.42),
        };
        let result = catalog
            .list(&CatalogFilter::default(), Some(user))
            .await
            .unwrap();
        assert!(result.iter().all(|e| e.distance_km.is_none()));
    }

    #[tokio::test]
    async fn test_get_is_case_sensitive() {
        let (catalog, _probe, _clock) = catalog_with(fixture_servers());
        assert!(catalog.get("LAX").await.unwrap().is_some());
        assert!(catalog.get("lax").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_by_location_conjunctive() {
        let (catalog, _probe, _clock) = catalog_with(fixture_servers());
        let hits = catalog
            .by_location(Some("newark"), Some("US"), None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "EWR");

        let none = catalog
            .by_location(Some("Newark"), Some("US"), Some("CA"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_stats_counts_and_status() {
        let (catalog, _probe, _clock) = catalog_with(fixture_servers());
        assert_eq!(catalog.stats().await.cache_status, CacheStatus::Empty);

        catalog.list(&CatalogFilter::default(), None).await.unwrap();
        let stats = catalog.stats().await;
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_country.get("US"), Some(&4));
        assert_eq!(
            stats.by_continent.get(Continent::NorthAmerica.as_str()),
            Some(&4)
        );
        assert_eq!(stats.cache_status, CacheStatus::Valid);

        catalog.clear().await;
        assert_eq!(catalog.stats().await.cache_status, CacheStatus::Empty);
    }

    #[tokio::test]
    async fn test_fetch_requires_admission_token() {
        let start = chrono::Local
            .with_ymd_and_hms(2025, 6, 1, 8, 0, 0)
            .single()
            .expect("fixed test instant");
        let clock = Arc::new(ManualClock::new(start));
        let probe = Arc::new(MockProbe::new(fixture_servers()));
        let mut settings = RateLimitSettings::defaults();
        settings.backoff.jitter_factor = 0.0;
        // One-token connection_info bucket that never refills in this test.
        settings = settings.with_bucket(
            OperationClass::ConnectionInfo,
            BucketConfig {
                tokens_per_interval: 1,
                interval_ms: 86_400_000,
                max_bucket_size: 1,
                max_daily_requests: 100,
                max_concurrent_requests: 5,
                concurrent_limit_wait_ms: 1_000,
            },
        );
        let limiter = Arc::new(RateLimiter::new(settings, clock.clone()));
        let catalog = ServerCatalog::new(probe, limiter, clock.clone());

        catalog.list(&CatalogFilter::default(), None).await.unwrap();
        clock.advance_ms(CACHE_TTL_MS + 1);
        // Refresh needs a token and the bucket is empty; with no stale
        // tolerance for admission failures, the denial surfaces.
        let err = catalog.list(&CatalogFilter::default(), None).await.unwrap_err();
        assert!(matches!(err, CatalogError::Admission(_)));
    }
}
