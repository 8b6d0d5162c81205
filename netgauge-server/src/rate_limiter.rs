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

//! Admission control
//!
//! Per-class token buckets with daily caps, concurrency caps, and
//! exponential backoff on repeated denial. The limiter is a pure state
//! machine: it never sleeps, never schedules, and never performs I/O.
//! Backoff is advisory, reported through the denial's `wait_time_ms` for
//! the caller to wait out if it chooses.
//!
//! Gate order is concurrent -> daily -> token. The first denying gate
//! names the reason; concurrency pressure resolves soonest (a release is
//! imminent), daily slowest, so the nearest-resolving cause wins.
//!
//! Successful acquisition hands back an [`AdmissionGuard`]; dropping the
//! guard releases the concurrency slot, which makes release run on every
//! exit path of the surrounding invocation, cancellation included.

use chrono::{DateTime, Local};
use netgauge_core::{
    start_of_next_local_day, AdmissionResult, BackoffConfig, BucketConfig, BucketStatus, Clock,
    DenialReason, OperationClass, RateLimitSettings, ToolError,
};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Limiter failures. Denial is an error only on `acquire`;
/// `check_and_consume` reports it in-band.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimiterError {
    #[error("rate limit exceeded for {class} ({reason}), retry in {wait_time_ms}ms")]
    RateLimitExceeded {
        class: OperationClass,
        wait_time_ms: u64,
        reason: DenialReason,
    },
    #[error("unknown operation class: {0}")]
    InvalidOperation(String),
}

impl From<RateLimiterError> for ToolError {
    fn from(err: RateLimiterError) -> Self {
        match err {
            RateLimiterError::RateLimitExceeded {
                class,
                wait_time_ms,
                reason,
            } => ToolError::rate_limited(
                format!(
                    "rate limit exceeded for {} ({}), retry in {}ms",
                    class, reason, wait_time_ms
                ),
                json!({ "waitTimeMs": wait_time_ms, "reason": reason }),
            ),
            RateLimiterError::InvalidOperation(name) => {
                ToolError::execution(format!("unknown operation class: {}", name))
            }
        }
    }
}

struct Bucket {
    config: BucketConfig,
    /// Rational during refill accounting, whole after consumption.
    tokens: f64,
    /// Refill anchor on the monotonic clock. Advances in whole intervals.
    last_refill_ms: u64,
    daily_request_count: u64,
    daily_reset_time: DateTime<Local>,
    concurrent_requests: u64,
    consecutive_failures: u32,
    #[allow(dead_code)]
    last_failure_ms: Option<u64>,
}

impl Bucket {
    fn new(config: BucketConfig, now_ms: u64, wall: DateTime<Local>) -> Self {
        Self {
            tokens: config.max_bucket_size as f64,
            last_refill_ms: now_ms,
            daily_request_count: 0,
            daily_reset_time: start_of_next_local_day(wall),
            concurrent_requests: 0,
            consecutive_failures: 0,
            last_failure_ms: None,
            config,
        }
    }

    /// Credit whole elapsed intervals and advance the anchor by exactly
    /// those intervals. Advancing by `k * interval` rather than to `now` is
    /// what keeps sub-interval remainders from being silently discarded.
    fn refill(&mut self, now_ms: u64) {
        let delta = now_ms.saturating_sub(self.last_refill_ms);
        if delta < self.config.interval_ms {
            return;
        }
        let intervals = delta / self.config.interval_ms;
        let earned = (intervals * self.config.tokens_per_interval) as f64;
        let headroom = self.config.max_bucket_size as f64 - self.tokens;
        self.tokens += earned.min(headroom).max(0.0);
        self.last_refill_ms += intervals * self.config.interval_ms;
    }

    fn roll_daily(&mut self, wall: DateTime<Local>) {
        if wall >= self.daily_reset_time {
            self.daily_request_count = 0;
            self.daily_reset_time = start_of_next_local_day(wall);
        }
    }

    fn next_token_wait_ms(&self, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.last_refill_ms);
        self.config.interval_ms - (elapsed % self.config.interval_ms)
    }

    /// Run all three gates and, on admission, consume a token.
    fn evaluate(&mut self, now_ms: u64, wall: DateTime<Local>) -> AdmissionResult {
        self.refill(now_ms);
        self.roll_daily(wall);

        if self.concurrent_requests >= self.config.max_concurrent_requests {
            return AdmissionResult::denied(
                DenialReason::ConcurrentLimit,
                self.config.concurrent_limit_wait_ms,
            );
        }

        if self.daily_request_count >= self.config.max_daily_requests {
            let wait = (self.daily_reset_time - wall).num_milliseconds().max(0) as u64;
            return AdmissionResult::denied(DenialReason::DailyLimit, wait);
        }

        if self.tokens < 1.0 {
            return AdmissionResult::denied(DenialReason::TokenBucket, self.next_token_wait_ms(now_ms));
        }

        self.tokens -= 1.0;
        self.daily_request_count += 1;
        self.consecutive_failures = 0;
        AdmissionResult::allowed(
            self.tokens as u64,
            self.config.max_daily_requests - self.daily_request_count,
        )
    }
}

/// Per-class admission control. One instance for the life of the process.
pub struct RateLimiter {
    buckets: HashMap<OperationClass, Mutex<Bucket>>,
    backoff: BackoffConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        let now_ms = clock.monotonic_ms();
        let wall = clock.wall();
        let buckets = settings
            .buckets
            .into_iter()
            .map(|(class, config)| (class, Mutex::new(Bucket::new(config, now_ms, wall))))
            .collect();
        Self {
            buckets,
            backoff: settings.backoff,
            clock,
        }
    }

    fn with_bucket<T>(
        &self,
        class: OperationClass,
        f: impl FnOnce(&mut Bucket) -> T,
    ) -> Result<T, RateLimiterError> {
        let cell = self
            .buckets
            .get(&class)
            .ok_or_else(|| RateLimiterError::InvalidOperation(class.to_string()))?;
        Ok(f(&mut cell.lock()))
    }

    /// Refill, roll the daily window, run the gates, and consume on allow.
    /// Never blocks; denial comes back in-band.
    pub fn check_and_consume(
        &self,
        class: OperationClass,
    ) -> Result<AdmissionResult, RateLimiterError> {
        let now_ms = self.clock.monotonic_ms();
        let wall = self.clock.wall();
        self.with_bucket(class, |bucket| bucket.evaluate(now_ms, wall))
    }

    /// Admit and reserve a concurrency slot, or fail with
    /// [`RateLimiterError::RateLimitExceeded`] carrying the larger of the
    /// admission wait and the current backoff delay.
    pub fn acquire(self: &Arc<Self>, class: OperationClass) -> Result<AdmissionGuard, RateLimiterError> {
        let now_ms = self.clock.monotonic_ms();
        let wall = self.clock.wall();

        let verdict = self.with_bucket(class, |bucket| {
            let admission = bucket.evaluate(now_ms, wall);
            if admission.allowed {
                bucket.concurrent_requests += 1;
                Ok(admission)
            } else {
                let failures = bucket.consecutive_failures;
                bucket.consecutive_failures += 1;
                bucket.last_failure_ms = Some(now_ms);
                Err((admission, failures))
            }
        })?;

        match verdict {
            Ok(admission) => {
                tracing::debug!(
                    class = %class,
                    tokens_remaining = admission.remaining_tokens,
                    "admission granted"
                );
                Ok(AdmissionGuard {
                    limiter: Arc::clone(self),
                    class,
                })
            }
            Err((admission, failures)) => {
                let reason = admission.reason.unwrap_or(DenialReason::TokenBucket);
                let backoff = self.backoff_delay_ms(failures);
                let wait_time_ms = admission.wait_time_ms.unwrap_or(0).max(backoff);
                tracing::debug!(
                    class = %class,
                    %reason,
                    wait_time_ms,
                    consecutive_failures = failures + 1,
                    "admission denied"
                );
                Err(RateLimiterError::RateLimitExceeded {
                    class,
                    wait_time_ms,
                    reason,
                })
            }
        }
    }

    /// Return a concurrency slot. Clamped at zero; called once per
    /// successful acquire by the guard's drop.
    pub fn release(&self, class: OperationClass) {
        let _ = self.with_bucket(class, |bucket| {
            bucket.concurrent_requests = bucket.concurrent_requests.saturating_sub(1);
        });
    }

    /// Snapshot without mutating bucket state: pending refill and an
    /// elapsed daily boundary are projected, not committed.
    pub fn status(&self, class: OperationClass) -> Result<BucketStatus, RateLimiterError> {
        let now_ms = self.clock.monotonic_ms();
        let wall = self.clock.wall();
        self.with_bucket(class, |bucket| {
            let delta = now_ms.saturating_sub(bucket.last_refill_ms);
            let intervals = delta / bucket.config.interval_ms;
            let projected = (bucket.tokens
                + (intervals * bucket.config.tokens_per_interval) as f64)
                .min(bucket.config.max_bucket_size as f64);
            let next_token_refill_ms = if projected >= bucket.config.max_bucket_size as f64 {
                0
            } else {
                bucket.config.interval_ms - (delta % bucket.config.interval_ms)
            };

            let (daily_count, reset_time) = if wall >= bucket.daily_reset_time {
                (0, start_of_next_local_day(wall))
            } else {
                (bucket.daily_request_count, bucket.daily_reset_time)
            };

            BucketStatus {
                tokens_remaining: projected as u64,
                daily_requests_remaining: bucket.config.max_daily_requests.saturating_sub(daily_count),
                concurrent_requests: bucket.concurrent_requests,
                next_token_refill_ms,
                daily_reset_time_ms: reset_time.timestamp_millis(),
            }
        })
    }

    /// Reinitialize one bucket, or all of them, to the starting state.
    pub fn reset(&self, class: Option<OperationClass>) {
        let now_ms = self.clock.monotonic_ms();
        let wall = self.clock.wall();
        for (tag, cell) in &self.buckets {
            if class.map_or(true, |c| c == *tag) {
                let mut bucket = cell.lock();
                *bucket = Bucket::new(bucket.config.clone(), now_ms, wall);
            }
        }
    }

    /// `min(base * multiplier^failures, max)` plus jitter of
    /// `delay * jitter_factor * (U(0,1) - 0.5)`, clamped at zero.
    fn backoff_delay_ms(&self, consecutive_failures: u32) -> u64 {
        let exp = self.backoff.multiplier.powi(consecutive_failures.min(64) as i32);
        let delay = (self.backoff.base_delay_ms as f64 * exp).min(self.backoff.max_delay_ms as f64);
        let jitter = delay * self.backoff.jitter_factor * (rand::thread_rng().gen::<f64>() - 0.5);
        (delay + jitter).max(0.0) as u64
    }
}

/// RAII concurrency slot. Dropping it releases the slot exactly once.
pub struct AdmissionGuard {
    limiter: Arc<RateLimiter>,
    class: OperationClass,
}

impl AdmissionGuard {
    pub fn class(&self) -> OperationClass {
        self.class
    }
}

impl std::fmt::Debug for AdmissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGuard").field("class", &self.class).finish()
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.limiter.release(self.class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netgauge_core::ManualClock;

    fn speed_test_settings() -> RateLimitSettings {
        let mut settings = RateLimitSettings::defaults();
        settings.backoff.jitter_factor = 0.0;
        settings
    }

    fn limiter_with(settings: RateLimitSettings) -> (Arc<RateLimiter>, Arc<ManualClock>) {
        // Fixed morning start so multi-hour test sequences stay clear of
        // the local-midnight boundary unless a test crosses it on purpose.
        use chrono::TimeZone;
        let start = chrono::Local
            .with_ymd_and_hms(2025, 6, 1, 8, 0, 0)
            .single()
            .expect("fixed test instant");
        let clock = Arc::new(ManualClock::new(start));
        let limiter = Arc::new(RateLimiter::new(settings, clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_bucket_starts_full_then_denies_with_interval_wait() {
        // speed_test: burst 2, one token per 180s.
        let (limiter, clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        let first = limiter.check_and_consume(class).unwrap();
        assert!(first.allowed);
        assert_eq!(first.remaining_tokens, Some(1));

        let second = limiter.check_and_consume(class).unwrap();
        assert!(second.allowed);
        assert_eq!(second.remaining_tokens, Some(0));

        let third = limiter.check_and_consume(class).unwrap();
        assert!(!third.allowed);
        assert_eq!(third.reason, Some(DenialReason::TokenBucket));
        assert_eq!(third.wait_time_ms, Some(180_000));

        clock.advance_ms(180_000);
        let fourth = limiter.check_and_consume(class).unwrap();
        assert!(fourth.allowed);
        assert_eq!(fourth.remaining_tokens, Some(0));
    }

    #[test]
    fn test_refill_anchor_advances_in_whole_intervals() {
        let (limiter, clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        // Drain the burst.
        assert!(limiter.check_and_consume(class).unwrap().allowed);
        assert!(limiter.check_and_consume(class).unwrap().allowed);

        // 1.5 intervals later one token has landed and the half interval
        // remainder still counts toward the next one.
        clock.advance_ms(270_000);
        let allowed = limiter.check_and_consume(class).unwrap();
        assert!(allowed.allowed);
        let denied = limiter.check_and_consume(class).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.wait_time_ms, Some(90_000));
    }

    #[test]
    fn test_tokens_never_exceed_bucket_size() {
        let (limiter, clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        // Idle far longer than burst * interval.
        clock.advance_ms(10 * 180_000);
        let status = limiter.status(class).unwrap();
        assert_eq!(status.tokens_remaining, 2);
        assert_eq!(status.next_token_refill_ms, 0);
    }

    #[test]
    fn test_window_admission_bound() {
        // Property: admissions in a window of W never exceed
        // ceil(W / interval) * tokens_per_interval + burst.
        let settings = speed_test_settings().with_bucket(
            OperationClass::LatencyTest,
            BucketConfig {
                tokens_per_interval: 1,
                interval_ms: 100,
                max_bucket_size: 2,
                max_daily_requests: 100_000,
                max_concurrent_requests: 100,
                concurrent_limit_wait_ms: 1_000,
            },
        );
        let (limiter, clock) = limiter_with(settings);
        let class = OperationClass::LatencyTest;

        let window_ms = 1_000u64;
        let mut allowed = 0;
        for _ in 0..(window_ms / 10) {
            for _ in 0..5 {
                if limiter.check_and_consume(class).unwrap().allowed {
                    allowed += 1;
                }
            }
            clock.advance_ms(10);
        }
        // ceil(W / interval) * tokens_per_interval + burst
        let bound = window_ms / 100 + 2;
        assert!(allowed <= bound, "allowed {} > bound {}", allowed, bound);
    }

    #[test]
    fn test_daily_cap_then_boundary_reset() {
        let (limiter, clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        for i in 0..50 {
            let admission = limiter.check_and_consume(class).unwrap();
            assert!(admission.allowed, "admission {} denied", i);
            clock.advance_ms(180_000);
        }

        let denied = limiter.check_and_consume(class).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.reason, Some(DenialReason::DailyLimit));
        assert!(denied.wait_time_ms.unwrap() > 0);

        // Cross the local-midnight boundary.
        let reset_at = clock.wall() + chrono::Duration::days(1);
        clock.set_wall(reset_at);
        let status = limiter.status(class).unwrap();
        assert_eq!(status.daily_requests_remaining, 50);

        let admission = limiter.check_and_consume(class).unwrap();
        assert!(admission.allowed);
    }

    #[test]
    fn test_daily_resets_once_per_boundary() {
        let (limiter, clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        assert!(limiter.check_and_consume(class).unwrap().allowed);
        clock.set_wall(clock.wall() + chrono::Duration::days(3));
        clock.advance_ms(180_000);

        // Three elapsed boundaries still produce a single reset to zero.
        let admission = limiter.check_and_consume(class).unwrap();
        assert!(admission.allowed);
        assert_eq!(admission.daily_requests_remaining, Some(49));
    }

    #[test]
    fn test_concurrency_gate_and_guard_release() {
        let (limiter, _clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        let guard = limiter.acquire(class).unwrap();

        let err = limiter.acquire(class).unwrap_err();
        match err {
            RateLimiterError::RateLimitExceeded {
                reason,
                wait_time_ms,
                ..
            } => {
                assert_eq!(reason, DenialReason::ConcurrentLimit);
                assert!(wait_time_ms >= 1_000);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        drop(guard);
        let second = limiter.acquire(class).unwrap();
        drop(second);

        let status = limiter.status(class).unwrap();
        assert_eq!(status.concurrent_requests, 0);
    }

    #[test]
    fn test_concurrency_denial_consumes_no_token_or_daily() {
        let (limiter, _clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        let _guard = limiter.acquire(class).unwrap();
        let before = limiter.status(class).unwrap();
        let _ = limiter.acquire(class).unwrap_err();
        let after = limiter.status(class).unwrap();
        assert_eq!(before.tokens_remaining, after.tokens_remaining);
        assert_eq!(before.daily_requests_remaining, after.daily_requests_remaining);
    }

    #[test]
    fn test_release_clamps_at_zero() {
        let (limiter, _clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;
        limiter.release(class);
        limiter.release(class);
        let status = limiter.status(class).unwrap();
        assert_eq!(status.concurrent_requests, 0);
    }

    #[test]
    fn test_backoff_grows_and_resets_on_success() {
        let (limiter, clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        // Drain tokens.
        assert!(limiter.check_and_consume(class).unwrap().allowed);
        assert!(limiter.check_and_consume(class).unwrap().allowed);

        // First denial: backoff base 1s loses to the 180s token wait. The
        // wait hint is max(admission wait, backoff), so it stays 180s until
        // backoff overtakes it.
        let mut last_wait = 0;
        for _ in 0..8 {
            match limiter.acquire(class).unwrap_err() {
                RateLimiterError::RateLimitExceeded { wait_time_ms, .. } => {
                    assert!(wait_time_ms >= last_wait.min(180_000));
                    last_wait = wait_time_ms;
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
        // 8 failures: backoff would be 128s, still under the token wait.
        assert_eq!(last_wait, 180_000);

        // A success clears the failure streak.
        clock.advance_ms(180_000);
        let guard = limiter.acquire(class).unwrap();
        drop(guard);
    }

    #[test]
    fn test_backoff_exceeds_admission_wait_after_enough_failures() {
        let mut settings = speed_test_settings();
        settings.backoff.max_delay_ms = 600_000;
        let (limiter, _clock) = limiter_with(settings);
        let class = OperationClass::SpeedTest;

        assert!(limiter.check_and_consume(class).unwrap().allowed);
        assert!(limiter.check_and_consume(class).unwrap().allowed);

        // 2^9 = 512s > 180s token wait; the backoff hint takes over.
        let mut final_wait = 0;
        for _ in 0..10 {
            if let Err(RateLimiterError::RateLimitExceeded { wait_time_ms, .. }) =
                limiter.acquire(class)
            {
                final_wait = wait_time_ms;
            }
        }
        assert!(final_wait > 180_000, "got {}", final_wait);
    }

    #[test]
    fn test_unknown_class_is_invalid_operation() {
        let mut settings = RateLimitSettings::defaults();
        settings.buckets.remove(&OperationClass::Traceroute);
        let (limiter, _clock) = limiter_with(settings);

        let err = limiter.status(OperationClass::Traceroute).unwrap_err();
        assert!(matches!(err, RateLimiterError::InvalidOperation(_)));
    }

    #[test]
    fn test_reset_restores_starting_state() {
        let (limiter, _clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        assert!(limiter.check_and_consume(class).unwrap().allowed);
        assert!(limiter.check_and_consume(class).unwrap().allowed);
        limiter.reset(Some(class));

        let status = limiter.status(class).unwrap();
        assert_eq!(status.tokens_remaining, 2);
        assert_eq!(status.daily_requests_remaining, 50);
    }

    #[test]
    fn test_status_does_not_mutate() {
        let (limiter, clock) = limiter_with(speed_test_settings());
        let class = OperationClass::SpeedTest;

        assert!(limiter.check_and_consume(class).unwrap().allowed);
        assert!(limiter.check_and_consume(class).unwrap().allowed);
        clock.advance_ms(180_000);

        // Projected refill shows one token either way.
        let first = limiter.status(class).unwrap();
        let second = limiter.status(class).unwrap();
        assert_eq!(first.tokens_remaining, 1);
        assert_eq!(second.tokens_remaining, 1);

        // And the token is still there to consume.
        assert!(limiter.check_and_consume(class).unwrap().allowed);
    }
}
