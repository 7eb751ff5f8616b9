//! Resilience primitives shared by the Scraper Orchestrator (§4.3) and
//! Debrid Provider Abstraction (§4.5): per-call timeouts, retry
//! classification, circuit breaking, and per-source rate limiting.
//!
//! Circuit breaking and retry lean on the `failsafe` and `backon`
//! crates rather than hand-rolled state machines; rate limiting uses
//! `governor`'s token bucket.

pub mod timeout {
    //! Timeout defaults from §5: per-scraper 30s, per-provider 15s,
    //! per-request (aggregate) 45s.

    use std::time::Duration;

    pub const SCRAPER_TIMEOUT: Duration = Duration::from_secs(30);
    pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
    pub const REDIS_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DB_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

    #[derive(Debug, Clone, Copy)]
    pub struct TimeoutConfig {
        pub scraper: Duration,
        pub provider: Duration,
        pub request: Duration,
        pub db_query: Duration,
        pub redis: Duration,
    }

    impl Default for TimeoutConfig {
        fn default() -> Self {
            Self {
                scraper: SCRAPER_TIMEOUT,
                provider: PROVIDER_TIMEOUT,
                request: REQUEST_TIMEOUT,
                db_query: DB_QUERY_TIMEOUT,
                redis: REDIS_OPERATION_TIMEOUT,
            }
        }
    }

    impl TimeoutConfig {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub const fn with_scraper_timeout(mut self, timeout: Duration) -> Self {
            self.scraper = timeout;
            self
        }

        #[must_use]
        pub const fn with_provider_timeout(mut self, timeout: Duration) -> Self {
            self.provider = timeout;
            self
        }

        #[must_use]
        pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
            self.request = timeout;
            self
        }
    }
}

pub mod retry {
    //! Error classification feeding `backon`-driven retry loops.

    pub fn should_retry_error(err: &(dyn std::error::Error + 'static)) -> bool {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return is_transient_io_error(io_err);
        }

        let msg = err.to_string().to_lowercase();
        msg.contains("timed out")
            || msg.contains("timeout")
            || msg.contains("connection reset")
            || msg.contains("connection refused")
            || msg.contains("connection aborted")
            || msg.contains("broken pipe")
    }

    fn is_transient_io_error(err: &std::io::Error) -> bool {
        matches!(
            err.kind(),
            std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        )
    }
}

pub mod circuit_breaker {
    //! Per-scraper circuit breaker (§4.2: "opens after N consecutive
    //! failures within window W; stays open for recovery-timeout;
    //! half-open admits a single probe" — exactly `failsafe`'s
    //! `ConsecutiveFailures` + `Exponential` backoff combination).

    use std::time::Duration;

    pub use failsafe::CircuitBreaker;

    pub type ScraperCircuitBreaker = failsafe::StateMachine<
        failsafe::failure_policy::ConsecutiveFailures<failsafe::backoff::Exponential>,
        (),
    >;

    pub fn create(failure_threshold: u32, min_backoff: Duration, max_backoff: Duration) -> ScraperCircuitBreaker {
        let backoff = failsafe::backoff::exponential(min_backoff, max_backoff);
        let policy = failsafe::failure_policy::consecutive_failures(failure_threshold, backoff);
        failsafe::Config::new().failure_policy(policy).build()
    }

    /// 5 consecutive failures, 10s-60s exponential backoff — the
    /// scraper-config default (§4.2, §5).
    pub fn create_default() -> ScraperCircuitBreaker {
        create(5, Duration::from_secs(10), Duration::from_secs(60))
    }
}

pub mod rate_limit {
    //! Per-scraper token-bucket rate limiter (§4.2: "carries a
    //! rate-limiter (token-bucket, configured per-source)").

    use governor::{Quota, RateLimiter};
    use nonzero_ext::nonzero;
    use std::num::NonZeroU32;
    use std::time::Duration;

    pub type ScraperRateLimiter =
        RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

    /// Build a token bucket admitting `per_second` requests/sec, with a
    /// burst capacity equal to the same number (no separate burst
    /// config — matches the per-scraper-instance scoping in §4.2/§5).
    #[must_use]
    pub fn create(per_second: u32) -> ScraperRateLimiter {
        let rate = NonZeroU32::new(per_second).unwrap_or(nonzero!(1u32));
        RateLimiter::direct(Quota::per_second(rate))
    }

    /// Wait for a token, but never longer than `deadline` (§5
    /// back-pressure: "waits for a token until the scraper's
    /// per-request deadline, then times out that scraper").
    pub async fn acquire_with_deadline(limiter: &ScraperRateLimiter, deadline: Duration) -> bool {
        tokio::time::timeout(deadline, async {
            loop {
                if limiter.check().is_ok() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::CircuitBreaker;
    use std::time::Duration;
    use timeout::TimeoutConfig;

    #[test]
    fn timeout_config_builder_overrides_scraper() {
        let config = TimeoutConfig::new().with_scraper_timeout(Duration::from_secs(60));
        assert_eq!(config.scraper.as_secs(), 60);
        assert_eq!(config.provider.as_secs(), 15);
    }

    #[test]
    fn circuit_breaker_opens_after_threshold() {
        let cb = circuit_breaker::create(3, Duration::from_secs(2), Duration::from_secs(10));
        assert!(cb.is_call_permitted());
        for _ in 0..3 {
            cb.on_error();
        }
        assert!(!cb.is_call_permitted());
    }

    #[test]
    fn circuit_breaker_half_opens_after_backoff() {
        let cb = circuit_breaker::create(2, Duration::from_secs(2), Duration::from_secs(5));
        cb.on_error();
        cb.on_error();
        assert!(!cb.is_call_permitted());
        std::thread::sleep(Duration::from_millis(2500));
        assert!(cb.is_call_permitted());
        cb.on_success();
        assert!(cb.is_call_permitted());
    }

    #[test]
    fn retry_classifies_transient_io_errors() {
        let timeout_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        assert!(retry::should_retry_error(&timeout_err));
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        assert!(!retry::should_retry_error(&not_found));
    }

    #[tokio::test]
    async fn rate_limiter_admits_within_quota() {
        let limiter = rate_limit::create(100);
        assert!(rate_limit::acquire_with_deadline(&limiter, Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn rate_limiter_times_out_when_saturated() {
        let limiter = rate_limit::create(1);
        assert!(rate_limit::acquire_with_deadline(&limiter, Duration::from_millis(50)).await);
        // second token not yet replenished within the short deadline
        assert!(!rate_limit::acquire_with_deadline(&limiter, Duration::from_millis(50)).await);
    }
}
