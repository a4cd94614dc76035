//! Dual-window rate limiting
//!
//! A [`RateLimiter`] enforces a per-minute spacing and a per-day budget on one
//! external resource. The crawler builds one for page fetches (politeness) and
//! one for the summarization API (quota). Workers share an instance through an
//! `Arc`; [`RateLimiter::acquire`] is the only mutator and runs as a single
//! critical section, so concurrent callers can never both pass the spacing
//! check.

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Length of the long window
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Mutable limiter state, observable through [`RateLimiter::snapshot`]
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterState {
    /// When the last accepted request started
    pub last_request: Option<Instant>,

    /// Requests accepted in the current day window
    pub daily_count: u32,

    /// Start of the current day window
    pub daily_window_start: Instant,
}

/// Dual-window throttle for one protected resource
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    requests_per_minute: u32,
    requests_per_day: u32,
    /// Extra random delay range in milliseconds, added to the spacing
    jitter_ms: Option<(u64, u64)>,
    state: Mutex<RateLimiterState>,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_minute` evenly spaced requests
    /// and at most `requests_per_day` requests per 24 hour window
    ///
    /// Zero budgets are raised to one.
    pub fn new(name: impl Into<String>, requests_per_minute: u32, requests_per_day: u32) -> Self {
        Self {
            name: name.into(),
            requests_per_minute: requests_per_minute.max(1),
            requests_per_day: requests_per_day.max(1),
            jitter_ms: None,
            state: Mutex::new(RateLimiterState {
                last_request: None,
                daily_count: 0,
                daily_window_start: Instant::now(),
            }),
        }
    }

    /// Adds a random delay in `[min_ms, max_ms]` on top of the per-minute spacing
    pub fn with_jitter(mut self, min_ms: u64, max_ms: u64) -> Self {
        if max_ms > 0 {
            self.jitter_ms = Some((min_ms.min(max_ms), max_ms));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    pub fn requests_per_day(&self) -> u32 {
        self.requests_per_day
    }

    /// Minimum spacing between two requests, `60 / requests_per_minute` seconds
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute))
    }

    /// Waits until a request is allowed, then records it
    ///
    /// Never fails: an exhausted budget is resolved by sleeping. The lock is
    /// held across the sleeps so callers are admitted one at a time. Returns
    /// how long this call waited.
    ///
    /// Cancel-safe: a call dropped while sleeping records nothing and releases
    /// the lock to the next caller.
    pub async fn acquire(&self) -> Duration {
        let mut state = self.state.lock().await;
        let entered = Instant::now();

        if entered.duration_since(state.daily_window_start) >= DAY {
            state.daily_count = 0;
            state.daily_window_start = entered;
        }

        if state.daily_count >= self.requests_per_day {
            let rollover = state.daily_window_start + DAY;
            tracing::warn!(
                limiter = %self.name,
                budget = self.requests_per_day,
                wait_secs = rollover.saturating_duration_since(entered).as_secs(),
                "Daily request budget exhausted, waiting for the window to roll over"
            );
            sleep_until(rollover).await;
            state.daily_count = 0;
            state.daily_window_start = Instant::now();
        }

        if let Some(last) = state.last_request {
            let next_allowed = last + self.min_interval() + self.jitter();
            if next_allowed > Instant::now() {
                tracing::trace!(
                    limiter = %self.name,
                    wait_ms = next_allowed.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "Spacing request"
                );
                sleep_until(next_allowed).await;
            }
        }

        let now = Instant::now();
        state.last_request = Some(now);
        state.daily_count += 1;

        now.saturating_duration_since(entered)
    }

    /// Returns a copy of the current state
    pub async fn snapshot(&self) -> RateLimiterState {
        *self.state.lock().await
    }

    fn jitter(&self) -> Duration {
        match self.jitter_ms {
            Some((min, max)) if max > min => {
                Duration::from_millis(rand::thread_rng().gen_range(min..=max))
            }
            Some((min, _)) => Duration::from_millis(min),
            None => Duration::ZERO,
        }
    }
}
