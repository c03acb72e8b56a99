use std::cell::Cell;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::{FeatureClass, FeatureSource, FetchError};
use crate::geom::BoundingBox;
use crate::osm::OsmData;

/// Blocks the current thread. Swapped out in tests.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) { std::thread::sleep(duration) }
}

/// Exponential backoff for rate-limited fetches.
///
/// The delay starts at `initial_delay` and doubles after every failed
/// attempt, capped at `max_delay`. Errors that are not rate limits are
/// returned at once without using up attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, initial_delay: Duration::from_secs(5), max_delay: Duration::from_secs(300) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts, initial_delay, max_delay }
    }

    /// Delay before retry number `retry` (0 for the first retry).
    pub fn delay(&self, retry: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(retry)).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
    pub fn run<T, Z: Sleeper>(
        &self,
        label: &str,
        sleeper: &Z,
        mut op: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(label, attempt, attempts, "fetching");
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        info!(label, attempt, "fetch succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    error!(label, error = %e, "non-retryable fetch error");
                    return Err(e);
                }
                Err(e) if attempt >= attempts => {
                    error!(label, attempts, error = %e, "fetch failed on every attempt");
                    return Err(FetchError::RetriesExhausted { attempts, last: Box::new(e) });
                }
                Err(e) => {
                    let delay = self.delay(attempt - 1);
                    warn!(label, attempt, delay_s = delay.as_secs_f64(), error = %e, "rate limited, backing off");
                    sleeper.sleep(delay);
                }
            }
        }
    }
}

/// Enforces a minimum interval between consecutive calls to [`Throttle::wait`].
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Cell<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self { Self { min_interval, last: Cell::new(None) } }

    pub fn wait<Z: Sleeper>(&self, sleeper: &Z) {
        if let Some(last) = self.last.get() {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleeper.sleep(self.min_interval - elapsed);
            }
        }
        self.last.set(Some(Instant::now()));
    }
}

/// Wraps a [`FeatureSource`] with throttling and rate-limit retries.
#[derive(Debug)]
pub struct RetryingSource<S, Z = ThreadSleeper> {
    inner: S,
    policy: RetryPolicy,
    throttle: Throttle,
    sleeper: Z,
}

impl<S: FeatureSource> RetryingSource<S> {
    pub fn new(inner: S, policy: RetryPolicy, min_interval: Duration) -> Self {
        Self::with_sleeper(inner, policy, min_interval, ThreadSleeper)
    }
}

impl<S: FeatureSource, Z: Sleeper> RetryingSource<S, Z> {
    pub fn with_sleeper(inner: S, policy: RetryPolicy, min_interval: Duration, sleeper: Z) -> Self {
        Self { inner, policy, throttle: Throttle::new(min_interval), sleeper }
    }

    #[inline] pub fn inner(&self) -> &S { &self.inner }

    #[inline] pub fn sleeper(&self) -> &Z { &self.sleeper }
}

impl<S: FeatureSource, Z: Sleeper> FeatureSource for RetryingSource<S, Z> {
    fn fetch(&self, bbox: &BoundingBox, class: FeatureClass) -> Result<OsmData, FetchError> {
        self.policy.run(class.as_str(), &self.sleeper, || {
            self.throttle.wait(&self.sleeper);
            self.inner.fetch(bbox, class)
        })
    }
}
