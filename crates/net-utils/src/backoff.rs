//! Exponential backoff, `base * 2^attempt` plus a random jitter.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::time::Sleep;

/// Default base delay of 1 second.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound (exclusive) on the random jitter added to each delay, 1 second.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(1);

/// A default number of attempts, 5. This counts the initial attempt.
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Config for a [`Backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    max_attempts: u32,
    // kept as u32 millis rather than full Durations, the math is simpler and
    // nothing here needs sub-millisecond precision.
    base_delay_ms: u32,
    max_jitter_ms: u32,
}

impl BackoffConfig {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u32,
            max_jitter_ms: max_jitter.as_millis() as u32,
        }
    }

    #[inline]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[inline]
    fn compute_backoff<R>(&self, attempt: u32, rng: &mut R) -> Duration
    where
        R: Rng + ?Sized,
    {
        let slots = 2_u64.saturating_pow(attempt);
        let delay_ms = slots.saturating_mul(self.base_delay_ms as u64);

        let jitter_ms = if self.max_jitter_ms == 0 {
            0
        } else {
            rng.random_range(0..self.max_jitter_ms) as u64
        };

        Duration::from_millis(delay_ms.saturating_add(jitter_ms))
    }

    /// Returns true once `attempts_made` reaches the attempt ceiling.
    #[inline]
    const fn is_spent(&self, attempts_made: u32) -> bool {
        attempts_made >= self.max_attempts
    }

    pub fn make_backoff<R: SeedableRng>(&self) -> Backoff<R> {
        Backoff {
            config: *self,
            rng: None,
            attempt: 0,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_BASE_DELAY, DEFAULT_MAX_JITTER)
    }
}

/// Tracks attempts made against a [`BackoffConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff<R = SmallRng> {
    attempt: u32,
    /// most calls succeed on the first try, so the rng is only seeded once
    /// a delay is actually computed.
    rng: Option<R>,
    config: BackoffConfig,
}

/// A single computed delay, handed out by [`Backoff::backoff_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackoffOnce {
    attempt: u32,
    max_attempts: u32,
    waiting: Duration,
}

impl BackoffOnce {
    /// The zero-based index of the attempt that just failed.
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn waiting(&self) -> Duration {
        self.waiting
    }
}

impl IntoFuture for BackoffOnce {
    type Output = ();
    type IntoFuture = Sleep;

    fn into_future(self) -> Self::IntoFuture {
        tokio::time::sleep(self.waiting)
    }
}

impl Default for Backoff {
    #[inline]
    fn default() -> Self {
        BackoffConfig::default().make_backoff()
    }
}

impl<R: Rng + SeedableRng> Backoff<R> {
    #[inline]
    pub fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        BackoffConfig::new(max_attempts, base_delay, max_jitter).make_backoff()
    }

    /// Records a failed attempt. Returns the delay to wait before the next one, or [`None`]
    /// if the failed attempt was the last one allowed.
    pub fn backoff_once(&mut self) -> Option<BackoffOnce> {
        let failed = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        if self.config.is_spent(self.attempt) {
            return None;
        }

        let rng = self.rng.get_or_insert_with(R::from_os_rng);

        Some(BackoffOnce {
            attempt: failed,
            max_attempts: self.config.max_attempts,
            waiting: self.config.compute_backoff(failed, rng),
        })
    }
}

impl<R> Backoff<R> {
    /// Number of attempts recorded as failed so far.
    #[inline]
    pub const fn attempts(&self) -> u32 {
        self.attempt
    }

    #[inline]
    pub const fn config(&self) -> BackoffConfig {
        self.config
    }

    pub const fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Something that can wait out a backoff delay. Lets retry loops be driven without a real
/// timer.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// [`Sleeper`] backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_with_bounded_jitter() {
        let mut backoff = Backoff::<SmallRng>::default();

        for attempt in 0..4 {
            let once = backoff.backoff_once().expect("attempts remain");
            let floor = Duration::from_secs(2_u64.pow(attempt));

            assert_eq!(once.attempt(), attempt);
            assert!(once.waiting() >= floor, "{:?} < {floor:?}", once.waiting());
            assert!(once.waiting() < floor + Duration::from_secs(1));
        }

        // the fifth failure is the last attempt, nothing left to wait for.
        assert!(backoff.backoff_once().is_none());
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn test_no_jitter() {
        let mut backoff =
            Backoff::<SmallRng>::new(3, Duration::from_millis(10), Duration::ZERO);

        assert_eq!(
            backoff.backoff_once().map(|once| once.waiting()),
            Some(Duration::from_millis(10))
        );
        assert_eq!(
            backoff.backoff_once().map(|once| once.waiting()),
            Some(Duration::from_millis(20))
        );
        assert_eq!(backoff.backoff_once(), None);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.backoff_once().is_some());
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let mut backoff = Backoff::<SmallRng>::new(1, DEFAULT_BASE_DELAY, DEFAULT_MAX_JITTER);
        assert!(backoff.backoff_once().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_once_sleeps() {
        let once = Backoff::<SmallRng>::new(2, Duration::from_millis(50), Duration::ZERO)
            .backoff_once()
            .expect("one retry allowed");

        let start = tokio::time::Instant::now();
        once.await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
