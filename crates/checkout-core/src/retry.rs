//! Bounded Retry
//!
//! One combinator drives both STK push retries and status polling: a maximum
//! number of attempts, a fixed interval, and an operation that decides after
//! each attempt whether it is done, should retry, or must abort.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

/// Verdict of a single attempt
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Terminal success
    Done(T),
    /// Not there yet
    Retry,
    /// Terminal failure, no further attempts
    Abort(E),
}

/// How a retry run ended
#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Completed { value: T, attempts: u32 },
    Aborted { error: E, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. }
            | Self::Aborted { attempts, .. }
            | Self::Exhausted { attempts } => *attempts,
        }
    }
}

/// When the interval is spent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// First attempt runs at once; wait `interval` after each retry verdict
    Backoff,
    /// Every attempt waits for a tick on a fixed cadence, the first one
    /// `interval` after the run starts
    Ticker,
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub pacing: Pacing,
}

impl RetryPolicy {
    pub const fn backoff(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            pacing: Pacing::Backoff,
        }
    }

    pub const fn ticker(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            pacing: Pacing::Ticker,
        }
    }

    /// Run `op` until it finishes, aborts, or `max_attempts` is reached.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        // interval_at panics on a zero period
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = match self.pacing {
            Pacing::Ticker => {
                let mut ticker = time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some(ticker)
            }
            Pacing::Backoff => None,
        };

        for attempt in 1..=self.max_attempts {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }

            match op(attempt).await {
                Attempt::Done(value) => return RetryOutcome::Completed { value, attempts: attempt },
                Attempt::Abort(error) => return RetryOutcome::Aborted { error, attempts: attempt },
                Attempt::Retry => {
                    tracing::trace!(attempt, max = self.max_attempts, "Attempt pending");
                    if self.pacing == Pacing::Backoff && attempt < self.max_attempts {
                        time::sleep(self.interval).await;
                    }
                }
            }
        }

        RetryOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_backoff_exhausts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::backoff(5, Duration::from_secs(1));
        let start = Instant::now();

        let outcome: RetryOutcome<(), ()> = policy
            .run(|_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Attempt::Retry
                }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 5 });
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // four waits between five attempts
        assert_eq!(start.elapsed().as_secs(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_immediately() {
        let policy = RetryPolicy::backoff(5, Duration::from_secs(1));
        let start = Instant::now();

        let outcome: RetryOutcome<(), &str> = policy.run(|_| async { Attempt::Abort("nope") }).await;

        assert_eq!(outcome, RetryOutcome::Aborted { error: "nope", attempts: 1 });
        assert_eq!(start.elapsed().as_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_spacing() {
        let policy = RetryPolicy::ticker(10, Duration::from_secs(5));
        let start = Instant::now();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let outcome: RetryOutcome<u32, ()> = policy
            .run(|attempt| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(start.elapsed().as_secs());
                    if attempt == 3 { Attempt::Done(attempt) } else { Attempt::Retry }
                }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Completed { value: 3, attempts: 3 });
        assert_eq!(*seen.lock().unwrap(), vec![5, 10, 15]);
    }
}
