// ABOUTME: Bounded exponential-backoff retry around single blocking HTTP calls
// ABOUTME: Retry predicate and sleep function are injectable for deterministic tests

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Outcome of one HTTP attempt as seen by the retry predicate.
pub type Attempt = std::result::Result<Response, reqwest::Error>;

pub type RetryPredicate = Arc<dyn Fn(&Attempt) -> bool + Send + Sync>;
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Immutable retry configuration handed to the transport at construction.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub should_retry: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            should_retry: Arc::new(default_should_retry),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, base: Duration, max: Duration, multiplier: f64) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self.multiplier = multiplier;
        self
    }

    pub fn with_predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Attempt) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(f);
        self
    }

    /// Fresh delay schedule: `min(base * multiplier^n, max)`, no jitter.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            max_interval: self.max_delay,
            multiplier: self.multiplier.max(1.0),
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Next delay from `backoff`, capped at `max_delay`.
    pub fn next_delay(&self, backoff: &mut ExponentialBackoff) -> Duration {
        let delay = backoff.next_backoff().unwrap_or(self.max_delay);
        // Even without randomization, backoff may add up to 1ns of rounding
        let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(micros).min(self.max_delay)
    }

    /// Delay slept after the 0-indexed attempt `n` fails.
    pub fn delay_for(&self, n: u32) -> Duration {
        let mut backoff = self.backoff();
        let mut delay = self.next_delay(&mut backoff);
        for _ in 0..n {
            if delay >= self.max_delay {
                break;
            }
            delay = self.next_delay(&mut backoff);
        }
        delay
    }
}

/// Retries on transport errors, 403, 429 and any 5xx.
pub fn default_should_retry(attempt: &Attempt) -> bool {
    match attempt {
        Err(_) => true,
        Ok(resp) => {
            let status = resp.status();
            status == StatusCode::FORBIDDEN
                || status == StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error()
        }
    }
}

pub struct RetryingTransport {
    client: Client,
    policy: RetryPolicy,
    sleeper: Sleeper,
}

impl RetryingTransport {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        RetryingTransport {
            client,
            policy,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    pub fn with_sleeper<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleeper = Arc::new(f);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs the request built by `build`, rebuilding it for every attempt.
    ///
    /// Returns the last response or transport error once the predicate
    /// accepts an outcome or the retries are used up.
    pub fn execute<F>(&self, build: F) -> Attempt
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut backoff = self.policy.backoff();
        let mut attempt = 0;
        loop {
            let outcome = build(&self.client).send();

            if !(self.policy.should_retry)(&outcome) || attempt >= self.policy.max_retries {
                return outcome;
            }

            match &outcome {
                Ok(resp) => warn!(
                    attempt = attempt + 1,
                    status = resp.status().as_u16(),
                    url = %resp.url(),
                    "retrying request"
                ),
                Err(e) => warn!(attempt = attempt + 1, error = %e, "retrying request"),
            }
            // Release the discarded response's connection before sleeping
            drop(outcome);

            (self.sleeper)(self.policy.next_delay(&mut backoff));
            attempt += 1;
        }
    }
}
