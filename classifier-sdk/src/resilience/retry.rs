//! Retry with exponential backoff for transient backend failures

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use crate::config::RetryConfig;
use crate::error::{ClassifierError, Result};

/// Bounded retry around a single backend call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryPolicy {{ max_attempts: {}, min_wait: {:?}, max_wait: {:?}, multiplier: {} }}",
            self.config.max_attempts, self.config.min_wait, self.config.max_wait, self.config.multiplier
        )
    }
}

impl RetryPolicy {
    /// Create a policy from its configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The policy configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether `error` belongs to the retried transient kinds
    pub fn should_retry(&self, error: &ClassifierError) -> bool {
        error
            .transient_kind()
            .map(|kind| self.config.retry_on.contains(&kind))
            .unwrap_or(false)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.config.min_wait,
            initial_interval: self.config.min_wait,
            max_interval: self.config.max_wait,
            multiplier: self.config.multiplier,
            randomization_factor: self.config.randomization_factor,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Waits between attempts, ignoring jitter
    pub fn wait_schedule(&self) -> Vec<Duration> {
        let mut backoff = ExponentialBackoff {
            randomization_factor: 0.0,
            ..self.backoff()
        };
        (1..self.config.max_attempts)
            .filter_map(|_| backoff.next_backoff())
            .collect()
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_counted(operation).await.0
    }

    /// Like `execute`, also returning how many times `operation` was invoked.
    ///
    /// The last error is returned unchanged once attempts are exhausted.
    pub async fn execute_counted<F, Fut, T>(&self, mut operation: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let err = match operation().await {
                Ok(value) => return (Ok(value), attempts),
                Err(err) => err,
            };

            if !self.should_retry(&err) || attempts >= self.config.max_attempts {
                if attempts > 1 {
                    log::error!("Giving up after {} attempts: {}", attempts, err);
                }
                return (Err(err), attempts);
            }

            let wait = backoff.next_backoff().unwrap_or(self.config.max_wait);
            log::warn!(
                "Transient failure, retrying in {:?} (attempt {}/{}): {}",
                wait,
                attempts,
                self.config.max_attempts,
                err
            );
            tokio::time::sleep(wait).await;
        }
    }
}
