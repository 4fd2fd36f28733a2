//! Retry policy for "not ready yet" responses.
//!
//! A freshly created course answers 202 (or 404 for a short while) until the
//! LMS has finished provisioning it. The schedule here decides whether another
//! attempt is allowed and how long to wait before it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthoringError, Result};

/// Retry configuration, passed explicitly into every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Master switch; when off the first 404/202 settles immediately.
    pub enabled: bool,
    /// Total attempts allowed, including the first.
    pub max_retries: u32,
    /// Wait before the second attempt.
    pub initial_delay_ms: u64,
    /// Growth factor applied to the delay after every retry.
    pub backoff_multiplier: f64,
    /// 404 is only retried while the attempt number is below this.
    pub not_found_window: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 10,
            initial_delay_ms: 10_000,
            backoff_multiplier: 1.5,
            not_found_window: 10,
        }
    }
}

impl RetryConfig {
    /// Enabled config with custom ceiling and first delay.
    pub fn new(max_retries: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(AuthoringError::Config("retry.max_retries must be at least 1".to_string()));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(AuthoringError::Config(format!(
                "retry.backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Why a retry was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryTrigger {
    /// HTTP 202, course exists but is still being prepared
    NotReady,
    /// HTTP 404 inside the retry window
    NotFound,
}

/// One scheduled retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// 1-based number of the attempt this retry will make
    pub attempt_number: u32,
    /// Time waited before making it
    pub delay: Duration,
    pub trigger: RetryTrigger,
}

/// Attempt counter plus compounding delay for one retry sequence.
#[derive(Debug, Clone)]
pub struct RetrySchedule<'a> {
    config: &'a RetryConfig,
    attempt: u32,
    next_delay: Duration,
}

impl<'a> RetrySchedule<'a> {
    pub fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            attempt: 1,
            next_delay: config.initial_delay(),
        }
    }

    /// Number of the attempt currently in flight (or last made).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Decide on a retry after the current attempt came back with `trigger`.
    ///
    /// Returns `None` when retrying is disabled or a ceiling is reached. 404
    /// has its own ceiling (`not_found_window`) on top of `max_retries`.
    pub fn next(&mut self, trigger: RetryTrigger) -> Option<RetryAttempt> {
        if !self.config.enabled || self.attempt >= self.config.max_retries {
            return None;
        }
        if trigger == RetryTrigger::NotFound && self.attempt >= self.config.not_found_window {
            return None;
        }

        let delay = self.next_delay;
        self.attempt += 1;
        self.next_delay = grow(delay, self.config.backoff_multiplier);

        Some(RetryAttempt {
            attempt_number: self.attempt,
            delay,
            trigger,
        })
    }
}

fn grow(delay: Duration, multiplier: f64) -> Duration {
    if !multiplier.is_finite() || multiplier < 1.0 {
        return delay;
    }
    let nanos = (delay.as_nanos() as f64 * multiplier).round();
    if nanos >= u64::MAX as f64 {
        return Duration::from_nanos(u64::MAX);
    }
    Duration::from_nanos(nanos as u64)
}
