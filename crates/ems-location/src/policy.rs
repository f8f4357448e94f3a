//! ---
//! ems_section: "02-location-acquisition"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Acquisition options and retry scheduling."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use ems_common::config::LocationConfig;

use crate::types::AcquisitionOptions;

/// Linear backoff applied to transient acquisition failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    /// Maximum number of automatic retries before a failure is surfaced.
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number (1-indexed).
    pub step: Duration,
}

impl LinearBackoff {
    pub fn new(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step,
        }
    }

    /// Delay before retry number `attempt` (1-indexed): `step × attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt.max(1))
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(2_000))
    }
}

/// Options for each kind of acquisition plus the retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    /// Fast single fix issued on every start.
    pub one_shot: AcquisitionOptions,
    /// Continuous subscription kept alive between retries.
    pub watch: AcquisitionOptions,
    /// Last-chance probe used right before submission.
    pub fallback: AcquisitionOptions,
    pub backoff: LinearBackoff,
}

impl AcquisitionPolicy {
    pub fn from_config(config: &LocationConfig) -> Self {
        Self {
            one_shot: AcquisitionOptions {
                high_accuracy: config.high_accuracy,
                timeout: config.one_shot_timeout,
                max_cache_age: Duration::ZERO,
            },
            watch: AcquisitionOptions {
                high_accuracy: config.high_accuracy,
                timeout: config.watch_timeout,
                max_cache_age: config.watch_max_age,
            },
            fallback: AcquisitionOptions {
                high_accuracy: config.high_accuracy,
                timeout: config.fallback_timeout,
                max_cache_age: Duration::ZERO,
            },
            backoff: LinearBackoff::new(config.max_attempts, config.backoff_step),
        }
    }
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self::from_config(&LocationConfig::default())
    }
}
