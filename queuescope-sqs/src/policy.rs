//! Tunable policies for peeking and refetching
//!
//! The numbers here are heuristics, not protocol constants. Every one of
//! them can be overridden from configuration, and tests run with all
//! delays set to zero.

use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportLimits;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("min_rounds ({min}) is greater than max_rounds ({max})")]
    RoundBounds { min: u32, max: u32 },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("{0} must be a whole number of seconds")]
    FractionalSeconds(&'static str),
    #[error("{0} must be at least one second")]
    TooShort(&'static str),
}

/// Stopping and pacing rules for the peek collector
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PeekPolicy {
    /// Rounds attempted even when the advisory count is small
    pub min_rounds: u32,
    pub max_rounds: u32,
    /// Consecutive rounds without a new id that end the collection
    pub empty_round_stop_threshold: u32,
    #[serde(rename = "inter_round_delay_ms", deserialize_with = "millis")]
    pub inter_round_delay: Duration,
    #[serde(rename = "first_round_wait_ms", deserialize_with = "millis")]
    pub first_round_wait: Duration,
    #[serde(rename = "later_round_wait_ms", deserialize_with = "millis")]
    pub later_round_wait: Duration,
    #[serde(rename = "visibility_timeout_ms", deserialize_with = "millis")]
    pub visibility_timeout: Duration,
}

impl Default for PeekPolicy {
    fn default() -> Self {
        Self {
            min_rounds: 4,
            max_rounds: 10,
            empty_round_stop_threshold: 2,
            inter_round_delay: Duration::from_millis(300),
            first_round_wait: Duration::from_secs(2),
            later_round_wait: Duration::from_secs(1),
            visibility_timeout: Duration::from_secs(2),
        }
    }
}

impl PeekPolicy {
    /// Number of rounds worth attempting.
    ///
    /// `approx_count` only sizes the loop; an unknown count falls back to
    /// `min_rounds`.
    pub fn rounds_for(&self, approx_count: Option<u64>, batch: u32) -> u32 {
        let batch = u64::from(batch.max(1));
        let wanted = approx_count.map_or(0, |count| count.div_ceil(batch));
        let wanted = u32::try_from(wanted).unwrap_or(u32::MAX);
        wanted.max(self.min_rounds).clamp(1, self.max_rounds.max(1))
    }

    /// Receive wait for a given zero-based round
    pub fn wait_for_round(&self, round: u32) -> Duration {
        if round == 0 {
            self.first_round_wait
        } else {
            self.later_round_wait
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_rounds == 0 {
            return Err(PolicyError::Zero("max_rounds"));
        }
        if self.empty_round_stop_threshold == 0 {
            return Err(PolicyError::Zero("empty_round_stop_threshold"));
        }
        if self.min_rounds > self.max_rounds {
            return Err(PolicyError::RoundBounds {
                min: self.min_rounds,
                max: self.max_rounds,
            });
        }
        whole_seconds("visibility_timeout", self.visibility_timeout)?;
        whole_seconds("first_round_wait", self.first_round_wait)?;
        whole_seconds("later_round_wait", self.later_round_wait)?;
        Ok(())
    }

    /// All waits and delays zeroed
    pub fn immediate() -> Self {
        Self {
            inter_round_delay: Duration::ZERO,
            first_round_wait: Duration::ZERO,
            later_round_wait: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Retry rules for re-acquiring a deletable receipt handle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefetchPolicy {
    pub attempts: u32,
    /// Long enough for the caller to delete before redelivery
    #[serde(rename = "visibility_timeout_ms", deserialize_with = "millis")]
    pub visibility_timeout: Duration,
    #[serde(rename = "wait_time_ms", deserialize_with = "millis")]
    pub wait_time: Duration,
    #[serde(rename = "retry_delay_ms", deserialize_with = "millis")]
    pub retry_delay: Duration,
}

impl Default for RefetchPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            visibility_timeout: Duration::from_secs(30),
            wait_time: Duration::from_secs(2),
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RefetchPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.attempts == 0 {
            return Err(PolicyError::Zero("attempts"));
        }
        // A zero window would let the message be redelivered before the delete
        if self.visibility_timeout < Duration::from_secs(1) {
            return Err(PolicyError::TooShort("visibility_timeout"));
        }
        whole_seconds("visibility_timeout", self.visibility_timeout)?;
        whole_seconds("wait_time", self.wait_time)?;
        Ok(())
    }

    pub fn immediate() -> Self {
        Self {
            wait_time: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl TransportLimits {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_batch == 0 {
            return Err(PolicyError::Zero("max_batch"));
        }
        Ok(())
    }
}

/// The queue service takes these in whole seconds
fn whole_seconds(field: &'static str, value: Duration) -> Result<(), PolicyError> {
    if value.subsec_nanos() == 0 {
        Ok(())
    } else {
        Err(PolicyError::FractionalSeconds(field))
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
