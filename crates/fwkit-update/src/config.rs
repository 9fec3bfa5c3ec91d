//! Update configuration
//!
//! Loaded from JSON; every field has a default so a partial document is
//! accepted. Call [`UpdateConfig::validate`] before handing a loaded config
//! to a plan.

use std::path::Path;
use std::time::Duration;

use fwkit_errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// How long to wait for a user to unlock a device during detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserActionPolicy {
    /// Give up after this many milliseconds
    pub timeout_ms: u64,
    /// Poll the device this often
    pub poll_interval_ms: u64,
}

impl Default for UserActionPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            poll_interval_ms: 500,
        }
    }
}

/// Share of overall progress given to each phase, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseWeights {
    /// Detach weight
    pub detach: u8,
    /// Erase weight
    pub erase: u8,
    /// Write weight
    pub write: u8,
    /// Verify weight
    pub verify: u8,
    /// Attach weight
    pub attach: u8,
    /// Reload weight
    pub reload: u8,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            detach: 2,
            erase: 20,
            write: 52,
            verify: 22,
            attach: 2,
            reload: 2,
        }
    }
}

impl PhaseWeights {
    /// Sum of all weights.
    pub fn total(&self) -> u32 {
        [
            self.detach,
            self.erase,
            self.write,
            self.verify,
            self.attach,
            self.reload,
        ]
        .iter()
        .map(|w| u32::from(*w))
        .sum()
    }
}

/// Configuration for a device update plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Retry policy for chunk writes and lifecycle hooks
    pub retry: RetryPolicy,
    /// Detach unlock polling
    pub user_action: UserActionPolicy,
    /// Progress weighting
    pub weights: PhaseWeights,
    /// Byte written across the erase range
    pub blank_fill: u8,
    /// Read back and compare every chunk
    pub verify: bool,
    /// Override of the backend's transfer size
    pub max_chunk_size: Option<usize>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            user_action: UserActionPolicy::default(),
            weights: PhaseWeights::default(),
            blank_fill: 0xFF,
            verify: true,
            max_chunk_size: None,
        }
    }
}

impl UpdateConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFormat`] if the JSON is malformed.
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(|e| ValidationError::invalid_format("config", e.to_string()))
    }

    /// Load and validate a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ValidationError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::invalid_format(path.display().to_string(), e.to_string()))?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFormat`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ValidationError> {
        serde_json::to_string_pretty(self).map_err(|e| ValidationError::invalid_format("config", e.to_string()))
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let total = self.weights.total();
        if total != 100 {
            return Err(ValidationError::constraint(format!(
                "phase weights must sum to 100, got {total}"
            )));
        }
        if self.retry.attempts == 0 {
            return Err(ValidationError::out_of_range(
                "retry.attempts",
                self.retry.attempts,
                1,
                u32::MAX,
            ));
        }
        let poll = self.user_action.poll_interval_ms;
        if poll == 0 || poll > self.user_action.timeout_ms {
            return Err(ValidationError::out_of_range(
                "user_action.poll_interval_ms",
                poll,
                1,
                self.user_action.timeout_ms.max(1),
            ));
        }
        if self.max_chunk_size == Some(0) {
            return Err(ValidationError::out_of_range("max_chunk_size", 0, 1, usize::MAX));
        }
        Ok(())
    }
}
