//! Constructor configuration and schema-level validation.
//!
//! Unknown fields are rejected structurally: these are plain Rust structs, so there is no
//! open bag a caller could stuff an unrecognized key into. `validate()` covers everything
//! the type system itself cannot: required fields actually set, and numeric fields that
//! must be non-zero for the protocol to make forward progress.

use crate::error::DynaError;

/// Default number of retries for a conditional-write contention loop.
pub const DEFAULT_RETRY_COUNT: u32 = 1;

/// Default TTL hint for Fail-Closed records: one day, in seconds.
pub const DEFAULT_EXPIRES_AT_SECS: u64 = 86_400;

/// Configuration common to both acquisition modes.
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// The backing table's name, as understood by the configured `Store`.
    pub lock_table: String,
    /// The partition key attribute name.
    pub partition_key: String,
    /// Explicit owner identifier. When `None`, one is derived per acquisition.
    pub owner: Option<String>,
    /// Number of retries to attempt after the first condition-failed response.
    pub retry_count: u32,
}

impl Default for CommonConfig {
    fn default() -> Self {
        CommonConfig {
            lock_table: String::new(),
            partition_key: String::new(),
            owner: None,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

impl CommonConfig {
    fn validate(&self) -> Result<(), DynaError> {
        if self.lock_table.is_empty() {
            return Err(DynaError::Configuration(
                "lock_table must not be empty".to_string(),
            ));
        }
        if self.partition_key.is_empty() {
            return Err(DynaError::Configuration(
                "partition_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the Fail-Closed acquirer.
#[derive(Debug, Clone)]
pub struct FailClosedConfig {
    pub common: CommonConfig,
    /// Delay between retries while contending on acquisition.
    pub acquire_period_ms: u64,
}

impl FailClosedConfig {
    pub fn validate(&self) -> Result<(), DynaError> {
        self.common.validate()?;
        if self.acquire_period_ms == 0 {
            return Err(DynaError::Configuration(
                "acquire_period_ms is required and must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the Fail-Open acquirer.
#[derive(Debug, Clone)]
pub struct FailOpenConfig {
    pub common: CommonConfig,
    /// Heartbeat period; `None` or `Some(0)` disables the heartbeat task.
    pub heartbeat_period_ms: Option<u64>,
    /// Lease validity window, required.
    pub lease_duration_ms: u64,
    /// Whether to trust the local clock to shorten the `WaitLease` step.
    pub trust_local_time: bool,
}

impl Default for FailOpenConfig {
    fn default() -> Self {
        FailOpenConfig {
            common: CommonConfig::default(),
            heartbeat_period_ms: None,
            lease_duration_ms: 0,
            trust_local_time: false,
        }
    }
}

impl FailOpenConfig {
    pub fn validate(&self) -> Result<(), DynaError> {
        self.common.validate()?;
        if self.lease_duration_ms == 0 {
            return Err(DynaError::Configuration(
                "lease_duration_ms is required and must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the heartbeat task should be scheduled for a handle built from this config.
    pub fn heartbeat_enabled(&self) -> bool {
        matches!(self.heartbeat_period_ms, Some(period) if period > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_closed_requires_table_and_partition_key() {
        let config = FailClosedConfig {
            common: CommonConfig::default(),
            acquire_period_ms: 10,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fail_closed_requires_nonzero_acquire_period() {
        let config = FailClosedConfig {
            common: CommonConfig {
                lock_table: "locks".to_string(),
                partition_key: "lockId".to_string(),
                ..Default::default()
            },
            acquire_period_ms: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fail_closed_accepts_sane_config() {
        let config = FailClosedConfig {
            common: CommonConfig {
                lock_table: "locks".to_string(),
                partition_key: "lockId".to_string(),
                ..Default::default()
            },
            acquire_period_ms: 10,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fail_open_requires_nonzero_lease_duration() {
        let config = FailOpenConfig {
            common: CommonConfig {
                lock_table: "locks".to_string(),
                partition_key: "lockId".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn heartbeat_enabled_requires_nonzero_period() {
        let mut config = FailOpenConfig {
            common: CommonConfig {
                lock_table: "locks".to_string(),
                partition_key: "lockId".to_string(),
                ..Default::default()
            },
            lease_duration_ms: 1000,
            ..Default::default()
        };
        assert!(!config.heartbeat_enabled());
        config.heartbeat_period_ms = Some(0);
        assert!(!config.heartbeat_enabled());
        config.heartbeat_period_ms = Some(20);
        assert!(config.heartbeat_enabled());
    }
}
