//! Driver configuration

use inscribe_core::{InscribeError, Result, RetryPolicy, CHUNK_SIZE, MAX_GROW_INCREMENT};

/// Inscription driver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Maximum remote calls in flight at once
    pub concurrency: usize,

    /// Bytes per write call
    pub chunk_size: usize,

    /// Bytes a single allocate call can add
    pub grow_increment: usize,

    /// Consecutive sizing rounds without length progress before giving up
    pub max_grow_rounds: u32,

    /// Write/verify rounds before giving up on convergence
    pub max_write_rounds: u32,

    /// Per-chunk write retry policy
    pub write_retry: RetryPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            chunk_size: CHUNK_SIZE,
            grow_increment: MAX_GROW_INCREMENT,
            max_grow_rounds: 64,
            max_write_rounds: 16,
            write_retry: RetryPolicy::default(),
        }
    }
}

impl DriverConfig {
    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the write retry policy
    pub fn with_write_retry(mut self, policy: RetryPolicy) -> Self {
        self.write_retry = policy;
        self
    }

    /// Check the configuration for values the driver cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(InscribeError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 || self.chunk_size > CHUNK_SIZE {
            return Err(InscribeError::Configuration(format!(
                "chunk size must be between 1 and {} bytes, got {}",
                CHUNK_SIZE, self.chunk_size
            )));
        }
        if self.grow_increment == 0 {
            return Err(InscribeError::Configuration(
                "grow increment must be greater than zero".to_string(),
            ));
        }
        if self.max_grow_rounds == 0 || self.max_write_rounds == 0 {
            return Err(InscribeError::Configuration(
                "round limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DriverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.chunk_size, 500);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(DriverConfig::default().with_concurrency(0).validate().is_err());

        let oversized = DriverConfig {
            chunk_size: CHUNK_SIZE + 1,
            ..DriverConfig::default()
        };
        assert!(matches!(
            oversized.validate(),
            Err(InscribeError::Configuration(_))
        ));

        let no_rounds = DriverConfig {
            max_write_rounds: 0,
            ..DriverConfig::default()
        };
        assert!(no_rounds.validate().is_err());
    }
}
