//! Scheduler configuration.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_wait_objects` | 64 |
//! | `pump_chunk_size` | 4096 |

use super::env_config::ConfigError;

/// Ceiling on waitables in a single wait.
pub const DEFAULT_MAX_WAIT_OBJECTS: usize = 64;

/// Bytes moved per read by [`pump`](crate::io::pump) unless told otherwise.
pub const DEFAULT_PUMP_CHUNK_SIZE: usize = 4096;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of waitables (roots plus cancellation) in one wait.
    pub max_wait_objects: usize,
    /// Chunk size for pumps started through [`pump_configured`](crate::io::pump_configured).
    pub pump_chunk_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_wait_objects: DEFAULT_MAX_WAIT_OBJECTS,
            pump_chunk_size: DEFAULT_PUMP_CHUNK_SIZE,
        }
    }
}

impl SchedulerConfig {
    /// Defaults with `CHAINIO_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        super::env_config::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the wait-object ceiling.
    #[must_use]
    pub const fn max_wait_objects(mut self, max: usize) -> Self {
        self.max_wait_objects = max;
        self
    }

    /// Sets the pump chunk size.
    #[must_use]
    pub const fn pump_chunk_size(mut self, size: usize) -> Self {
        self.pump_chunk_size = size;
        self
    }

    /// Rejects values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wait_objects == 0 {
            return Err(ConfigError::Zero {
                field: "max_wait_objects",
            });
        }
        if self.pump_chunk_size == 0 {
            return Err(ConfigError::Zero {
                field: "pump_chunk_size",
            });
        }
        Ok(())
    }
}
