//! Environment variable overrides for [`SchedulerConfig`].
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CHAINIO_MAX_WAIT_OBJECTS` | `max_wait_objects` |
//! | `CHAINIO_PUMP_CHUNK_SIZE` | `pump_chunk_size` |

use super::config::SchedulerConfig;

/// Environment variable for `max_wait_objects`.
pub const ENV_MAX_WAIT_OBJECTS: &str = "CHAINIO_MAX_WAIT_OBJECTS";
/// Environment variable for `pump_chunk_size`.
pub const ENV_PUMP_CHUNK_SIZE: &str = "CHAINIO_PUMP_CHUNK_SIZE";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("invalid value for {var}: expected unsigned integer, got {value:?}")]
    InvalidValue {
        /// The variable name.
        var: &'static str,
        /// The raw value.
        value: String,
    },
    /// A field that must be positive is zero.
    #[error("{field} must be at least 1")]
    Zero {
        /// The field name.
        field: &'static str,
    },
}

/// Apply environment variable overrides to a [`SchedulerConfig`].
///
/// Only variables that are set in the environment are applied.
pub fn apply_env_overrides(config: &mut SchedulerConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_MAX_WAIT_OBJECTS) {
        config.max_wait_objects = parse_usize(ENV_MAX_WAIT_OBJECTS, &val)?;
    }
    if let Some(val) = read_env(ENV_PUMP_CHUNK_SIZE) {
        config.pump_chunk_size = parse_usize(ENV_PUMP_CHUNK_SIZE, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value: val.to_owned(),
        })
}
