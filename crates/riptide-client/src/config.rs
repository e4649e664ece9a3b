//! Client configuration.

use std::time::Duration;

use riptide_core::schema::ContextDefaults;

/// What a typed feed does when a record's value fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeserializationPolicy {
    /// Surface the error and end the feed.
    #[default]
    Abort,
    /// Log and skip the record.
    Skip,
    /// Forward the raw record to a dead-letter topic, then skip it.
    DeadLetter {
        /// Dead-letter topic name.
        topic: String,
    },
}

/// Retry guidance for transient collaborator failures.
///
/// Carried declaratively; collaborator implementations decide how to
/// honor it for their transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per operation, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Context-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RiptideConfig {
    /// Topic defaults applied where a record type declares no hint.
    pub defaults: ContextDefaults,
    /// Decode-failure policy for typed feeds.
    pub deserialization: DeserializationPolicy,
    /// Retry guidance for the execution collaborator.
    pub retry: RetryPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_core::schema::ValueFormat;

    #[test]
    fn defaults_are_conservative() {
        let config = RiptideConfig::default();
        assert_eq!(config.defaults.partitions, 1);
        assert_eq!(config.defaults.value_format, ValueFormat::Json);
        assert_eq!(config.deserialization, DeserializationPolicy::Abort);
        assert_eq!(config.retry.max_attempts, 3);
    }
}
