// CrashGuard - Error Taxonomy
//
// Only `StartupError` ever reaches a caller. Everything else is absorbed at
// the call site and logged; the alert pipeline degrades instead of failing.

use thiserror::Error;

use crate::platform::Capability;

/// Fatal to the current run: the service never starts ingesting samples.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("required capability not granted: {0:?}")]
    PermissionDenied(Capability),
    #[error("failed to publish monitoring status: {0}")]
    Status(#[source] anyhow::Error),
    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Recovered locally by the response orchestrator.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("location unavailable: {0}")]
    LocationUnavailable(#[source] anyhow::Error),
    #[error("message to {recipient} failed: {source}")]
    MessageSendFailed {
        recipient: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("audio unavailable: {0}")]
    AudioUnavailable(#[source] anyhow::Error),
    #[error("emergency profile unavailable: {0}")]
    ProfileUnavailable(String),
}

/// A raw vector that cannot become a motion sample. Dropped, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SampleError {
    #[error("non-finite acceleration component")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("speed limit {0} km/h outside 5..=150")]
    SpeedOutOfRange(f64),
    #[error("g limit must be positive, got {0}")]
    InvalidGLimit(f64),
    #[error("malformed stored record: {0}")]
    Parse(#[from] serde_json::Error),
}
