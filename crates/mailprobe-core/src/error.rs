//! Error types for the core library.

use thiserror::Error;

/// Errors raised before a probe starts.
///
/// Failures during a probe are never returned as errors; they are reported
/// inside the [`ProbeResult`](crate::ProbeResult) with the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Hostname is empty or only whitespace.
    #[error("hostname and port are required")]
    EmptyHostname,

    /// Port is zero.
    #[error("hostname and port are required")]
    InvalidPort,
}

impl Error {
    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHostname => "hostname",
            Self::InvalidPort => "port",
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
