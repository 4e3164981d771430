//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Transport variants display the underlying message unchanged so that the
/// operator sees exactly what the resolver, socket or TLS library reported.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TCP connection could not be established (DNS, refused, unreachable).
    #[error("{0}")]
    Connect(#[source] io::Error),

    /// TLS handshake failed (certificate or protocol negotiation).
    #[error("{0}")]
    Handshake(#[source] io::Error),

    /// I/O error on an established connection.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Hostname cannot be used as a TLS server name.
    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    /// TLS client configuration could not be built.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// Protocol error (malformed or unexpected data).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Stream closed before a terminating reply line arrived.
    #[error("connection closed before a complete reply was received")]
    IncompleteReply {
        /// Lines received before the stream closed.
        lines: Vec<String>,
    },

    /// Server answered STARTTLS with something other than 220.
    #[error("STARTTLS rejected: {0}")]
    StartTlsRejected(String),

    /// Network operation did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Broad failure classes used by callers to report what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Transport failure before any protocol byte was exchanged.
    Connect,
    /// TLS negotiation failed.
    Handshake,
    /// Malformed or unexpected reply, or broken stream mid-session.
    Protocol,
    /// Stream closed mid-reply.
    IncompleteReply,
    /// A bounded operation expired.
    Timeout,
}

impl Error {
    /// Returns the failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(_) => ErrorKind::Connect,
            Self::Handshake(_) | Self::InvalidServerName(_) | Self::Tls(_) => ErrorKind::Handshake,
            Self::Io(_) | Self::Protocol(_) | Self::StartTlsRejected(_) => ErrorKind::Protocol,
            Self::IncompleteReply { .. } => ErrorKind::IncompleteReply,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_keep_raw_message() {
        let err = Error::Connect(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        assert_eq!(err.to_string(), "Connection refused (os error 111)");
        assert_eq!(err.kind(), ErrorKind::Connect);
    }

    #[test]
    fn starttls_rejection_message() {
        let err = Error::StartTlsRejected("454 TLS not available".into());
        assert_eq!(err.to_string(), "STARTTLS rejected: 454 TLS not available");
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn tls_failures_are_handshake_kind() {
        let err = Error::Handshake(io::Error::other("invalid peer certificate: UnknownIssuer"));
        assert_eq!(err.kind(), ErrorKind::Handshake);
        assert_eq!(
            Error::InvalidServerName("bad name".into()).kind(),
            ErrorKind::Handshake
        );
        assert_eq!(Error::Timeout(Duration::from_secs(1)).kind(), ErrorKind::Timeout);
    }

    #[test]
    fn timeout_message() {
        let err = Error::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "operation timed out after 30s");
    }
}
