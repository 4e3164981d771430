//! SMTP command builder.

use std::fmt;

/// SMTP command issued by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Creates an EHLO command.
    #[must_use]
    pub fn ehlo(hostname: impl Into<String>) -> Self {
        Self::Ehlo {
            hostname: hostname.into(),
        }
    }

    /// Returns the command line as it appears in a transcript (no CRLF).
    #[must_use]
    pub fn line(&self) -> String {
        self.to_string()
    }

    /// Serializes the command to bytes, CRLF-terminated.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.line().into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}
