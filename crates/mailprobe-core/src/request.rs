//! Probe requests and TLS strategy selection.

use std::fmt;

use mailprobe_smtp::IMPLICIT_TLS_PORT;
use serde::Serialize;

use crate::error::{Error, Result};

/// How TLS is negotiated for a probe.
///
/// Chosen once from the port and never changed during the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProtocolVariant {
    /// TLS from the first byte (port 465).
    #[serde(rename = "implicit-tls")]
    ImplicitTls,
    /// Plaintext greeting, upgraded with STARTTLS when the server offers it.
    #[serde(rename = "starttls")]
    StartTls,
}

impl ProtocolVariant {
    /// Selects the variant for a port: 465 is implicit TLS, everything else STARTTLS.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        if port == IMPLICIT_TLS_PORT {
            Self::ImplicitTls
        } else {
            Self::StartTls
        }
    }

    /// Returns the wire name used in JSON output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImplicitTls => "implicit-tls",
            Self::StartTls => "starttls",
        }
    }

    /// Returns the human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ImplicitTls => "Implicit TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A validated probe target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    hostname: String,
    port: u16,
}

impl ProbeRequest {
    /// Creates a request, trimming the hostname.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname is blank or the port is zero.
    pub fn new(hostname: &str, port: u16) -> Result<Self> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(Error::EmptyHostname);
        }
        if port == 0 {
            return Err(Error::InvalidPort);
        }
        Ok(Self {
            hostname: hostname.to_string(),
            port,
        })
    }

    /// Returns the server hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the TLS strategy for this request's port.
    #[must_use]
    pub const fn protocol(&self) -> ProtocolVariant {
        ProtocolVariant::for_port(self.port)
    }
}

/// A commonly used mail submission port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownPort {
    /// Port number.
    pub port: u16,
    /// Short name.
    pub name: &'static str,
    /// What the port is used for.
    pub description: &'static str,
}

impl WellKnownPort {
    /// Returns the TLS strategy a probe of this port uses.
    #[must_use]
    pub const fn protocol(&self) -> ProtocolVariant {
        ProtocolVariant::for_port(self.port)
    }
}

/// Ports worth probing on a mail server.
pub const WELL_KNOWN_PORTS: &[WellKnownPort] = &[
    WellKnownPort {
        port: 25,
        name: "SMTP",
        description: "Server-to-server relay, STARTTLS if offered",
    },
    WellKnownPort {
        port: 465,
        name: "SMTPS",
        description: "Submission over implicit TLS",
    },
    WellKnownPort {
        port: 587,
        name: "Submission",
        description: "Submission with STARTTLS",
    },
];
