//! Probe results.
//!
//! A [`ProbeResult`] is assembled once at the end of a probe and never
//! modified afterwards. Its JSON form is the flat camelCase object web
//! clients already consume:
//!
//! ```json
//! {
//!   "success": true,
//!   "protocol": "starttls",
//!   "hostname": "smtp.example.com",
//!   "port": 587,
//!   "greeting": "220 smtp.example.com ESMTP",
//!   "capabilities": ["PIPELINING", "AUTH PLAIN LOGIN"],
//!   "tlsUpgraded": true,
//!   "logs": [{"direction": "info", "message": "...", "timestamp": 1700000000000}]
//! }
//! ```

use std::fmt::Write as _;

use mailprobe_smtp::{Capabilities, ErrorKind, Transcript};
use serde::{Serialize, Serializer};

use crate::request::ProtocolVariant;

/// How a probe ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every step completed.
    Success {
        /// Greeting lines joined with `\n`.
        greeting: String,
        /// Capabilities from the most recent EHLO.
        capabilities: Capabilities,
        /// Whether the session ran over TLS.
        tls_upgraded: bool,
    },
    /// A step failed.
    Failure(Failure),
}

/// Details of a failed probe, including whatever was learned before it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Raw error message, never empty.
    pub error: String,
    /// Failure class.
    pub kind: ErrorKind,
    /// Greeting, if it was read before the failure.
    pub greeting: Option<String>,
    /// Capabilities, if EHLO completed before the failure.
    pub capabilities: Option<Capabilities>,
    /// Set to `false` when the server refused STARTTLS.
    pub tls_upgraded: Option<bool>,
}

/// The result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// TLS strategy used.
    pub protocol: ProtocolVariant,
    /// Probed hostname.
    pub hostname: String,
    /// Probed port.
    pub port: u16,
    /// How the probe ended.
    pub outcome: Outcome,
    /// Everything sent, received and noted, in order.
    pub logs: Transcript,
}

impl ProbeResult {
    /// Returns true if the probe completed.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Returns the error message of a failed probe.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure(failure) => Some(&failure.error),
        }
    }

    /// Returns the failure class of a failed probe.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure(failure) => Some(failure.kind),
        }
    }

    /// Returns the server greeting, if one was read.
    #[must_use]
    pub fn greeting(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { greeting, .. } => Some(greeting),
            Outcome::Failure(failure) => failure.greeting.as_deref(),
        }
    }

    /// Returns the capabilities from the most recent EHLO, if any completed.
    #[must_use]
    pub const fn capabilities(&self) -> Option<&Capabilities> {
        match &self.outcome {
            Outcome::Success { capabilities, .. } => Some(capabilities),
            Outcome::Failure(failure) => failure.capabilities.as_ref(),
        }
    }

    /// Returns whether the session ran over TLS, when known.
    #[must_use]
    pub const fn tls_upgraded(&self) -> Option<bool> {
        match &self.outcome {
            Outcome::Success { tls_upgraded, .. } => Some(*tls_upgraded),
            Outcome::Failure(failure) => failure.tls_upgraded,
        }
    }

    /// One-line summary of the outcome.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.outcome {
            Outcome::Success { .. } => format!(
                "Successfully connected to {}:{} using {}",
                self.hostname, self.port, self.protocol
            ),
            Outcome::Failure(failure) => failure.error.clone(),
        }
    }

    /// Renders the transcript one entry per line, `HH:MM:SS <prefix><message>`.
    #[must_use]
    pub fn render_transcript(&self) -> String {
        let mut out = String::new();
        for entry in self.logs.entries() {
            let _ = writeln!(out, "{entry}");
        }
        out
    }

    /// Serializes the result to its JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serializes the result to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireResult<'a> {
    success: bool,
    protocol: ProtocolVariant,
    hostname: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    greeting: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capabilities: Option<&'a Capabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls_upgraded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    logs: &'a Transcript,
}

impl Serialize for ProbeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireResult {
            success: self.success(),
            protocol: self.protocol,
            hostname: &self.hostname,
            port: self.port,
            greeting: self.greeting(),
            capabilities: self.capabilities(),
            tls_upgraded: self.tls_upgraded(),
            error: self.error(),
            logs: &self.logs,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::similar_names)]
mod tests {
    use super::*;

    fn success() -> ProbeResult {
        let mut logs = Transcript::new();
        logs.info("Connecting to smtp.example.com:587...");
        logs.received("220 smtp.example.com ESMTP");
        ProbeResult {
            protocol: ProtocolVariant::StartTls,
            hostname: "smtp.example.com".into(),
            port: 587,
            outcome: Outcome::Success {
                greeting: "220 smtp.example.com ESMTP".into(),
                capabilities: Capabilities::from(vec!["PIPELINING".to_string()]),
                tls_upgraded: true,
            },
            logs,
        }
    }

    fn failure() -> ProbeResult {
        let mut logs = Transcript::new();
        logs.info("Connecting to smtp.example.com:465 with implicit TLS...");
        logs.error("Connection refused (os error 111)");
        ProbeResult {
            protocol: ProtocolVariant::ImplicitTls,
            hostname: "smtp.example.com".into(),
            port: 465,
            outcome: Outcome::Failure(Failure {
                error: "Connection refused (os error 111)".into(),
                kind: ErrorKind::Connect,
                greeting: None,
                capabilities: None,
                tls_upgraded: None,
            }),
            logs,
        }
    }

    #[test]
    fn success_json_shape() {
        let json = serde_json::to_value(success()).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["protocol"], "starttls");
        assert_eq!(json["hostname"], "smtp.example.com");
        assert_eq!(json["port"], 587);
        assert_eq!(json["greeting"], "220 smtp.example.com ESMTP");
        assert_eq!(json["capabilities"][0], "PIPELINING");
        assert_eq!(json["tlsUpgraded"], true);
        assert!(!obj.contains_key("error"));
        assert_eq!(json["logs"][1]["direction"], "received");
        assert!(json["logs"][1]["timestamp"].is_i64());
    }

    #[test]
    fn failure_json_omits_absent_fields() {
        let json = serde_json::to_value(failure()).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["protocol"], "implicit-tls");
        assert_eq!(json["error"], "Connection refused (os error 111)");
        for absent in ["greeting", "capabilities", "tlsUpgraded", "kind"] {
            assert!(!obj.contains_key(absent), "{absent} should be omitted");
        }
    }

    #[test]
    fn json_key_order_matches_web_client() {
        let text = success().to_json().unwrap();
        let keys = [
            "\"success\"",
            "\"protocol\"",
            "\"hostname\"",
            "\"port\"",
            "\"greeting\"",
            "\"capabilities\"",
            "\"tlsUpgraded\"",
            "\"logs\"",
        ];
        let positions: Vec<_> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn accessors_follow_outcome() {
        let ok = success();
        assert!(ok.success());
        assert_eq!(ok.error(), None);
        assert_eq!(ok.error_kind(), None);
        assert_eq!(ok.tls_upgraded(), Some(true));

        let failed = failure();
        assert!(!failed.success());
        assert_eq!(failed.error_kind(), Some(ErrorKind::Connect));
        assert_eq!(failed.greeting(), None);
        assert!(failed.capabilities().is_none());
    }

    #[test]
    fn summary_lines() {
        assert_eq!(
            success().summary(),
            "Successfully connected to smtp.example.com:587 using STARTTLS"
        );
        assert_eq!(failure().summary(), "Connection refused (os error 111)");
    }

    #[test]
    fn transcript_rendering() {
        let rendered = failure().render_transcript();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("--- Connecting to smtp.example.com:465 with implicit TLS..."));
        assert!(lines[1].ends_with("ERR Connection refused (os error 111)"));
        assert_eq!(lines[1].as_bytes()[2], b':');
    }
}
