//! # mailprobe-core
//!
//! SMTP connectivity and TLS probe.
//!
//! A probe opens one connection to a mail server, walks the greeting, EHLO
//! and (when the port calls for it) STARTTLS or implicit TLS, then says
//! goodbye. It never authenticates or submits mail. The result records:
//! - Which TLS strategy applied and whether the session ran over TLS
//! - The server greeting and advertised capabilities
//! - A timestamped transcript of every line sent and received
//!
//! Port 465 is probed with implicit TLS; every other port with STARTTLS,
//! falling back to a plaintext walk when the server does not offer it.
//!
//! ```ignore
//! let result = mailprobe_core::probe("smtp.example.com", 587).await;
//! println!("{}", result.summary());
//! for entry in result.logs.entries() {
//!     println!("{entry}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod driver;
mod error;
pub mod request;
pub mod result;
#[cfg(test)]
mod testing;

pub use config::{ProbeConfig, ProbeConfigBuilder};
pub use error::{Error, Result};
pub use mailprobe_smtp::{Capabilities, Direction, ErrorKind, LogEntry, Transcript};
pub use request::{ProbeRequest, ProtocolVariant, WELL_KNOWN_PORTS, WellKnownPort};
pub use result::{Failure, Outcome, ProbeResult};

/// Probes `hostname:port` with the default configuration.
///
/// Never fails: connection, TLS and protocol problems are reported in the
/// returned [`ProbeResult`].
pub async fn probe(hostname: &str, port: u16) -> ProbeResult {
    probe_with(&ProbeConfig::default(), hostname, port).await
}

/// Probes `hostname:port` with an explicit configuration.
///
/// The hostname is trimmed; no other validation is done. Use
/// [`ProbeRequest::new`] to reject blank hostnames and port zero up front.
pub async fn probe_with(config: &ProbeConfig, hostname: &str, port: u16) -> ProbeResult {
    let hostname = hostname.trim();
    driver::run(config, hostname, port, ProtocolVariant::for_port(port)).await
}

/// Probes a validated request.
pub async fn probe_request(config: &ProbeConfig, request: &ProbeRequest) -> ProbeResult {
    driver::run(config, request.hostname(), request.port(), request.protocol()).await
}
