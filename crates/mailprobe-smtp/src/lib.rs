//! # mailprobe-smtp
//!
//! The SMTP wire layer used by `mailprobe` to diagnose submission servers.
//!
//! ## Features
//!
//! - **Reply framing**: CRLF lines folded into multi-line replies, each line
//!   recorded in a [`Transcript`] the moment it arrives
//! - **Command writing**: commands are logged before they hit the socket
//! - **TLS support**: implicit TLS (port 465) and in-place STARTTLS upgrade
//!   that refuses to discard bytes the server sent early
//! - **Capabilities**: EHLO token extraction with a typed [`Extension`] view
//!
//! ## Example
//!
//! ```ignore
//! use mailprobe_smtp::connection::{FramedStream, SmtpStream, TlsOptions, create_tls_connector};
//! use mailprobe_smtp::{Capabilities, Command, Transcript};
//!
//! let mut log = Transcript::new();
//! let stream = SmtpStream::connect("smtp.example.com", 587).await?;
//! let mut framed = FramedStream::new(stream);
//! framed.read_complete_reply(&mut log).await?;
//!
//! framed.send(&Command::ehlo("test.local"), &mut log).await?;
//! let ehlo = framed.read_complete_reply(&mut log).await?;
//! let caps = Capabilities::from_ehlo(&ehlo, "smtp.example.com");
//!
//! if caps.supports_starttls() {
//!     framed.send(&Command::StartTls, &mut log).await?;
//!     framed.read_complete_reply(&mut log).await?;
//!     let connector = create_tls_connector(&TlsOptions::default())?;
//!     framed = framed.upgrade_to_tls("smtp.example.com", &connector).await?;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Streams, framing and TLS
//! - [`parser`]: Reply line parsing
//! - [`transcript`]: Ordered session log
//! - [`types`]: Replies, reply codes, capabilities, extensions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod transcript;
pub mod types;

pub use command::Command;
pub use connection::{FramedStream, SmtpStream, TlsOptions};
pub use error::{Error, ErrorKind, Result};
pub use transcript::{Direction, LogEntry, Transcript};
pub use types::{AuthMechanism, Capabilities, Extension, Reply, ReplyCode};

/// Port conventionally used for implicit TLS submission (SMTPS).
pub const IMPLICIT_TLS_PORT: u16 = 465;
