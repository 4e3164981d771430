//! SMTP reply types.

use crate::parser::{is_last_reply_line, reply_code};

/// SMTP reply from server, kept as the raw lines that arrived on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Reply lines, without CRLF terminators.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Returns the reply code parsed from the first line.
    #[must_use]
    pub fn code(&self) -> Option<ReplyCode> {
        self.lines.first().and_then(|line| reply_code(line))
    }

    /// Returns the first line, or an empty string when nothing arrived.
    #[must_use]
    pub fn first_line(&self) -> &str {
        self.lines.first().map_or("", String::as_str)
    }

    /// Returns true if the last line carries the final-line marker.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.lines.last().is_some_and(|line| is_last_reply_line(line))
    }

    /// Returns true if no line was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code().is_some_and(ReplyCode::is_success)
    }

    /// Returns true if the first line starts with the given code.
    #[must_use]
    pub fn starts_with_code(&self, code: ReplyCode) -> bool {
        self.first_line().starts_with(&code.to_string())
    }

    /// Returns the full reply as a single string.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Codes the probe cares about
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 454 TLS not available due to temporary reason
    pub const TLS_UNAVAILABLE: Self = Self(454);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn reply(lines: &[&str]) -> Reply {
        Reply::new(lines.iter().map(ToString::to_string).collect())
    }

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::SERVICE_READY.is_success());
            assert!(ReplyCode::CLOSING.is_success());
            assert!(ReplyCode::TLS_UNAVAILABLE.is_transient());
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::NOT_IMPLEMENTED.is_permanent());
            assert!(!ReplyCode::OK.is_transient());
            assert!(!ReplyCode::OK.is_permanent());
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", ReplyCode::OK), "250");
            assert_eq!(ReplyCode::new(354).as_u16(), 354);
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn code_from_first_line() {
            let r = reply(&["250-mail.test", "250 SIZE 100"]);
            assert_eq!(r.code(), Some(ReplyCode::OK));
            assert!(r.is_success());
            assert!(r.is_complete());
        }

        #[test]
        fn incomplete_when_last_line_continues() {
            let r = reply(&["250-mail.test", "250-STARTTLS"]);
            assert!(!r.is_complete());
        }

        #[test]
        fn empty_reply() {
            let r = Reply::default();
            assert!(r.is_empty());
            assert!(!r.is_complete());
            assert_eq!(r.first_line(), "");
            assert_eq!(r.code(), None);
        }

        #[test]
        fn starts_with_code() {
            assert!(reply(&["220 Ready"]).starts_with_code(ReplyCode::SERVICE_READY));
            assert!(!reply(&["454 TLS not available"]).starts_with_code(ReplyCode::SERVICE_READY));
        }

        #[test]
        fn text_joins_lines() {
            let r = reply(&["220-mail.test ESMTP", "220 ready"]);
            assert_eq!(r.text(), "220-mail.test ESMTP\n220 ready");
        }
    }
}
