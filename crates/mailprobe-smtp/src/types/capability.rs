//! EHLO capability list.

use serde::Serialize;

use super::{AuthMechanism, Extension, Reply};
use crate::parser::reply_text;

/// Capability tokens advertised in an EHLO reply, in the order the server
/// sent them. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Capabilities(Vec<String>);

impl Capabilities {
    /// Extracts capabilities from the lines of an EHLO reply.
    ///
    /// Only `250` lines are considered. The code and separator are stripped and
    /// the remainder trimmed; empty entries and entries equal to `hostname` are
    /// dropped. Comparing against the probed hostname is how the server's
    /// identification line gets filtered out.
    #[must_use]
    pub fn from_ehlo_lines<S: AsRef<str>>(lines: &[S], hostname: &str) -> Self {
        let tokens = lines
            .iter()
            .map(|line| line.as_ref())
            .filter(|line| line.starts_with("250"))
            .map(|line| reply_text(line).trim())
            .filter(|cap| !cap.is_empty() && *cap != hostname)
            .map(ToString::to_string)
            .collect();
        Self(tokens)
    }

    /// Extracts capabilities from an EHLO reply.
    #[must_use]
    pub fn from_ehlo(reply: &Reply, hostname: &str) -> Self {
        Self::from_ehlo_lines(&reply.lines, hostname)
    }

    /// Checks if STARTTLS is advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.0.iter().any(|cap| cap.eq_ignore_ascii_case("STARTTLS"))
    }

    /// Returns the typed view of each token.
    #[must_use]
    pub fn extensions(&self) -> Vec<Extension> {
        self.0.iter().map(|cap| Extension::parse(cap)).collect()
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions().into_iter().find_map(|ext| match ext {
            Extension::Size(size) => size,
            _ => None,
        })
    }

    /// Returns advertised authentication mechanisms across all AUTH lines.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions()
            .into_iter()
            .filter_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Returns the raw tokens.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns true if no capability was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<String>> for Capabilities {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

impl<'a> IntoIterator for &'a Capabilities {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
