//! Typed view of EHLO capability tokens.

/// SMTP extensions discovered from EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// CHUNKING - Chunked message transfer
    Chunking,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// DSN - Delivery status notifications
    Dsn,
    /// ENHANCEDSTATUSCODES - RFC 3463 status codes
    EnhancedStatusCodes,
    /// REQUIRETLS - RFC 8689
    RequireTls,
    /// Unknown extension
    Unknown(String),
}

impl Extension {
    /// Parses a capability token from an EHLO response.
    ///
    /// Accepts the legacy `AUTH=LOGIN PLAIN` spelling some servers still
    /// advertise alongside the standard `AUTH LOGIN PLAIN`.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let mut parts = token.split_whitespace();
        let Some(first) = parts.next() else {
            return Self::Unknown(token.to_string());
        };

        let (keyword, inline_arg) = match first.split_once('=') {
            Some((keyword, arg)) => (keyword, Some(arg)),
            None => (first, None),
        };

        match keyword.to_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => {
                let mechanisms = inline_arg
                    .into_iter()
                    .chain(parts)
                    .filter(|m| !m.is_empty())
                    .map(AuthMechanism::parse)
                    .collect();
                Self::Auth(mechanisms)
            }
            "SIZE" => {
                let size = parts.next().and_then(|s| s.parse().ok());
                Self::Size(size)
            }
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "CHUNKING" => Self::Chunking,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            "ENHANCEDSTATUSCODES" => Self::EnhancedStatusCodes,
            "REQUIRETLS" => Self::RequireTls,
            _ => Self::Unknown(token.to_string()),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` (Google/Microsoft)
    XOAuth2,
    /// `OAUTHBEARER` - RFC 7628 `OAuth2`
    OAuthBearer,
    /// Any other mechanism, as advertised (uppercased).
    Other(String),
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "LOGIN" => Self::Login,
            "CRAM-MD5" => Self::CramMd5,
            "XOAUTH2" => Self::XOAuth2,
            "OAUTHBEARER" => Self::OAuthBearer,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
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

    mod extension_parse_tests {
        use super::*;

        #[test]
        fn parse_starttls() {
            assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
            assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        }

        #[test]
        fn parse_auth() {
            assert_eq!(
                Extension::parse("AUTH PLAIN LOGIN"),
                Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login])
            );
        }

        #[test]
        fn parse_legacy_auth() {
            assert_eq!(
                Extension::parse("AUTH=LOGIN PLAIN"),
                Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::Plain])
            );
        }

        #[test]
        fn parse_auth_unknown_mechanism_is_kept() {
            assert_eq!(
                Extension::parse("AUTH GSSAPI xoauth2"),
                Extension::Auth(vec![
                    AuthMechanism::Other("GSSAPI".into()),
                    AuthMechanism::XOAuth2
                ])
            );
        }

        #[test]
        fn parse_size() {
            assert_eq!(
                Extension::parse("SIZE 52428800"),
                Extension::Size(Some(52_428_800))
            );
            assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        }

        #[test]
        fn parse_flags() {
            assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
            assert_eq!(Extension::parse("PIPELINING"), Extension::Pipelining);
            assert_eq!(Extension::parse("CHUNKING"), Extension::Chunking);
            assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
            assert_eq!(Extension::parse("DSN"), Extension::Dsn);
            assert_eq!(
                Extension::parse("ENHANCEDSTATUSCODES"),
                Extension::EnhancedStatusCodes
            );
            assert_eq!(Extension::parse("REQUIRETLS"), Extension::RequireTls);
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(
                Extension::parse("X-CUSTOM foo"),
                Extension::Unknown("X-CUSTOM foo".into())
            );
            assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
        }
    }

    mod auth_mechanism_tests {
        use super::*;

        #[test]
        fn parse_known() {
            assert_eq!(AuthMechanism::parse("plain"), AuthMechanism::Plain);
            assert_eq!(AuthMechanism::parse("CRAM-MD5"), AuthMechanism::CramMd5);
            assert_eq!(AuthMechanism::parse("OAUTHBEARER"), AuthMechanism::OAuthBearer);
        }

        #[test]
        fn display_round_trips_name() {
            assert_eq!(AuthMechanism::Login.to_string(), "LOGIN");
            assert_eq!(AuthMechanism::parse("ntlm").to_string(), "NTLM");
        }
    }
}
