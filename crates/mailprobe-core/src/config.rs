//! Probe configuration types.

use std::time::Duration;

use mailprobe_smtp::TlsOptions;

/// Identity sent with EHLO unless overridden.
pub const DEFAULT_EHLO_HOSTNAME: &str = "test.local";

/// Default bound on TCP connect and the implicit TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on each read, write and STARTTLS handshake.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Hostname announced in EHLO.
    pub ehlo_hostname: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
    /// Certificate trust settings.
    pub tls: TlsOptions,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ehlo_hostname: DEFAULT_EHLO_HOSTNAME.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            tls: TlsOptions::default(),
        }
    }
}

impl ProbeConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ProbeConfigBuilder {
        ProbeConfigBuilder::new()
    }
}

/// Builder for probe configuration.
#[derive(Debug, Clone, Default)]
pub struct ProbeConfigBuilder {
    config: ProbeConfig,
}

impl ProbeConfigBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the EHLO hostname.
    #[must_use]
    pub fn ehlo_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.ehlo_hostname = hostname.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Adds a trust anchor on top of the bundled roots.
    #[must_use]
    pub fn add_root(mut self, cert: rustls::pki_types::CertificateDer<'static>) -> Self {
        self.config.tls.extra_roots.push(cert);
        self
    }

    /// Disables certificate verification.
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.tls.accept_invalid_certs = accept;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ProbeConfig {
        self.config
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

    #[test]
    fn test_config_default() {
        let config = ProbeConfig::default();
        assert_eq!(config.ehlo_hostname, "test.local");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(60));
        assert!(config.tls.extra_roots.is_empty());
        assert!(!config.tls.accept_invalid_certs);
    }

    #[test]
    fn test_config_builder() {
        let config = ProbeConfig::builder()
            .ehlo_hostname("probe.example.org")
            .connect_timeout(Duration::from_secs(5))
            .io_timeout(Duration::from_secs(10))
            .accept_invalid_certs(true)
            .build();

        assert_eq!(config.ehlo_hostname, "probe.example.org");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(10));
        assert!(config.tls.accept_invalid_certs);
    }

    #[test]
    fn test_config_builder_roots() {
        let cert = rustls::pki_types::CertificateDer::from(vec![1u8, 2, 3]);
        let config = ProbeConfig::builder().add_root(cert.clone()).build();
        assert_eq!(config.tls.extra_roots, vec![cert]);
    }
}
