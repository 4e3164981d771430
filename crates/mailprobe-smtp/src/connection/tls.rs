//! TLS client configuration.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;

use crate::error::Result;

/// Trust settings for TLS connections.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Trust anchors added on top of the bundled Mozilla roots.
    pub extra_roots: Vec<CertificateDer<'static>>,
    /// Skip certificate verification entirely. Diagnostic use only.
    pub accept_invalid_certs: bool,
}

/// Creates a TLS connector trusting the bundled Mozilla roots plus any extra roots.
///
/// # Errors
///
/// Returns an error if an extra root certificate cannot be parsed.
pub fn create_tls_connector(options: &TlsOptions) -> Result<TlsConnector> {
    let mut root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    for cert in &options.extra_roots {
        root_store.add(cert.clone())?;
    }

    let mut config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if options.accept_invalid_certs {
        tracing::warn!("certificate verification disabled");
        let provider = Arc::clone(config.crypto_provider());
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoVerifier(provider)));
    }

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Accepts any certificate but still checks handshake signatures.
#[derive(Debug)]
struct NoVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_connector_builds() {
        assert!(create_tls_connector(&TlsOptions::default()).is_ok());
    }

    #[test]
    fn insecure_connector_builds() {
        let options = TlsOptions {
            accept_invalid_certs: true,
            ..TlsOptions::default()
        };
        assert!(create_tls_connector(&options).is_ok());
    }

    #[test]
    fn garbage_extra_root_is_rejected() {
        let options = TlsOptions {
            extra_roots: vec![CertificateDer::from(vec![0u8, 1, 2, 3])],
            ..TlsOptions::default()
        };
        assert!(create_tls_connector(&options).is_err());
    }
}
