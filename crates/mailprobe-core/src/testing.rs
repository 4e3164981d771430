//! Scripted SMTP peers for driver tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::CertificateDer;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::config::ProbeConfig;

const CA_PEM: &[u8] = include_bytes!("../testdata/ca.crt");
const CERT_PEM: &[u8] = include_bytes!("../testdata/localhost.crt");
const KEY_PEM: &[u8] = include_bytes!("../testdata/localhost.key");

/// The test CA that signed the `localhost` certificate.
pub(crate) fn test_ca() -> CertificateDer<'static> {
    rustls_pemfile::certs(&mut &CA_PEM[..])
        .next()
        .unwrap()
        .unwrap()
}

/// Server-side TLS for `localhost`.
pub(crate) fn tls_acceptor() -> TlsAcceptor {
    let certs = rustls_pemfile::certs(&mut &CERT_PEM[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut &KEY_PEM[..])
        .unwrap()
        .unwrap();
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Client configuration trusting the test CA, with short timeouts.
pub(crate) fn trusting_config() -> ProbeConfig {
    ProbeConfig::builder()
        .add_root(test_ca())
        .connect_timeout(Duration::from_secs(5))
        .io_timeout(Duration::from_secs(5))
        .build()
}

/// Accepts one connection on a loopback port and runs `script` against it.
pub(crate) async fn spawn_server<F, Fut>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        script(socket).await;
    });
    (port, handle)
}

/// Server end of a scripted session.
pub(crate) struct Peer<S> {
    io: BufReader<S>,
}

impl<S> Peer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S) -> Self {
        Self {
            io: BufReader::new(stream),
        }
    }

    /// Writes raw bytes; `data` carries its own CRLFs.
    pub(crate) async fn send(&mut self, data: &str) {
        let stream = self.io.get_mut();
        stream.write_all(data.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// Reads one line and checks it matches `line` plus CRLF.
    pub(crate) async fn expect(&mut self, line: &str) {
        let mut buf = String::new();
        self.io.read_line(&mut buf).await.unwrap();
        assert_eq!(buf, format!("{line}\r\n"));
    }

    /// Reads until the client hangs up.
    pub(crate) async fn drain(&mut self) {
        let mut sink = Vec::new();
        let _ = self.io.read_to_end(&mut sink).await;
    }

    pub(crate) fn into_inner(self) -> S {
        assert!(self.io.buffer().is_empty(), "client sent bytes early");
        self.io.into_inner()
    }
}
