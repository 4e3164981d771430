//! Low-level SMTP stream handling.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::error::{Error, Result};

/// SMTP stream (TCP or TLS).
///
/// Exactly one handle is live at a time: upgrading consumes the plaintext
/// variant and moves its socket into the TLS session.
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Plain(TcpStream),
    /// TLS-encrypted connection (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Connects to an SMTP server over plain TCP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if resolution or the TCP connect fails.
    pub async fn connect(hostname: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((hostname, port))
            .await
            .map_err(Error::Connect)?;
        tracing::debug!(hostname, port, peer = ?stream.peer_addr().ok(), "tcp connected");
        Ok(Self::Plain(stream))
    }

    /// Upgrades a TCP stream to TLS, validating the certificate against `hostname`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the TLS handshake fails, or
    /// [`Error::Protocol`] if the stream is already encrypted.
    pub async fn upgrade_to_tls(self, hostname: &str, connector: &TlsConnector) -> Result<Self> {
        let tcp = match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|_| Error::InvalidServerName(hostname.to_string()))?;

        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(Error::Handshake)?;

        if let Some(version) = tls.get_ref().1.protocol_version() {
            tracing::debug!(hostname, ?version, "tls established");
        }
        Ok(Self::Tls(Box::new(tls)))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::connection::{TlsOptions, create_tls_connector};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_refused_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = SmtpStream::connect("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)));
    }

    #[tokio::test]
    async fn connect_gives_plain_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = SmtpStream::connect("127.0.0.1", port).await.unwrap();
        assert!(matches!(stream, SmtpStream::Plain(_)));
    }

    #[tokio::test]
    async fn handshake_against_plaintext_peer_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = socket.write_all(b"220 not tls at all\r\n").await;
        });

        let connector = create_tls_connector(&TlsOptions::default()).unwrap();
        let stream = SmtpStream::connect("127.0.0.1", port).await.unwrap();
        let err = stream
            .upgrade_to_tls("localhost", &connector)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Handshake(_)));
    }
}
