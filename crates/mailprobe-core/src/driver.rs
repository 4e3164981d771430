//! The probe state machine.
//!
//! One probe is one sequential walk over a single connection:
//!
//! ```text
//! Connecting -> GreetingRead -> EhloSent -> EhloRead
//!     [-> StartTlsCheck -> StartTlsSent -> StartTlsRead -> TlsUpgrading
//!      -> PostTlsEhloSent -> PostTlsEhloRead]
//!     -> QuitSent -> QuitRead -> Done
//! ```
//!
//! Any step may fail, which ends the probe in `Failed` with whatever was
//! collected so far. Nothing is retried.

use mailprobe_smtp::connection::{create_tls_connector, with_timeout};
use mailprobe_smtp::{
    Capabilities, Command, Error as SmtpError, FramedStream, Reply, ReplyCode, SmtpStream,
    Transcript,
};

use crate::config::ProbeConfig;
use crate::request::ProtocolVariant;
use crate::result::{Failure, Outcome, ProbeResult};

type Framed = FramedStream<SmtpStream>;

/// Where a probe is in its walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeState {
    /// Opening the connection (and, for implicit TLS, the handshake).
    Connecting,
    /// Greeting received.
    GreetingRead,
    /// First EHLO written.
    EhloSent,
    /// First EHLO reply received.
    EhloRead,
    /// Looking for STARTTLS in the capabilities.
    StartTlsCheck,
    /// STARTTLS written.
    StartTlsSent,
    /// STARTTLS reply received.
    StartTlsRead,
    /// TLS handshake over the existing connection.
    TlsUpgrading,
    /// EHLO written over TLS.
    PostTlsEhloSent,
    /// EHLO reply received over TLS.
    PostTlsEhloRead,
    /// QUIT written.
    QuitSent,
    /// QUIT reply read, or given up on.
    QuitRead,
    /// Probe completed.
    Done,
    /// Probe aborted.
    Failed,
}

/// Mutable state of one probe. Dropped when the probe returns.
struct Session<'a> {
    config: &'a ProbeConfig,
    hostname: &'a str,
    port: u16,
    state: ProbeState,
    log: Transcript,
    greeting: Option<String>,
    capabilities: Option<Capabilities>,
    tls_upgraded: Option<bool>,
}

/// Runs one probe with an explicit TLS strategy.
#[tracing::instrument(skip(config, protocol), fields(protocol = protocol.as_str()))]
pub(crate) async fn run(
    config: &ProbeConfig,
    hostname: &str,
    port: u16,
    protocol: ProtocolVariant,
) -> ProbeResult {
    let mut session = Session {
        config,
        hostname,
        port,
        state: ProbeState::Connecting,
        log: Transcript::new(),
        greeting: None,
        capabilities: None,
        tls_upgraded: None,
    };

    let walked = match protocol {
        ProtocolVariant::ImplicitTls => session.implicit_tls().await,
        ProtocolVariant::StartTls => session.starttls().await,
    };
    session.finish(protocol, walked)
}

impl Session<'_> {
    async fn implicit_tls(&mut self) -> Result<bool, SmtpError> {
        self.log.info(format!(
            "Connecting to {}:{} with implicit TLS...",
            self.hostname, self.port
        ));
        let connector = create_tls_connector(&self.config.tls)?;

        let limit = self.config.connect_timeout;
        let stream = with_timeout(limit, SmtpStream::connect(self.hostname, self.port)).await?;
        self.log.info("TCP connection established, upgrading to TLS...");

        let stream = with_timeout(limit, stream.upgrade_to_tls(self.hostname, &connector)).await?;
        self.log.info("TLS handshake successful");

        let mut framed = FramedStream::new(stream);
        self.read_greeting(&mut framed).await?;
        self.ehlo(&mut framed, ProbeState::EhloSent, ProbeState::EhloRead).await?;
        self.quit(&mut framed).await?;

        Ok(true)
    }

    async fn starttls(&mut self) -> Result<bool, SmtpError> {
        self.log
            .info(format!("Connecting to {}:{}...", self.hostname, self.port));
        let connector = create_tls_connector(&self.config.tls)?;

        let limit = self.config.connect_timeout;
        let stream = with_timeout(limit, SmtpStream::connect(self.hostname, self.port)).await?;
        self.log.info("TCP connection established");

        let mut framed = FramedStream::new(stream);
        self.read_greeting(&mut framed).await?;
        self.ehlo(&mut framed, ProbeState::EhloSent, ProbeState::EhloRead).await?;

        self.enter(ProbeState::StartTlsCheck);
        let advertised = self
            .capabilities
            .as_ref()
            .is_some_and(Capabilities::supports_starttls);
        if !advertised {
            tracing::info!(hostname = self.hostname, "STARTTLS not advertised");
            self.quit(&mut framed).await?;
            return Ok(false);
        }

        self.send(&mut framed, &Command::StartTls, ProbeState::StartTlsSent).await?;
        self.read_starttls_reply(&mut framed).await?;

        self.log.info("Upgrading to TLS...");
        self.enter(ProbeState::TlsUpgrading);
        let limit = self.config.io_timeout;
        let upgrade = framed.upgrade_to_tls(self.hostname, &connector);
        let mut framed = with_timeout(limit, upgrade).await?;
        self.log.info("TLS handshake successful");

        self.ehlo(
            &mut framed,
            ProbeState::PostTlsEhloSent,
            ProbeState::PostTlsEhloRead,
        )
        .await?;
        self.quit(&mut framed).await?;

        Ok(true)
    }

    /// Reads the STARTTLS reply. A non-220 first line is a rejection even if
    /// the server hung up before finishing the reply.
    async fn read_starttls_reply(&mut self, framed: &mut Framed) -> Result<(), SmtpError> {
        let limit = self.config.io_timeout;
        let reply = with_timeout(limit, framed.read_reply(&mut self.log)).await?;

        if !reply.is_empty() && !reply.starts_with_code(ReplyCode::SERVICE_READY) {
            self.tls_upgraded = Some(false);
            return Err(SmtpError::StartTlsRejected(reply.first_line().to_string()));
        }
        if !reply.is_complete() {
            return Err(SmtpError::IncompleteReply { lines: reply.lines });
        }
        self.enter(ProbeState::StartTlsRead);
        Ok(())
    }

    async fn read_greeting(&mut self, framed: &mut Framed) -> Result<(), SmtpError> {
        let reply = self.read(framed, ProbeState::GreetingRead).await?;
        if !reply.is_success() {
            tracing::warn!(greeting = reply.first_line(), "server greeting is not 2xx");
        }
        self.greeting = Some(reply.text());
        Ok(())
    }

    /// Sends EHLO and replaces the capabilities with the reply's.
    async fn ehlo(
        &mut self,
        framed: &mut Framed,
        sent: ProbeState,
        read: ProbeState,
    ) -> Result<(), SmtpError> {
        let command = Command::ehlo(self.config.ehlo_hostname.as_str());
        self.send(framed, &command, sent).await?;
        let reply = self.read(framed, read).await?;

        let capabilities = Capabilities::from_ehlo(&reply, self.hostname);
        tracing::debug!(count = capabilities.len(), ?read, "capabilities");
        self.capabilities = Some(capabilities);
        Ok(())
    }

    /// Sends QUIT. The reply is read best-effort and never inspected.
    async fn quit(&mut self, framed: &mut Framed) -> Result<(), SmtpError> {
        self.send(framed, &Command::Quit, ProbeState::QuitSent).await?;

        let limit = self.config.io_timeout;
        if let Err(e) = with_timeout(limit, framed.read_reply(&mut self.log)).await {
            tracing::debug!(error = %e, "ignoring QUIT reply failure");
        }
        self.enter(ProbeState::QuitRead);

        if let Err(e) = with_timeout(limit, framed.shutdown()).await {
            tracing::debug!(error = %e, "shutdown failed");
        }
        Ok(())
    }

    async fn send(
        &mut self,
        framed: &mut Framed,
        command: &Command,
        next: ProbeState,
    ) -> Result<(), SmtpError> {
        let limit = self.config.io_timeout;
        with_timeout(limit, framed.send(command, &mut self.log)).await?;
        self.enter(next);
        Ok(())
    }

    async fn read(&mut self, framed: &mut Framed, next: ProbeState) -> Result<Reply, SmtpError> {
        let limit = self.config.io_timeout;
        let reply = with_timeout(limit, framed.read_complete_reply(&mut self.log)).await?;
        self.enter(next);
        Ok(reply)
    }

    fn enter(&mut self, next: ProbeState) {
        tracing::trace!(from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    fn finish(mut self, protocol: ProtocolVariant, walked: Result<bool, SmtpError>) -> ProbeResult {
        let outcome = match walked {
            Ok(tls_upgraded) => {
                self.enter(ProbeState::Done);
                tracing::info!(tls_upgraded, "probe succeeded");
                Outcome::Success {
                    greeting: self.greeting.unwrap_or_default(),
                    capabilities: self.capabilities.unwrap_or_default(),
                    tls_upgraded,
                }
            }
            Err(err) => {
                let mut error = err.to_string();
                if error.is_empty() {
                    error = format!("{:?} failure", err.kind());
                }
                tracing::warn!(state = ?self.state, kind = ?err.kind(), %error, "probe failed");
                self.enter(ProbeState::Failed);
                self.log.error(error.as_str());
                Outcome::Failure(Failure {
                    error,
                    kind: err.kind(),
                    greeting: self.greeting,
                    capabilities: self.capabilities,
                    tls_upgraded: self.tls_upgraded,
                })
            }
        };

        ProbeResult {
            protocol,
            hostname: self.hostname.to_string(),
            port: self.port,
            outcome,
            logs: self.log,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::similar_names
)]
mod tests {
    use std::time::Duration;

    use mailprobe_smtp::{Direction, ErrorKind};

    use super::*;
    use crate::testing::{Peer, spawn_server, tls_acceptor, trusting_config};

    const EHLO_PLAIN: &str = "250-localhost\r\n250-PIPELINING\r\n250-STARTTLS\r\n250 SIZE 10240000\r\n";

    fn sent(result: &ProbeResult) -> Vec<&str> {
        result
            .logs
            .entries()
            .iter()
            .filter(|e| e.direction == Direction::Sent)
            .map(|e| e.message.as_str())
            .collect()
    }

    fn infos(result: &ProbeResult) -> Vec<&str> {
        result
            .logs
            .entries()
            .iter()
            .filter(|e| e.direction == Direction::Info)
            .map(|e| e.message.as_str())
            .collect()
    }

    #[tokio::test]
    async fn starttls_advertised_upgrades_and_replaces_capabilities() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost ESMTP ready\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send(EHLO_PLAIN).await;
            peer.expect("STARTTLS").await;
            peer.send("220 2.0.0 Ready to start TLS\r\n").await;

            let tls = tls_acceptor().accept(peer.into_inner()).await.unwrap();
            let mut peer = Peer::new(tls);
            peer.expect("EHLO test.local").await;
            peer.send("250-localhost\r\n250-AUTH PLAIN LOGIN\r\n250 SIZE 10240000\r\n")
                .await;
            peer.expect("QUIT").await;
            peer.send("221 2.0.0 Bye\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(result.success(), "{:?}", result.error());
        assert_eq!(result.tls_upgraded(), Some(true));
        assert_eq!(result.greeting(), Some("220 localhost ESMTP ready"));
        assert_eq!(
            result.capabilities().unwrap().as_slice(),
            ["AUTH PLAIN LOGIN", "SIZE 10240000"]
        );
        assert_eq!(
            sent(&result),
            vec!["EHLO test.local", "STARTTLS", "EHLO test.local", "QUIT"]
        );
        assert_eq!(
            infos(&result),
            vec![
                format!("Connecting to localhost:{port}..."),
                "TCP connection established".to_string(),
                "Upgrading to TLS...".to_string(),
                "TLS handshake successful".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn starttls_not_advertised_stays_plaintext() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220-localhost ESMTP\r\n220 no crypto here\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send("250-localhost\r\n250-PIPELINING\r\n250 8BITMIME\r\n")
                .await;
            peer.expect("QUIT").await;
            peer.send("221 Bye\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(result.success());
        assert_eq!(result.tls_upgraded(), Some(false));
        assert_eq!(
            result.greeting(),
            Some("220-localhost ESMTP\n220 no crypto here")
        );
        assert_eq!(
            result.capabilities().unwrap().as_slice(),
            ["PIPELINING", "8BITMIME"]
        );
        assert_eq!(sent(&result), vec!["EHLO test.local", "QUIT"]);
        assert!(!infos(&result).contains(&"TLS handshake successful"));
    }

    #[tokio::test]
    async fn starttls_rejected_keeps_pre_upgrade_state() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost ESMTP\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send(EHLO_PLAIN).await;
            peer.expect("STARTTLS").await;
            peer.send("454 TLS not available\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(!result.success());
        assert_eq!(result.error(), Some("STARTTLS rejected: 454 TLS not available"));
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        assert_eq!(result.tls_upgraded(), Some(false));
        assert_eq!(result.greeting(), Some("220 localhost ESMTP"));
        assert_eq!(
            result.capabilities().unwrap().as_slice(),
            ["PIPELINING", "STARTTLS", "SIZE 10240000"]
        );
        let last = result.logs.last().unwrap();
        assert_eq!(last.direction, Direction::Error);
        assert_eq!(last.message, "STARTTLS rejected: 454 TLS not available");
    }

    #[tokio::test]
    async fn implicit_tls_walks_greeting_ehlo_quit() {
        let (port, server) = spawn_server(|socket| async move {
            let tls = tls_acceptor().accept(socket).await.unwrap();
            let mut peer = Peer::new(tls);
            peer.send("220 localhost ESMTPS\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send("250-localhost\r\n250 AUTH PLAIN\r\n").await;
            peer.expect("QUIT").await;
            peer.send("221 Bye\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::ImplicitTls).await;
        server.await.unwrap();

        assert!(result.success(), "{:?}", result.error());
        assert_eq!(result.protocol, ProtocolVariant::ImplicitTls);
        assert_eq!(result.tls_upgraded(), Some(true));
        assert_eq!(result.capabilities().unwrap().as_slice(), ["AUTH PLAIN"]);
        assert_eq!(
            infos(&result),
            vec![
                format!("Connecting to localhost:{port} with implicit TLS..."),
                "TCP connection established, upgrading to TLS...".to_string(),
                "TLS handshake successful".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn implicit_tls_untrusted_certificate_fails_handshake() {
        let (port, server) = spawn_server(|socket| async move {
            let _ = tls_acceptor().accept(socket).await;
        })
        .await;

        let result = run(
            &ProbeConfig::default(),
            "localhost",
            port,
            ProtocolVariant::ImplicitTls,
        )
        .await;
        server.await.unwrap();

        assert!(!result.success());
        assert_eq!(result.protocol, ProtocolVariant::ImplicitTls);
        assert_eq!(result.error_kind(), Some(ErrorKind::Handshake));
        assert!(result.greeting().is_none());
        assert!(result.capabilities().is_none());
        assert!(result.tls_upgraded().is_none());
        assert_eq!(result.logs.last().unwrap().direction, Direction::Error);
        assert!(!result.error().unwrap().is_empty());
    }

    #[tokio::test]
    async fn insecure_mode_accepts_untrusted_certificate() {
        let (port, server) = spawn_server(|socket| async move {
            let tls = tls_acceptor().accept(socket).await.unwrap();
            let mut peer = Peer::new(tls);
            peer.send("220 localhost\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send("250 localhost\r\n").await;
            peer.expect("QUIT").await;
        })
        .await;

        let config = ProbeConfig::builder().accept_invalid_certs(true).build();
        let result = run(&config, "localhost", port, ProtocolVariant::ImplicitTls).await;
        server.await.unwrap();

        assert!(result.success(), "{:?}", result.error());
        assert!(result.capabilities().unwrap().is_empty());
    }

    #[tokio::test]
    async fn incomplete_greeting_is_a_failure() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220-localhost still talking\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(!result.success());
        assert_eq!(result.error_kind(), Some(ErrorKind::IncompleteReply));
        assert_eq!(
            result.error(),
            Some("connection closed before a complete reply was received")
        );
        assert!(result.greeting().is_none());
        let received: Vec<_> = result
            .logs
            .entries()
            .iter()
            .filter(|e| e.direction == Direction::Received)
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(received, vec!["220-localhost still talking"]);
    }

    #[tokio::test]
    async fn missing_quit_reply_is_not_a_failure() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send("250 localhost\r\n").await;
            peer.expect("QUIT").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(result.success(), "{:?}", result.error());
        assert_eq!(result.logs.last().unwrap().message, "QUIT");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (port, server) = spawn_server(|socket| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        })
        .await;

        let config = ProbeConfig::builder()
            .io_timeout(Duration::from_millis(100))
            .build();
        let result = run(&config, "localhost", port, ProtocolVariant::StartTls).await;
        server.abort();

        assert!(!result.success());
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(result.error(), Some("operation timed out after 100ms"));
    }

    #[tokio::test]
    async fn custom_ehlo_hostname_is_sent() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost\r\n").await;
            peer.expect("EHLO probe.example.org").await;
            peer.send("250 localhost\r\n").await;
            peer.expect("QUIT").await;
            peer.send("221 Bye\r\n").await;
        })
        .await;

        let config = ProbeConfig::builder()
            .ehlo_hostname("probe.example.org")
            .build();
        let result = run(&config, "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(result.success(), "{:?}", result.error());
        assert_eq!(sent(&result)[0], "EHLO probe.example.org");
    }

    #[tokio::test]
    async fn timestamps_never_decrease() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send(EHLO_PLAIN).await;
            peer.expect("STARTTLS").await;
            peer.send("454 later\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(
            result
                .logs
                .entries()
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }

    #[tokio::test]
    async fn starttls_handshake_failure_keeps_pre_upgrade_capabilities() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost ESMTP\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send(EHLO_PLAIN).await;
            peer.expect("STARTTLS").await;
            peer.send("220 Ready\r\n").await;
            let _ = tls_acceptor().accept(peer.into_inner()).await;
        })
        .await;

        let result = run(
            &ProbeConfig::default(),
            "localhost",
            port,
            ProtocolVariant::StartTls,
        )
        .await;
        server.await.unwrap();

        assert!(!result.success());
        assert_eq!(result.error_kind(), Some(ErrorKind::Handshake));
        assert_eq!(result.tls_upgraded(), None);
        assert_eq!(result.greeting(), Some("220 localhost ESMTP"));
        assert_eq!(
            result.capabilities().unwrap().as_slice(),
            ["PIPELINING", "STARTTLS", "SIZE 10240000"]
        );

        let entries = result.logs.entries();
        let last = entries.last().unwrap();
        assert_eq!(last.direction, Direction::Error);
        assert_eq!(last.message, result.error().unwrap());
        let before = &entries[entries.len() - 2];
        assert_eq!(before.direction, Direction::Info);
        assert_eq!(before.message, "Upgrading to TLS...");
    }

    #[tokio::test]
    async fn bytes_pipelined_after_starttls_ready_are_refused() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost ESMTP\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send(EHLO_PLAIN).await;
            peer.expect("STARTTLS").await;
            peer.send("220 Ready\r\n250 injected\r\n").await;
            peer.drain().await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert!(!result.success());
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        assert!(result.error().unwrap().contains("unexpected bytes"));
        assert_eq!(result.tls_upgraded(), None);
        assert!(!infos(&result).contains(&"TLS handshake successful"));
    }

    #[tokio::test]
    async fn starttls_rejection_cut_short_is_still_a_rejection() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost ESMTP\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send(EHLO_PLAIN).await;
            peer.expect("STARTTLS").await;
            peer.send("454-TLS not\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert_eq!(result.error(), Some("STARTTLS rejected: 454-TLS not"));
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        assert_eq!(result.tls_upgraded(), Some(false));
    }

    #[tokio::test]
    async fn starttls_ready_cut_short_is_incomplete() {
        let (port, server) = spawn_server(|socket| async move {
            let mut peer = Peer::new(socket);
            peer.send("220 localhost ESMTP\r\n").await;
            peer.expect("EHLO test.local").await;
            peer.send(EHLO_PLAIN).await;
            peer.expect("STARTTLS").await;
            peer.send("220-go ahead\r\n").await;
        })
        .await;

        let result = run(&trusting_config(), "localhost", port, ProtocolVariant::StartTls).await;
        server.await.unwrap();

        assert_eq!(result.error_kind(), Some(ErrorKind::IncompleteReply));
        assert_eq!(result.tls_upgraded(), None);
    }
}
