//! Framed I/O for the SMTP protocol.
//!
//! Replies are CRLF-terminated lines; a reply ends on the first line whose
//! fourth byte is a space. Every line read is recorded in the transcript as
//! it arrives, and every command is recorded before it is written.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_rustls::TlsConnector;

use super::SmtpStream;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::is_last_reply_line;
use crate::transcript::Transcript;
use crate::types::Reply;

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum reply line length (excluding CRLF) to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Framed connection for the SMTP protocol.
#[derive(Debug)]
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
        }
    }

    /// Reads one reply, logging each line as it is parsed.
    ///
    /// If the stream ends before the final line, the lines read so far are
    /// returned; check [`Reply::is_complete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or a line is too long.
    pub async fn read_reply(&mut self, log: &mut Transcript) -> Result<Reply> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line().await? {
            log.received(line.as_str());
            let is_last = is_last_reply_line(&line);
            lines.push(line);
            if is_last {
                break;
            }
        }
        Ok(Reply::new(lines))
    }

    /// Reads one reply and requires its final line to have arrived.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteReply`] if the stream closed mid-reply.
    pub async fn read_complete_reply(&mut self, log: &mut Transcript) -> Result<Reply> {
        let reply = self.read_reply(log).await?;
        if reply.is_complete() {
            Ok(reply)
        } else {
            Err(Error::IncompleteReply { lines: reply.lines })
        }
    }

    /// Reads a single CRLF-terminated line, without the terminator.
    ///
    /// Returns `None` at end of stream; a trailing fragment with no CRLF is
    /// discarded. A bare LF does not end a line.
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();

        loop {
            let budget = (MAX_LINE_LENGTH + 2).saturating_sub(line.len());
            if budget == 0 {
                return Err(Error::Protocol(format!(
                    "reply line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }

            let read = (&mut self.reader)
                .take(budget as u64)
                .read_until(b'\n', &mut line)
                .await?;

            if read == 0 {
                if !line.is_empty() {
                    tracing::debug!(bytes = line.len(), "discarding unterminated fragment");
                }
                return Ok(None);
            }

            if line.ends_with(b"\r\n") {
                line.truncate(line.len() - 2);
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
        }
    }

    /// Sends one command. The transcript entry is written before the bytes,
    /// so a failed write still shows what was attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn send(&mut self, command: &Command, log: &mut Transcript) -> Result<()> {
        log.sent(command.line());

        let stream = self.reader.get_mut();
        stream.write_all(&command.serialize()).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Returns the number of bytes read from the stream but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.reader.buffer().len()
    }

    /// Shuts down the write side of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if unread bytes are buffered; they would be
    /// lost when the stream changes hands.
    pub fn into_inner(self) -> Result<S> {
        let pending = self.buffered();
        if pending > 0 {
            return Err(Error::Protocol(format!(
                "server sent {pending} unexpected bytes before TLS negotiation"
            )));
        }
        Ok(self.reader.into_inner())
    }
}

impl FramedStream<SmtpStream> {
    /// Upgrades the underlying stream to TLS in place.
    ///
    /// # Errors
    ///
    /// Returns an error if bytes are pending in the read buffer or the
    /// handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str, connector: &TlsConnector) -> Result<Self> {
        let stream = self.into_inner()?;
        let stream = stream.upgrade_to_tls(hostname, connector).await?;
        Ok(Self::new(stream))
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
    use crate::transcript::Direction;
    use tokio_test::io::Builder;

    fn messages(log: &Transcript) -> Vec<(Direction, &str)> {
        log.entries()
            .iter()
            .map(|e| (e.direction, e.message.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn reads_single_line_reply() {
        let mock = Builder::new().read(b"220 mail.test ESMTP\r\n").build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let reply = framed.read_reply(&mut log).await.unwrap();
        assert_eq!(reply.lines, vec!["220 mail.test ESMTP"]);
        assert!(reply.is_complete());
        assert_eq!(
            messages(&log),
            vec![(Direction::Received, "220 mail.test ESMTP")]
        );
    }

    #[tokio::test]
    async fn folds_multi_line_reply_across_reads() {
        let mock = Builder::new()
            .read(b"250-mail.test\r\n250-STAR")
            .read(b"TTLS\r")
            .read(b"\n250 AUTH PLAIN\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let reply = framed.read_reply(&mut log).await.unwrap();
        assert_eq!(
            reply.lines,
            vec!["250-mail.test", "250-STARTTLS", "250 AUTH PLAIN"]
        );
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn stops_at_final_line_and_leaves_rest_buffered() {
        let mock = Builder::new().read(b"250 OK\r\n221 Bye\r\n").build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let first = framed.read_reply(&mut log).await.unwrap();
        assert_eq!(first.lines, vec!["250 OK"]);
        assert_eq!(framed.buffered(), "221 Bye\r\n".len());

        let second = framed.read_reply(&mut log).await.unwrap();
        assert_eq!(second.lines, vec!["221 Bye"]);
    }

    #[tokio::test]
    async fn eof_returns_partial_reply() {
        let mock = Builder::new()
            .read(b"250-mail.test\r\n250-STARTTLS\r\n250 trunc")
            .build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let reply = framed.read_reply(&mut log).await.unwrap();
        assert_eq!(reply.lines, vec!["250-mail.test", "250-STARTTLS"]);
        assert!(!reply.is_complete());
    }

    #[tokio::test]
    async fn eof_before_anything_is_empty_reply() {
        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let reply = framed.read_reply(&mut log).await.unwrap();
        assert!(reply.is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn complete_reply_required() {
        let mock = Builder::new().read(b"250-mail.test\r\n").build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let err = framed.read_complete_reply(&mut log).await.unwrap_err();
        match err {
            Error::IncompleteReply { lines } => assert_eq!(lines, vec!["250-mail.test"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bare_lf_does_not_end_line() {
        let mock = Builder::new().read(b"250 one\ntwo\r\n").build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let reply = framed.read_reply(&mut log).await.unwrap();
        assert_eq!(reply.lines, vec!["250 one\ntwo"]);
    }

    #[tokio::test]
    async fn empty_lines_are_kept() {
        let mock = Builder::new().read(b"\r\n220 ready\r\n").build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let reply = framed.read_reply(&mut log).await.unwrap();
        assert_eq!(reply.lines, vec!["", "220 ready"]);
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        let long = vec![b'a'; MAX_LINE_LENGTH + 2];
        let mock = Builder::new().read(&long).build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let err = framed.read_reply(&mut log).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn send_writes_crlf_and_logs_without_it() {
        let mock = Builder::new().write(b"EHLO test.local\r\n").build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        framed
            .send(&Command::ehlo("test.local"), &mut log)
            .await
            .unwrap();
        assert_eq!(messages(&log), vec![(Direction::Sent, "EHLO test.local")]);
    }

    #[tokio::test]
    async fn send_logs_even_when_write_fails() {
        let mock = Builder::new()
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "broken pipe",
            ))
            .build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        let err = framed.send(&Command::Quit, &mut log).await.unwrap_err();
        assert_eq!(err.to_string(), "broken pipe");
        assert_eq!(messages(&log), vec![(Direction::Sent, "QUIT")]);
    }

    #[tokio::test]
    async fn into_inner_refuses_pending_bytes() {
        let mock = Builder::new()
            .read(b"220 Ready\r\n250 injected\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let mut log = Transcript::new();

        framed.read_reply(&mut log).await.unwrap();
        let err = framed.into_inner().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
