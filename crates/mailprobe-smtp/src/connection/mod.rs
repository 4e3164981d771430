//! SMTP connection management.
//!
//! - [`SmtpStream`]: plaintext or TLS socket, upgradable in place
//! - [`FramedStream`]: reply framing and command writing over any stream
//! - [`TlsOptions`] / [`create_tls_connector`]: trust configuration

mod framed;
mod stream;
mod tls;

pub use framed::FramedStream;
pub use stream::SmtpStream;
pub use tls::{TlsOptions, create_tls_connector};

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Runs a network operation with an upper bound on how long it may take.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if `limit` elapses first, otherwise the
/// operation's own result.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| Error::Timeout(limit))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_fires() {
        let err = with_timeout(Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn passes_through_result() {
        let value = with_timeout(Duration::from_secs(5), async { Ok::<_, Error>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
