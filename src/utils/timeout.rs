//! Deadline helpers for connection I/O.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Deadline for each read or write of the login exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a shutting-down server waits for open connections
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a fallible future under a deadline, mapping expiry to `ProtocolError::Timeout`.
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_expiry_maps_to_timeout() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }

    #[tokio::test]
    async fn test_inner_error_is_preserved() {
        let result: Result<()> =
            with_timeout_error(async { Err(ProtocolError::ConnectionClosed) }, DEFAULT_TIMEOUT)
                .await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }
}
