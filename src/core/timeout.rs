//! Deadlines for external calls
//!
//! Every subprocess, RPC and explorer request goes through [`with_timeout`] so
//! a hung collaborator surfaces as [`SatError::Timeout`] instead of blocking
//! the command forever.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, SatError};

/// Await `future` for at most `secs` seconds. `0` disables the deadline.
pub async fn with_timeout<T, E, F>(operation: &str, secs: u64, future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    SatError: From<E>,
{
    if secs == 0 {
        return future.await.map_err(SatError::from);
    }
    match tokio::time::timeout(Duration::from_secs(secs), future).await {
        Ok(result) => result.map_err(SatError::from),
        Err(_) => {
            warn!(operation, secs, "external call timed out");
            Err(SatError::Timeout {
                operation: operation.to_string(),
                secs,
            })
        }
    }
}
