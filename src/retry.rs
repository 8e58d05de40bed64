//! The Retry Engine: wraps a Backend mutation in the optimistic-concurrency loop every
//! orchestrated operation shares. A [`PoolError::Conflict`] is expected — log at debug
//! level. Anything else is unexpected — log a warning instead. Either way, [`Backend::reset`]
//! runs and the loop waits `retry_delay` before trying again; conflict and unexpected-error
//! retry identically, differing only in what gets logged. Retries are unbounded by design:
//! `acquire`/`add` retry forever on contention rather than surfacing a partial failure to
//! the caller.

use std::time::Duration;

use crate::backend::Backend;
use crate::{PoolError, PoolResult};

/// Run `op` against `backend`, resetting and retrying on conflict until it succeeds.
///
/// `op` performs whatever local mutation (and `publish`) the caller needs and returns its
/// result; `retry` only concerns itself with the reset/retry choreography around it.
pub async fn retry<T, F, Fut>(backend: &Backend, retry_delay: Duration, mut op: F) -> PoolResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = PoolResult<T>>,
{
    backend.reset().await?;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(PoolError::Conflict) => {
                log::debug!("publish conflict, resetting and retrying");
                backend.reset().await?;
                tokio::time::sleep(retry_delay).await;
            }
            Err(err @ (PoolError::ResetFailed(_) | PoolError::PublishFailed(_))) => {
                log::warn!("unexpected error during retry loop, retrying: {err}");
                tokio::time::sleep(retry_delay).await;
                backend.reset().await?;
            }
            Err(other) => return Err(other),
        }
    }
}
