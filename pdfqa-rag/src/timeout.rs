//! Deadline handling for calls into external services.

use std::future::Future;
use std::time::Duration;

use crate::error::{RagError, Result};

/// Await `call`, failing with `on_timeout()` once `limit` elapses.
///
/// `None` waits indefinitely. Dropping the returned future cancels the call.
pub(crate) async fn with_timeout<T, F>(
    limit: Option<Duration>,
    call: F,
    on_timeout: impl FnOnce(Duration) -> RagError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| on_timeout(limit))?,
        None => call.await,
    }
}
