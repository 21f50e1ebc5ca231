//! Timeout enforcement.
//!
//! Wraps a remote call in a Tokio deadline; timing out is reported as
//! [`RpcError::Timeout`], distinct from transport errors.

use std::future::Future;
use std::time::Duration;

use crate::blockchain::types::{RpcError, RpcResult};

/// Run `fut` with a deadline.
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> RpcResult<T>
where
    F: Future<Output = RpcResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(RpcError::Timeout(deadline.as_millis() as u64)),
    }
}
