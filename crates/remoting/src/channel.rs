//! The single abstraction through which all remote execution happens

use crate::error::RemotingError;
use crate::events::JobObserver;
use crate::job::{Job, JobResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Submits jobs to an execution target and streams events back.
///
/// Every resource-specific operation routes through this one contract, so
/// callers never depend on the concrete remote mechanism.
///
/// Contract:
/// - `submit` is the caller's sole suspension point; it may take arbitrary
///   wall-clock time bounded only by `cancel`.
/// - Log events are delivered to `observer` in the order produced; no
///   interleaving guarantee across concurrently executing jobs.
/// - Progress events replace one another; consumers hold only the latest.
/// - Cancellation is cooperative: the remote side is asked to stop, and
///   `submit` resolves to [`RemotingError::Cancelled`]. Side effects already
///   performed are not unwound.
/// - Abnormal remote termination resolves to [`RemotingError::ExecutionFailed`]
///   carrying a captured log tail; partially captured output variables are
///   discarded rather than returned.
#[async_trait]
pub trait JobChannel: Send + Sync {
    async fn submit(
        &self,
        job: Job,
        observer: Arc<dyn JobObserver>,
        cancel: CancellationToken,
    ) -> Result<JobResult, RemotingError>;
}
