//! The capability seam between the engine and resource kinds
//!
//! Each resource kind implements [`ResourceHandler`]; the engine owns the
//! state machine, sequencing and simulation gating. This keeps resource
//! logic behind one trait instead of a per-kind operation hierarchy.

use crate::diff::{self, DiffReport};
use crate::error::ReconcileError;
use crate::template::{PersistedConfiguration, ResourceTemplate};
use async_trait::async_trait;
use remoting::{ContentCache, ContentProvider, JobChannel, JobObserver};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a handler needs to talk to the execution target for one run
pub struct ReconcileContext {
    /// The remote execution seam
    pub channel: Arc<dyn JobChannel>,
    /// Resolves asset references to content
    pub provider: Arc<dyn ContentProvider>,
    /// Content-addressed staging on the execution target
    pub cache: Arc<ContentCache>,
    /// Receives log and progress events for every job this run submits
    pub observer: Arc<dyn JobObserver>,
    /// The run's single cancellation signal
    pub cancel: CancellationToken,
    /// Simulation runs must not perform configuration side effects
    pub simulation: bool,
}

/// Per-resource-kind capability: collect, compare, configure.
///
/// Handlers must not submit configuration jobs from `collect`; the engine
/// relies on collection being side-effect free with respect to the
/// resource's desired state.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Reject templates missing mandatory identity fields
    fn validate(&self, template: &ResourceTemplate) -> Result<(), ReconcileError>;

    /// Observe current state. Inspection is batched: one pass per run, not
    /// one per sub-target. Returns a snapshot with the discovered
    /// sub-target names in discovery order.
    async fn collect(
        &self,
        template: &ResourceTemplate,
        ctx: &ReconcileContext,
    ) -> Result<PersistedConfiguration, ReconcileError>;

    /// Structural comparison; the default is the total field-by-field diff
    fn compare(
        &self,
        template: &ResourceTemplate,
        observed: &PersistedConfiguration,
    ) -> DiffReport {
        diff::compare(template, observed)
    }

    /// Bring one sub-target to the declared state
    async fn configure_target(
        &self,
        template: &ResourceTemplate,
        target: &str,
        ctx: &ReconcileContext,
    ) -> Result<(), ReconcileError>;
}
