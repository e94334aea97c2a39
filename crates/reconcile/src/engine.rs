//! The Collect → Compare → Configure state machine
//!
//! One engine run executes on a single logical flow of control per
//! template; the job channel's `submit` is the sole suspension point.
//! Independent templates may be reconciled concurrently by independent
//! engine instances, which share no mutable state.

use crate::diff::DiffReport;
use crate::error::ReconcileError;
use crate::handler::{ReconcileContext, ResourceHandler};
use crate::template::{PersistedConfiguration, ResourceTemplate};
use remoting::{ContentCache, ContentProvider, JobChannel, JobObserver, NullObserver, RemotingError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Terminal outcome of one reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Observed state already matched the declared intent
    InDesiredState,
    /// Configuration ran and verification confirmed the desired state
    Configured,
    /// Configuration ran but verification still observed drift
    ConfiguredWithDrift,
    /// Simulation: configuration was needed but not performed
    WouldConfigure,
    /// The template was rejected before any remote call
    ValidationFailed,
    /// A staging, execution or capture failure ended the run
    Failed,
    /// The run was cancelled cooperatively
    Cancelled,
}

impl Outcome {
    /// Process exit status for callers mapping outcomes to exit codes
    pub fn exit_code(self) -> u8 {
        match self {
            Self::InDesiredState | Self::Configured | Self::WouldConfigure => 0,
            Self::Failed => 1,
            Self::ValidationFailed => 2,
            Self::ConfiguredWithDrift => 3,
            Self::Cancelled => 130,
        }
    }

    pub fn is_success(self) -> bool {
        self.exit_code() == 0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InDesiredState => "in desired state",
            Self::Configured => "configured",
            Self::ConfiguredWithDrift => "configured with drift",
            Self::WouldConfigure => "would configure",
            Self::ValidationFailed => "validation failed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What one reconciliation run produced
#[derive(Debug)]
pub struct ReconcileReport {
    pub outcome: Outcome,
    /// The last snapshot taken, when collection got that far
    pub snapshot: Option<PersistedConfiguration>,
    /// The comparison that drove the outcome
    pub diff: Option<DiffReport>,
    /// Failure detail for the terminal error outcomes
    pub error: Option<ReconcileError>,
}

impl ReconcileReport {
    fn terminal(
        outcome: Outcome,
        snapshot: Option<PersistedConfiguration>,
        diff: Option<DiffReport>,
    ) -> Self {
        Self {
            outcome,
            snapshot,
            diff,
            error: None,
        }
    }
}

/// Drives the reconciliation state machine over a [`ResourceHandler`]
pub struct Engine {
    channel: Arc<dyn JobChannel>,
    provider: Arc<dyn ContentProvider>,
    cache: Arc<ContentCache>,
    observer: Arc<dyn JobObserver>,
}

impl Engine {
    pub fn new(
        channel: Arc<dyn JobChannel>,
        provider: Arc<dyn ContentProvider>,
        cache: Arc<ContentCache>,
    ) -> Self {
        Self {
            channel,
            provider,
            cache,
            observer: Arc::new(NullObserver),
        }
    }

    /// Receive log and progress events for every job the engine submits
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Reconcile observed state against the template: the single entry
    /// point. Terminal failures are folded into the report's outcome so the
    /// outcome list is the complete caller contract.
    pub async fn reconcile(
        &self,
        handler: &dyn ResourceHandler,
        template: &ResourceTemplate,
        simulation: bool,
        cancel: CancellationToken,
    ) -> ReconcileReport {
        let ctx = ReconcileContext {
            channel: self.channel.clone(),
            provider: self.provider.clone(),
            cache: self.cache.clone(),
            observer: self.observer.clone(),
            cancel,
            simulation,
        };

        match self.run(handler, template, &ctx).await {
            Ok(report) => report,
            Err(err) => {
                let key = &template.configuration_key;
                let outcome = if matches!(err, ReconcileError::Validation { .. }) {
                    log::error!("template '{key}' failed validation: {err}");
                    Outcome::ValidationFailed
                } else if err.is_cancelled() {
                    log::warn!("reconciliation of '{key}' was cancelled");
                    Outcome::Cancelled
                } else {
                    log::error!("reconciliation of '{key}' failed: {err}");
                    Outcome::Failed
                };
                ReconcileReport {
                    outcome,
                    snapshot: None,
                    diff: None,
                    error: Some(err),
                }
            }
        }
    }

    async fn run(
        &self,
        handler: &dyn ResourceHandler,
        template: &ResourceTemplate,
        ctx: &ReconcileContext,
    ) -> Result<ReconcileReport, ReconcileError> {
        let key = &template.configuration_key;

        log::debug!("validating template '{key}'");
        handler.validate(template)?;

        log::info!("collecting current state for '{key}'");
        let observed = handler.collect(template, ctx).await?;

        log::debug!("comparing observed state of '{key}' against declared intent");
        let diff = handler.compare(template, &observed);
        if !diff.has_changes() {
            if template.exists {
                log::info!("'{key}' is in the desired state");
            } else {
                log::warn!("'{key}' is declared absent and is already absent");
            }
            return Ok(ReconcileReport::terminal(
                Outcome::InDesiredState,
                Some(observed),
                Some(diff),
            ));
        }
        for field in &diff.fields {
            log::info!("'{key}' drift: {}", field.render());
        }

        if ctx.simulation {
            // No configuration side effects; still report what would be done
            // per sub-target.
            if diff.unsatisfied.is_empty() {
                log::info!("simulation: would reconfigure '{key}'");
            }
            for target in &diff.unsatisfied {
                log::info!("simulation: would configure sub-target '{target}' of '{key}'");
            }
            return Ok(ReconcileReport::terminal(
                Outcome::WouldConfigure,
                Some(observed),
                Some(diff),
            ));
        }

        // Sub-target jobs run strictly sequentially in discovery order;
        // they may write overlapping remote state.
        for target in &observed.config_names {
            if ctx.cancel.is_cancelled() {
                log::warn!("cancellation requested; stopping before sub-target '{target}'");
                return Err(ReconcileError::Remoting(RemotingError::Cancelled));
            }
            log::info!("configuring sub-target '{target}' of '{key}'");
            match handler.configure_target(template, target, ctx).await {
                Ok(()) => log::info!("sub-target '{target}' of '{key}' configured"),
                Err(err) => {
                    // First failure stops the sequence; earlier sub-targets
                    // keep whatever state they reached.
                    log::error!("sub-target '{target}' of '{key}' failed to configure: {err}");
                    return Err(attribute_to_target(err, target));
                }
            }
        }

        log::info!("verifying '{key}' after configuration");
        let verified = handler.collect(template, ctx).await?;
        let drift = handler.compare(template, &verified);
        if drift.has_changes() {
            for field in &drift.fields {
                log::warn!("'{key}' still drifted after configuration: {}", field.render());
            }
            Ok(ReconcileReport::terminal(
                Outcome::ConfiguredWithDrift,
                Some(verified),
                Some(drift),
            ))
        } else {
            log::info!("'{key}' configured");
            Ok(ReconcileReport::terminal(
                Outcome::Configured,
                Some(verified),
                Some(diff),
            ))
        }
    }
}

fn attribute_to_target(err: ReconcileError, target: &str) -> ReconcileError {
    match err {
        ReconcileError::Remoting(source) if !source.is_cancelled() => ReconcileError::Target {
            target: target.to_string(),
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_terminal_outcomes() {
        assert_eq!(Outcome::InDesiredState.exit_code(), 0);
        assert_eq!(Outcome::Configured.exit_code(), 0);
        assert_eq!(Outcome::WouldConfigure.exit_code(), 0);
        assert_eq!(Outcome::Failed.exit_code(), 1);
        assert_eq!(Outcome::ValidationFailed.exit_code(), 2);
        assert_eq!(Outcome::ConfiguredWithDrift.exit_code(), 3);
        assert_eq!(Outcome::Cancelled.exit_code(), 130);
    }

    #[test]
    fn success_outcomes_are_marked_successful() {
        assert!(Outcome::InDesiredState.is_success());
        assert!(Outcome::WouldConfigure.is_success());
        assert!(!Outcome::ConfiguredWithDrift.is_success());
        assert!(!Outcome::Cancelled.is_success());
    }
}
