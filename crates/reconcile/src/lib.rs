//! # Reconcile
//!
//! A framework for reconciling remote machine state against declarative
//! templates.
//!
//! A [`ResourceTemplate`] declares the desired state of one resource
//! instance. The [`Engine`] drives a uniform Collect → Compare → Configure
//! state machine over a small capability seam ([`ResourceHandler`]) that
//! resource kinds implement; the engine owns sequencing, simulation gating
//! and failure isolation, and handlers own the resource-specific jobs.
//!
//! ## Core Concepts
//!
//! - **ResourceTemplate**: desired-state descriptor, immutable per run
//! - **PersistedConfiguration**: observed-or-resulting state snapshot
//! - **ResourceHandler**: `{validate, collect, compare, configure}` per kind
//! - **Engine**: the state machine; one logical flow of control per template
//!
//! ## Guarantees
//!
//! - Simulation runs issue zero configuration jobs and still report what
//!   would be done.
//! - Sub-target configuration jobs run strictly sequentially, in discovery
//!   order; the first failure stops the sequence.
//! - Cancellation is cooperative and surfaced as its own outcome, distinct
//!   from failure.

pub mod diff;
pub mod engine;
pub mod error;
pub mod handler;
pub mod script;
pub mod template;

// Re-export main types at crate root
pub use diff::{compare, DiffReport, FieldDiff};
pub use engine::{Engine, Outcome, ReconcileReport};
pub use error::ReconcileError;
pub use handler::{ReconcileContext, ResourceHandler};
pub use script::{ScriptPrograms, ScriptResource};
pub use template::{PersistedConfiguration, ResourceTemplate};
