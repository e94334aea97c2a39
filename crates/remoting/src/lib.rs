//! # Remoting
//!
//! The remote job execution subsystem: everything needed to describe a unit
//! of remote work, submit it to an execution target, stream its log and
//! progress events, and turn its loosely-typed output back into concrete
//! values.
//!
//! ## Core Concepts
//!
//! - **Job**: a single-use unit of remote work (payload + flags + inputs)
//! - **JobChannel**: the one abstraction all remote execution routes through
//! - **Capture**: typed extraction of named output variables
//! - **ContentCache**: content-addressed staging of script payloads
//!
//! ## Example
//!
//! ```ignore
//! use remoting::{Job, JobChannel, LocalShellChannel, NullObserver, OutputRequest};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let channel = LocalShellChannel::new();
//! let mut job = Job::new("echo '::out answer=42'");
//! job.collect_output = true;
//! job.out_variables = OutputRequest::Named(vec!["answer".into()]);
//!
//! let result = channel
//!     .submit(job, Arc::new(NullObserver), CancellationToken::new())
//!     .await?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`JobChannel`]: submits jobs and streams events back
//! - [`ContentProvider`]: resolves asset references to text
//! - [`JobObserver`]: receives per-job log and progress events

pub mod cache;
pub mod capture;
pub mod channel;
pub mod error;
pub mod events;
pub mod job;
pub mod local;
pub mod value;

// Re-export main types at crate root
pub use cache::{asset_name, ContentCache, ContentProvider, DirContentProvider};
pub use capture::Capture;
pub use channel::JobChannel;
pub use error::RemotingError;
pub use events::{
    JobObserver, LogEvent, LogLevel, LogObserver, NullObserver, ProgressEvent, ProgressSlot,
};
pub use job::{Job, JobResult, JobStatus, OutputRequest};
pub use local::LocalShellChannel;
pub use value::Value;
