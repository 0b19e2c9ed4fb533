//! Build orchestration.
//!
//! This module turns a dependency graph into waves, runs each formula in an
//! isolated sandbox and aggregates the outcomes.

pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod job;
pub mod report;
pub mod sandbox;
pub mod schedule;

pub use events::BuildEvent;
pub use executor::Executor;
pub use fingerprint::{cache_key, install_path};
pub use job::{BuildJob, JobError, JobOutcome, JobStatus};
pub use report::{OverallStatus, ResultAggregator};
pub use sandbox::{Sandbox, SandboxConfig};
pub use schedule::{schedule, Schedule, Wave};
