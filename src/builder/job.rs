//! Build jobs and their outcomes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::resolver::NodeIndex;
use crate::sources::FetchError;

/// Terminal state of a build job.
///
/// A job is pending until its wave is dispatched and running while a
/// worker holds it; only these end states are ever recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job did not succeed.
///
/// Every variant is confined to the job's own subtree: dependents are
/// skipped, siblings are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error(transparent)]
    FetchError(#[from] FetchError),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("build step {} failed{}", .step_index + 1, exit_suffix(.exit_code))]
    BuildStepFailed {
        /// Zero-based index into the install steps
        step_index: usize,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("self-test failed{}", exit_suffix(.exit_code))]
    SelfTestFailed {
        exit_code: Option<i32>,
        output: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("dependency `{dep}` did not build")]
    DependencyFailed { dep: String },

    #[error("sandbox error: {message}")]
    Io { message: String },
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {}", code),
        None => String::new(),
    }
}

impl JobError {
    pub fn io(err: impl fmt::Display) -> Self {
        JobError::Io {
            message: err.to_string(),
        }
    }

    /// Captured output tail, for errors that carry one.
    pub fn output(&self) -> Option<&str> {
        match self {
            JobError::BuildStepFailed { output, .. } | JobError::SelfTestFailed { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}

/// One formula's unit of work within a run.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub node: NodeIndex,
    pub name: String,
    /// Install paths of the dependencies that are actually available
    pub deps: BTreeMap<String, PathBuf>,
    /// Options requested of this formula by its dependents
    pub options: BTreeSet<String>,
    /// Optional dependencies building without; exported as empty prefixes
    pub absent: Vec<String>,
}

impl BuildJob {
    pub fn new(node: NodeIndex, name: impl Into<String>) -> Self {
        BuildJob {
            node,
            name: name.into(),
            deps: BTreeMap::new(),
            options: BTreeSet::new(),
            absent: Vec::new(),
        }
    }

    pub fn with_dep(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.deps.insert(name.into(), path.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }
}

/// Terminal result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub install_path: Option<PathBuf>,
    pub error: Option<JobError>,
    /// Satisfied from the artifact cache without building
    pub cached: bool,
}

impl JobOutcome {
    pub fn succeeded(install_path: PathBuf, cached: bool) -> Self {
        JobOutcome {
            status: JobStatus::Succeeded,
            install_path: Some(install_path),
            error: None,
            cached,
        }
    }

    pub fn failed(error: JobError) -> Self {
        JobOutcome {
            status: JobStatus::Failed,
            install_path: None,
            error: Some(error),
            cached: false,
        }
    }

    /// Built and installed, but the self-test did not pass.
    pub fn self_test_failed(install_path: PathBuf, error: JobError) -> Self {
        JobOutcome {
            status: JobStatus::Failed,
            install_path: Some(install_path),
            error: Some(error),
            cached: false,
        }
    }

    pub fn skipped(error: JobError) -> Self {
        JobOutcome {
            status: JobStatus::Skipped,
            install_path: None,
            error: Some(error),
            cached: false,
        }
    }

    pub fn is_self_test_failure(&self) -> bool {
        matches!(self.error, Some(JobError::SelfTestFailed { .. }))
    }

    /// Install path usable by dependents.
    ///
    /// With `self_test_blocks` set, a self-test failure makes the artifact
    /// unavailable to dependents.
    pub fn installable(&self, self_test_blocks: bool) -> Option<&Path> {
        match self.status {
            JobStatus::Succeeded => self.install_path.as_deref(),
            JobStatus::Failed if self.is_self_test_failure() && !self_test_blocks => {
                self.install_path.as_deref()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_step_failed_message_is_one_based() {
        let err = JobError::BuildStepFailed {
            step_index: 2,
            exit_code: Some(1),
            output: String::new(),
        };
        assert_eq!(err.to_string(), "build step 3 failed with exit code 1");
    }

    #[test]
    fn test_self_test_outcome_installable_unless_blocking() {
        let outcome = JobOutcome::self_test_failed(
            PathBuf::from("/cellar/pcl/abc"),
            JobError::SelfTestFailed {
                exit_code: Some(1),
                output: "boom".into(),
            },
        );
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(
            outcome.installable(false),
            Some(Path::new("/cellar/pcl/abc"))
        );
        assert_eq!(outcome.installable(true), None);
    }

    #[test]
    fn test_failed_outcome_not_installable() {
        let outcome = JobOutcome::failed(JobError::Cancelled);
        assert!(outcome.installable(false).is_none());
        assert_eq!(outcome.status.as_str(), "failed");
    }
}
