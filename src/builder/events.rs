//! Build event types for JSON output.
//!
//! This module defines the JSON schema for machine-readable build output.
//! These events are emitted when using `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: Plan computed, execution about to begin
//! - `job-finished`: A formula reached a terminal state
//! - `diagnostic`: A warning or note not tied to one job
//! - `build-finished`: Run completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::builder::job::{JobError, JobOutcome};
use crate::builder::report::Counts;

/// A build event emitted during the run.
///
/// Each event is serialized as a single JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Number of formulas in the plan
        formula_count: u64,
        /// Number of waves
        waves: u64,
        workers: u64,
    },

    #[serde(rename = "job-finished")]
    JobFinished {
        formula: String,
        /// Terminal status ("succeeded", "failed", "skipped")
        status: String,
        /// Whether the artifact came from the cache
        fresh: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        install_path: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Zero-based index of the failing install step
        #[serde(skip_serializing_if = "Option::is_none")]
        step_index: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },

    /// A generic diagnostic message.
    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning", "note")
        level: String,
        message: String,
    },

    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        built: u64,
        cached: u64,
        failed: u64,
        skipped: u64,
    },
}

impl BuildEvent {
    pub fn started(formula_count: usize, waves: usize, workers: usize) -> Self {
        BuildEvent::BuildStarted {
            formula_count: formula_count as u64,
            waves: waves as u64,
            workers: workers as u64,
        }
    }

    /// Create a job-finished event from an outcome.
    pub fn job(formula: impl Into<String>, outcome: &JobOutcome) -> Self {
        let (step_index, exit_code) = match &outcome.error {
            Some(JobError::BuildStepFailed {
                step_index,
                exit_code,
                ..
            }) => (Some(*step_index), *exit_code),
            Some(JobError::SelfTestFailed { exit_code, .. }) => (None, *exit_code),
            _ => (None, None),
        };

        BuildEvent::JobFinished {
            formula: formula.into(),
            status: outcome.status.to_string(),
            fresh: outcome.cached,
            install_path: outcome.install_path.clone(),
            message: outcome.error.as_ref().map(ToString::to_string),
            step_index,
            exit_code,
        }
    }

    pub fn note(message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "note".to_string(),
            message: message.into(),
        }
    }

    pub fn finished(success: bool, duration_ms: u64, counts: Counts) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            built: counts.built as u64,
            cached: counts.cached as u64,
            failed: counts.failed as u64,
            skipped: counts.skipped as u64,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
