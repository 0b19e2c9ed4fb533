//! Result aggregation and the end-of-run report.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use crate::builder::job::{JobError, JobOutcome, JobStatus};

/// One formula's recorded result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub name: String,
    pub required: bool,
    pub outcome: JobOutcome,
}

/// Verdict for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverallStatus {
    Succeeded,
    /// Every failed or skipped job with its reason, in recording order
    Failed(Vec<(String, JobError)>),
}

impl OverallStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OverallStatus::Succeeded)
    }
}

/// Collects terminal job outcomes.
///
/// Recording is monotonic: the first outcome recorded for a formula is kept
/// and later ones are ignored.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<JobRecord>,
    index: HashMap<String, usize>,
    notes: Vec<String>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal outcome. Returns `false` if `name` already had one.
    pub fn record(&mut self, name: &str, required: bool, outcome: JobOutcome) -> bool {
        if self.index.contains_key(name) {
            tracing::debug!("ignoring second outcome for {}", name);
            return false;
        }
        self.index.insert(name.to_string(), self.records.len());
        self.records.push(JobRecord {
            name: name.to_string(),
            required,
            outcome,
        });
        true
    }

    /// Attach a note shown at the end of the report.
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn get(&self, name: &str) -> Option<&JobRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn status_of(&self, name: &str) -> Option<JobStatus> {
        self.get(name).map(|r| r.outcome.status)
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Succeeded only if every required job succeeded.
    pub fn overall_status(&self) -> OverallStatus {
        let required_ok = self
            .records
            .iter()
            .filter(|r| r.required)
            .all(|r| r.outcome.status == JobStatus::Succeeded);

        if required_ok {
            return OverallStatus::Succeeded;
        }

        let failures = self
            .records
            .iter()
            .filter(|r| matches!(r.outcome.status, JobStatus::Failed | JobStatus::Skipped))
            .map(|r| {
                let reason = r.outcome.error.clone().unwrap_or(JobError::Io {
                    message: "no reason recorded".into(),
                });
                (r.name.clone(), reason)
            })
            .collect();
        OverallStatus::Failed(failures)
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for record in &self.records {
            match record.outcome.status {
                JobStatus::Succeeded if record.outcome.cached => counts.cached += 1,
                JobStatus::Succeeded => counts.built += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    /// Render the human-readable report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            render_record(&mut out, record);
        }
        for note in &self.notes {
            let _ = writeln!(out, "note: {}", note);
        }
        let _ = write!(out, "{}", self.counts());
        out
    }
}

fn render_record(out: &mut String, record: &JobRecord) {
    let outcome = &record.outcome;
    let label = if outcome.is_self_test_failure() {
        "test failed".to_string()
    } else {
        outcome.status.to_string()
    };
    let marker = if outcome.cached { " (cached)" } else { "" };
    let optional = if record.required { "" } else { " [optional]" };

    let _ = write!(out, "{:>12} {}{}{}", label, record.name, optional, marker);
    if let Some(path) = &outcome.install_path {
        let _ = write!(out, " -> {}", path.display());
    }
    out.push('\n');

    let Some(error) = &outcome.error else {
        return;
    };
    let _ = writeln!(out, "             {}", error);
    if let Some(output) = error.output().filter(|o| !o.is_empty()) {
        for line in output.lines() {
            let _ = writeln!(out, "             | {}", line);
        }
    }
}

/// Job totals by terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub built: usize,
    pub cached: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} built, {} cached, {} failed, {} skipped",
            self.built, self.cached, self.failed, self.skipped
        )
    }
}
