//! Test utilities and mocks for Formulary unit tests.
//!
//! This module provides scripted implementations of the two external
//! collaborators the sandbox talks to: the source [`Fetcher`] and the
//! subprocess [`CommandRunner`].
//!
//! # Example
//!
//! ```rust,ignore
//! use formulary::test_support::{MockRunner, MockProcessOutput};
//!
//! let runner = MockRunner::new();
//! runner.expect_prefix("make check", MockProcessOutput::failure(2, "1 test failed"));
//! // Every other command succeeds.
//! ```

pub mod fixtures;

use std::collections::HashMap;
use std::sync::Mutex;

use url::Url;

use crate::sources::{FetchError, Fetcher};
use crate::util::cancel::CancellationToken;
use crate::util::process::{CommandOutput, CommandRunner, ProcessBuilder, RunError};

pub use fixtures::*;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    fn to_output(&self) -> CommandOutput {
        CommandOutput {
            exit_code: Some(self.status),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

/// Pattern for matching commands in [`MockRunner`].
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on the full command line.
    Exact(String),
    /// Match if the command line starts with prefix.
    StartsWith(String),
}

impl CommandPattern {
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
        }
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    expectations: Vec<(CommandPattern, MockProcessOutput)>,
    calls: Vec<ProcessBuilder>,
}

/// Scripted [`CommandRunner`].
///
/// Records every invocation. The first matching expectation decides the
/// output; unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct MockRunner {
    state: Mutex<RunnerState>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the output of an exact command line.
    pub fn expect(&self, cmd: &str, output: MockProcessOutput) -> &Self {
        self.push(CommandPattern::Exact(cmd.to_string()), output)
    }

    /// Script the output of commands starting with `prefix`.
    pub fn expect_prefix(&self, prefix: &str, output: MockProcessOutput) -> &Self {
        self.push(CommandPattern::StartsWith(prefix.to_string()), output)
    }

    /// Every invocation so far, in call order.
    pub fn calls(&self) -> Vec<ProcessBuilder> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Command lines of every invocation so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ProcessBuilder::display_command).collect()
    }

    fn push(&self, pattern: CommandPattern, output: MockProcessOutput) -> &Self {
        self.state
            .lock()
            .unwrap()
            .expectations
            .push((pattern, output));
        self
    }
}

impl CommandRunner for MockRunner {
    fn run(
        &self,
        cmd: &ProcessBuilder,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(cmd.clone());

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled {
                program: cmd.get_program().to_string(),
            });
        }

        let line = cmd.display_command();
        let output = state
            .expectations
            .iter()
            .find(|(pattern, _)| pattern.matches(&line))
            .map(|(_, output)| output.to_output())
            .unwrap_or_default();

        Ok(CommandOutput {
            exit_code: output.exit_code.or(Some(0)),
            ..output
        })
    }
}

/// Scripted [`Fetcher`] serving fixed payloads by URL.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<String, Result<Vec<u8>, FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for `url`.
    pub fn with(mut self, url: &str, data: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), Ok(data.into()));
        self
    }

    /// Fail fetches of `url` with `err`.
    pub fn with_error(mut self, url: &str, err: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(err));
        self
    }

    /// URLs fetched so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| Err(FetchError::not_found(url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_scripts_and_records() {
        let runner = MockRunner::new();
        runner.expect_prefix("make check", MockProcessOutput::failure(2, "boom"));

        let cancel = CancellationToken::new();
        let ok = runner
            .run(&ProcessBuilder::new("make").arg("install"), &cancel)
            .unwrap();
        let bad = runner
            .run(&ProcessBuilder::new("make").arg("check"), &cancel)
            .unwrap();

        assert!(ok.success());
        assert_eq!(bad.exit_code, Some(2));
        assert_eq!(bad.stderr, "boom");
        assert_eq!(runner.command_lines(), vec!["make install", "make check"]);
    }

    #[test]
    fn test_mock_fetcher_unknown_url_not_found() {
        let fetcher = MockFetcher::new().with("https://example.com/a", b"a".to_vec());
        let known = Url::parse("https://example.com/a").unwrap();
        let unknown = Url::parse("https://example.com/b").unwrap();

        assert_eq!(fetcher.fetch(&known).unwrap(), b"a");
        assert!(matches!(
            fetcher.fetch(&unknown),
            Err(FetchError::NotFound { .. })
        ));
        assert_eq!(fetcher.calls().len(), 2);
    }
}
