//! Mock container runner for testing.
//!
//! Provides a configurable mock implementation of the ContainerRunner trait
//! for use in unit tests without requiring Singularity or Apptainer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::ExecRequest;
use crate::error::{RunnerError, RunnerResult};
use crate::handler::SharedLineHandler;
use crate::runner::ContainerRunner;

/// Predefined mock response for a command execution.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl MockResponse {
    pub fn success<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exit_code: 0,
            stdout: lines.into_iter().map(Into::into).collect(),
            stderr: Vec::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: Vec::new(),
            stderr: vec![stderr.into()],
        }
    }

    pub fn with_stderr(mut self, line: impl Into<String>) -> Self {
        self.stderr.push(line.into());
        self
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub image: Option<PathBuf>,
    pub command: Option<String>,
    pub bind_dirs: Vec<PathBuf>,
}

impl CapturedCall {
    fn method(method: &str) -> Self {
        Self {
            method: method.to_string(),
            image: None,
            command: None,
            bind_dirs: Vec::new(),
        }
    }
}

/// Mock container runner for testing.
///
/// Captures every call and replays predefined responses. Image existence
/// is checked against the filesystem exactly as the real runner does, so
/// callers see the same `ImageNotFound` behaviour.
#[derive(Clone)]
pub struct MockRunner {
    available: Arc<RwLock<bool>>,
    version: Arc<RwLock<String>>,
    responses: Arc<RwLock<Vec<MockResponse>>>,
    response_index: Arc<AtomicUsize>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Skip the image existence check.
    ignore_missing_images: Arc<RwLock<bool>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            available: Arc::new(RwLock::new(true)),
            version: Arc::new(RwLock::new("mock-singularity 1.0.0".to_string())),
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            ignore_missing_images: Arc::new(RwLock::new(false)),
        }
    }

    pub fn set_available(self, available: bool) -> Self {
        *self.available.write() = available;
        self
    }

    pub fn set_version(self, version: impl Into<String>) -> Self {
        *self.version.write() = version.into();
        self
    }

    /// Add a mock response for the next execute call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Set multiple responses, replayed in order and then cycled.
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.write() = responses;
        self
    }

    /// Accept image paths that do not exist on disk.
    pub fn ignore_missing_images(self) -> Self {
        *self.ignore_missing_images.write() = true;
        self
    }

    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls
            .read()
            .iter()
            .any(|c| c.method == method)
    }

    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn next_response(&self) -> MockResponse {
        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success(Vec::<String>::new());
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses[index % responses.len()].clone()
    }
}

#[async_trait]
impl ContainerRunner for MockRunner {
    async fn is_available(&self) -> RunnerResult<bool> {
        self.record_call(CapturedCall::method("is_available"));
        Ok(*self.available.read())
    }

    async fn version(&self) -> RunnerResult<String> {
        self.record_call(CapturedCall::method("version"));
        if !*self.available.read() {
            return Err(RunnerError::RuntimeNotAvailable(
                "mock runtime disabled".to_string(),
            ));
        }
        Ok(self.version.read().clone())
    }

    async fn execute(
        &self,
        request: &ExecRequest,
        on_line: Option<SharedLineHandler>,
    ) -> RunnerResult<()> {
        if !*self.ignore_missing_images.read() && !request.image.exists() {
            return Err(RunnerError::ImageNotFound(request.image.clone()));
        }
        if request.command.split_whitespace().next().is_none() {
            return Err(RunnerError::EmptyCommand);
        }

        self.record_call(CapturedCall {
            method: "execute".to_string(),
            image: Some(request.image.clone()),
            command: Some(request.command.clone()),
            bind_dirs: request.bind_dirs.clone(),
        });

        let response = self.next_response();
        if let Some(handler) = &on_line {
            for line in response.stdout.iter().chain(response.stderr.iter()) {
                handler.handle(line);
            }
        }

        if response.exit_code == 0 {
            return Ok(());
        }

        Err(RunnerError::ExecutionFailed {
            command: request.command.clone(),
            exit_code: Some(response.exit_code),
            stdout: join_lines(&response.stdout),
            stderr: join_lines(&response.stderr),
        })
    }
}

fn join_lines(lines: &[String]) -> String {
    lines.iter().map(|l| format!("{}\n", l)).collect()
}
