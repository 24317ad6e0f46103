//! Error types for the runner module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while running a command in a container.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("The container image {} was not found", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Command failed ({}): {command}", describe_exit(.exit_code))]
    ExecutionFailed {
        /// Command string as given by the caller
        command: String,
        /// Exit code of the runtime process, `None` when killed by a signal
        exit_code: Option<i32>,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    #[error("No command given to run in the container")]
    EmptyCommand,

    #[error("Container runtime not available: {0}")]
    RuntimeNotAvailable(String),

    #[error("Failed to spawn {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Container command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Runner task failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Whether repeating the same call could reasonably succeed.
    ///
    /// The runner never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Exit code of the failed command, if the error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExecutionFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
