//! Container runner trait.

use async_trait::async_trait;

use crate::config::ExecRequest;
use crate::error::RunnerResult;
use crate::handler::SharedLineHandler;

/// Container runner trait.
///
/// Implemented by [`SingularityRunner`](crate::SingularityRunner) and by
/// [`MockRunner`](crate::MockRunner) for tests that must not start
/// containers.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Check if the container runtime answers.
    async fn is_available(&self) -> RunnerResult<bool>;

    /// Get runtime version information.
    async fn version(&self) -> RunnerResult<String>;

    /// Run `request.command` inside `request.image`, streaming every output
    /// line to `on_line` before it is logged.
    ///
    /// Resolves once the command has exited successfully; every failure is
    /// returned to the caller without retrying.
    async fn execute(
        &self,
        request: &ExecRequest,
        on_line: Option<SharedLineHandler>,
    ) -> RunnerResult<()>;
}
