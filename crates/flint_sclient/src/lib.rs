//! # flint_sclient
//!
//! Runs commands inside Singularity/Apptainer container images.
//!
//! # Features
//!
//! - **Streaming output**: stdout and stderr are drained line by line while
//!   the command runs, logged, and handed to an optional [`LineHandler`]
//! - **Bind management**: bind directories are resolved to canonical paths
//!   and de-duplicated before reaching the runtime
//! - **Structured failures**: a non-zero exit becomes
//!   [`RunnerError::ExecutionFailed`] carrying the captured output
//! - **Runtime detection**: `singularity` or `apptainer` from `PATH`, or an
//!   explicit binary
//! - **Mock runner**: for testing callers without a container runtime
//!
//! # Example
//!
//! ```rust,no_run
//! use flint_sclient::{RunnerOptions, SingularityRunner};
//! use std::path::{Path, PathBuf};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = SingularityRunner::new(RunnerOptions::default())?;
//!
//!     let print_line = |line: &str| println!("container: {}", line);
//!     runner.run(
//!         Path::new("wsclean.sif"),
//!         "wsclean -version",
//!         &[PathBuf::from("/scratch/field")],
//!         Some(&print_line),
//!     )?;
//!
//!     Ok(())
//! }
//! ```

pub mod binds;
pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod mock;
pub mod paths;
pub mod runner;
pub mod singularity;

pub use binds::BindSet;
pub use command::{build_exec_args, format_command, tokenize};
pub use config::{ContainerRuntime, ExecRequest, RunnerOptions};
pub use error::{RunnerError, RunnerResult};
pub use handler::{
    LineHandler, LogLevel, LogSink, MemorySink, OutputLine, OutputStream, SharedLineHandler,
    TracingSink,
};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use paths::{resolve_existing, resolve_path};
pub use runner::ContainerRunner;
pub use singularity::{run_singularity_command, SingularityRunner};
