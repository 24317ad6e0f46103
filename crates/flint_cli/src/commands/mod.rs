//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use flint_sclient::{ContainerRuntime, RunnerOptions};

pub mod check;
pub mod exec;

/// flint-sclient - run commands inside Singularity/Apptainer images
#[derive(Parser)]
#[command(name = "flint-sclient")]
#[command(version, about = "Run commands inside Singularity/Apptainer images")]
#[command(long_about = r#"
Runs a single command inside a container image, streaming its output
line by line as it is produced.

COMMANDS:
  exec   → Run a command in an image
  check  → Report the detected container runtime

EXIT CODES:
  0     - Success
  1     - General error
  2     - Image not found or invalid arguments
  other - Exit code of the failed container command
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command inside a container image
    Exec(exec::ExecArgs),

    /// Check which container runtime is available
    Check(check::CheckArgs),
}

/// Runtime flavour accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RuntimeArg {
    Singularity,
    Apptainer,
}

impl From<RuntimeArg> for ContainerRuntime {
    fn from(arg: RuntimeArg) -> Self {
        match arg {
            RuntimeArg::Singularity => ContainerRuntime::Singularity,
            RuntimeArg::Apptainer => ContainerRuntime::Apptainer,
        }
    }
}

/// Options locating the container runtime, shared by all commands.
#[derive(Args)]
pub struct RuntimeArgs {
    /// Preferred container runtime
    #[arg(long, value_enum, env = "FLINT_CONTAINER_RUNTIME")]
    pub runtime: Option<RuntimeArg>,

    /// Explicit path to the runtime binary
    #[arg(long, env = "FLINT_SINGULARITY_BIN")]
    pub binary: Option<PathBuf>,
}

impl RuntimeArgs {
    pub fn options(&self) -> RunnerOptions {
        let mut options = RunnerOptions::new();
        if let Some(runtime) = self.runtime {
            options = options.runtime(runtime.into());
        }
        if let Some(binary) = &self.binary {
            options = options.binary(binary);
        }
        options
    }
}
