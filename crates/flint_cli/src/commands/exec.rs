//! Exec command - Run a command inside a container image.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use flint_sclient::{
    ContainerRunner, ExecRequest, RunnerError, SharedLineHandler, SingularityRunner,
};

use super::RuntimeArgs;

#[derive(Args)]
pub struct ExecArgs {
    #[command(flatten)]
    runtime: RuntimeArgs,

    /// Host directory to bind at the same path (repeatable)
    #[arg(short = 'B', long = "bind", value_name = "DIR")]
    binds: Vec<PathBuf>,

    /// Kill the command after this many seconds (0 = never)
    #[arg(long, default_value_t = 0)]
    timeout: u64,

    /// Print the runtime command instead of running it
    #[arg(long)]
    dry_run: bool,

    /// Pass --quiet to the runtime
    #[arg(long)]
    runtime_quiet: bool,

    /// Extra argument for the runtime, placed before the image (repeatable)
    #[arg(long = "runtime-arg", value_name = "ARG", allow_hyphen_values = true)]
    runtime_args: Vec<String>,

    /// Echo each output line to stdout as well as the log
    #[arg(long)]
    echo: bool,

    /// Container image file
    image: PathBuf,

    /// Command to run; words are split on whitespace, no shell quoting
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

pub async fn execute(args: ExecArgs) -> Result<()> {
    // A missing image is reported before the runtime is looked up.
    if !args.image.exists() {
        return Err(RunnerError::ImageNotFound(args.image).into());
    }

    let mut options = args.runtime.options().timeout(args.timeout);
    if args.dry_run {
        options = options.dry_run();
    }
    if args.runtime_quiet {
        options = options.quiet();
    }
    for arg in &args.runtime_args {
        options = options.extra_arg(arg.clone());
    }

    let runner = SingularityRunner::new(options).context("Failed to locate container runtime")?;
    let request = ExecRequest::new(&args.image, args.command.join(" ")).binds(args.binds);

    info!(
        "Executing in {} via {}",
        request.image.display(),
        runner.binary().display()
    );

    let handler: Option<SharedLineHandler> = if args.echo {
        Some(Arc::new(|line: &str| println!("{}", line)))
    } else {
        None
    };

    runner
        .execute(&request, handler)
        .await
        .with_context(|| format!("Command '{}' failed", request.command))?;

    Ok(())
}
