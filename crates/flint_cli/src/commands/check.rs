//! Check command - Report the detected container runtime.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use flint_sclient::{ContainerRunner, SingularityRunner};

use super::RuntimeArgs;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    runtime: RuntimeArgs,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,
}

#[derive(Serialize)]
struct RuntimeReport {
    runtime: String,
    binary: String,
    available: bool,
    version: Option<String>,
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    let runner = SingularityRunner::new(args.runtime.options())
        .context("Failed to locate container runtime")?;

    let available = runner.is_available().await?;
    let version = if available {
        Some(runner.version().await?)
    } else {
        None
    };

    let report = RuntimeReport {
        runtime: runner.runtime().to_string(),
        binary: runner.binary().display().to_string(),
        available,
        version,
    };

    if args.format == "json" {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        println!("Runtime:   {}", report.runtime);
        println!("Binary:    {}", report.binary);
        println!(
            "Version:   {}",
            report.version.as_deref().unwrap_or("unavailable")
        );
    }

    if !available {
        anyhow::bail!("Container runtime {} is not working", report.binary);
    }
    Ok(())
}
