//! flint-sclient CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Image not found / invalid arguments
//! - n: Exit code of a failed container command

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flint_sclient::RunnerError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Exec(args) => commands::exec::execute(args).await,
        Commands::Check(args) => commands::check::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the defaults.
fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "flint=debug"
    } else if cli.quiet {
        "flint=warn"
    } else {
        "flint=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", default_level)));

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Map an error to the process exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    let runner_error = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<RunnerError>());

    match runner_error {
        Some(RunnerError::ImageNotFound(_)) | Some(RunnerError::EmptyCommand) => {
            ExitCodes::INVALID_ARGS
        }
        Some(RunnerError::ExecutionFailed {
            exit_code: Some(code),
            ..
        }) => u8::try_from(*code)
            .ok()
            .filter(|code| *code != ExitCodes::SUCCESS)
            .unwrap_or(ExitCodes::GENERAL_ERROR),
        _ => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_categorize_image_not_found() {
        let err = anyhow::Error::new(RunnerError::ImageNotFound(PathBuf::from("missing.sif")))
            .context("Command 'echo hello' failed");
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_categorize_execution_failed_uses_exit_code() {
        let failed = |code| RunnerError::ExecutionFailed {
            command: "false".to_string(),
            exit_code: code,
            stdout: String::new(),
            stderr: String::new(),
        };

        assert_eq!(categorize_error(&anyhow::Error::new(failed(Some(3)))), 3);
        assert_eq!(
            categorize_error(&anyhow::Error::new(failed(Some(300)))),
            ExitCodes::GENERAL_ERROR
        );
        assert_eq!(
            categorize_error(&anyhow::Error::new(failed(None))),
            ExitCodes::GENERAL_ERROR
        );
    }

    #[test]
    fn test_categorize_other_errors() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }

    #[test]
    fn test_cli_parses_exec() {
        let cli = Cli::try_parse_from([
            "flint-sclient",
            "exec",
            "--bind",
            "/data",
            "-B",
            "/scratch",
            "--timeout",
            "60",
            "wsclean.sif",
            "wsclean",
            "-size",
            "8000",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Exec(_)));
    }

    #[tokio::test]
    async fn test_exec_missing_image_reported_before_runtime_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("missing.sif");
        let cli = Cli::try_parse_from([
            "flint-sclient",
            "exec",
            "--runtime",
            "apptainer",
            image.to_str().unwrap(),
            "echo",
            "hello",
        ])
        .unwrap();

        let Commands::Exec(args) = cli.command else {
            panic!("expected exec command");
        };
        let err = commands::exec::execute(args).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RunnerError>(),
            Some(RunnerError::ImageNotFound(_))
        ));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["flint-sclient", "exec", "wsclean.sif"]).is_err());
    }
}
