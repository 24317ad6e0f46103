//! Singularity/Apptainer command runner.
//!
//! Runs one command per call inside a `.sif` image via `<runtime> exec`,
//! draining the child's stdout and stderr line by line while it runs.

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::binds::BindSet;
use crate::command::{build_exec_args, format_command, tokenize};
use crate::config::{ContainerRuntime, ExecRequest, RunnerOptions};
use crate::error::{RunnerError, RunnerResult};
use crate::handler::{
    LineHandler, LogSink, OutputLine, OutputStream, SharedLineHandler, TracingSink,
};
use crate::paths::resolve_existing;
use crate::runner::ContainerRunner;

type Message = io::Result<OutputLine>;

/// Runs commands inside Singularity/Apptainer images.
///
/// Holds only immutable configuration; every call is independent, so one
/// runner can be shared across threads.
#[derive(Clone)]
pub struct SingularityRunner {
    runtime: ContainerRuntime,
    binary: PathBuf,
    options: RunnerOptions,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for SingularityRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingularityRunner")
            .field("runtime", &self.runtime)
            .field("binary", &self.binary)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SingularityRunner {
    /// Create a new runner, locating the runtime binary.
    pub fn new(options: RunnerOptions) -> RunnerResult<Self> {
        let (runtime, binary) = Self::detect_runtime(&options)?;
        info!("Using container runtime: {} ({})", runtime, binary.display());

        Ok(Self {
            runtime,
            binary,
            options,
            sink: Arc::new(TracingSink),
        })
    }

    /// Create a runner for a specific runtime binary.
    pub fn with_binary(
        runtime: ContainerRuntime,
        binary: impl Into<PathBuf>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            runtime,
            binary: binary.into(),
            options,
            sink: Arc::new(TracingSink),
        }
    }

    /// Send log messages to `sink` instead of `tracing`.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Locate the runtime binary.
    ///
    /// Order: explicit binary, preferred runtime on `PATH`, `singularity`,
    /// `apptainer`.
    pub fn detect_runtime(options: &RunnerOptions) -> RunnerResult<(ContainerRuntime, PathBuf)> {
        if let Some(binary) = &options.binary {
            let runtime = options
                .preferred_runtime
                .or_else(|| {
                    binary
                        .file_name()
                        .and_then(|name| ContainerRuntime::from_name(&name.to_string_lossy()))
                })
                .unwrap_or(ContainerRuntime::Singularity);
            return Ok((runtime, binary.clone()));
        }

        if let Some(preferred) = options.preferred_runtime {
            if let Ok(path) = which::which(preferred.command()) {
                return Ok((preferred, path));
            }
            warn!(
                "Preferred runtime {} not available, trying alternatives",
                preferred
            );
        }

        for runtime in [ContainerRuntime::Singularity, ContainerRuntime::Apptainer] {
            if let Ok(path) = which::which(runtime.command()) {
                return Ok((runtime, path));
            }
        }

        Err(RunnerError::RuntimeNotAvailable(
            "Neither singularity nor apptainer is on PATH".to_string(),
        ))
    }

    /// Get the current runtime.
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    /// Path of the runtime binary that will be executed.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Check if dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Run `command` inside `image`.
    ///
    /// The image must exist; otherwise [`RunnerError::ImageNotFound`] is
    /// returned before anything is logged or spawned. Every output line is
    /// passed to `on_line` (without its line terminator) and then logged at
    /// info level. A non-zero exit yields [`RunnerError::ExecutionFailed`]
    /// carrying the captured stdout and stderr.
    ///
    /// Blocks the calling thread until the command exits.
    pub fn run(
        &self,
        image: &Path,
        command: &str,
        bind_dirs: &[PathBuf],
        on_line: Option<&dyn LineHandler>,
    ) -> RunnerResult<()> {
        if !image.exists() {
            return Err(RunnerError::ImageNotFound(image.to_path_buf()));
        }
        let argv = tokenize(command);
        if argv.is_empty() {
            return Err(RunnerError::EmptyCommand);
        }
        let image_path = resolve_existing(image)?;

        self.sink
            .info(&format!("Running {} in {}", command, image_path.display()));
        self.sink.info(&format!(
            "Attempting to run {} command on {}",
            self.runtime,
            host_name()
        ));

        let binds = BindSet::resolve(bind_dirs)?;
        if !binds.is_empty() {
            self.sink
                .debug(&format!("Constructed {} bindings: {}", self.runtime, binds));
        }

        let args = build_exec_args(&image_path, &argv, &binds, &self.options);
        let cmd_str = format_command(&self.binary, &args);
        self.sink.debug(&format!("Executing: {}", cmd_str));

        if self.options.dry_run {
            self.sink.info(&format!("[DRY-RUN] Would execute: {}", cmd_str));
            return Ok(());
        }

        let started_at = Utc::now();
        let (status, captured) = match self.execute_with_streaming(&args, on_line) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.sink.error(&format!("Failed to run command: {}", command));
                self.sink.error(&format!("Error: {}", e));
                return Err(e);
            }
        };
        let duration_ms = (Utc::now() - started_at).num_milliseconds();

        if status.success() {
            self.sink.info(&format!(
                "Command completed successfully in {}ms",
                duration_ms
            ));
            return Ok(());
        }

        self.sink.error(&format!("Failed to run command: {}", command));
        self.sink.error(&format!("Image: {}", image_path.display()));
        self.sink.error(&format!("Stdout: {}", captured.stdout));
        self.sink.error(&format!("Stderr: {}", captured.stderr));

        let err = RunnerError::ExecutionFailed {
            command: command.to_string(),
            exit_code: status.code(),
            stdout: captured.stdout,
            stderr: captured.stderr,
        };
        self.sink
            .error(&format!("Error after {}ms: {}", duration_ms, err));
        Err(err)
    }

    /// Spawn the runtime and drain its output on the calling thread.
    fn execute_with_streaming(
        &self,
        args: &[String],
        on_line: Option<&dyn LineHandler>,
    ) -> RunnerResult<(ExitStatus, Captured)> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not captured"))?;

        // Bounded so a slow consumer throttles the readers, and through the
        // pipes the child itself.
        let (tx, rx) = mpsc::sync_channel::<Message>(self.options.line_buffer.max(1));
        let readers = [
            spawn_reader(stdout, OutputStream::Stdout, tx.clone()),
            spawn_reader(stderr, OutputStream::Stderr, tx),
        ];

        let deadline = (self.options.timeout_seconds > 0)
            .then(|| Instant::now() + Duration::from_secs(self.options.timeout_seconds));
        let mut captured = Captured::default();

        loop {
            let message = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(remaining) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            kill(&mut child);
                            return Err(RunnerError::Timeout(self.options.timeout_seconds));
                        }
                    }
                }
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            let line = match message {
                Ok(line) => line,
                Err(e) => {
                    kill(&mut child);
                    return Err(e.into());
                }
            };

            if let Some(handler) = on_line {
                handler.handle(line.text());
            }
            self.sink.info(line.text());
            captured.push(line);
        }

        for reader in readers {
            let _ = reader.join();
        }

        let status = match deadline {
            Some(deadline) => wait_until(&mut child, deadline, self.options.timeout_seconds)?,
            None => child.wait()?,
        };
        Ok((status, captured))
    }
}

/// Output collected for failure diagnostics.
#[derive(Debug, Default)]
struct Captured {
    stdout: String,
    stderr: String,
}

impl Captured {
    fn push(&mut self, line: OutputLine) {
        match line.stream {
            OutputStream::Stdout => self.stdout.push_str(&line.raw),
            OutputStream::Stderr => self.stderr.push_str(&line.raw),
        }
    }
}

/// Read `pipe` line by line into `tx` until EOF or the receiver goes away.
fn spawn_reader<R>(pipe: R, stream: OutputStream, tx: SyncSender<Message>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = OutputLine::new(stream, String::from_utf8_lossy(&buf));
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    })
}

/// Both pipes are closed but the process may still be running.
fn wait_until(child: &mut Child, deadline: Instant, timeout_seconds: u64) -> RunnerResult<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            kill(child);
            return Err(RunnerError::Timeout(timeout_seconds));
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill container process: {}", e);
    }
    let _ = child.wait();
}

/// Host name for log messages only.
///
/// `HOSTNAME` is set by most shells but often not exported to child
/// processes, and `/etc/hostname` only exists on Linux. When neither is
/// available the log reads "unknown host"; nothing else depends on it.
fn host_name() -> String {
    pick_host_name(
        std::env::var("HOSTNAME").ok(),
        std::fs::read_to_string("/etc/hostname").ok(),
    )
}

fn pick_host_name(env: Option<String>, file: Option<String>) -> String {
    [env, file]
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown host".to_string())
}

#[async_trait]
impl ContainerRunner for SingularityRunner {
    async fn is_available(&self) -> RunnerResult<bool> {
        let status = tokio::process::Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        Ok(status.map(|s| s.success()).unwrap_or(false))
    }

    async fn version(&self) -> RunnerResult<String> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("version")
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(format!(
                "{} {}",
                self.runtime,
                String::from_utf8_lossy(&output.stdout).trim()
            ))
        } else {
            Err(RunnerError::RuntimeNotAvailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    async fn execute(
        &self,
        request: &ExecRequest,
        on_line: Option<SharedLineHandler>,
    ) -> RunnerResult<()> {
        let runner = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            runner.run(
                &request.image,
                &request.command,
                &request.bind_dirs,
                on_line.as_deref(),
            )
        })
        .await
        .map_err(|e| RunnerError::Join(e.to_string()))?
    }
}

/// Run `command` inside `image` with an auto-detected runtime.
///
/// Convenience wrapper around [`SingularityRunner::run`] using
/// [`RunnerOptions::default`].
pub fn run_singularity_command(
    image: &Path,
    command: &str,
    bind_dirs: &[PathBuf],
    on_line: Option<&dyn LineHandler>,
) -> RunnerResult<()> {
    if !image.exists() {
        return Err(RunnerError::ImageNotFound(image.to_path_buf()));
    }
    SingularityRunner::new(RunnerOptions::default())?.run(image, command, bind_dirs, on_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{LogLevel, MemorySink};

    fn runner_with_sink(options: RunnerOptions) -> (SingularityRunner, MemorySink) {
        let sink = MemorySink::new();
        let runner = SingularityRunner::with_binary(
            ContainerRuntime::Singularity,
            "/nonexistent/singularity",
            options,
        )
        .with_log_sink(Arc::new(sink.clone()));
        (runner, sink)
    }

    #[test]
    fn test_detect_explicit_binary() {
        let options = RunnerOptions::new().binary("/opt/bin/apptainer");
        let (runtime, binary) = SingularityRunner::detect_runtime(&options).unwrap();
        assert_eq!(runtime, ContainerRuntime::Apptainer);
        assert_eq!(binary, PathBuf::from("/opt/bin/apptainer"));

        let options = RunnerOptions::new()
            .binary("/opt/bin/wrapper")
            .prefer_apptainer();
        let (runtime, _) = SingularityRunner::detect_runtime(&options).unwrap();
        assert_eq!(runtime, ContainerRuntime::Apptainer);
    }

    #[test]
    fn test_missing_image_logs_nothing() {
        let (runner, sink) = runner_with_sink(RunnerOptions::new());
        let dir = tempfile::tempdir().unwrap();

        let err = runner
            .run(&dir.path().join("missing.sif"), "echo hello", &[], None)
            .unwrap_err();

        assert!(matches!(err, RunnerError::ImageNotFound(_)));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_empty_command_rejected() {
        let (runner, sink) = runner_with_sink(RunnerOptions::new());
        let image = tempfile::NamedTempFile::new().unwrap();

        let err = runner.run(image.path(), "  \t ", &[], None).unwrap_err();
        assert!(matches!(err, RunnerError::EmptyCommand));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_dry_run_does_not_spawn() {
        let (runner, sink) = runner_with_sink(RunnerOptions::new().dry_run());
        let image = tempfile::NamedTempFile::new().unwrap();
        let data = tempfile::tempdir().unwrap();

        runner
            .run(
                image.path(),
                "echo hello",
                &[data.path().to_path_buf(), data.path().to_path_buf()],
                None,
            )
            .unwrap();

        assert!(runner.is_dry_run());
        assert!(sink.contains("[DRY-RUN] Would execute: /nonexistent/singularity exec --bind"));
        assert_eq!(sink.messages(LogLevel::Debug).len(), 2);
    }

    #[test]
    fn test_spawn_failure_is_logged() {
        let (runner, sink) = runner_with_sink(RunnerOptions::new());
        let image = tempfile::NamedTempFile::new().unwrap();

        let err = runner.run(image.path(), "echo hello", &[], None).unwrap_err();

        assert!(matches!(err, RunnerError::Spawn { .. }));
        assert!(sink
            .messages(LogLevel::Error)
            .contains(&"Failed to run command: echo hello".to_string()));
    }

    #[test]
    fn test_captured_splits_streams() {
        let mut captured = Captured::default();
        captured.push(OutputLine::new(OutputStream::Stdout, "a\n"));
        captured.push(OutputLine::new(OutputStream::Stderr, "oops\n"));
        captured.push(OutputLine::new(OutputStream::Stdout, "b"));

        assert_eq!(captured.stdout, "a\nb");
        assert_eq!(captured.stderr, "oops\n");
    }

    #[test]
    fn test_host_name_fallbacks() {
        assert_eq!(
            pick_host_name(Some("node01\n".into()), Some("other".into())),
            "node01"
        );
        assert_eq!(pick_host_name(Some("  ".into()), Some("node02\n".into())), "node02");
        assert_eq!(pick_host_name(None, None), "unknown host");
        assert!(!host_name().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_failure_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("singularity");
        std::fs::write(&binary, "#!/bin/sh\necho 'license expired' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        let runner =
            SingularityRunner::with_binary(ContainerRuntime::Singularity, &binary, RunnerOptions::new());

        let (available, version) = tokio::join!(runner.is_available(), runner.version());
        assert!(!available.unwrap());
        assert!(matches!(
            version,
            Err(RunnerError::RuntimeNotAvailable(ref msg)) if msg == "license expired"
        ));
    }
}
