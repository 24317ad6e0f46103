//! Runner configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit runtime binary.
pub const BINARY_ENV: &str = "FLINT_SINGULARITY_BIN";

/// Environment variable selecting the preferred runtime.
pub const RUNTIME_ENV: &str = "FLINT_CONTAINER_RUNTIME";

/// Container runtime flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Singularity,
    Apptainer,
}

impl ContainerRuntime {
    /// Get the CLI command name.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Singularity => "singularity",
            Self::Apptainer => "apptainer",
        }
    }

    /// Parse a runtime name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "singularity" => Some(Self::Singularity),
            "apptainer" => Some(Self::Apptainer),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Options controlling how the runtime is located and invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerOptions {
    /// Preferred runtime (if not set, auto-detect)
    pub preferred_runtime: Option<ContainerRuntime>,
    /// Explicit path to the runtime binary, skips detection
    pub binary: Option<PathBuf>,
    /// Pass `--quiet` to the runtime
    pub quiet: bool,
    /// Extra runtime arguments placed before the image (e.g. `--cleanenv`)
    pub extra_args: Vec<String>,
    /// Log the command instead of executing it
    pub dry_run: bool,
    /// Timeout in seconds (0 = no timeout)
    pub timeout_seconds: u64,
    /// Lines buffered between the pipe readers and the consumer
    pub line_buffer: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            preferred_runtime: std::env::var(RUNTIME_ENV)
                .ok()
                .and_then(|name| ContainerRuntime::from_name(&name)),
            binary: std::env::var_os(BINARY_ENV).map(PathBuf::from),
            quiet: false,
            extra_args: Vec::new(),
            dry_run: false,
            timeout_seconds: 0,
            line_buffer: 64,
        }
    }
}

impl RunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer_singularity(mut self) -> Self {
        self.preferred_runtime = Some(ContainerRuntime::Singularity);
        self
    }

    pub fn prefer_apptainer(mut self) -> Self {
        self.preferred_runtime = Some(ContainerRuntime::Apptainer);
        self
    }

    pub fn runtime(mut self, runtime: ContainerRuntime) -> Self {
        self.preferred_runtime = Some(runtime);
        self
    }

    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the channel bound; clamped to at least one line.
    pub fn line_buffer(mut self, lines: usize) -> Self {
        self.line_buffer = lines.max(1);
        self
    }
}

/// A single command to run inside an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    /// Container image file
    pub image: PathBuf,
    /// Command string, split on whitespace before execution
    pub command: String,
    /// Host directories to bind at the same path
    pub bind_dirs: Vec<PathBuf>,
}

impl ExecRequest {
    pub fn new(image: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: command.into(),
            bind_dirs: Vec::new(),
        }
    }

    pub fn bind(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bind_dirs.push(dir.into());
        self
    }

    pub fn binds<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.bind_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_names() {
        assert_eq!(ContainerRuntime::Singularity.command(), "singularity");
        assert_eq!(ContainerRuntime::Apptainer.to_string(), "apptainer");
        assert_eq!(
            ContainerRuntime::from_name(" Apptainer "),
            Some(ContainerRuntime::Apptainer)
        );
        assert_eq!(ContainerRuntime::from_name("docker"), None);
    }

    #[test]
    fn test_options_builder() {
        let options = RunnerOptions::new()
            .prefer_apptainer()
            .binary("/opt/apptainer/bin/apptainer")
            .quiet()
            .extra_arg("--cleanenv")
            .timeout(30)
            .line_buffer(0);

        assert_eq!(options.preferred_runtime, Some(ContainerRuntime::Apptainer));
        assert_eq!(
            options.binary,
            Some(PathBuf::from("/opt/apptainer/bin/apptainer"))
        );
        assert!(options.quiet);
        assert_eq!(options.extra_args, vec!["--cleanenv".to_string()]);
        assert_eq!(options.timeout_seconds, 30);
        assert_eq!(options.line_buffer, 1);
        assert!(!options.dry_run);
    }

    #[test]
    fn test_exec_request_builder() {
        let request = ExecRequest::new("image.sif", "echo hello")
            .bind("/data")
            .binds(["/scratch", "/data"]);

        assert_eq!(request.image, PathBuf::from("image.sif"));
        assert_eq!(request.command, "echo hello");
        assert_eq!(request.bind_dirs.len(), 3);
    }

    #[test]
    fn test_exec_request_serde() {
        let request = ExecRequest::new("image.sif", "wsclean -version").bind("/data");
        let json = serde_json::to_string(&request).unwrap();
        let back: ExecRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
