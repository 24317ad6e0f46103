//! Runtime argument construction.

use std::path::Path;

use crate::binds::BindSet;
use crate::config::RunnerOptions;

/// Split a command string into an argument vector.
///
/// Plain whitespace splitting: there is no quoting or escaping, so an
/// argument containing a space cannot be expressed. Nothing is passed
/// through a shell.
pub fn tokenize(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Build the arguments for `<runtime> exec`.
pub fn build_exec_args(
    image: &Path,
    argv: &[String],
    binds: &BindSet,
    options: &RunnerOptions,
) -> Vec<String> {
    let mut args = vec!["exec".to_string()];

    if options.quiet {
        args.push("--quiet".to_string());
    }

    args.extend(binds.to_args());
    args.extend(options.extra_args.iter().cloned());

    args.push(image.to_string_lossy().into_owned());
    args.extend(argv.iter().cloned());

    args
}

/// Format command for logging.
pub fn format_command(program: &Path, args: &[String]) -> String {
    let mut cmd = program.to_string_lossy().into_owned();
    for arg in args {
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            cmd.push_str(&format!(" '{}'", arg));
        } else {
            cmd.push(' ');
            cmd.push_str(arg);
        }
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_tokenize_whitespace() {
        assert_eq!(
            tokenize("  wsclean  -size 8000\t8000\n-name img "),
            vec!["wsclean", "-size", "8000", "8000", "-name", "img"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_tokenize_ignores_quotes() {
        assert_eq!(
            tokenize("echo 'hello world'"),
            vec!["echo", "'hello", "world'"]
        );
    }

    #[test]
    fn test_build_exec_args_without_binds() {
        let args = build_exec_args(
            Path::new("/images/test.sif"),
            &tokenize("echo hello"),
            &BindSet::new(),
            &RunnerOptions::new(),
        );
        assert_eq!(args, vec!["exec", "/images/test.sif", "echo", "hello"]);
    }

    #[test]
    fn test_build_exec_args_with_options() {
        let dir = tempfile::tempdir().unwrap();
        let binds = BindSet::resolve([dir.path()]).unwrap();
        let options = RunnerOptions::new().quiet().extra_arg("--cleanenv");

        let args = build_exec_args(
            Path::new("/images/test.sif"),
            &tokenize("ls"),
            &binds,
            &options,
        );

        let bound = dir.path().canonicalize().unwrap();
        assert_eq!(
            args,
            vec![
                "exec".to_string(),
                "--quiet".to_string(),
                "--bind".to_string(),
                bound.to_string_lossy().into_owned(),
                "--cleanenv".to_string(),
                "/images/test.sif".to_string(),
                "ls".to_string(),
            ]
        );
    }

    #[test]
    fn test_format_command() {
        let formatted = format_command(
            &PathBuf::from("singularity"),
            &["exec".to_string(), "a b".to_string(), String::new()],
        );
        assert_eq!(formatted, "singularity exec 'a b' ''");
    }
}
