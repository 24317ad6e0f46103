//! Bind-mount set handed to the container runtime.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::RunnerResult;
use crate::paths::resolve_path;

/// Set of host directories exposed inside the container at the same path.
///
/// Entries are resolved before insertion, so two spellings of one
/// directory (relative, `..`, symlink) collapse into a single bind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindSet {
    paths: BTreeSet<PathBuf>,
}

impl BindSet {
    /// Create an empty bind set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and de-duplicate a collection of host directories.
    pub fn resolve<I, P>(dirs: I) -> RunnerResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut set = Self::new();
        for dir in dirs {
            set.insert(dir.as_ref())?;
        }
        Ok(set)
    }

    /// Add a directory; returns `false` if it was already bound.
    pub fn insert(&mut self, dir: &Path) -> RunnerResult<bool> {
        Ok(self.paths.insert(resolve_path(dir)?))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.paths.contains(dir)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Runtime arguments, one `--bind <path>` pair per entry.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.paths.len() * 2);
        for path in &self.paths {
            args.push("--bind".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        args
    }
}

impl fmt::Display for BindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .paths
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}", joined)
    }
}
