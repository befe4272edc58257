//! Domain-specific error types for the dotts engine.
//!
//! Library modules return typed errors ([`ConfigError`], [`InstallError`],
//! [`FsError`]) while command handlers at the CLI boundary convert them to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! DottsError
//! ├── Config(ConfigError): missing or malformed repository files, cycles
//! ├── Install(InstallError): package-manager invocations that exited non-zero
//! ├── Source(SourceError): git operations on the configuration repository
//! └── Filesystem(FsError): links, backups, manifest and index files
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Top-level error type for the dotts engine.
#[derive(Error, Debug)]
pub enum DottsError {
    /// Repository loading or inheritance resolution failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A package-manager backend failed.
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// A git operation on the configuration repository failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A filesystem operation failed.
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FsError),
}

/// The kind of repository record a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `profiles/<name>.yaml`
    Profile,
    /// `machines/<name>.yaml`
    Machine,
    /// `packages/<name>.yaml`
    PackageGroup,
    /// `configs/<name>/`
    ConfigBundle,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile => write!(f, "profile"),
            Self::Machine => write!(f, "machine"),
            Self::PackageGroup => write!(f, "package group"),
            Self::ConfigBundle => write!(f, "config bundle"),
        }
    }
}

fn requested_by(chain: &[String]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (requested by {})", chain.join(" -> "))
    }
}

/// Errors that arise from repository loading and inheritance resolution.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A referenced record does not exist on disk.
    #[error("{kind} '{name}' not found at {}{}", .path.display(), requested_by(.chain))]
    NotFound {
        /// What was being looked up.
        kind: RecordKind,
        /// The requested name.
        name: String,
        /// Where the record was expected.
        path: PathBuf,
        /// Names that led to this lookup, outermost first.
        chain: Vec<String>,
    },

    /// A repository file exists but is not valid YAML for its schema.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// A profile inherits (directly or transitively) from itself.
    #[error("inheritance cycle detected: {}", .chain.join(" -> "))]
    CycleDetected {
        /// The names forming the cycle, ending with the repeated name.
        chain: Vec<String>,
    },

    /// A repository file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// A package-manager invocation that exited non-zero or could not be spawned.
///
/// `output` carries the captured stdout and stderr of the failing command.
#[derive(Error, Debug)]
pub enum InstallError {
    /// A single package failed.
    #[error("{backend}: failed to install {package}: {cause}")]
    Package {
        /// Backend identifier (`pacman`, `apt`, ...).
        backend: String,
        /// The package that failed.
        package: String,
        /// Short description of the failure.
        cause: String,
        /// Captured command output.
        output: String,
    },

    /// A batch operation (install, removal, update) failed as a whole.
    #[error("{backend}: {operation} failed: {cause}")]
    Batch {
        /// Backend identifier.
        backend: String,
        /// `installation`, `removal` or `update`.
        operation: &'static str,
        /// Short description of the failure.
        cause: String,
        /// Captured command output.
        output: String,
    },
}

impl InstallError {
    /// Name of the backend that failed.
    #[must_use]
    pub fn backend(&self) -> &str {
        match self {
            Self::Package { backend, .. } | Self::Batch { backend, .. } => backend,
        }
    }

    /// The package involved, if the failure was for a single package.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::Package { package, .. } => Some(package),
            Self::Batch { .. } => None,
        }
    }

    /// Captured output of the failing command.
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            Self::Package { output, .. } | Self::Batch { output, .. } => output,
        }
    }
}

/// Errors from filesystem work done by the linker and the persisted stores.
#[derive(Error, Debug)]
pub enum FsError {
    /// An I/O operation failed on `path`.
    #[error("{operation} {}: {source}", .path.display())]
    Io {
        /// What was being attempted (`create symlink`, `copy`, ...).
        operation: &'static str,
        /// The path the operation acted on.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A persisted JSON file could not be read or written.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        /// The JSON file.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },

    /// A restore was requested for a path with no recorded backup.
    #[error("no backup recorded for {}", .path.display())]
    NoBackup {
        /// The original path.
        path: PathBuf,
    },

    /// Writing `path` would go through a symlink and land somewhere else,
    /// possibly in the repository itself.
    #[error("refusing to write {}: {reason}", .path.display())]
    UnsafeTarget {
        /// The target that was refused.
        path: PathBuf,
        /// Why it was refused.
        reason: String,
    },
}

/// Errors from cloning, pulling and validating the configuration repository.
#[derive(Error, Debug)]
pub enum SourceError {
    /// `git` exited non-zero or could not be spawned.
    #[error("git {operation} failed: {cause}")]
    Git {
        /// `clone`, `pull` or `rev-parse`.
        operation: &'static str,
        /// Captured error output.
        cause: String,
    },

    /// The directory lacks a required top-level directory.
    #[error("{} is not a configuration repository: missing {missing}/", .path.display())]
    Invalid {
        /// The checked directory.
        path: PathBuf,
        /// The directory that is missing.
        missing: &'static str,
    },

    /// Preparing the checkout location failed.
    #[error(transparent)]
    Filesystem(#[from] FsError),
}

/// Attach an operation name and path to an [`io::Result`].
pub(crate) trait IoResultExt<T> {
    /// Convert the error into [`FsError::Io`].
    fn fs_op(self, operation: &'static str, path: &Path) -> Result<T, FsError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn fs_op(self, operation: &'static str, path: &Path) -> Result<T, FsError> {
        self.map_err(|source| FsError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        })
    }
}
