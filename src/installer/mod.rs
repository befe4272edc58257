//! Package installation through system package managers.
//!
//! Each package manager is wrapped by a backend implementing [`Installer`].
//! Backends are held by a [`Registry`] keyed by name, and an
//! [`Orchestrator`] walks an [`InstallPlan`] bucket by bucket.
mod apt;
mod aur;
mod brew;
mod dnf;
mod nix;
pub mod orchestrator;
mod pacman;
pub mod plan;
pub mod registry;

use std::fmt;

pub use apt::AptInstaller;
pub use aur::AurInstaller;
pub use brew::BrewInstaller;
pub use dnf::DnfInstaller;
pub use nix::NixInstaller;
pub use orchestrator::Orchestrator;
pub use pacman::PacmanInstaller;
pub use plan::{Bucket, InstallPlan};
pub use registry::Registry;

use crate::error::InstallError;
use crate::exec::{ExecResult, Executor};

/// A package-manager backend.
pub trait Installer: Send + Sync + fmt::Debug {
    /// Registry key of this backend (`pacman`, `apt`, ...).
    fn name(&self) -> &str;

    /// Whether the backend's tooling is present on `PATH`.
    fn available(&self) -> bool;

    /// Install every package in `packages` with one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] carrying the command output when the package
    /// manager exits non-zero.
    fn install(&self, packages: &[String]) -> Result<(), InstallError>;

    /// Remove every package in `packages`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] when the package manager exits non-zero.
    fn remove(&self, packages: &[String]) -> Result<(), InstallError>;

    /// Whether `package` is already installed.
    fn is_installed(&self, package: &str) -> bool;

    /// Refresh the package database.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] when the refresh fails.
    fn update(&self) -> Result<(), InstallError>;

    /// Whether commands are prefixed with `sudo`.
    fn needs_sudo(&self) -> bool;
}

/// Outcome of installing one bucket.
#[derive(Debug)]
pub struct InstallResult {
    /// Backend that handled the bucket.
    pub backend: String,
    /// Every package the plan asked for.
    pub requested: Vec<String>,
    /// Packages installed by this run.
    pub installed: Vec<String>,
    /// Packages that were already present.
    pub skipped: Vec<String>,
    /// Packages whose installation failed.
    pub failed: Vec<String>,
    /// The backend error, when the install command failed.
    pub error: Option<InstallError>,
}

impl InstallResult {
    /// An empty result for `backend`.
    #[must_use]
    pub fn new(backend: &str, requested: &[String]) -> Self {
        Self {
            backend: backend.to_string(),
            requested: requested.to_vec(),
            installed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            error: None,
        }
    }

    /// True when nothing failed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none() && self.failed.is_empty()
    }
}

/// Prefix `program args` with `sudo` when required.
fn sudo_wrap<'a>(sudo: bool, program: &'a str, args: &[&'a str]) -> (&'a str, Vec<&'a str>) {
    if sudo {
        let mut wrapped = Vec::with_capacity(args.len() + 1);
        wrapped.push(program);
        wrapped.extend_from_slice(args);
        ("sudo", wrapped)
    } else {
        (program, args.to_vec())
    }
}

/// Run a package-manager command, turning a spawn failure or non-zero exit
/// into an [`InstallError`].
///
/// A single-package installation reports [`InstallError::Package`]; anything
/// else reports [`InstallError::Batch`].
fn run_backend(
    executor: &dyn Executor,
    backend: &str,
    operation: &'static str,
    packages: &[String],
    (program, args): (&str, Vec<&str>),
) -> Result<ExecResult, InstallError> {
    tracing::debug!(backend, "running: {program} {}", args.join(" "));
    let (cause, output) = match executor.run_unchecked(program, &args) {
        Ok(result) if result.success => return Ok(result),
        Ok(result) => (result.status_text(), result.combined_output()),
        Err(e) => (format!("{e:#}"), String::new()),
    };

    match packages {
        [package] if operation == "installation" => Err(InstallError::Package {
            backend: backend.to_string(),
            package: package.clone(),
            cause,
            output,
        }),
        _ => Err(InstallError::Batch {
            backend: backend.to_string(),
            operation,
            cause,
            output,
        }),
    }
}

/// Whether a read-only query exits zero.
fn query_succeeds(executor: &dyn Executor, program: &str, args: &[&str]) -> bool {
    executor
        .run_unchecked(program, args)
        .is_ok_and(|result| result.success)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn sudo_wrap_prefixes_program() {
        let (program, args) = sudo_wrap(true, "pacman", &["-Sy"]);
        assert_eq!(program, "sudo");
        assert_eq!(args, vec!["pacman", "-Sy"]);

        let (program, args) = sudo_wrap(false, "pacman", &["-Sy"]);
        assert_eq!(program, "pacman");
        assert_eq!(args, vec!["-Sy"]);
    }

    #[test]
    fn single_package_failure_names_the_package() {
        let mock = MockExecutor::with_responses(vec![(false, "target not found".to_string())]);
        let err = run_backend(
            &mock,
            "pacman",
            "installation",
            &names(&["nope"]),
            ("pacman", vec!["-S", "nope"]),
        )
        .unwrap_err();
        assert_eq!(err.package(), Some("nope"));
        assert_eq!(err.output(), "target not found");
    }

    #[test]
    fn batch_failure_has_no_package() {
        let mock = MockExecutor::with_responses(vec![(false, String::new())]);
        let err = run_backend(
            &mock,
            "apt",
            "installation",
            &names(&["git", "curl"]),
            ("apt-get", vec!["install", "-y", "git", "curl"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InstallError::Batch {
                operation: "installation",
                ..
            }
        ));
    }

    #[test]
    fn result_success_requires_no_failures() {
        let mut result = InstallResult::new("nix", &names(&["git"]));
        assert!(result.success());
        result.failed.push("git".to_string());
        assert!(!result.success());
    }
}
