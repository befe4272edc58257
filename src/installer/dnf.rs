use std::sync::Arc;

use super::{Installer, query_succeeds, run_backend, sudo_wrap};
use crate::error::InstallError;
use crate::exec::Executor;

/// `dnf check-update` exits 100 when updates are available.
const UPDATES_AVAILABLE: i32 = 100;

/// Fedora packages through `dnf`.
#[derive(Debug, Clone)]
pub struct DnfInstaller {
    executor: Arc<dyn Executor>,
    sudo: bool,
}

impl DnfInstaller {
    /// Create the backend; `sudo` prefixes every mutating command.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, sudo: bool) -> Self {
        Self { executor, sudo }
    }
}

impl Installer for DnfInstaller {
    fn name(&self) -> &str {
        "dnf"
    }

    fn available(&self) -> bool {
        self.executor.which("dnf")
    }

    fn install(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec!["install", "-y"];
        args.extend(packages.iter().map(String::as_str));
        run_backend(
            self.executor.as_ref(),
            self.name(),
            "installation",
            packages,
            sudo_wrap(self.sudo, "dnf", &args),
        )
        .map(drop)
    }

    fn remove(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec!["remove", "-y"];
        args.extend(packages.iter().map(String::as_str));
        run_backend(
            self.executor.as_ref(),
            self.name(),
            "removal",
            packages,
            sudo_wrap(self.sudo, "dnf", &args),
        )
        .map(drop)
    }

    fn is_installed(&self, package: &str) -> bool {
        query_succeeds(self.executor.as_ref(), "rpm", &["-q", package])
    }

    fn update(&self) -> Result<(), InstallError> {
        let result = self
            .executor
            .run_unchecked("dnf", &["check-update"])
            .map_err(|e| InstallError::Batch {
                backend: self.name().to_string(),
                operation: "update",
                cause: format!("{e:#}"),
                output: String::new(),
            })?;
        if result.success || result.code == Some(UPDATES_AVAILABLE) {
            return Ok(());
        }
        Err(InstallError::Batch {
            backend: self.name().to_string(),
            operation: "update",
            cause: result.status_text(),
            output: result.combined_output(),
        })
    }

    fn needs_sudo(&self) -> bool {
        self.sudo
    }
}
