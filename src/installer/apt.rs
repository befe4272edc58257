use std::sync::Arc;

use super::{Installer, run_backend, sudo_wrap};
use crate::error::InstallError;
use crate::exec::Executor;

const INSTALLED_STATUS: &str = "Status: install ok installed";

/// Debian and Ubuntu packages through `apt-get`.
#[derive(Debug, Clone)]
pub struct AptInstaller {
    executor: Arc<dyn Executor>,
    sudo: bool,
}

impl AptInstaller {
    /// Create the backend; `sudo` prefixes every mutating command.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, sudo: bool) -> Self {
        Self { executor, sudo }
    }

    fn run(
        &self,
        operation: &'static str,
        packages: &[String],
        args: &[&str],
    ) -> Result<(), InstallError> {
        run_backend(
            self.executor.as_ref(),
            self.name(),
            operation,
            packages,
            sudo_wrap(self.sudo, "apt-get", args),
        )
        .map(drop)
    }
}

impl Installer for AptInstaller {
    fn name(&self) -> &str {
        "apt"
    }

    fn available(&self) -> bool {
        self.executor.which("apt-get")
    }

    fn install(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec!["install", "-y"];
        args.extend(packages.iter().map(String::as_str));
        self.run("installation", packages, &args)
    }

    fn remove(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec!["remove", "-y"];
        args.extend(packages.iter().map(String::as_str));
        self.run("removal", packages, &args)
    }

    fn is_installed(&self, package: &str) -> bool {
        self.executor
            .run_unchecked("dpkg", &["-s", package])
            .is_ok_and(|result| result.success && result.stdout.contains(INSTALLED_STATUS))
    }

    fn update(&self) -> Result<(), InstallError> {
        self.run("update", &[], &["update"])
    }

    fn needs_sudo(&self) -> bool {
        self.sudo
    }
}
