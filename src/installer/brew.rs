use std::sync::Arc;

use super::{Installer, query_succeeds, run_backend};
use crate::error::InstallError;
use crate::exec::Executor;

/// Homebrew formulae or casks.
///
/// The same binary serves both buckets; the cask flavour registers as `cask`
/// and passes `--cask` to every command.
#[derive(Debug, Clone)]
pub struct BrewInstaller {
    executor: Arc<dyn Executor>,
    cask: bool,
}

impl BrewInstaller {
    /// Backend for formulae, registered as `brew`.
    #[must_use]
    pub fn formulae(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            cask: false,
        }
    }

    /// Backend for casks, registered as `cask`.
    #[must_use]
    pub fn casks(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            cask: true,
        }
    }

    fn args<'a>(&self, command: &'a str, packages: &'a [String]) -> Vec<&'a str> {
        let mut args = vec![command];
        if self.cask {
            args.push("--cask");
        }
        args.extend(packages.iter().map(String::as_str));
        args
    }
}

impl Installer for BrewInstaller {
    fn name(&self) -> &str {
        if self.cask { "cask" } else { "brew" }
    }

    fn available(&self) -> bool {
        self.executor.which("brew")
    }

    fn install(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        run_backend(
            self.executor.as_ref(),
            self.name(),
            "installation",
            packages,
            ("brew", self.args("install", packages)),
        )
        .map(drop)
    }

    fn remove(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        run_backend(
            self.executor.as_ref(),
            self.name(),
            "removal",
            packages,
            ("brew", self.args("uninstall", packages)),
        )
        .map(drop)
    }

    fn is_installed(&self, package: &str) -> bool {
        let package = [package.to_string()];
        query_succeeds(
            self.executor.as_ref(),
            "brew",
            &self.args("list", &package),
        )
    }

    fn update(&self) -> Result<(), InstallError> {
        run_backend(
            self.executor.as_ref(),
            self.name(),
            "update",
            &[],
            ("brew", vec!["update"]),
        )
        .map(drop)
    }

    fn needs_sudo(&self) -> bool {
        false
    }
}
