use std::sync::Arc;

use super::{Installer, query_succeeds, run_backend, sudo_wrap};
use crate::error::InstallError;
use crate::exec::Executor;

/// Official Arch Linux repositories through `pacman`.
#[derive(Debug, Clone)]
pub struct PacmanInstaller {
    executor: Arc<dyn Executor>,
    sudo: bool,
}

impl PacmanInstaller {
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
            sudo_wrap(self.sudo, "pacman", args),
        )
        .map(drop)
    }
}

impl Installer for PacmanInstaller {
    fn name(&self) -> &str {
        "pacman"
    }

    fn available(&self) -> bool {
        self.executor.which("pacman")
    }

    fn install(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec!["-S", "--noconfirm", "--needed"];
        args.extend(packages.iter().map(String::as_str));
        self.run("installation", packages, &args)
    }

    fn remove(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec!["-R", "--noconfirm"];
        args.extend(packages.iter().map(String::as_str));
        self.run("removal", packages, &args)
    }

    fn is_installed(&self, package: &str) -> bool {
        query_succeeds(self.executor.as_ref(), "pacman", &["-Qi", package])
    }

    fn update(&self) -> Result<(), InstallError> {
        self.run("update", &[], &["-Sy"])
    }

    fn needs_sudo(&self) -> bool {
        self.sudo
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;

    #[test]
    fn install_uses_sudo_and_needed() {
        let mock = Arc::new(MockExecutor::ok(""));
        let pacman = PacmanInstaller::new(mock.clone(), true);
        pacman
            .install(&["git".to_string(), "ripgrep".to_string()])
            .unwrap();
        assert_eq!(
            mock.calls(),
            vec!["sudo pacman -S --noconfirm --needed git ripgrep"]
        );
    }

    #[test]
    fn root_runs_without_sudo() {
        let mock = Arc::new(MockExecutor::ok(""));
        let pacman = PacmanInstaller::new(mock.clone(), false);
        pacman.update().unwrap();
        assert_eq!(mock.calls(), vec!["pacman -Sy"]);
        assert!(!pacman.needs_sudo());
    }

    #[test]
    fn is_installed_queries_local_database() {
        let mock = Arc::new(MockExecutor::with_responses(vec![
            (true, "Name : git".to_string()),
            (false, String::new()),
        ]));
        let pacman = PacmanInstaller::new(mock.clone(), true);
        assert!(pacman.is_installed("git"));
        assert!(!pacman.is_installed("nope"));
        assert_eq!(mock.calls()[1], "pacman -Qi nope");
    }

    #[test]
    fn empty_install_runs_nothing() {
        let mock = Arc::new(MockExecutor::default());
        PacmanInstaller::new(mock.clone(), true).install(&[]).unwrap();
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn failed_removal_is_batch_error() {
        let mock = Arc::new(MockExecutor::with_responses(vec![(false, String::new())]));
        let err = PacmanInstaller::new(mock, true)
            .remove(&["git".to_string()])
            .unwrap_err();
        assert_eq!(err.to_string(), "pacman: removal failed: exit status 1");
    }
}
