use std::sync::Arc;

use super::{Installer, query_succeeds, run_backend};
use crate::error::InstallError;
use crate::exec::Executor;

/// Arch User Repository packages through an AUR helper.
///
/// `paru` is preferred when it is on `PATH`, otherwise `yay`. Helpers elevate
/// on their own, so commands never run under `sudo`.
#[derive(Debug, Clone)]
pub struct AurInstaller {
    executor: Arc<dyn Executor>,
    helper: &'static str,
}

impl AurInstaller {
    /// Create the backend, picking the helper from what is installed.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        let helper = if executor.which("paru") { "paru" } else { "yay" };
        Self { executor, helper }
    }

    /// The helper binary in use.
    #[must_use]
    pub const fn helper(&self) -> &str {
        self.helper
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
            (self.helper, args.to_vec()),
        )
        .map(drop)
    }
}

impl Installer for AurInstaller {
    fn name(&self) -> &str {
        "yay"
    }

    fn available(&self) -> bool {
        self.executor.which(self.helper)
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
        query_succeeds(self.executor.as_ref(), self.helper, &["-Qi", package])
    }

    fn update(&self) -> Result<(), InstallError> {
        self.run("update", &[], &["-Sy"])
    }

    fn needs_sudo(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;

    #[test]
    fn prefers_paru() {
        let mock = Arc::new(MockExecutor::ok("").with_programs(&["paru", "yay"]));
        let aur = AurInstaller::new(mock.clone());
        assert_eq!(aur.helper(), "paru");
        aur.install(&["visual-studio-code-bin".to_string()]).unwrap();
        assert_eq!(
            mock.calls(),
            vec!["paru -S --noconfirm --needed visual-studio-code-bin"]
        );
    }

    #[test]
    fn falls_back_to_yay() {
        let mock = Arc::new(MockExecutor::default().with_programs(&["yay"]));
        let aur = AurInstaller::new(mock);
        assert_eq!(aur.helper(), "yay");
        assert!(aur.available());
        assert!(!aur.needs_sudo());
        assert_eq!(aur.name(), "yay");
    }

    #[test]
    fn unavailable_without_helpers() {
        let mock = Arc::new(MockExecutor::default());
        assert!(!AurInstaller::new(mock).available());
    }
}
