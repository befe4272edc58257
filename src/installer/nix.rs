use std::sync::Arc;

use super::{Installer, run_backend};
use crate::error::InstallError;
use crate::exec::Executor;

/// Packages from nixpkgs, installed into the user's profile.
///
/// `nix profile` is tried first; when it fails and `nix-env` is present the
/// legacy command is used instead.
#[derive(Debug, Clone)]
pub struct NixInstaller {
    executor: Arc<dyn Executor>,
}

impl NixInstaller {
    /// Create the backend.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    fn run(
        &self,
        operation: &'static str,
        packages: &[String],
        program: &str,
        args: Vec<&str>,
    ) -> Result<(), InstallError> {
        run_backend(
            self.executor.as_ref(),
            self.name(),
            operation,
            packages,
            (program, args),
        )
        .map(drop)
    }
}

/// Whether a `nix profile list` or `nix-env -q` listing mentions `package`.
///
/// `nix-env -q` prints `name-version`, so a bare name only matches when a
/// version number follows the dash.
fn listing_contains(listing: &str, package: &str) -> bool {
    let attr = format!(".{package}");
    let flake_ref = format!("#{package}");
    listing.lines().any(|line| {
        line.split_whitespace().any(|token| {
            token == package
                || token.ends_with(&attr)
                || token.ends_with(&flake_ref)
                || token
                    .strip_prefix(package)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .is_some_and(|version| version.starts_with(|c: char| c.is_ascii_digit()))
        })
    })
}

impl Installer for NixInstaller {
    fn name(&self) -> &str {
        "nix"
    }

    fn available(&self) -> bool {
        self.executor.which("nix")
    }

    fn install(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let refs: Vec<String> = packages.iter().map(|p| format!("nixpkgs#{p}")).collect();
        let mut args = vec!["profile", "install", "--impure"];
        args.extend(refs.iter().map(String::as_str));

        match self.run("installation", packages, "nix", args) {
            Err(e) if self.executor.which("nix-env") => {
                tracing::debug!("nix profile install failed, retrying with nix-env: {e}");
                let attrs: Vec<String> =
                    packages.iter().map(|p| format!("nixpkgs.{p}")).collect();
                let mut args = vec!["-iA"];
                args.extend(attrs.iter().map(String::as_str));
                self.run("installation", packages, "nix-env", args)
            }
            other => other,
        }
    }

    fn remove(&self, packages: &[String]) -> Result<(), InstallError> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = vec!["profile", "remove"];
        args.extend(packages.iter().map(String::as_str));
        self.run("removal", packages, "nix", args)
    }

    fn is_installed(&self, package: &str) -> bool {
        let listing = self
            .executor
            .run_unchecked("nix", &["profile", "list"])
            .ok()
            .filter(|r| r.success)
            .or_else(|| {
                self.executor
                    .run_unchecked("nix-env", &["-q"])
                    .ok()
                    .filter(|r| r.success)
            });
        listing.is_some_and(|r| listing_contains(&r.stdout, package))
    }

    fn update(&self) -> Result<(), InstallError> {
        self.run("update", &[], "nix-channel", vec!["--update"])
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
    fn install_uses_flake_refs() {
        let mock = Arc::new(MockExecutor::ok(""));
        NixInstaller::new(mock.clone())
            .install(&["git".to_string(), "ripgrep".to_string()])
            .unwrap();
        assert_eq!(
            mock.calls(),
            vec!["nix profile install --impure nixpkgs#git nixpkgs#ripgrep"]
        );
    }

    #[test]
    fn falls_back_to_nix_env() {
        let mock = Arc::new(
            MockExecutor::with_responses(vec![(false, String::new()), (true, String::new())])
                .with_programs(&["nix", "nix-env"]),
        );
        NixInstaller::new(mock.clone())
            .install(&["git".to_string()])
            .unwrap();
        assert_eq!(mock.calls()[1], "nix-env -iA nixpkgs.git");
    }

    #[test]
    fn failure_without_nix_env_is_reported() {
        let mock = Arc::new(
            MockExecutor::with_responses(vec![(false, "error: flakes disabled".to_string())])
                .with_programs(&["nix"]),
        );
        let err = NixInstaller::new(mock)
            .install(&["git".to_string()])
            .unwrap_err();
        assert_eq!(err.package(), Some("git"));
    }

    #[test]
    fn listing_matches_whole_names_only() {
        let listing = "Name:               ripgrep\n\
                       Flake attribute:    legacyPackages.x86_64-linux.ripgrep\n";
        assert!(listing_contains(listing, "ripgrep"));
        assert!(!listing_contains(listing, "rip"));
        assert!(listing_contains("git-2.45.1\n", "git"));
        assert!(!listing_contains("gitui-0.26\n", "git"));
        assert!(!listing_contains("git-lfs-3.4.0\n", "git"));
        assert!(listing_contains("git-lfs-3.4.0\n", "git-lfs"));
        assert!(listing_contains("git-2.44.0\ngit-lfs-3.4.0\n", "git"));
    }

    #[test]
    fn is_installed_reads_profile_listing() {
        let mock = Arc::new(MockExecutor::ok("0 flake:nixpkgs#legacyPackages.x86_64-linux.fd"));
        assert!(NixInstaller::new(mock).is_installed("fd"));
    }
}
