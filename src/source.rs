//! The configuration repository's source control, driven through `git`.
use std::path::Path;
use std::sync::Arc;

use crate::error::SourceError;
use crate::exec::Executor;
use crate::linker::fs::{ensure_parent_dir, remove_path};

/// Branch cloned when none is given.
pub const DEFAULT_BRANCH: &str = "main";

/// Directories every configuration repository must have.
const REQUIRED_DIRS: [&str; 3] = ["configs", "profiles", "packages"];

/// Runs git operations against a checkout.
#[derive(Debug, Clone)]
pub struct GitSource {
    executor: Arc<dyn Executor>,
}

impl GitSource {
    /// Create a provider running `git` through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Shallow-clone `branch` of `url` into `dest`, replacing anything there.
    ///
    /// # Errors
    ///
    /// Returns an error if `dest` cannot be prepared or `git clone` fails.
    pub fn clone_repo(&self, url: &str, dest: &Path, branch: &str) -> Result<(), SourceError> {
        ensure_parent_dir(dest)?;
        remove_path(dest)?;
        let dest_str = dest.to_string_lossy();
        let branch = if branch.is_empty() {
            DEFAULT_BRANCH
        } else {
            branch
        };
        self.executor
            .run(
                "git",
                &["clone", "--depth", "1", "--branch", branch, url, &dest_str],
            )
            .map_err(|e| git_error("clone", &e))?;
        tracing::info!("cloned {url} ({branch}) into {}", dest.display());
        Ok(())
    }

    /// Fast-forward the checkout at `repo`.
    ///
    /// # Errors
    ///
    /// Returns an error if `git pull --ff-only` fails.
    pub fn pull(&self, repo: &Path) -> Result<(), SourceError> {
        self.executor
            .run_in(repo, "git", &["pull", "--ff-only"])
            .map_err(|e| git_error("pull", &e))?;
        Ok(())
    }

    /// Abbreviated hash of `HEAD` in `repo`.
    ///
    /// # Errors
    ///
    /// Returns an error if `git rev-parse` fails.
    pub fn current_commit(&self, repo: &Path) -> Result<String, SourceError> {
        let result = self
            .executor
            .run_in(repo, "git", &["rev-parse", "--short", "HEAD"])
            .map_err(|e| git_error("rev-parse", &e))?;
        Ok(result.stdout.trim().to_string())
    }
}

fn git_error(operation: &'static str, e: &anyhow::Error) -> SourceError {
    SourceError::Git {
        operation,
        cause: format!("{e:#}"),
    }
}

/// Check that `path` has the layout of a configuration repository.
///
/// # Errors
///
/// Returns [`SourceError::Invalid`] naming the first missing directory.
pub fn validate(path: &Path) -> Result<(), SourceError> {
    for dir in REQUIRED_DIRS {
        if !path.join(dir).is_dir() {
            return Err(SourceError::Invalid {
                path: path.to_path_buf(),
                missing: dir,
            });
        }
    }
    Ok(())
}

/// Whether `s` looks like a git remote.
#[must_use]
pub fn is_valid_git_url(s: &str) -> bool {
    ["https://", "http://", "git@", "ssh://"]
        .iter()
        .any(|prefix| s.starts_with(prefix))
}

/// Whether `s` looks like a filesystem path rather than a remote.
#[must_use]
pub fn is_local_path(s: &str) -> bool {
    s.starts_with('/') || s.starts_with('~') || s.starts_with("./") || s.starts_with("../")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;
    use std::fs;

    #[test]
    fn clone_is_shallow_and_defaults_branch() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("repo");
        fs::create_dir_all(dest.join("stale")).unwrap();

        let mock = Arc::new(MockExecutor::ok(""));
        GitSource::new(mock.clone())
            .clone_repo("https://example.com/dots.git", &dest, "")
            .unwrap();

        assert!(!dest.exists(), "existing checkout is removed before cloning");
        assert_eq!(
            mock.calls(),
            vec![format!(
                "git clone --depth 1 --branch main https://example.com/dots.git {}",
                dest.display()
            )]
        );
    }

    #[test]
    fn pull_failure_is_git_error() {
        let mock = Arc::new(MockExecutor::with_responses(vec![(
            false,
            "fatal: Not possible to fast-forward".to_string(),
        )]));
        let err = GitSource::new(mock).pull(Path::new("/repo")).unwrap_err();
        assert!(matches!(err, SourceError::Git { operation: "pull", .. }));
        assert!(err.to_string().contains("fast-forward"));
    }

    #[test]
    fn current_commit_is_trimmed() {
        let mock = Arc::new(MockExecutor::ok("abc1234\n"));
        let commit = GitSource::new(mock.clone())
            .current_commit(Path::new("/repo"))
            .unwrap();
        assert_eq!(commit, "abc1234");
        assert_eq!(mock.calls(), vec!["git rev-parse --short HEAD"]);
    }

    #[test]
    fn validate_requires_layout() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["configs", "profiles"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
        }
        let err = validate(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Invalid {
                missing: "packages",
                ..
            }
        ));
        fs::create_dir(dir.path().join("packages")).unwrap();
        assert!(validate(dir.path()).is_ok());
    }

    #[test]
    fn url_and_path_detection() {
        assert!(is_valid_git_url("https://github.com/me/dots"));
        assert!(is_valid_git_url("git@github.com:me/dots.git"));
        assert!(is_valid_git_url("ssh://git@host/dots"));
        assert!(!is_valid_git_url("/home/me/dots"));
        assert!(is_local_path("~/dots"));
        assert!(is_local_path("./dots"));
        assert!(!is_local_path("github.com/me/dots"));
    }
}
