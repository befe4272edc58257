pub mod apply;
pub mod backups;
pub mod init;
pub mod inspect;
pub mod links;
pub mod update;
pub mod version;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::Loader;
use crate::exec::{Executor, SystemExecutor};
use crate::linker::Linker;
use crate::paths::AppPaths;
use crate::platform::SystemInfo;
use crate::state::State;

/// Environment variable naming the configuration repository.
pub const REPO_ENV: &str = "DOTTS_REPO";

/// Shared state produced by the common command setup sequence.
///
/// Detects the system, loads `state.json`, and settles which repository the
/// command works against.
#[derive(Debug)]
pub struct CommandSetup {
    pub paths: AppPaths,
    pub system: SystemInfo,
    pub state: State,
    pub repo: PathBuf,
    pub executor: Arc<dyn Executor>,
}

impl CommandSetup {
    /// Detect the system, load state, and resolve the repository root.
    ///
    /// # Errors
    ///
    /// Returns an error if `state.json` exists but cannot be parsed.
    pub fn init(global: &GlobalOpts, paths: &AppPaths) -> Result<Self> {
        let system = SystemInfo::detect();
        let state = State::load(&paths.state_file())?;
        let repo = repo_root(
            global.repo.as_deref(),
            std::env::var_os(REPO_ENV),
            &state,
            paths,
        );
        tracing::debug!(
            "system: {} {} {} as {}, repo {}",
            system.os,
            system.distro,
            system.arch,
            system.username,
            repo.display()
        );
        Ok(Self {
            paths: paths.clone(),
            system,
            state,
            repo,
            executor: Arc::new(SystemExecutor),
        })
    }

    /// A loader over the repository, which must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository directory is missing.
    pub fn loader(&self) -> Result<Loader> {
        if !self.repo.is_dir() {
            anyhow::bail!(
                "configuration repository not found at {} (run `dotts init` or pass --repo)",
                self.repo.display()
            );
        }
        Ok(Loader::new(&self.repo))
    }

    /// A linker over the repository and the persisted link stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or backup index cannot be read.
    pub fn linker(&self) -> Result<Linker> {
        Linker::open(Loader::new(&self.repo), &self.system.home_dir, &self.paths)
            .context("failed to open link manifest")
    }
}

/// Pick the repository root.
///
/// Order: the `--repo` flag, `DOTTS_REPO`, the checkout recorded in state,
/// then the default checkout location.
#[must_use]
pub fn repo_root(
    flag: Option<&Path>,
    env: Option<OsString>,
    state: &State,
    paths: &AppPaths,
) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Some(path) = env.filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    if !state.config_source.path.is_empty() {
        return PathBuf::from(&state.config_source.path);
    }
    paths.repo_dir()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::state::SourceType;

    fn paths() -> AppPaths {
        AppPaths::under(Path::new("/tmp/app"))
    }

    #[test]
    fn flag_wins() {
        let root = repo_root(
            Some(Path::new("/explicit")),
            Some(OsString::from("/from-env")),
            &State::default(),
            &paths(),
        );
        assert_eq!(root, PathBuf::from("/explicit"));
    }

    #[test]
    fn env_before_state() {
        let mut state = State::default();
        state.set_config_source(SourceType::Local, "", Path::new("/recorded"), "");
        let root = repo_root(None, Some(OsString::from("/from-env")), &state, &paths());
        assert_eq!(root, PathBuf::from("/from-env"));
    }

    #[test]
    fn recorded_checkout_before_default() {
        let mut state = State::default();
        state.set_config_source(SourceType::Local, "", Path::new("/recorded"), "");
        assert_eq!(
            repo_root(None, Some(OsString::new()), &state, &paths()),
            PathBuf::from("/recorded")
        );
    }

    #[test]
    fn default_checkout() {
        assert_eq!(
            repo_root(None, None, &State::default(), &paths()),
            PathBuf::from("/tmp/app/config/repo")
        );
    }
}
