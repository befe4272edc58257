//! Command: clone or register the configuration repository.
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{GlobalOpts, InitOpts};
use crate::logging::Logger;
use crate::paths::AppPaths;
use crate::source::{self, GitSource};
use crate::state::SourceType;

/// Run the init command.
///
/// A git URL is cloned into the default checkout location (or `--repo`);
/// a local path is validated and recorded as-is.
///
/// # Errors
///
/// Returns an error if the source is neither a URL nor a path, the clone
/// fails, the result is not a configuration repository, or state cannot be
/// saved.
pub fn run(global: &GlobalOpts, opts: &InitOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let mut setup = CommandSetup::init(global, paths)?;

    let (kind, url, repo) = if source::is_valid_git_url(&opts.source) {
        let dest = global.repo.clone().unwrap_or_else(|| paths.repo_dir());
        (SourceType::Git, opts.source.clone(), dest)
    } else if source::is_local_path(&opts.source) {
        let expanded = shellexpand::tilde(&opts.source).into_owned();
        let path = std::path::absolute(PathBuf::from(expanded))
            .with_context(|| format!("invalid path {}", opts.source))?;
        (SourceType::Local, String::new(), path)
    } else {
        anyhow::bail!(
            "{} is neither a git URL (https://, git@, ssh://) nor a path (/, ~, ./)",
            opts.source
        );
    };

    if global.dry_run {
        match kind {
            SourceType::Git => log.dry_run(&format!(
                "would clone {url} ({}) into {}",
                opts.branch,
                repo.display()
            )),
            SourceType::Local => log.dry_run(&format!("would use {}", repo.display())),
        }
        return Ok(());
    }

    let git = GitSource::new(setup.executor.clone());
    if kind == SourceType::Git {
        log.stage(&format!("Cloning {url}"));
        git.clone_repo(&url, &repo, &opts.branch)?;
    }
    source::validate(&repo)?;

    if kind == SourceType::Git {
        setup
            .state
            .set_config_source(kind, &url, &repo, &opts.branch);
        let commit = git.current_commit(&repo)?;
        setup.state.record_pull(&commit);
    } else {
        setup.state.set_config_source(kind, "", &repo, "");
    }
    setup.state.save().context("failed to save state")?;
    log.info(&format!("configuration repository: {}", repo.display()));
    Ok(())
}
