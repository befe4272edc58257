//! Command: pull the repository and refresh package databases.
use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::config::{Loader, Resolver, Scripts};
use crate::exec::Executor;
use crate::installer::{Orchestrator, Registry};
use crate::logging::{Logger, TaskStatus};
use crate::paths::AppPaths;
use crate::source::GitSource;
use crate::state::{SourceType, State};

/// Run the update command.
///
/// # Errors
///
/// Returns an error if the pull fails, state cannot be saved, or a backend
/// update failed.
pub fn run(global: &GlobalOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let mut setup = CommandSetup::init(global, paths)?;
    let registry = Registry::with_defaults(&setup.executor, &setup.system);
    let executor = setup.executor.clone();
    let scripts = match setup.loader() {
        Ok(loader) => recorded_scripts(&loader, &setup.state, log),
        Err(e) => {
            log.debug(&format!("no update scripts: {e:#}"));
            Scripts::default()
        }
    };

    if global.dry_run {
        if setup.state.config_source.kind == SourceType::Git {
            log.dry_run(&format!("would pull {}", setup.repo.display()));
        }
        run_update_scripts(executor.as_ref(), "pre_update", &scripts.pre_update, true, log);
        for installer in registry.available() {
            log.dry_run(&format!("would update {}", installer.name()));
        }
        run_update_scripts(executor.as_ref(), "post_update", &scripts.post_update, true, log);
        return Ok(());
    }

    if setup.state.config_source.kind == SourceType::Git && setup.repo.join(".git").exists() {
        log.stage("Updating repository");
        let git = GitSource::new(setup.executor.clone());
        match git.pull(&setup.repo).and_then(|()| git.current_commit(&setup.repo)) {
            Ok(commit) => {
                setup.state.record_pull(&commit);
                setup.state.save().context("failed to save state")?;
                log.record_task("repository", TaskStatus::Ok, Some(&commit));
            }
            Err(e) => log.record_task("repository", TaskStatus::Failed, Some(&e.to_string())),
        }
    } else {
        log.record_task("repository", TaskStatus::Skipped, Some("not a git checkout"));
    }

    run_update_scripts(executor.as_ref(), "pre_update", &scripts.pre_update, false, log);

    log.stage("Updating package databases");
    let failures = Orchestrator::new(&registry).update_all();
    for installer in registry.available() {
        let name = format!("update: {}", installer.name());
        match failures.iter().find(|(backend, _)| backend == installer.name()) {
            Some((_, e)) => log.record_task(&name, TaskStatus::Failed, Some(&e.to_string())),
            None => log.record_task(&name, TaskStatus::Ok, None),
        }
    }

    run_update_scripts(executor.as_ref(), "post_update", &scripts.post_update, false, log);

    log.print_summary();
    if log.has_failures() {
        anyhow::bail!("update finished with errors");
    }
    Ok(())
}

/// Scripts of the machine or profile the last apply recorded.
///
/// Nothing recorded yields no scripts. A resolution failure is recorded as a
/// failed unit and also yields none.
#[must_use]
pub fn recorded_scripts(loader: &Loader, state: &State, log: &Logger) -> Scripts {
    let resolver = Resolver::new(loader);
    let resolved = if !state.machine.name.is_empty() {
        resolver.resolve_machine(&state.machine.name)
    } else if !state.machine.profile.is_empty() {
        resolver.resolve_profile(&state.machine.profile)
    } else {
        log.debug("no applied machine or profile recorded; no update scripts");
        return Scripts::default();
    };
    match resolved {
        Ok(resolved) => resolved.scripts,
        Err(e) => {
            log.record_task("update scripts", TaskStatus::Failed, Some(&e.to_string()));
            Scripts::default()
        }
    }
}

/// Run each `phase` script with `sh -c`, recording one unit per script.
///
/// A failing script is recorded and the remaining scripts still run.
pub fn run_update_scripts(
    executor: &dyn Executor,
    phase: &str,
    scripts: &[String],
    dry_run: bool,
    log: &Logger,
) {
    for script in scripts {
        let name = format!("{phase}: {script}");
        if dry_run {
            log.dry_run(&format!("would run {name}"));
            log.record_task(&name, TaskStatus::DryRun, None);
            continue;
        }
        log.info(&name);
        match executor.run("sh", &["-c", script]) {
            Ok(_) => log.record_task(&name, TaskStatus::Ok, None),
            Err(e) => {
                log.error(&format!("{phase} script failed: {e:#}"));
                log.record_task(&name, TaskStatus::Failed, Some(&format!("{e:#}")));
            }
        }
    }
}
