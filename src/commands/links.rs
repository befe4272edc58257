//! Commands: `status`, `unlink` and `restore`.
use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{GlobalOpts, RestoreOpts, UnlinkOpts};
use crate::linker::UnlinkOutcome;
use crate::logging::{Logger, TaskStatus};
use crate::paths::AppPaths;

/// Show managed links, broken and foreign entries, and the last apply.
///
/// # Errors
///
/// Returns an error if state or the manifest cannot be read.
pub fn status(global: &GlobalOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let state = &setup.state;

    log.stage("Machine");
    if state.has_machine() || !state.machine.profile.is_empty() {
        let m = &state.machine;
        let name = if m.name.is_empty() { "-" } else { &m.name };
        log.info(&format!("machine: {name} (profile {})", m.profile));
        log.info(&format!("host: {} ({} {})", m.hostname, m.os, m.distro));
    } else {
        log.info("nothing applied yet");
    }
    if let Some(at) = state.last_apply {
        log.info(&format!("last apply: {}", at.to_rfc3339()));
    }
    log.info(&format!("repository: {}", setup.repo.display()));

    let status = setup.linker()?.status();
    log.stage(&format!("Links ({})", status.links.len()));
    for entry in &status.links {
        let kind = if entry.is_template { " [rendered]" } else { "" };
        log.info(&format!(
            "{} -> {}{kind}",
            entry.target.display(),
            entry.source.display()
        ));
    }
    for path in &status.broken {
        log.warn(&format!("broken: {}", path.display()));
    }
    for path in &status.foreign {
        log.warn(&format!("foreign: {} no longer points into the repository", path.display()));
    }
    Ok(())
}

/// Remove one managed link, or all of them.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or saved, or a removal
/// fails.
pub fn unlink(global: &GlobalOpts, opts: &UnlinkOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let linker = setup.linker()?;

    if global.dry_run {
        let targets: Vec<_> = if opts.all {
            linker.manifest().entries().into_iter().map(|e| e.target).collect()
        } else {
            opts.target.iter().map(|t| linker.expand(t)).collect()
        };
        for target in targets {
            log.dry_run(&format!("would unlink {}", target.display()));
        }
        return Ok(());
    }

    let outcomes = if opts.all {
        linker.unlink_all()
    } else {
        opts.target
            .iter()
            .map(|t| {
                let target = linker.expand(t);
                let outcome = linker.unlink(&target);
                (target, outcome)
            })
            .collect()
    };

    for (target, outcome) in outcomes {
        let name = format!("unlink: {}", target.display());
        match outcome {
            Ok(UnlinkOutcome::Removed) => log.record_task(&name, TaskStatus::Ok, None),
            Ok(other) => log.record_task(&name, TaskStatus::Skipped, Some(&other.to_string())),
            Err(e) => log.record_task(&name, TaskStatus::Failed, Some(&e.to_string())),
        }
    }
    linker.save().context("failed to save manifest")?;
    log.print_summary();

    if log.has_failures() {
        anyhow::bail!("some links could not be removed");
    }
    Ok(())
}

/// Put the backed-up copy of a path back in place.
///
/// # Errors
///
/// Returns an error if nothing was backed up for the path or the copy fails.
pub fn restore(global: &GlobalOpts, opts: &RestoreOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let linker = setup.linker()?;
    let path = linker.expand(&opts.path);

    if global.dry_run {
        if linker.backups().has_backup(&path) {
            log.dry_run(&format!("would restore {}", path.display()));
            return Ok(());
        }
        anyhow::bail!("no backup recorded for {}", path.display());
    }

    linker.restore(&path)?;
    linker.save().context("failed to save manifest")?;
    log.info(&format!("restored {}", path.display()));
    Ok(())
}
