//! Command: apply a machine or profile.
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::CommandSetup;
use crate::apply::{ApplyOptions, ApplyResult, Applier};
use crate::cli::{ApplyOpts, GlobalOpts};
use crate::installer::Registry;
use crate::logging::{Logger, TaskStatus};
use crate::paths::AppPaths;
use crate::personal::PersonalConfig;

/// Run the apply command.
///
/// # Errors
///
/// Returns an error if resolution fails or any package, link or script
/// failed.
pub fn run(
    global: &GlobalOpts,
    opts: &ApplyOpts,
    paths: &AppPaths,
    log: &Logger,
    cancel: &AtomicBool,
) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let loader = setup.loader()?;

    let personal = PersonalConfig::load(&paths.personal_file())?;
    if !personal.is_complete() {
        log.debug("personal.yaml has no name or email; user.* placeholders stay verbatim");
    }

    let registry = Registry::with_defaults(&setup.executor, &setup.system);
    let applier = Applier::new(
        &loader,
        &setup.system,
        &setup.paths,
        &registry,
        setup.executor.clone(),
    )
    .with_personal(personal.to_values());

    let options = ApplyOptions {
        dry_run: global.dry_run,
        skip_packages: opts.skip_packages,
        skip_dotfiles: opts.skip_dotfiles,
        machine: opts.target.machine.clone(),
        profile: opts.target.profile.clone(),
        force: opts.force,
        backup: opts.backup,
    };

    log.stage("Applying configuration");
    let result = applier.apply(&options, cancel)?;
    record(&result, global.dry_run, log);
    log.print_summary();

    if log.has_failures() || result.has_errors() {
        anyhow::bail!("apply finished with errors");
    }
    Ok(())
}

/// Turn an [`ApplyResult`] into summary entries.
fn record(result: &ApplyResult, dry_run: bool, log: &Logger) {
    if dry_run {
        for (bucket, packages) in result.plan.buckets() {
            log.record_task(
                &format!("packages: {bucket}"),
                TaskStatus::DryRun,
                Some(&format!("{} package(s)", packages.len())),
            );
        }
    }
    for r in &result.package_results {
        let name = format!("packages: {}", r.backend);
        match &r.error {
            Some(e) => log.record_task(&name, TaskStatus::Failed, Some(&e.to_string())),
            None if r.installed.is_empty() => {
                log.record_task(&name, TaskStatus::Skipped, Some("already installed"));
            }
            None => log.record_task(
                &name,
                TaskStatus::Ok,
                Some(&format!("{} installed", r.installed.len())),
            ),
        }
    }

    for bundle in &result.bundles {
        let status = if bundle.failed > 0 {
            TaskStatus::Failed
        } else if dry_run {
            TaskStatus::DryRun
        } else if bundle.linked == 0 {
            TaskStatus::Skipped
        } else {
            TaskStatus::Ok
        };
        let failed = if bundle.failed > 0 {
            format!(", {} failed", bundle.failed)
        } else {
            String::new()
        };
        let message = format!(
            "{} linked, {} unchanged, {} backed up{failed}",
            bundle.linked, bundle.skipped, bundle.backed
        );
        log.record_task(&format!("link: {}", bundle.name), status, Some(&message));
    }
    for failure in &result.link_result.errors {
        log.error(&failure.to_string());
    }
    for e in &result.errors {
        log.record_task("apply", TaskStatus::Failed, Some(&format!("{e:#}")));
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::apply::BundleOutcome;
    use crate::logging::isolated_logger;

    fn bundle(name: &str, linked: usize, skipped: usize, failed: usize) -> BundleOutcome {
        BundleOutcome {
            name: name.to_string(),
            linked,
            skipped,
            backed: 0,
            failed,
        }
    }

    #[test]
    fn one_task_per_bundle() {
        let (log, _tmp, _guard) = isolated_logger();
        let result = ApplyResult {
            bundles: vec![
                bundle("shell", 2, 0, 0),
                bundle("git", 0, 1, 0),
                bundle("nvim", 1, 0, 1),
            ],
            ..ApplyResult::default()
        };

        record(&result, false, &log);

        let tasks = log.task_entries();
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["link: shell", "link: git", "link: nvim"]);
        assert_eq!(tasks[0].status, TaskStatus::Ok);
        assert_eq!(tasks[1].status, TaskStatus::Skipped);
        assert_eq!(tasks[2].status, TaskStatus::Failed);
        assert_eq!(
            tasks[2].message.as_deref(),
            Some("1 linked, 0 unchanged, 0 backed up, 1 failed")
        );
    }

    #[test]
    fn dry_run_bundles_are_marked() {
        let (log, _tmp, _guard) = isolated_logger();
        let result = ApplyResult {
            bundles: vec![bundle("shell", 3, 0, 0)],
            ..ApplyResult::default()
        };
        record(&result, true, &log);
        let tasks = log.task_entries();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::DryRun);
    }
}
