//! Command: inspect and prune backups.
use std::time::Duration;

use anyhow::Result;
use chrono::Local;

use super::CommandSetup;
use crate::cli::{BackupsAction, GlobalOpts};
use crate::logging::Logger;
use crate::paths::AppPaths;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Run a `backups` action.
///
/// # Errors
///
/// Returns an error if the backup index cannot be read or written.
pub fn run(global: &GlobalOpts, action: &BackupsAction, paths: &AppPaths, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let linker = setup.linker()?;
    let backups = linker.backups();

    match action {
        BackupsAction::List => {
            let entries = backups.list();
            if entries.is_empty() {
                log.info("no backups");
            }
            for entry in entries {
                let kind = if entry.is_dir { "/" } else { "" };
                log.info(&format!(
                    "{}  {}{kind} -> {}",
                    entry.backed_up_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    entry.original_path.display(),
                    entry.backup_path.display()
                ));
            }
        }
        BackupsAction::Clean { older_than_days } => {
            let age = Duration::from_secs(older_than_days.saturating_mul(SECONDS_PER_DAY));
            if global.dry_run {
                log.dry_run(&format!(
                    "would remove backups older than {older_than_days} day(s)"
                ));
                return Ok(());
            }
            let removed = backups.clean(age)?;
            log.info(&format!("removed {removed} backup(s)"));
        }
    }
    Ok(())
}
