//! Structured logger with dry-run awareness and summary collection.
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{TaskEntry, TaskStatus};

/// Front-end logger used by command handlers.
///
/// Messages go through [`tracing`], so they reach both the console and the
/// log file installed by [`init_subscriber`](super::init_subscriber). Unit
/// outcomes are collected for the end-of-run summary.
#[derive(Debug)]
pub struct Logger {
    tasks: Mutex<Vec<TaskEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger; `log_file` is only shown in the summary.
    #[must_use]
    pub fn new(log_file: Option<&Path>) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            log_file: log_file.map(Path::to_path_buf),
        }
    }

    /// Recorded entries, in order.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (console only when verbose).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log an action that a dry run skipped.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a unit outcome for the summary.
    pub fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
    }

    /// Whether any recorded unit failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Number of failed units.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count()
    }

    /// Log every recorded outcome followed by per-status totals.
    pub fn print_summary(&self) {
        let tasks = self.task_entries();
        if tasks.is_empty() {
            return;
        }

        self.stage("Summary");
        let (mut ok, mut skipped, mut dry_run, mut failed) = (0usize, 0usize, 0usize, 0usize);
        for task in &tasks {
            match task.status {
                TaskStatus::Ok => ok += 1,
                TaskStatus::Skipped => skipped += 1,
                TaskStatus::DryRun => dry_run += 1,
                TaskStatus::Failed => failed += 1,
            }
            let (icon, color) = task.status.style();
            let suffix = task
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", task.name));
        }

        self.info(&format!(
            "{} units: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[31m{failed} failed\x1b[0m",
            tasks.len()
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn records_tasks_in_order() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_task("packages: pacman", TaskStatus::Ok, None);
        log.record_task("link: nvim", TaskStatus::Skipped, Some("up to date"));
        let tasks = log.task_entries();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "packages: pacman");
        assert_eq!(tasks[1].message.as_deref(), Some("up to date"));
    }

    #[test]
    fn failure_count_counts_only_failed() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(!log.has_failures());
        log.record_task("a", TaskStatus::Ok, None);
        log.record_task("b", TaskStatus::Failed, Some("exit status 1"));
        log.record_task("c", TaskStatus::Failed, None);
        log.record_task("d", TaskStatus::DryRun, None);
        assert_eq!(log.failure_count(), 2);
        assert!(log.has_failures());
    }

    #[test]
    fn levels_are_tagged_in_file() {
        let (log, tmp, _guard) = isolated_logger();
        log.stage("Linking");
        log.dry_run("would link ~/.bashrc");
        log.warn("skipping cask");
        log.error("pacman failed");
        log.debug("chose bashrc##os.linux");

        let contents = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert!(contents.contains("==> Linking"));
        assert!(contents.contains("[dry run] would link ~/.bashrc"));
        assert!(contents.contains("[warn] skipping cask"));
        assert!(contents.contains("[error] pacman failed"));
        assert!(contents.contains("chose bashrc##os.linux"));
    }

    #[test]
    fn summary_is_written_without_ansi() {
        let (log, tmp, _guard) = isolated_logger();
        log.record_task("link: git", TaskStatus::Ok, None);
        log.record_task("packages: apt", TaskStatus::Failed, Some("exit status 100"));
        log.print_summary();

        let contents = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert!(contents.contains("✗ packages: apt (exit status 100)"));
        assert!(contents.contains("2 units: 1 ok, 0 skipped, 0 dry-run, 1 failed"));
        assert!(!contents.contains('\x1b'));
    }
}
