//! Run summary entries.

/// Outcome of one unit of work, for the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    /// What the unit was (`packages: pacman`, `link: nvim`).
    pub name: String,
    /// Final status.
    pub status: TaskStatus,
    /// Optional detail (skip reason or error description).
    pub message: Option<String>,
}

/// Status of a completed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Completed and changed something.
    Ok,
    /// Nothing to do, or deliberately left alone.
    Skipped,
    /// Would have run; dry run was requested.
    DryRun,
    /// Could not complete.
    Failed,
}

impl TaskStatus {
    /// Summary icon and ANSI colour.
    pub(super) const fn style(self) -> (&'static str, &'static str) {
        match self {
            Self::Ok => ("✓", "\x1b[32m"),
            Self::Skipped => ("○", "\x1b[33m"),
            Self::DryRun => ("~", "\x1b[37m"),
            Self::Failed => ("✗", "\x1b[31m"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_has_distinct_icon() {
        let icons: Vec<&str> = [
            TaskStatus::Ok,
            TaskStatus::Skipped,
            TaskStatus::DryRun,
            TaskStatus::Failed,
        ]
        .iter()
        .map(|s| s.style().0)
        .collect();
        let mut unique = icons.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(icons.len(), unique.len());
    }
}
