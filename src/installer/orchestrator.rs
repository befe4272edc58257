//! Sequential execution of an [`InstallPlan`].
use std::sync::atomic::{AtomicBool, Ordering};

use super::{InstallPlan, InstallResult, Installer, Registry};
use crate::error::InstallError;

/// Runs plans against the backends in a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator<'a> {
    registry: &'a Registry,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over `registry`.
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Install every non-empty bucket of `plan`, in order.
    ///
    /// Buckets whose backend is unregistered or unavailable are skipped and
    /// produce no result. A failing bucket does not stop later ones.
    /// `cancel` is checked before each bucket; once set, nothing further is
    /// scheduled.
    pub fn execute(&self, plan: &InstallPlan, cancel: &AtomicBool) -> Vec<InstallResult> {
        let mut results = Vec::new();
        for (bucket, packages) in plan.buckets() {
            if cancel.load(Ordering::SeqCst) {
                tracing::warn!("cancelled, not installing remaining buckets");
                break;
            }
            let Some(installer) = self
                .registry
                .get(bucket.backend())
                .filter(|installer| installer.available())
            else {
                tracing::debug!(
                    bucket = %bucket,
                    "backend {} not available, skipping {} package(s)",
                    bucket.backend(),
                    packages.len()
                );
                continue;
            };
            results.push(install_bucket(installer.as_ref(), packages));
        }
        results
    }

    /// Refresh the package database of every available backend.
    ///
    /// Returns the backends that failed, with their errors.
    #[must_use]
    pub fn update_all(&self) -> Vec<(String, InstallError)> {
        let mut failures = Vec::new();
        for installer in self.registry.available() {
            tracing::debug!("updating {}", installer.name());
            if let Err(e) = installer.update() {
                tracing::warn!("{e}");
                failures.push((installer.name().to_string(), e));
            }
        }
        failures
    }
}

/// Install the missing subset of `packages` with one backend call.
pub fn install_bucket(installer: &dyn Installer, packages: &[String]) -> InstallResult {
    let mut result = InstallResult::new(installer.name(), packages);
    let (present, missing): (Vec<String>, Vec<String>) = packages
        .iter()
        .cloned()
        .partition(|package| installer.is_installed(package));
    result.skipped = present;

    if missing.is_empty() {
        tracing::debug!(
            "{}: all {} package(s) already installed",
            installer.name(),
            packages.len()
        );
        return result;
    }

    match installer.install(&missing) {
        Ok(()) => {
            tracing::info!(
                "{}: installed {}",
                installer.name(),
                missing.join(", ")
            );
            result.installed = missing;
        }
        Err(e) => {
            tracing::debug!("{}", e.output());
            result.failed = missing;
            result.error = Some(e);
        }
    }
    result
}
