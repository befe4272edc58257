//! Name-keyed table of installer backends.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::{
    AptInstaller, AurInstaller, BrewInstaller, DnfInstaller, Installer, NixInstaller,
    PacmanInstaller,
};
use crate::exec::Executor;
use crate::platform::SystemInfo;

/// Backends keyed by [`Installer::name`].
///
/// Registration and lookup may happen from several threads.
#[derive(Default)]
pub struct Registry {
    backends: RwLock<HashMap<String, Arc<dyn Installer>>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("backends", &self.names())
            .finish()
    }
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in backend.
    ///
    /// Backends that modify the system run under `sudo` unless `system`
    /// describes the root user.
    #[must_use]
    pub fn with_defaults(executor: &Arc<dyn Executor>, system: &SystemInfo) -> Self {
        let sudo = !system.is_root();
        let registry = Self::new();
        registry.register(Arc::new(NixInstaller::new(Arc::clone(executor))));
        registry.register(Arc::new(PacmanInstaller::new(Arc::clone(executor), sudo)));
        registry.register(Arc::new(AurInstaller::new(Arc::clone(executor))));
        registry.register(Arc::new(AptInstaller::new(Arc::clone(executor), sudo)));
        registry.register(Arc::new(DnfInstaller::new(Arc::clone(executor), sudo)));
        registry.register(Arc::new(BrewInstaller::formulae(Arc::clone(executor))));
        registry.register(Arc::new(BrewInstaller::casks(Arc::clone(executor))));
        registry
    }

    /// Add `installer`, replacing any backend with the same name.
    pub fn register(&self, installer: Arc<dyn Installer>) {
        let mut backends = self
            .backends
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        backends.insert(installer.name().to_string(), installer);
    }

    /// The backend registered as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Installer>> {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered backend names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Registered backends whose tooling is present, sorted by name.
    #[must_use]
    pub fn available(&self) -> Vec<Arc<dyn Installer>> {
        let mut available: Vec<Arc<dyn Installer>> = self
            .backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|installer| installer.available())
            .cloned()
            .collect();
        available.sort_by(|a, b| a.name().cmp(b.name()));
        available
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;
    use crate::platform::{Distro, Os};

    fn defaults(programs: &[&str], user: &str) -> Registry {
        let executor: Arc<dyn Executor> = Arc::new(MockExecutor::default().with_programs(programs));
        let mut system = SystemInfo::new(Os::Linux, Distro::Arch);
        system.username = user.to_string();
        Registry::with_defaults(&executor, &system)
    }

    #[test]
    fn defaults_register_every_backend() {
        let registry = defaults(&[], "user");
        assert_eq!(
            registry.names(),
            vec!["apt", "brew", "cask", "dnf", "nix", "pacman", "yay"]
        );
    }

    #[test]
    fn available_filters_and_sorts() {
        let registry = defaults(&["pacman", "nix"], "user");
        let names: Vec<String> = registry
            .available()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["nix", "pacman"]);
    }

    #[test]
    fn root_skips_sudo() {
        assert!(defaults(&[], "user").get("pacman").unwrap().needs_sudo());
        assert!(!defaults(&[], "root").get("pacman").unwrap().needs_sudo());
        assert!(!defaults(&[], "user").get("nix").unwrap().needs_sudo());
    }

    #[test]
    fn register_replaces_by_name() {
        let registry = Registry::new();
        let executor: Arc<dyn Executor> = Arc::new(MockExecutor::default());
        registry.register(Arc::new(PacmanInstaller::new(Arc::clone(&executor), true)));
        registry.register(Arc::new(PacmanInstaller::new(executor, false)));
        assert_eq!(registry.names(), vec!["pacman"]);
        assert!(!registry.get("pacman").unwrap().needs_sudo());
        assert!(registry.get("apt").is_none());
    }
}
