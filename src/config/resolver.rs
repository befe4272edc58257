//! Profile and machine inheritance resolution.
//!
//! Profiles are walked depth-first with parents applied before children, so
//! for settings an ancestor resolved earlier wins over a descendant defining
//! the same key. A machine's own settings always win over anything inherited.
//!
//! Each public call starts a fresh session: every profile is applied at most
//! once per session (diamond inheritance), and reaching a profile that is
//! still being resolved is an error.
use std::collections::HashSet;

use super::loader::Loader;
use super::schema::{Profile, ResolvedConfig};
use crate::error::ConfigError;

/// Resolves machines and profiles from a [`Loader`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    loader: &'a Loader,
}

/// Per-call bookkeeping for the depth-first walk.
#[derive(Debug, Default)]
struct Session {
    /// Label of the record that started the walk (`machine:laptop`).
    origin: Option<String>,
    /// Profiles fully applied.
    done: HashSet<String>,
    /// Profiles currently on the walk stack, outermost first.
    stack: Vec<String>,
}

impl Session {
    fn new(origin: String) -> Self {
        Self {
            origin: Some(origin),
            ..Self::default()
        }
    }

    /// The chain of records that led to the current lookup.
    fn chain(&self) -> Vec<String> {
        self.origin
            .iter()
            .cloned()
            .chain(self.stack.iter().map(|p| format!("profile:{p}")))
            .collect()
    }

    /// Fill in the request chain on a not-found error.
    fn attach_chain(&self, err: ConfigError) -> ConfigError {
        match err {
            ConfigError::NotFound {
                kind, name, path, ..
            } => ConfigError::NotFound {
                kind,
                name,
                path,
                chain: self.chain(),
            },
            other => other,
        }
    }

    /// Enter `name`, or report whether it was already applied.
    ///
    /// Returns `Ok(false)` for an already-applied profile.
    fn enter(&mut self, name: &str) -> Result<bool, ConfigError> {
        if self.done.contains(name) {
            return Ok(false);
        }
        if self.stack.iter().any(|p| p == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(ConfigError::CycleDetected { chain });
        }
        self.stack.push(name.to_string());
        Ok(true)
    }

    fn leave(&mut self, name: &str) {
        self.stack.pop();
        self.done.insert(name.to_string());
    }
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `loader`.
    #[must_use]
    pub const fn new(loader: &'a Loader) -> Self {
        Self { loader }
    }

    /// Resolve machine `name` and every profile it inherits.
    ///
    /// # Errors
    ///
    /// Fails if the machine, any inherited profile or any referenced package
    /// group is missing or malformed, or if profile inheritance is cyclic.
    pub fn resolve_machine(&self, name: &str) -> Result<ResolvedConfig, ConfigError> {
        let machine = self.loader.load_machine(name)?;
        let mut session = Session::new(format!("machine:{name}"));
        let mut result = ResolvedConfig {
            machine: Some(name.to_string()),
            hostname: Some(machine.machine.hostname.clone()).filter(|h| !h.is_empty()),
            profile: machine.inherits.last().cloned(),
            ..ResolvedConfig::default()
        };

        for parent in &machine.inherits {
            self.walk(parent, &mut session, &mut result)?;
        }

        result.features.clone_from(&machine.features);
        for (key, value) in machine.settings {
            result.settings.insert(key, value);
        }
        tracing::debug!(
            machine = name,
            configs = result.configs.len(),
            settings = result.settings.len(),
            "resolved machine"
        );
        Ok(result)
    }

    /// Resolve profile `name` and its ancestors.
    ///
    /// # Errors
    ///
    /// Fails if the profile, any ancestor or any referenced package group is
    /// missing or malformed, or if inheritance is cyclic.
    pub fn resolve_profile(&self, name: &str) -> Result<ResolvedConfig, ConfigError> {
        let mut session = Session::default();
        let mut result = ResolvedConfig {
            profile: Some(name.to_string()),
            ..ResolvedConfig::default()
        };
        self.walk(name, &mut session, &mut result)?;
        tracing::debug!(
            profile = name,
            configs = result.configs.len(),
            "resolved profile"
        );
        Ok(result)
    }

    /// Profile names machine `name` inherits, ancestors first, without duplicates.
    ///
    /// # Errors
    ///
    /// Fails if the machine or any inherited profile is missing or malformed,
    /// or if inheritance is cyclic.
    pub fn inheritance_chain(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let machine = self.loader.load_machine(name)?;
        let mut session = Session::new(format!("machine:{name}"));
        let mut chain = Vec::new();
        for parent in &machine.inherits {
            self.collect_chain(parent, &mut session, &mut chain)?;
        }
        Ok(chain)
    }

    fn load(&self, name: &str, session: &Session) -> Result<Profile, ConfigError> {
        self.loader
            .load_profile(name)
            .map_err(|e| session.attach_chain(e))
    }

    fn walk(
        &self,
        name: &str,
        session: &mut Session,
        result: &mut ResolvedConfig,
    ) -> Result<(), ConfigError> {
        if session.done.contains(name) {
            return Ok(());
        }
        let profile = self.load(name, session)?;
        if !session.enter(name)? {
            return Ok(());
        }

        for parent in &profile.inherits {
            self.walk(parent, session, result)?;
        }

        result.add_configs(&profile.configs);
        for group in &profile.packages {
            let manifest = self
                .loader
                .load_packages(group)
                .map_err(|e| session.attach_chain(e))?;
            result.packages.merge(&manifest);
        }
        for (key, value) in &profile.settings {
            result
                .settings
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        result.scripts.extend(&profile.scripts);

        session.leave(name);
        Ok(())
    }

    fn collect_chain(
        &self,
        name: &str,
        session: &mut Session,
        chain: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        if session.done.contains(name) {
            return Ok(());
        }
        let profile = self.load(name, session)?;
        if !session.enter(name)? {
            return Ok(());
        }
        for parent in &profile.inherits {
            self.collect_chain(parent, session, chain)?;
        }
        chain.push(name.to_string());
        session.leave(name);
        Ok(())
    }
}
