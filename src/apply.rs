//! End-to-end apply: resolve, install packages, link bundles, record state.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, anyhow};

use crate::config::{AlternateContext, AlternateResolver, Loader, ResolvedConfig, Resolver};
use crate::error::{ConfigError, DottsError, FsError, RecordKind};
use crate::exec::Executor;
use crate::installer::{InstallPlan, InstallResult, Orchestrator, Registry};
use crate::linker::{LinkOptions, LinkResult, Linker};
use crate::logging::DRY_RUN_TARGET;
use crate::paths::AppPaths;
use crate::platform::SystemInfo;
use crate::state::{MachineState, State};
use crate::template::TemplateValues;

/// What an apply run should do.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Report decisions without changing anything.
    pub dry_run: bool,
    /// Leave packages alone.
    pub skip_packages: bool,
    /// Leave config bundles alone.
    pub skip_dotfiles: bool,
    /// Machine record to apply.
    pub machine: Option<String>,
    /// Profile to apply when no machine is given.
    pub profile: Option<String>,
    /// Replace symlinks dotts does not own.
    pub force: bool,
    /// Back up real files before replacing them.
    pub backup: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            skip_packages: false,
            skip_dotfiles: false,
            machine: None,
            profile: None,
            force: false,
            backup: true,
        }
    }
}

/// Everything an apply run did.
#[derive(Debug, Default)]
pub struct ApplyResult {
    /// The configuration that was applied.
    pub resolved: ResolvedConfig,
    /// The package plan for this platform.
    pub plan: InstallPlan,
    /// One entry per bucket that ran.
    pub package_results: Vec<InstallResult>,
    /// Aggregated outcome of every linked bundle.
    pub link_result: LinkResult,
    /// Per-bundle counts, in link order.
    pub bundles: Vec<BundleOutcome>,
    /// Failures that did not abort the run.
    pub errors: Vec<anyhow::Error>,
}

/// What linking one config bundle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutcome {
    /// Bundle name under `configs/`.
    pub name: String,
    /// Units deployed.
    pub linked: usize,
    /// Units left alone.
    pub skipped: usize,
    /// Backup copies taken.
    pub backed: usize,
    /// Units that failed.
    pub failed: usize,
}

impl BundleOutcome {
    fn of(name: &str, result: &LinkResult) -> Self {
        Self {
            name: name.to_string(),
            linked: result.linked.len(),
            skipped: result.skipped.len(),
            backed: result.backed.len(),
            failed: result.errors.len(),
        }
    }
}

impl ApplyResult {
    /// Whether anything failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
            || !self.link_result.success()
            || self.package_results.iter().any(|r| !r.success())
    }
}

/// Runs apply against one repository.
#[derive(Debug)]
pub struct Applier<'a> {
    loader: &'a Loader,
    system: &'a SystemInfo,
    paths: &'a AppPaths,
    registry: &'a Registry,
    executor: Arc<dyn Executor>,
    personal: TemplateValues,
}

impl<'a> Applier<'a> {
    /// Create an applier.
    #[must_use]
    pub fn new(
        loader: &'a Loader,
        system: &'a SystemInfo,
        paths: &'a AppPaths,
        registry: &'a Registry,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            loader,
            system,
            paths,
            registry,
            executor,
            personal: TemplateValues::new(),
        }
    }

    /// Template values from `personal.yaml`; they win over repository settings.
    #[must_use]
    pub fn with_personal(mut self, values: TemplateValues) -> Self {
        self.personal = values;
        self
    }

    /// Pick and resolve the record to apply.
    ///
    /// Order: the requested machine, the requested profile, the repository's
    /// `default_machine`, then a machine named after the host.
    ///
    /// # Errors
    ///
    /// Fails when nothing can be resolved or resolution itself fails.
    pub fn resolve(&self, options: &ApplyOptions) -> Result<ResolvedConfig, ConfigError> {
        let resolver = Resolver::new(self.loader);
        if let Some(machine) = &options.machine {
            return resolver.resolve_machine(machine);
        }
        if let Some(profile) = &options.profile {
            return resolver.resolve_profile(profile);
        }
        if let Some(machine) = self.loader.load_repo_config()?.default_machine {
            return resolver.resolve_machine(&machine);
        }
        if self.loader.machine_exists(&self.system.hostname) {
            return resolver.resolve_machine(&self.system.hostname);
        }
        Err(ConfigError::NotFound {
            kind: RecordKind::Machine,
            name: self.system.hostname.clone(),
            path: self
                .loader
                .root()
                .join("machines")
                .join(format!("{}.yaml", self.system.hostname)),
            chain: Vec::new(),
        })
    }

    /// Template values for `resolved`: personal values, then flattened
    /// settings for keys personal values do not define.
    #[must_use]
    pub fn template_values(&self, resolved: &ResolvedConfig) -> TemplateValues {
        let mut values = self.personal.clone();
        for (key, value) in resolved.flat_settings() {
            values.entry(key).or_insert(value);
        }
        values
    }

    /// Apply the selected machine or profile.
    ///
    /// Package, link and script failures are collected in
    /// [`ApplyResult::errors`] and do not stop the run.
    ///
    /// # Errors
    ///
    /// Returns an error only when resolution fails or the link store cannot
    /// be opened.
    pub fn apply(
        &self,
        options: &ApplyOptions,
        cancel: &AtomicBool,
    ) -> Result<ApplyResult, DottsError> {
        let resolved = self.resolve(options)?;
        tracing::info!(
            "applying {}",
            resolved
                .machine
                .as_deref()
                .map_or_else(
                    || format!("profile {}", resolved.profile.as_deref().unwrap_or("-")),
                    |m| format!("machine {m}")
                )
        );

        let mut result = ApplyResult {
            plan: InstallPlan::for_platform(&resolved.packages, self.system),
            ..ApplyResult::default()
        };

        self.run_scripts("pre_install", &resolved.scripts.pre_install, options, &mut result);

        if !options.skip_packages {
            self.install_packages(options, cancel, &mut result);
        }

        if !options.skip_dotfiles && !cancel.load(Ordering::SeqCst) {
            self.link_configs(&resolved, options, &mut result)?;
        }

        if cancel.load(Ordering::SeqCst) {
            result.errors.push(anyhow!("interrupted"));
            result.resolved = resolved;
            return Ok(result);
        }

        self.run_scripts(
            "post_install",
            &resolved.scripts.post_install,
            options,
            &mut result,
        );

        if !options.dry_run
            && let Err(e) = self.record_state(&resolved)
        {
            result.errors.push(e.into());
        }

        result.resolved = resolved;
        Ok(result)
    }

    fn install_packages(&self, options: &ApplyOptions, cancel: &AtomicBool, result: &mut ApplyResult) {
        if result.plan.is_empty() {
            tracing::info!("no packages to install");
            return;
        }
        if options.dry_run {
            for line in result.plan.summary().lines() {
                tracing::info!(target: DRY_RUN_TARGET, "would install {line}");
            }
            return;
        }
        result.package_results = Orchestrator::new(self.registry).execute(&result.plan, cancel);
        for r in &result.package_results {
            if let Some(e) = &r.error {
                tracing::error!("{e}");
            }
        }
    }

    fn link_configs(
        &self,
        resolved: &ResolvedConfig,
        options: &ApplyOptions,
        result: &mut ApplyResult,
    ) -> Result<(), DottsError> {
        if resolved.configs.is_empty() {
            return Ok(());
        }
        let context = AlternateContext::from_system(self.system, resolved.profile.as_deref());
        let linker = Linker::open(self.loader.clone(), &self.system.home_dir, self.paths)?
            .with_alternates(AlternateResolver::new(context));
        let link_options = LinkOptions {
            dry_run: options.dry_run,
            force: options.force,
            backup: options.backup,
            template_values: self.template_values(resolved),
        };

        for name in &resolved.configs {
            match linker.link_config(name, &link_options) {
                Ok(linked) => {
                    tracing::info!(
                        "{name}: {} linked, {} unchanged",
                        linked.linked.len(),
                        linked.skipped.len()
                    );
                    result.bundles.push(BundleOutcome::of(name, &linked));
                    result.link_result.merge(linked);
                }
                Err(e) => {
                    tracing::error!("{name}: {e}");
                    result
                        .errors
                        .push(anyhow::Error::new(e).context(format!("config {name}")));
                }
            }
        }

        if !options.dry_run
            && let Err(e) = linker.save()
        {
            result.errors.push(e.into());
        }
        Ok(())
    }

    fn run_scripts(
        &self,
        phase: &str,
        scripts: &[String],
        options: &ApplyOptions,
        result: &mut ApplyResult,
    ) {
        for script in scripts {
            if options.dry_run {
                tracing::info!(target: DRY_RUN_TARGET, "would run {phase}: {script}");
                continue;
            }
            tracing::info!("{phase}: {script}");
            if let Err(e) = self
                .executor
                .run("sh", &["-c", script])
                .with_context(|| format!("{phase} script failed: {script}"))
            {
                tracing::error!("{e:#}");
                result.errors.push(e);
            }
        }
    }

    fn record_state(&self, resolved: &ResolvedConfig) -> Result<(), FsError> {
        let mut state = State::load(&self.paths.state_file())?;
        state.set_machine(MachineState {
            name: resolved.machine.clone().unwrap_or_default(),
            hostname: self.system.hostname.clone(),
            os: self.system.os.to_string(),
            distro: self.system.distro.to_string(),
            profile: resolved.profile.clone().unwrap_or_default(),
        });
        state.features.clear();
        for feature in &resolved.features {
            state.add_feature(feature);
        }
        state.settings.clear();
        for (key, value) in &resolved.settings {
            match serde_json::to_value(value) {
                Ok(json) => {
                    state.settings.insert(key.clone(), json);
                }
                Err(e) => tracing::warn!("not recording setting {key}: {e}"),
            }
        }
        state.mark_applied();
        state.save()
    }
}
