//! Read-only commands over the repository: `chain`, `plan` and `list`.
use anyhow::Result;

use super::CommandSetup;
use crate::apply::{ApplyOptions, Applier};
use crate::cli::{ChainOpts, GlobalOpts, ListKind, ListOpts, TargetOpts};
use crate::config::Resolver;
use crate::installer::{InstallPlan, Registry};
use crate::logging::Logger;
use crate::paths::AppPaths;

/// Print the profiles a machine inherits, ancestors first.
///
/// # Errors
///
/// Returns an error if the machine or an inherited profile is missing, or
/// inheritance is cyclic.
pub fn chain(global: &GlobalOpts, opts: &ChainOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let loader = setup.loader()?;
    let chain = Resolver::new(&loader).inheritance_chain(&opts.machine)?;
    log.info(&render_chain(&opts.machine, &chain));
    Ok(())
}

/// `base -> desktop -> [laptop]`
fn render_chain(machine: &str, profiles: &[String]) -> String {
    let mut parts = profiles.to_vec();
    parts.push(format!("[{machine}]"));
    parts.join(" -> ")
}

/// Print the install plan buckets for this platform.
///
/// # Errors
///
/// Returns an error if resolution fails.
pub fn plan(global: &GlobalOpts, opts: &TargetOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let loader = setup.loader()?;
    let registry = Registry::new();
    let applier = Applier::new(
        &loader,
        &setup.system,
        &setup.paths,
        &registry,
        setup.executor.clone(),
    );
    let resolved = applier.resolve(&ApplyOptions {
        machine: opts.machine.clone(),
        profile: opts.profile.clone(),
        ..ApplyOptions::default()
    })?;

    let plan = InstallPlan::for_platform(&resolved.packages, &setup.system);
    log.stage(&format!(
        "Install plan for {} {} ({} packages)",
        setup.system.os,
        setup.system.distro,
        plan.total()
    ));
    if plan.is_empty() {
        log.info("nothing to install");
    }
    for line in plan.summary().lines() {
        log.info(line);
    }
    if !resolved.configs.is_empty() {
        log.stage("Config bundles");
        log.info(&resolved.configs.join(", "));
    }
    Ok(())
}

/// List profiles, machines, package groups or config bundles.
///
/// # Errors
///
/// Returns an error if the repository cannot be read.
pub fn list(global: &GlobalOpts, opts: &ListOpts, paths: &AppPaths, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, paths)?;
    let loader = setup.loader()?;
    let names = match opts.kind {
        ListKind::Profiles => loader.list_profiles()?,
        ListKind::Machines => loader.list_machines()?,
        ListKind::Packages => loader.list_package_manifests()?,
        ListKind::Configs => loader.list_configs()?,
    };
    if names.is_empty() {
        log.info("none");
    }
    for name in names {
        log.info(&name);
    }
    Ok(())
}
