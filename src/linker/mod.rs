//! Deploys config bundles into the home directory.
//!
//! A bundle at `configs/<name>/` mirrors the layout of `$HOME`. Entries at
//! the bundle root and inside its top-level directories are linked file by
//! file. Deeper directories (`.config/nvim`) are linked as one unit when
//! nothing real occupies the target; otherwise the linker descends and links
//! their files individually.
//!
//! Every unit the linker creates is recorded in the [`Manifest`]. A symlink
//! that is not in the manifest is never replaced unless `force` is set.
pub mod backup;
pub mod fs;
pub mod manifest;

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

pub use backup::{BackupEntry, BackupManager};
pub use manifest::{LinkEntry, Manifest};

use crate::config::Loader;
use crate::config::alternates::{AlternateResolver, VARIANT_MARKER, split_variant};
use crate::error::{ConfigError, DottsError, FsError, IoResultExt as _, RecordKind};
use crate::logging::DRY_RUN_TARGET;
use crate::paths::AppPaths;
use crate::template::{self, TemplateValues};

/// How [`Linker::link_config`] treats existing targets.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Decide but change nothing on disk or in the manifest.
    pub dry_run: bool,
    /// Replace symlinks the manifest does not own.
    pub force: bool,
    /// Copy real files and directories aside before replacing them.
    pub backup: bool,
    /// Values for `<<dotts:key>>` placeholders. When empty, templated files
    /// are linked like any other file.
    pub template_values: TemplateValues,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            backup: true,
            template_values: TemplateValues::new(),
        }
    }
}

/// A unit that could not be deployed.
#[derive(Debug)]
pub struct LinkFailure {
    /// File or directory in the repository.
    pub source: PathBuf,
    /// Intended target.
    pub target: PathBuf,
    /// What went wrong.
    pub error: FsError,
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to link {} -> {}: {}",
            self.target.display(),
            self.source.display(),
            self.error
        )
    }
}

impl Error for LinkFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// What [`Linker::link_config`] did.
#[derive(Debug, Default)]
pub struct LinkResult {
    /// Units deployed (or, in a dry run, that would be).
    pub linked: Vec<LinkEntry>,
    /// Targets left alone: already correct, or foreign symlinks.
    pub skipped: Vec<PathBuf>,
    /// Backup copies taken.
    pub backed: Vec<PathBuf>,
    /// Units that failed.
    pub errors: Vec<LinkFailure>,
}

impl LinkResult {
    /// True when no unit failed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Append everything from `other`.
    pub fn merge(&mut self, other: Self) {
        self.linked.extend(other.linked);
        self.skipped.extend(other.skipped);
        self.backed.extend(other.backed);
        self.errors.extend(other.errors);
    }
}

/// Health of the owned links.
#[derive(Debug, Default)]
pub struct LinkStatus {
    /// Entries whose target is in place.
    pub links: Vec<LinkEntry>,
    /// Entries whose target is gone or dangling.
    pub broken: Vec<PathBuf>,
    /// Entries whose target was replaced by something else.
    pub foreign: Vec<PathBuf>,
}

/// Outcome of [`Linker::unlink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    /// The link (or rendered file) was removed and forgotten.
    Removed,
    /// The manifest does not own the target.
    NotManaged,
    /// The target no longer is what was deployed; left alone.
    Foreign,
    /// Nothing exists at the target; the entry is kept.
    Missing,
}

impl fmt::Display for UnlinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed => write!(f, "removed"),
            Self::NotManaged => write!(f, "not managed by dotts"),
            Self::Foreign => write!(f, "changed since deployment, left alone"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// The symlink engine.
#[derive(Debug)]
pub struct Linker {
    loader: Loader,
    home: PathBuf,
    alternates: Option<AlternateResolver>,
    manifest: Manifest,
    backups: BackupManager,
}

impl Linker {
    /// Open the manifest and backup store under `paths` and deploy bundles
    /// from `loader`'s repository into `home`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or the backup index is unreadable.
    pub fn open(loader: Loader, home: &Path, paths: &AppPaths) -> Result<Self, FsError> {
        Ok(Self {
            loader,
            home: home.to_path_buf(),
            alternates: None,
            manifest: Manifest::load(&paths.manifest_file())?,
            backups: BackupManager::open(&paths.backups_dir(), &paths.backup_index_file())?,
        })
    }

    /// Select alternate files with `resolver`.
    #[must_use]
    pub fn with_alternates(mut self, resolver: AlternateResolver) -> Self {
        self.alternates = Some(resolver);
        self
    }

    /// The owned-link table.
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The backup store.
    #[must_use]
    pub const fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Expand `~` against the configured home and make `path` absolute.
    #[must_use]
    pub fn expand(&self, path: &Path) -> PathBuf {
        let expanded = path.to_str().map_or_else(
            || path.to_path_buf(),
            |s| {
                PathBuf::from(
                    shellexpand::tilde_with_context(s, || Some(self.home.to_string_lossy()))
                        .into_owned(),
                )
            },
        );
        std::path::absolute(&expanded).unwrap_or(expanded)
    }

    /// Deploy bundle `name`.
    ///
    /// Per-unit failures are collected in [`LinkResult::errors`]; only a
    /// missing bundle or an unreadable bundle directory fails the call.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when `configs/<name>` does not
    /// exist, or a filesystem error when it cannot be read.
    pub fn link_config(&self, name: &str, options: &LinkOptions) -> Result<LinkResult, DottsError> {
        let root = self.loader.config_path(name);
        if !root.is_dir() {
            return Err(ConfigError::NotFound {
                kind: RecordKind::ConfigBundle,
                name: name.to_string(),
                path: root,
                chain: Vec::new(),
            }
            .into());
        }
        let root = std::path::absolute(&root).fs_op("resolve", &root)?;

        let mut result = LinkResult::default();
        self.link_tree(&root, &root, options, &mut result)?;
        tracing::debug!(
            bundle = name,
            linked = result.linked.len(),
            skipped = result.skipped.len(),
            errors = result.errors.len(),
            "linked config bundle"
        );
        Ok(result)
    }

    fn link_tree(
        &self,
        root: &Path,
        dir: &Path,
        options: &LinkOptions,
        result: &mut LinkResult,
    ) -> Result<(), FsError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir).fs_op("read directory", dir)? {
            entries.push(entry.fs_op("read directory entry", dir)?);
        }
        entries.sort_by_key(std::fs::DirEntry::file_name);

        let mut file_bases: Vec<String> = Vec::new();
        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_dir() {
                let base = split_variant(&name).map_or(name.as_str(), |(base, _)| base);
                if !file_bases.iter().any(|b| b == base) {
                    file_bases.push(base.to_string());
                }
                continue;
            }
            if name.contains(VARIANT_MARKER) {
                tracing::debug!("skipping variant directory {}", path.display());
                continue;
            }
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let target = self.home.join(rel);
            let depth = rel.components().count();
            if depth >= 2 && !occupied_by_real_dir(&target) && !needs_per_file(&path, options) {
                self.link_unit(&path, &target, true, options, result);
                continue;
            }
            match self.release_dir_link(&target, options) {
                Ok(true) => {}
                Ok(false) => {
                    result.skipped.push(target);
                    continue;
                }
                Err(error) => {
                    result.errors.push(LinkFailure {
                        source: path,
                        target,
                        error,
                    });
                    continue;
                }
            }
            if let Err(error) = self.link_tree(root, &path, options, result) {
                result.errors.push(LinkFailure {
                    source: path,
                    target,
                    error,
                });
            }
        }

        for base in file_bases {
            let base_path = dir.join(&base);
            let Some(source) = self.choose(&base_path) else {
                tracing::debug!("no candidate selected for {}", base_path.display());
                continue;
            };
            let Ok(rel) = base_path.strip_prefix(root) else {
                continue;
            };
            let target = self.home.join(rel);
            self.link_unit(&source, &target, false, options, result);
        }
        Ok(())
    }

    /// Clear the way for descending into the directory at `target`.
    ///
    /// A directory link the manifest owns is removed and forgotten, so the
    /// per-file links land in a real directory instead of in the repository
    /// behind it. A foreign symlink is only removed with `force`. Returns
    /// `false` when the directory must be left alone.
    fn release_dir_link(&self, target: &Path, options: &LinkOptions) -> Result<bool, FsError> {
        if !fs::is_symlink(target) {
            return Ok(true);
        }
        let owned = self.manifest.get(target).is_some_and(|e| e.is_dir);
        if !owned && !options.force {
            tracing::warn!(
                "not descending into foreign symlink {} (use --force)",
                target.display()
            );
            return Ok(false);
        }
        if options.dry_run {
            tracing::info!(
                target: DRY_RUN_TARGET,
                "would replace directory link {} with per-file links",
                target.display()
            );
            return Ok(true);
        }
        fs::remove_path(target)?;
        if owned {
            self.manifest.remove(target);
        }
        tracing::debug!("released directory link {}", target.display());
        Ok(true)
    }

    /// The nearest ancestor of `target` below home that is a symlink.
    fn symlinked_ancestor(&self, target: &Path) -> Option<PathBuf> {
        target
            .ancestors()
            .skip(1)
            .take_while(|a| a.starts_with(&self.home) && *a != self.home)
            .find(|a| fs::is_symlink(a))
            .map(Path::to_path_buf)
    }

    /// The file to deploy for `base_path`, if any.
    fn choose(&self, base_path: &Path) -> Option<PathBuf> {
        let chosen = match &self.alternates {
            Some(resolver) => match resolver.resolve_file(base_path) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("{e}");
                    return None;
                }
            },
            None => base_path.to_path_buf(),
        };
        chosen.is_file().then_some(chosen)
    }

    fn link_unit(
        &self,
        source: &Path,
        target: &Path,
        is_dir: bool,
        options: &LinkOptions,
        result: &mut LinkResult,
    ) {
        if let Err(error) = self.try_link_unit(source, target, is_dir, options, result) {
            tracing::warn!("failed to link {}: {error}", target.display());
            result.errors.push(LinkFailure {
                source: source.to_path_buf(),
                target: target.to_path_buf(),
                error,
            });
        }
    }

    fn try_link_unit(
        &self,
        source: &Path,
        target: &Path,
        is_dir: bool,
        options: &LinkOptions,
        result: &mut LinkResult,
    ) -> Result<(), FsError> {
        // A dry run never releases directory links it would descend into.
        let mut through_released_link = false;
        if let Some(ancestor) = self.symlinked_ancestor(target) {
            let owned = self.manifest.get(&ancestor).is_some_and(|e| e.is_dir);
            if !(options.dry_run && (owned || options.force)) {
                return Err(FsError::UnsafeTarget {
                    path: target.to_path_buf(),
                    reason: format!("{} is a symlink", ancestor.display()),
                });
            }
            through_released_link = true;
        }

        let rendered = if is_dir || options.template_values.is_empty() {
            None
        } else {
            let content = std::fs::read(source).fs_op("read", source)?;
            match String::from_utf8(content) {
                Ok(text) if template::has_placeholders(&text) => {
                    Some(template::render(&text, &options.template_values))
                }
                _ => None,
            }
        };
        let is_template = rendered.is_some();
        let target_is_link = fs::is_symlink(target);

        if target_is_link {
            let current = fs::link_target(target);
            if !is_template && current.is_some_and(|c| fs::paths_equal(&c, source)) {
                tracing::debug!("already linked: {}", target.display());
                result.skipped.push(target.to_path_buf());
                return Ok(());
            }
            if !options.force && !self.manifest.contains(target) {
                tracing::warn!(
                    "not replacing foreign symlink {} (use --force)",
                    target.display()
                );
                result.skipped.push(target.to_path_buf());
                return Ok(());
            }
        } else if let Some(rendered) = &rendered
            && target.is_file()
            && std::fs::read(target).is_ok_and(|existing| existing == rendered.as_bytes())
        {
            tracing::debug!("template up to date: {}", target.display());
            result.skipped.push(target.to_path_buf());
            return Ok(());
        }

        if !target_is_link && !through_released_link && fs::path_exists(target) {
            let same = std::fs::canonicalize(target)
                .ok()
                .zip(std::fs::canonicalize(source).ok())
                .is_some_and(|(t, s)| t == s);
            if same {
                return Err(FsError::UnsafeTarget {
                    path: target.to_path_buf(),
                    reason: format!("it resolves to the source {}", source.display()),
                });
            }
        }

        let entry = LinkEntry {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            created_at: Utc::now(),
            is_dir,
            is_template,
        };

        if options.dry_run {
            tracing::info!(
                target: DRY_RUN_TARGET,
                "would link {} -> {}",
                target.display(),
                source.display()
            );
            result.linked.push(entry);
            return Ok(());
        }

        if target_is_link {
            fs::remove_path(target)?;
        } else if fs::path_exists(target) {
            let owned_render = target.is_file()
                && self
                    .manifest
                    .get(target)
                    .is_some_and(|owned| owned.is_template);
            if options.backup && !owned_render {
                let copy = self.backups.backup(target)?;
                result.backed.push(copy);
            }
            fs::remove_path(target)?;
        }

        fs::ensure_parent_dir(target)?;
        match &rendered {
            Some(text) => {
                std::fs::write(target, text).fs_op("write", target)?;
                if let Ok(meta) = std::fs::metadata(source) {
                    std::fs::set_permissions(target, meta.permissions())
                        .fs_op("set permissions", target)?;
                }
            }
            None => fs::create_symlink(source, target)?,
        }

        tracing::debug!("linked {} -> {}", target.display(), source.display());
        self.manifest.add(entry.clone());
        result.linked.push(entry);
        Ok(())
    }

    /// Remove the owned unit at `target`.
    ///
    /// Only a symlink still pointing at its recorded source, or a rendered
    /// template file, is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal itself fails.
    pub fn unlink(&self, target: &Path) -> Result<UnlinkOutcome, FsError> {
        let target = self.expand(target);
        let Some(entry) = self.manifest.get(&target) else {
            return Ok(UnlinkOutcome::NotManaged);
        };
        let meta = match std::fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(UnlinkOutcome::Missing),
            Err(e) => return Err(e).fs_op("inspect", &target),
        };

        let ours = if meta.file_type().is_symlink() {
            fs::link_target(&target).is_some_and(|c| fs::paths_equal(&c, &entry.source))
        } else {
            entry.is_template && meta.is_file()
        };
        if !ours {
            return Ok(UnlinkOutcome::Foreign);
        }

        fs::remove_path(&target)?;
        self.manifest.remove(&target);
        tracing::info!("unlinked {}", target.display());
        Ok(UnlinkOutcome::Removed)
    }

    /// [`unlink`](Self::unlink) every owned target.
    #[must_use]
    pub fn unlink_all(&self) -> Vec<(PathBuf, Result<UnlinkOutcome, FsError>)> {
        self.manifest
            .entries()
            .into_iter()
            .map(|entry| {
                let outcome = self.unlink(&entry.target);
                (entry.target, outcome)
            })
            .collect()
    }

    /// Classify every owned entry.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        let mut status = LinkStatus::default();
        for entry in self.manifest.entries() {
            let target = &entry.target;
            if !fs::path_exists(target) {
                status.broken.push(target.clone());
            } else if fs::is_symlink(target) {
                if !fs::link_target(target).is_some_and(|c| fs::paths_equal(&c, &entry.source)) {
                    status.foreign.push(target.clone());
                } else if !target.exists() {
                    status.broken.push(target.clone());
                } else {
                    status.links.push(entry);
                }
            } else if entry.is_template && target.is_file() {
                status.links.push(entry);
            } else {
                status.foreign.push(target.clone());
            }
        }
        status
    }

    /// Persist the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be written.
    pub fn save(&self) -> Result<(), FsError> {
        self.manifest.save()
    }

    /// Put the backed-up original of `path` back in place and stop managing
    /// whatever replaced it.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NoBackup`] if nothing was backed up for `path`.
    pub fn restore(&self, path: &Path) -> Result<(), FsError> {
        let path = self.expand(path);
        self.backups.restore(&path)?;
        self.manifest.remove(&path);
        Ok(())
    }
}

/// Whether `target` is a real directory (not a symlink to one).
fn occupied_by_real_dir(target: &Path) -> bool {
    std::fs::symlink_metadata(target).is_ok_and(|m| m.is_dir())
}

/// Whether `dir` holds files that must be handled one by one: alternates, or
/// templates when values are supplied.
fn needs_per_file(dir: &Path, options: &LinkOptions) -> bool {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .any(|e| {
            e.file_name().to_string_lossy().contains(VARIANT_MARKER)
                || (!options.template_values.is_empty()
                    && std::fs::read_to_string(e.path())
                        .is_ok_and(|text| template::has_placeholders(&text)))
        })
}
