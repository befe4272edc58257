//! Per-platform install plans.
use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;

use crate::config::PackageManifest;
use crate::platform::{Distro, Os, SystemInfo};

/// One slice of an [`InstallPlan`], handled by a single backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// nixpkgs, on every platform.
    Nix,
    /// Arch repositories.
    Pacman,
    /// Arch User Repository.
    Aur,
    /// Debian and Ubuntu.
    Apt,
    /// Fedora.
    Dnf,
    /// Homebrew formulae.
    Brew,
    /// Homebrew casks.
    Cask,
}

impl Bucket {
    /// Buckets in execution order.
    pub const ALL: [Self; 7] = [
        Self::Nix,
        Self::Pacman,
        Self::Aur,
        Self::Apt,
        Self::Dnf,
        Self::Brew,
        Self::Cask,
    ];

    /// Registry name of the backend that installs this bucket.
    #[must_use]
    pub const fn backend(self) -> &'static str {
        match self {
            Self::Nix => "nix",
            Self::Pacman => "pacman",
            Self::Aur => "yay",
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Brew => "brew",
            Self::Cask => "cask",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nix => "nix",
            Self::Pacman => "pacman",
            Self::Aur => "aur",
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Brew => "brew",
            Self::Cask => "cask",
        };
        f.write_str(name)
    }
}

/// Packages to install, grouped by backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    /// nixpkgs attributes.
    pub nix: Vec<String>,
    /// pacman packages.
    pub pacman: Vec<String>,
    /// AUR packages.
    pub aur: Vec<String>,
    /// apt packages.
    pub apt: Vec<String>,
    /// dnf packages.
    pub dnf: Vec<String>,
    /// Homebrew formulae.
    pub brew: Vec<String>,
    /// Homebrew casks.
    pub cask: Vec<String>,
}

impl InstallPlan {
    /// Select the parts of `manifest` that apply to `system`.
    ///
    /// nix packages always apply. The distribution picks the system package
    /// list; Ubuntu falls back to the Debian list when it has none of its
    /// own. Homebrew lists apply on macOS regardless of distribution.
    #[must_use]
    pub fn for_platform(manifest: &PackageManifest, system: &SystemInfo) -> Self {
        let mut plan = Self {
            nix: manifest.nix.clone(),
            ..Self::default()
        };

        let packages = &manifest.system;
        match system.distro {
            Distro::Arch => {
                plan.pacman.clone_from(&packages.arch);
                plan.aur.clone_from(&manifest.aur);
            }
            Distro::Debian => plan.apt.clone_from(&packages.debian),
            Distro::Ubuntu => {
                let list = if packages.ubuntu.is_empty() {
                    &packages.debian
                } else {
                    &packages.ubuntu
                };
                plan.apt.clone_from(list);
            }
            Distro::Fedora => plan.dnf.clone_from(&packages.fedora),
            Distro::NixOs | Distro::MacOs | Distro::Unknown => {}
        }

        if system.os == Os::Darwin {
            plan.brew.clone_from(&manifest.brew);
            plan.cask.clone_from(&manifest.cask);
        }
        plan
    }

    /// Packages in `bucket`.
    #[must_use]
    pub fn packages(&self, bucket: Bucket) -> &[String] {
        match bucket {
            Bucket::Nix => &self.nix,
            Bucket::Pacman => &self.pacman,
            Bucket::Aur => &self.aur,
            Bucket::Apt => &self.apt,
            Bucket::Dnf => &self.dnf,
            Bucket::Brew => &self.brew,
            Bucket::Cask => &self.cask,
        }
    }

    /// Non-empty buckets in execution order.
    pub fn buckets(&self) -> impl Iterator<Item = (Bucket, &[String])> + '_ {
        Bucket::ALL
            .into_iter()
            .map(|bucket| (bucket, self.packages(bucket)))
            .filter(|(_, packages)| !packages.is_empty())
    }

    /// True when no bucket has packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets().next().is_none()
    }

    /// Number of packages across all buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.buckets().map(|(_, packages)| packages.len()).sum()
    }

    /// One line per non-empty bucket: `bucket (n): a, b, c`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (bucket, packages) in self.buckets() {
            let _ = writeln!(
                out,
                "{bucket} ({}): {}",
                packages.len(),
                packages.join(", ")
            );
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::SystemPackages;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn manifest() -> PackageManifest {
        PackageManifest {
            nix: strings(&["ripgrep", "fd"]),
            system: SystemPackages {
                arch: strings(&["base-devel"]),
                debian: strings(&["git", "curl"]),
                ubuntu: Vec::new(),
                fedora: strings(&["gcc"]),
                darwin: Vec::new(),
            },
            aur: strings(&["paru-bin"]),
            brew: strings(&["jq"]),
            cask: strings(&["wezterm"]),
            ..PackageManifest::default()
        }
    }

    #[test]
    fn ubuntu_falls_back_to_debian() {
        let system = SystemInfo::new(Os::Linux, Distro::Ubuntu);
        let plan = InstallPlan::for_platform(&manifest(), &system);
        assert_eq!(plan.apt, vec!["git", "curl"]);
        assert!(plan.pacman.is_empty());
        assert!(plan.brew.is_empty());
    }

    #[test]
    fn ubuntu_list_wins_when_present() {
        let mut m = manifest();
        m.system.ubuntu = strings(&["build-essential"]);
        let plan = InstallPlan::for_platform(&m, &SystemInfo::new(Os::Linux, Distro::Ubuntu));
        assert_eq!(plan.apt, vec!["build-essential"]);
    }

    #[test]
    fn arch_gets_pacman_and_aur() {
        let plan =
            InstallPlan::for_platform(&manifest(), &SystemInfo::new(Os::Linux, Distro::Arch));
        assert_eq!(plan.pacman, vec!["base-devel"]);
        assert_eq!(plan.aur, vec!["paru-bin"]);
        assert!(plan.apt.is_empty());
    }

    #[test]
    fn darwin_gets_brew_and_cask() {
        let plan =
            InstallPlan::for_platform(&manifest(), &SystemInfo::new(Os::Darwin, Distro::MacOs));
        assert_eq!(plan.brew, vec!["jq"]);
        assert_eq!(plan.cask, vec!["wezterm"]);
        assert_eq!(plan.nix, vec!["ripgrep", "fd"]);
    }

    #[test]
    fn buckets_skip_empty_in_order() {
        let plan =
            InstallPlan::for_platform(&manifest(), &SystemInfo::new(Os::Linux, Distro::Arch));
        let order: Vec<Bucket> = plan.buckets().map(|(b, _)| b).collect();
        assert_eq!(order, vec![Bucket::Nix, Bucket::Pacman, Bucket::Aur]);
        assert_eq!(plan.total(), 4);
        assert!(!plan.is_empty());
        assert!(InstallPlan::default().is_empty());
    }

    #[test]
    fn unknown_distro_only_gets_nix() {
        let plan =
            InstallPlan::for_platform(&manifest(), &SystemInfo::new(Os::Linux, Distro::Unknown));
        assert_eq!(plan.total(), 2);
    }

    #[test]
    fn summary_rendering() {
        let plan =
            InstallPlan::for_platform(&manifest(), &SystemInfo::new(Os::Linux, Distro::Arch));
        insta::assert_snapshot!(plan.summary(), @r"
        nix (2): ripgrep, fd
        pacman (1): base-devel
        aur (1): paru-bin
        ");
    }
}
