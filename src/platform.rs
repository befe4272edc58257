//! System detection: operating system, distribution, architecture and identity.
use std::fmt;
use std::path::{Path, PathBuf};

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Any Linux kernel.
    Linux,
    /// macOS.
    Darwin,
    /// Anything else.
    Unknown,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Darwin => write!(f, "darwin"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detected distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distro {
    /// Arch Linux and derivatives (`CachyOS`, `EndeavourOS`, Manjaro).
    Arch,
    /// Debian.
    Debian,
    /// Ubuntu.
    Ubuntu,
    /// Fedora.
    Fedora,
    /// `NixOS`.
    NixOs,
    /// macOS.
    MacOs,
    /// Unrecognised.
    Unknown,
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Arch => "arch",
            Self::Debian => "debian",
            Self::Ubuntu => "ubuntu",
            Self::Fedora => "fedora",
            Self::NixOs => "nixos",
            Self::MacOs => "macos",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Detected CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    /// `x86_64`.
    Amd64,
    /// `aarch64`.
    Arm64,
    /// Anything else.
    Unknown,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amd64 => write!(f, "amd64"),
            Self::Arm64 => write!(f, "arm64"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identity and platform of the machine being configured.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    /// Operating system.
    pub os: Os,
    /// Distribution family.
    pub distro: Distro,
    /// CPU architecture.
    pub arch: Arch,
    /// Short host name.
    pub hostname: String,
    /// Login name of the invoking user.
    pub username: String,
    /// The user's home directory; link targets are rooted here.
    pub home_dir: PathBuf,
}

impl SystemInfo {
    /// Detect the current system.
    #[must_use]
    pub fn detect() -> Self {
        let os = detect_os();
        let hostname = whoami::fallible::hostname()
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let home_dir = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/"), PathBuf::from);
        Self {
            os,
            distro: detect_distro(os),
            arch: detect_arch(),
            hostname,
            username: whoami::username(),
            home_dir,
        }
    }

    /// Create a system description with explicit platform values.
    ///
    /// Host name defaults to `localhost`, user to `user`, home to `/`.
    #[must_use]
    pub fn new(os: Os, distro: Distro) -> Self {
        Self {
            os,
            distro,
            arch: Arch::Amd64,
            hostname: "localhost".to_string(),
            username: "user".to_string(),
            home_dir: PathBuf::from("/"),
        }
    }

    /// Override the host name.
    #[must_use]
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }

    /// Override the home directory.
    #[must_use]
    pub fn with_home(mut self, home: &Path) -> Self {
        self.home_dir = home.to_path_buf();
        self
    }

    /// Whether the invoking user is root (package managers then run without sudo).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.username == "root"
    }
}

const fn detect_os() -> Os {
    if cfg!(target_os = "linux") {
        Os::Linux
    } else if cfg!(target_os = "macos") {
        Os::Darwin
    } else {
        Os::Unknown
    }
}

const fn detect_arch() -> Arch {
    if cfg!(target_arch = "x86_64") {
        Arch::Amd64
    } else if cfg!(target_arch = "aarch64") {
        Arch::Arm64
    } else {
        Arch::Unknown
    }
}

fn detect_distro(os: Os) -> Distro {
    match os {
        Os::Darwin => Distro::MacOs,
        Os::Unknown => Distro::Unknown,
        Os::Linux => {
            if Path::new("/etc/arch-release").exists() {
                return Distro::Arch;
            }
            if Path::new("/etc/nixos").exists() {
                return Distro::NixOs;
            }
            std::fs::read_to_string("/etc/os-release")
                .map_or(Distro::Unknown, |content| distro_from_os_release(&content))
        }
    }
}

/// Map the contents of an `os-release` file to a [`Distro`].
///
/// `ID` is consulted first, then each word of `ID_LIKE`.
#[must_use]
pub fn distro_from_os_release(content: &str) -> Distro {
    let mut id = None;
    let mut id_like = None;
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').to_lowercase();
            match key.trim() {
                "ID" => id = Some(value),
                "ID_LIKE" => id_like = Some(value),
                _ => {}
            }
        }
    }

    let by_id = |id: &str| match id {
        "arch" | "cachyos" | "endeavouros" | "manjaro" => Some(Distro::Arch),
        "ubuntu" => Some(Distro::Ubuntu),
        "debian" => Some(Distro::Debian),
        "fedora" => Some(Distro::Fedora),
        "nixos" => Some(Distro::NixOs),
        _ => None,
    };

    id.as_deref()
        .and_then(by_id)
        .or_else(|| {
            id_like
                .as_deref()
                .and_then(|like| like.split_whitespace().find_map(by_id))
        })
        .unwrap_or(Distro::Unknown)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn detect_returns_home() {
        let info = SystemInfo::detect();
        assert!(!info.hostname.is_empty());
        assert!(!info.home_dir.as_os_str().is_empty());
    }

    #[test]
    fn os_release_arch_derivatives() {
        assert_eq!(distro_from_os_release("ID=cachyos\n"), Distro::Arch);
        assert_eq!(distro_from_os_release("ID=\"manjaro\"\n"), Distro::Arch);
    }

    #[test]
    fn os_release_ubuntu_before_debian() {
        let content = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\n";
        assert_eq!(distro_from_os_release(content), Distro::Ubuntu);
    }

    #[test]
    fn os_release_falls_back_to_id_like() {
        let content = "ID=pop\nID_LIKE=\"ubuntu debian\"\n";
        assert_eq!(distro_from_os_release(content), Distro::Ubuntu);
    }

    #[test]
    fn os_release_unknown() {
        assert_eq!(distro_from_os_release("ID=gentoo\n"), Distro::Unknown);
        assert_eq!(distro_from_os_release(""), Distro::Unknown);
    }

    #[test]
    fn new_sets_defaults() {
        let info = SystemInfo::new(Os::Linux, Distro::Fedora).with_hostname("work");
        assert_eq!(info.hostname, "work");
        assert_eq!(info.distro, Distro::Fedora);
        assert!(!info.is_root());
    }

    #[test]
    fn display_values() {
        assert_eq!(Os::Darwin.to_string(), "darwin");
        assert_eq!(Distro::NixOs.to_string(), "nixos");
        assert_eq!(Arch::Arm64.to_string(), "arm64");
    }
}
