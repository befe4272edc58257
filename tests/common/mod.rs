// Shared helpers for integration tests.
//
// Provides a temporary configuration repository with a fake home directory
// and application data root, plus a scripted executor so package backends
// can be driven without touching the host.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};

use dotts::config::Loader;
use dotts::exec::{ExecResult, Executor};
use dotts::linker::Linker;
use dotts::paths::AppPaths;
use dotts::platform::{Distro, Os, SystemInfo};

/// An isolated repository, home directory and data root under one tempdir.
pub struct TestRepo {
    root: tempfile::TempDir,
    pub repo: PathBuf,
    pub home: PathBuf,
    pub paths: AppPaths,
}

impl TestRepo {
    /// Create the skeleton every repository needs: `configs/`, `profiles/`
    /// and `packages/`.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create tempdir");
        let repo = root.path().join("repo");
        let home = root.path().join("home");
        for dir in ["configs", "profiles", "packages", "machines"] {
            std::fs::create_dir_all(repo.join(dir)).expect("create repo dir");
        }
        std::fs::create_dir_all(&home).expect("create home dir");
        let paths = AppPaths::under(&root.path().join("data"));
        Self {
            root,
            repo,
            home,
            paths,
        }
    }

    /// Write `content` to `rel` inside the repository.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.repo.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        std::fs::write(&path, content).expect("write repo file");
        path
    }

    /// Builder-style form of [`TestRepo::write`].
    pub fn with(self, rel: &str, content: &str) -> Self {
        self.write(rel, content);
        self
    }

    /// Write `content` to `rel` inside the fake home directory.
    pub fn write_home(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.home.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        std::fs::write(&path, content).expect("write home file");
        path
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn loader(&self) -> Loader {
        Loader::new(&self.repo)
    }

    pub fn linker(&self) -> Linker {
        Linker::open(self.loader(), &self.home, &self.paths).expect("open linker")
    }

    /// A system description rooted at the fake home directory.
    pub fn system(&self, os: Os, distro: Distro, hostname: &str) -> SystemInfo {
        SystemInfo::new(os, distro)
            .with_hostname(hostname)
            .with_home(&self.home)
    }
}

/// Executor that never spawns anything.
///
/// `which` answers from a fixed set of programs. Installed-package queries
/// (`pacman -Qi`, `nix profile list`) answer from a fixed set of packages.
/// Every other command succeeds unless its program is listed as failing.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    programs: BTreeSet<String>,
    installed: BTreeSet<String>,
    failing: BTreeSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn with_programs(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn installed(mut self, packages: &[&str]) -> Self {
        self.installed = packages.iter().map(ToString::to_string).collect();
        self
    }

    /// Make every invocation of `program` exit non-zero.
    pub fn failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Each invocation as `program arg1 arg2 ...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn respond(&self, program: &str, args: &[&str]) -> ExecResult {
        let (success, stdout) = match (program, args) {
            (p, _) if self.failing.contains(p) => (false, String::new()),
            ("pacman", ["-Qi", package]) => (self.installed.contains(*package), String::new()),
            ("nix", ["profile", "list"]) => (
                true,
                self.installed
                    .iter()
                    .map(|p| format!("0 flake:nixpkgs#legacyPackages.x86_64-linux.{p}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => (true, String::new()),
        };
        ExecResult {
            stdout,
            stderr: if success { String::new() } else { "scripted failure".to_string() },
            success,
            code: Some(i32::from(!success)),
        }
    }
}

impl Executor for ScriptedExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let result = self.run_unchecked(program, args)?;
        if !result.success {
            bail!("{program} failed: {}", result.stderr);
        }
        Ok(result)
    }

    fn run_in(&self, _dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        self.run(program, args)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls.lock().expect("calls lock").push(line);
        Ok(self.respond(program, args))
    }

    fn which(&self, program: &str) -> bool {
        self.programs.contains(program)
    }
}
