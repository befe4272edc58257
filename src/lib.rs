//! Cross-machine dotfiles and package bootstrapper.
//!
//! A configuration repository describes profiles (bundles of configs,
//! package groups, settings and scripts), machines that inherit profiles,
//! and config bundles that mirror `$HOME`. `dotts` resolves a machine into a
//! flat configuration, installs its packages through the platform's package
//! managers, and links its bundles into the home directory.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: load repository records, resolve inheritance, pick alternates
//! - **[`installer`]**: per-platform install plans and package-manager backends
//! - **[`linker`]**: symlinks and rendered templates, with a manifest and backups
//! - **[`apply`]**: the end-to-end run tying the three together
//! - **[`commands`]**: top-level subcommand handlers
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod apply;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod installer;
pub mod linker;
pub mod logging;
pub mod paths;
pub mod personal;
pub mod platform;
pub mod source;
pub mod state;
pub mod template;
