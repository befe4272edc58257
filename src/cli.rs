use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "dotts",
    about = "Cross-machine dotfiles and package bootstrapper",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Configuration repository (defaults to DOTTS_REPO, then the recorded checkout)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install packages and link config bundles for a machine or profile
    Apply(ApplyOpts),
    /// Show managed links and the last applied machine
    Status,
    /// Remove managed links
    Unlink(UnlinkOpts),
    /// Put a backed-up file back in place
    Restore(RestoreOpts),
    /// Inspect or prune backups
    Backups {
        #[command(subcommand)]
        action: BackupsAction,
    },
    /// Print the inheritance chain of a machine
    Chain(ChainOpts),
    /// Print the install plan for this platform
    Plan(TargetOpts),
    /// List repository records
    List(ListOpts),
    /// Clone or register a configuration repository
    Init(InitOpts),
    /// Pull the repository and refresh package databases
    Update,
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Apply(_) => "apply",
            Self::Status => "status",
            Self::Unlink(_) => "unlink",
            Self::Restore(_) => "restore",
            Self::Backups { .. } => "backups",
            Self::Chain(_) => "chain",
            Self::Plan(_) => "plan",
            Self::List(_) => "list",
            Self::Init(_) => "init",
            Self::Update => "update",
            Self::Version => "version",
        }
    }
}

/// Machine or profile selection.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetOpts {
    /// Machine record to use
    #[arg(short, long, conflicts_with = "profile")]
    pub machine: Option<String>,

    /// Profile to use instead of a machine
    #[arg(short, long)]
    pub profile: Option<String>,
}

/// Options for the `apply` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ApplyOpts {
    #[command(flatten)]
    pub target: TargetOpts,

    /// Do not install packages
    #[arg(long)]
    pub skip_packages: bool,

    /// Do not link config bundles
    #[arg(long)]
    pub skip_dotfiles: bool,

    /// Replace symlinks dotts did not create
    #[arg(short, long)]
    pub force: bool,

    /// Replace existing files without backing them up
    #[arg(long = "no-backup", action = clap::ArgAction::SetFalse)]
    pub backup: bool,
}

/// Options for the `unlink` subcommand.
#[derive(Args, Debug, Clone)]
pub struct UnlinkOpts {
    /// Link to remove
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub target: Option<PathBuf>,

    /// Remove every managed link
    #[arg(long)]
    pub all: bool,
}

/// Options for the `restore` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RestoreOpts {
    /// Original path of the backed-up file
    pub path: PathBuf,
}

/// `backups` actions.
#[derive(Subcommand, Debug, Clone)]
pub enum BackupsAction {
    /// List recorded backups, newest first
    List,
    /// Delete old backups
    Clean {
        /// Remove backups older than this many days
        #[arg(long, default_value_t = 30)]
        older_than_days: u64,
    },
}

/// Options for the `chain` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ChainOpts {
    /// Machine record name
    pub machine: String,
}

/// Record kinds for `list`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// `profiles/*.yaml`
    Profiles,
    /// `machines/*.yaml`
    Machines,
    /// `packages/*.yaml`
    Packages,
    /// `configs/*/`
    Configs,
}

/// Options for the `list` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ListOpts {
    /// What to list
    #[arg(value_enum)]
    pub kind: ListKind,
}

/// Options for the `init` subcommand.
#[derive(Args, Debug, Clone)]
pub struct InitOpts {
    /// Git URL to clone, or a local repository path
    pub source: String,

    /// Branch to clone
    #[arg(short, long, default_value = crate::source::DEFAULT_BRANCH)]
    pub branch: String,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_with_machine() {
        let cli = Cli::parse_from(["dotts", "apply", "--machine", "laptop"]);
        assert!(matches!(
            &cli.command,
            Command::Apply(opts) if opts.target.machine.as_deref() == Some("laptop")
        ));
    }

    #[test]
    fn apply_backs_up_by_default() {
        let cli = Cli::parse_from(["dotts", "apply"]);
        assert!(matches!(&cli.command, Command::Apply(opts) if opts.backup && !opts.force));
        let cli = Cli::parse_from(["dotts", "apply", "--no-backup"]);
        assert!(matches!(&cli.command, Command::Apply(opts) if !opts.backup));
    }

    #[test]
    fn machine_and_profile_conflict() {
        let result =
            Cli::try_parse_from(["dotts", "plan", "--machine", "laptop", "--profile", "base"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dotts", "status", "-d", "-v", "--repo", "/tmp/dots"]);
        assert!(cli.global.dry_run);
        assert!(cli.verbose);
        assert_eq!(cli.global.repo, Some(PathBuf::from("/tmp/dots")));
    }

    #[test]
    fn unlink_requires_target_or_all() {
        assert!(Cli::try_parse_from(["dotts", "unlink"]).is_err());
        let cli = Cli::parse_from(["dotts", "unlink", "--all"]);
        assert!(matches!(&cli.command, Command::Unlink(opts) if opts.all));
    }

    #[test]
    fn backups_clean_default_age() {
        let cli = Cli::parse_from(["dotts", "backups", "clean"]);
        assert!(matches!(
            cli.command,
            Command::Backups {
                action: BackupsAction::Clean {
                    older_than_days: 30
                }
            }
        ));
    }

    #[test]
    fn list_kind_is_validated() {
        let cli = Cli::parse_from(["dotts", "list", "machines"]);
        assert!(matches!(&cli.command, Command::List(opts) if opts.kind == ListKind::Machines));
        assert!(Cli::try_parse_from(["dotts", "list", "fonts"]).is_err());
    }

    #[test]
    fn init_defaults_branch() {
        let cli = Cli::parse_from(["dotts", "init", "https://github.com/me/dots"]);
        assert!(matches!(&cli.command, Command::Init(opts) if opts.branch == "main"));
        assert_eq!(cli.command.name(), "init");
    }
}
