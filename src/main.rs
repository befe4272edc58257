use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use dotts::cli::{self, Command};
use dotts::commands;
use dotts::logging::{self, Logger};
use dotts::paths::AppPaths;

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return ExitCode::SUCCESS;
    }

    let paths = AppPaths::from_env();
    let log_file = paths.log_file(args.command.name());
    logging::init_subscriber(args.verbose, Some(&log_file));
    let log = Logger::new(Some(&log_file));

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log.debug(&format!("cannot install interrupt handler: {e}"));
    }

    let global = &args.global;
    let result = match &args.command {
        Command::Apply(opts) => commands::apply::run(global, opts, &paths, &log, &cancel),
        Command::Status => commands::links::status(global, &paths, &log),
        Command::Unlink(opts) => commands::links::unlink(global, opts, &paths, &log),
        Command::Restore(opts) => commands::links::restore(global, opts, &paths, &log),
        Command::Backups { action } => commands::backups::run(global, action, &paths, &log),
        Command::Chain(opts) => commands::inspect::chain(global, opts, &paths, &log),
        Command::Plan(opts) => commands::inspect::plan(global, opts, &paths, &log),
        Command::List(opts) => commands::inspect::list(global, opts, &paths, &log),
        Command::Init(opts) => commands::init::run(global, opts, &paths, &log),
        Command::Update => commands::update::run(global, &paths, &log),
        Command::Version => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
