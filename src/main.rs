use clap::Parser;
use log::LevelFilter;
use std::process::ExitCode;

use camgrab::cli::{self, Args, CliError, Command, ConfigAction};
use camgrab::config::{self, Config};
use camgrab::logging;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let config_path = args.config.clone().unwrap_or_else(config::default_path);
    let loaded = Config::load(Some(config_path.as_path()));

    let level = match (args.log_level, &loaded) {
        (Some(level), _) => level.into(),
        (None, Ok(config)) => config.log_level()?,
        (None, Err(_)) => LevelFilter::Info,
    };
    logging::init(level);

    // a broken file must not block writing a fresh one
    let config = match (&args.command, loaded) {
        (Command::Config { action: ConfigAction::Init { .. } }, Err(e)) => {
            log::warn!("{}", e);
            Config::default()
        }
        (_, loaded) => loaded?,
    };
    log::debug!("Using config file {}", config_path.display());

    match &args.command {
        Command::Run(run_args) => cli::run(run_args, &config),
        Command::Config { action } => cli::handle_config_action(action, &config, &config_path),
    }
}
