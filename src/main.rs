mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use nginx_agent::reporter::Reporter;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "nginx_agent=debug,nginx_agent_parser=debug,nginx_agent_log=debug"
    } else {
        "nginx_agent=info,nginx_agent_parser=info,nginx_agent_log=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match cli::load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    let reporter = Reporter::new(cli.format.into());

    match cli.command {
        Commands::Parse {
            files,
            prefix,
            simplify,
        } => cli::parse::run_parse(&settings, &files, prefix, simplify, &reporter),
        Commands::Files { file, ssl } => cli::files::run_files(&settings, file, ssl, &reporter),
        Commands::AccessLog {
            log_format,
            nginx_conf,
            log,
        } => cli::logs::run_access_log(&settings, log_format, nginx_conf, log),
        Commands::ErrorLog { level } => cli::logs::run_error_log(level),
    }
}
