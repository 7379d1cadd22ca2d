pub mod files;
pub mod logs;
pub mod parse;

use clap::{Parser, Subcommand};
use nginx_agent::reporter::OutputFormat;
use nginx_agent::{AgentConfig, ConfigError, ErrorLogLevel};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nginx-agent")]
#[command(author, version, about = "Parse nginx configuration trees and log lines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text", global = true)]
    pub format: Format,

    /// Path to agent settings (.nginx-agent.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse configuration trees and print what was found
    Parse {
        /// Main configuration file(s) or directories containing nginx.conf
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Install prefix for relative and default log paths
        #[arg(long, value_name = "DIR")]
        prefix: Option<PathBuf>,

        /// Include the tree without index handles
        #[arg(long)]
        simplify: bool,
    },
    /// List included files with their size_mtime_permissions signatures
    Files {
        /// Main configuration file
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Include ssl_certificate files
        #[arg(long)]
        ssl: bool,
    },
    /// Parse access log lines from stdin into JSON objects
    AccessLog {
        /// Log format string
        #[arg(long, value_name = "FORMAT", conflicts_with = "nginx_conf")]
        log_format: Option<String>,

        /// Configuration to look the log's format up in
        #[arg(long, value_name = "FILE", requires = "log")]
        nginx_conf: Option<PathBuf>,

        /// Access log path as written in the configuration
        #[arg(long, value_name = "PATH")]
        log: Option<String>,
    },
    /// Classify error log lines from stdin and count them per metric
    ErrorLog {
        /// Minimum level the error log is written at
        #[arg(long, default_value = "warn")]
        level: ErrorLogLevel,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Loads `--settings`, or the nearest .nginx-agent.toml, or the defaults.
pub fn load_settings(cli: &Cli) -> Result<AgentConfig, ConfigError> {
    if let Some(path) = &cli.settings {
        return AgentConfig::from_file(path);
    }
    match AgentConfig::find_and_load(Path::new(".")) {
        Some(settings) => settings,
        None => Ok(AgentConfig::default()),
    }
}

/// A directory argument stands for the nginx.conf inside it.
pub fn resolve_config_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join("nginx.conf")
    } else {
        path.to_path_buf()
    }
}
