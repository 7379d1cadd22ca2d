use super::resolve_config_path;
use nginx_agent::reporter::Reporter;
use nginx_agent::{AgentConfig, NginxConfig};
use rayon::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

pub fn run_parse(
    settings: &AgentConfig,
    files: &[PathBuf],
    prefix: Option<PathBuf>,
    simplify: bool,
    reporter: &Reporter,
) -> ExitCode {
    let roots: Vec<PathBuf> = if files.is_empty() {
        vec![settings.nginx.config.clone()]
    } else {
        files.iter().map(|path| resolve_config_path(path)).collect()
    };
    let prefix = prefix.unwrap_or_else(|| settings.nginx.prefix.clone());
    let exclude = settings.exclude_patterns();

    // each root is an independent installation
    let configs: Vec<NginxConfig> = roots
        .par_iter()
        .map(|root| {
            let mut config = NginxConfig::new(root, &prefix)
                .with_max_size(settings.nginx.max_config_size)
                .with_exclude_rules(&exclude);
            config.full_parse();
            config
        })
        .collect();

    let mut has_errors = false;
    for config in &configs {
        if let Err(e) = reporter.report_parse(config, simplify) {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
        has_errors |= !config.load_output().errors.is_empty();
    }

    if has_errors {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
