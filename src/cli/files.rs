use super::resolve_config_path;
use nginx_agent::reporter::Reporter;
use nginx_agent::{AgentConfig, NginxConfig};
use std::path::PathBuf;
use std::process::ExitCode;

pub fn run_files(
    settings: &AgentConfig,
    file: Option<PathBuf>,
    ssl: bool,
    reporter: &Reporter,
) -> ExitCode {
    let root = file
        .map(|path| resolve_config_path(&path))
        .unwrap_or_else(|| settings.nginx.config.clone());
    let config = NginxConfig::new(&root, &settings.nginx.prefix);

    let structure = match config.collect_structure(ssl || settings.nginx.upload_ssl) {
        Ok(structure) => structure,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    match reporter.report_structure(&root, &structure) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
