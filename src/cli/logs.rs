use super::resolve_config_path;
use nginx_agent::{
    AccessLineParser, AgentConfig, COMBINED_FORMAT, ErrorLineClassifier, ErrorLogLevel,
    LogFormatCompiler, NginxConfig,
};
use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

/// Picks the format: an explicit string, the format the configuration assigns
/// to `log`, or `combined`.
fn resolve_format(
    settings: &AgentConfig,
    log_format: Option<String>,
    nginx_conf: Option<PathBuf>,
    log: Option<String>,
) -> Result<String, String> {
    if let Some(format) = log_format {
        return Ok(format);
    }
    let (Some(nginx_conf), Some(log)) = (nginx_conf, log) else {
        return Ok(COMBINED_FORMAT.to_string());
    };

    let mut config = NginxConfig::new(resolve_config_path(&nginx_conf), &settings.nginx.prefix)
        .with_max_size(settings.nginx.max_config_size);
    config.full_parse();
    config
        .summary()
        .access_log_format(&log)
        .map(String::from)
        .ok_or_else(|| format!("no access log format found for {log}"))
}

pub fn run_access_log(
    settings: &AgentConfig,
    log_format: Option<String>,
    nginx_conf: Option<PathBuf>,
    log: Option<String>,
) -> ExitCode {
    let format = match resolve_format(settings, log_format, nginx_conf, log) {
        Ok(format) => format,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(2);
        }
    };

    let mut compiler = LogFormatCompiler::new();
    let parser = match compiler.compile(&format) {
        Ok(compiled) => AccessLineParser::new(compiled),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    debug!(format = %format, "compiled access log format");

    let (mut total, mut unmatched, mut malformed) = (0usize, 0usize, 0usize);
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error reading from stdin: {}", e);
                return ExitCode::from(2);
            }
        };
        total += 1;

        let parsed = parser.parse(&line);
        if !parsed.is_match() {
            unmatched += 1;
            continue;
        }
        if parsed.malformed {
            malformed += 1;
        }
        match serde_json::to_string(&parsed) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        }
    }

    info!(total, unmatched, malformed, "parsed access log lines");
    ExitCode::SUCCESS
}

pub fn run_error_log(level: ErrorLogLevel) -> ExitCode {
    let classifier = match ErrorLineClassifier::new(level) {
        Ok(classifier) => classifier,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut counts: BTreeMap<&'static str, u64> =
        classifier.metrics().map(|metric| (metric, 0)).collect();
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error reading from stdin: {}", e);
                return ExitCode::from(2);
            }
        };
        if let Some(metric) = classifier.classify(&line) {
            *counts.entry(metric).or_default() += 1;
        }
    }

    match serde_json::to_string_pretty(&counts) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
