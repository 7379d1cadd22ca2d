use crate::{FileStructure, NginxConfig};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub struct Reporter {
    format: OutputFormat,
}

#[derive(Serialize)]
struct ParseReport<'a> {
    file: String,
    #[serde(flatten)]
    summary: &'a crate::ConfigSummary,
    files: &'a BTreeMap<PathBuf, crate::SourceFile>,
    directories: &'a BTreeMap<PathBuf, crate::FileMeta>,
    index: &'a crate::IndexList,
    tree: serde_json::Value,
    errors: Vec<String>,
    total_size: u64,
    checksum: String,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Prints everything a full parse produced.
    pub fn report_parse(&self, config: &NginxConfig, simplify: bool) -> Result<(), serde_json::Error> {
        match self.format {
            OutputFormat::Text => {
                self.parse_text(config, simplify);
                Ok(())
            }
            OutputFormat::Json => self.parse_json(config, simplify),
        }
    }

    fn parse_text(&self, config: &NginxConfig, simplify: bool) {
        let summary = config.summary();
        let output = config.load_output();

        println!("{}", config.filename().display().to_string().bold());

        section("files");
        for (path, file) in &output.files {
            let broken = if file.broken { " broken".red().to_string() } else { String::new() };
            println!(
                "  {} {}{}",
                path.display(),
                file.meta.signature().dimmed(),
                broken
            );
        }

        section("log formats");
        for (name, format) in &summary.log_formats {
            println!("  {} {}", name.cyan(), format);
        }

        section("access logs");
        for (path, format) in &summary.access_logs {
            println!("  {} {}", path, format.as_deref().unwrap_or("combined").dimmed());
        }

        section("error logs");
        for (path, level) in &summary.error_logs {
            println!("  {} {}", path, level.to_string().dimmed());
        }

        section("status urls");
        for url in &summary.stub_status_urls {
            println!("  stub_status {url}");
        }
        for url in &summary.plus_status_external_urls {
            println!("  status (external) {url}");
        }
        for url in &summary.plus_status_internal_urls {
            println!("  status (internal) {url}");
        }

        section("ssl certificates");
        for cert in &summary.ssl_certificates {
            println!("  {}", cert.display());
        }

        if simplify {
            section("tree");
            match serde_json::to_string_pretty(&config.simplify()) {
                Ok(tree) => println!("{tree}"),
                Err(e) => eprintln!("Error rendering tree: {e}"),
            }
        }

        let errors = config.parser_errors();
        if !errors.is_empty() {
            println!();
            for message in &errors {
                println!("{} {}", "[error]".red().bold(), message);
            }
        }

        println!();
        println!(
            "{} file(s), {} bytes, {} error(s), checksum {}",
            output.files.len(),
            config.total_size(),
            errors.len(),
            config.checksum()
        );
    }

    fn parse_json(&self, config: &NginxConfig, simplify: bool) -> Result<(), serde_json::Error> {
        let output = config.load_output();
        let tree = if simplify {
            serde_json::to_value(config.simplify())?
        } else {
            serde_json::to_value(config.tree())?
        };

        let report = ParseReport {
            file: config.filename().display().to_string(),
            summary: config.summary(),
            files: &output.files,
            directories: &output.directories,
            index: &output.index,
            tree,
            errors: config.parser_errors(),
            total_size: config.total_size(),
            checksum: config.checksum(),
        };

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    /// Prints a lightweight scan.
    pub fn report_structure(&self, root: &Path, structure: &FileStructure) -> Result<(), serde_json::Error> {
        match self.format {
            OutputFormat::Text => {
                println!("{}", root.display().to_string().bold());
                section("files");
                for (path, signature) in &structure.files {
                    println!("  {} {}", path.display(), signature.dimmed());
                }
                section("directories");
                for (path, signature) in &structure.directories {
                    println!("  {} {}", path.display(), signature.dimmed());
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(structure)?),
        }
        Ok(())
    }
}

fn section(title: &str) {
    println!("{}", title.bold().underline());
}
