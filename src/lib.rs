//! nginx configuration and log parsing core of a host agent.
//!
//! [`NginxConfig`] ties the pieces together: it loads a configuration tree
//! with [`ConfigLoader`], extracts logs, status URLs and certificates with
//! [`SemanticExtractor`], adds nginx's default logs, drops excluded logs and
//! computes a change-detection checksum. Log lines are parsed with the
//! re-exported [`nginx_agent_log`] types.
//!
//! ```no_run
//! use nginx_agent::NginxConfig;
//!
//! let mut config = NginxConfig::new("/etc/nginx/nginx.conf", "/usr/share/nginx");
//! config.full_parse();
//! for (path, format) in &config.summary().access_logs {
//!     println!("{path} {}", format.as_deref().unwrap_or("combined"));
//! }
//! println!("checksum {}", config.checksum());
//! ```

pub mod checksum;
pub mod config;
pub mod exclude;
pub mod extract;
pub mod listen;
#[cfg(feature = "cli")]
pub mod reporter;
pub mod sample;
pub mod structure;

pub use config::{AgentConfig, ConfigError, NginxSettings};
pub use exclude::ExcludeRule;
pub use extract::{ConfigSummary, SemanticExtractor};
pub use listen::ListenAddr;
pub use nginx_agent_log::{
    AccessLineParser, COMBINED_FORMAT, CompiledLogFormat, ErrorLineClassifier, ErrorLogLevel,
    FieldValue, LogError, LogFormatCompiler, ParsedLine,
};
pub use nginx_agent_parser::{
    ConfigLoader, ConfigTree, ConfigValue, FileMeta, IndexList, LoadError, LoadOutput,
    SimpleValue, SourceFile,
};
pub use structure::{FileStructure, StructureScanner};

use nginx_agent_parser::DEFAULT_MAX_SIZE;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One monitored nginx configuration.
///
/// Every [`full_parse`](NginxConfig::full_parse) rebuilds the tree and the
/// summary from scratch.
#[derive(Debug)]
pub struct NginxConfig {
    filename: PathBuf,
    prefix: PathBuf,
    binary: Option<PathBuf>,
    max_size: u64,
    exclude: Vec<ExcludeRule>,
    output: LoadOutput,
    summary: ConfigSummary,
}

impl NginxConfig {
    pub fn new(filename: impl Into<PathBuf>, prefix: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            prefix: prefix.into(),
            binary: None,
            max_size: DEFAULT_MAX_SIZE,
            exclude: Vec::new(),
            output: LoadOutput::default(),
            summary: ConfigSummary::default(),
        }
    }

    /// Builds a configuration from the `[nginx]` settings table.
    pub fn from_settings(settings: &AgentConfig) -> Self {
        let nginx = &settings.nginx;
        let mut config = Self::new(&nginx.config, &nginx.prefix)
            .with_max_size(nginx.max_config_size)
            .with_exclude_rules(&settings.exclude_patterns());
        config.binary = nginx.binary.clone();
        config
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_exclude_rules<S: AsRef<str>>(mut self, rules: &[S]) -> Self {
        self.exclude = exclude::parse_rules(rules);
        self
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    /// Loads the whole tree and extracts everything from it.
    pub fn full_parse(&mut self) {
        debug!(file = %self.filename.display(), "parsing full tree");

        self.output = ConfigLoader::new(&self.filename)
            .with_max_size(self.max_size)
            .load();

        let config_dir = self.filename.parent().unwrap_or(Path::new("/"));
        self.summary = SemanticExtractor::new(&self.prefix, config_dir).extract(&self.output.tree);

        self.add_default_logs();
        self.exclude_logs();

        info!(
            file = %self.filename.display(),
            files = self.output.files.len(),
            errors = self.output.errors.len(),
            access_logs = self.summary.access_logs.len(),
            error_logs = self.summary.error_logs.len(),
            "parsed config"
        );
    }

    /// nginx writes to `<prefix>/logs/access.log` and `<prefix>/logs/error.log`
    /// unless told otherwise.
    fn add_default_logs(&mut self) {
        let access_log = self.prefix.join("logs/access.log");
        if access_log.is_file() {
            self.summary
                .access_logs
                .entry(access_log.display().to_string())
                .or_insert(None);
        }

        let error_log = self.prefix.join("logs/error.log");
        if error_log.is_file() {
            self.summary
                .error_logs
                .entry(error_log.display().to_string())
                .or_insert(ErrorLogLevel::Error);
        }
    }

    fn exclude_logs(&mut self) {
        if self.exclude.is_empty() {
            return;
        }
        let rules = &self.exclude;
        let before = self.summary.access_logs.len() + self.summary.error_logs.len();
        self.summary
            .access_logs
            .retain(|path, _| !exclude::is_excluded(rules, path));
        self.summary
            .error_logs
            .retain(|path, _| !exclude::is_excluded(rules, path));
        let removed = before - self.summary.access_logs.len() - self.summary.error_logs.len();
        debug!(removed, "excluded logs");
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.output.tree
    }

    /// Everything the loader produced: tree, file and directory registries,
    /// index and errors.
    pub fn load_output(&self) -> &LoadOutput {
        &self.output
    }

    pub fn summary(&self) -> &ConfigSummary {
        &self.summary
    }

    /// Parse errors of the last load, rendered as messages.
    pub fn parser_errors(&self) -> Vec<String> {
        self.output.error_messages()
    }

    /// The tree without index handles.
    pub fn simplify(&self) -> SimpleValue {
        self.output.tree.simplify()
    }

    pub fn total_size(&self) -> u64 {
        self.output.total_size()
    }

    pub fn checksum(&self) -> String {
        checksum::checksum(
            &self.output.files,
            &self.output.directories,
            &self.summary.ssl_certificates,
        )
    }

    /// Signatures of the files reachable through `include` lines, without a
    /// full parse.
    pub fn collect_structure(&self, include_ssl_certs: bool) -> Result<FileStructure, regex::Error> {
        let scanner = StructureScanner::new()?;
        Ok(scanner.collect_all_files(&self.filename, include_ssl_certs))
    }
}
