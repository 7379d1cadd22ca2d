use nginx_agent_parser::DEFAULT_MAX_SIZE;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`AgentConfig::find_and_load`].
pub const CONFIG_FILE_NAME: &str = ".nginx-agent.toml";

/// Agent settings loaded from `.nginx-agent.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub nginx: NginxSettings,
}

/// The `[nginx]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NginxSettings {
    /// Main configuration file
    pub config: PathBuf,
    /// Install prefix; relative and default log paths resolve against it
    pub prefix: PathBuf,
    /// nginx binary. Recorded only; the agent never runs it.
    pub binary: Option<PathBuf>,
    /// Comma-separated patterns of log files to ignore
    pub exclude_logs: String,
    /// Files larger than this many bytes are registered but not parsed
    pub max_config_size: u64,
    /// Include certificates in the lightweight file scan
    pub upload_ssl: bool,
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            config: PathBuf::from("/etc/nginx/nginx.conf"),
            prefix: PathBuf::from("/usr/local/nginx"),
            binary: None,
            exclude_logs: String::new(),
            max_config_size: DEFAULT_MAX_SIZE,
            upload_ssl: false,
        }
    }
}

impl AgentConfig {
    /// Load settings from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Find and load .nginx-agent.toml from the given directory or its parents
    pub fn find_and_load(dir: &Path) -> Option<Result<Self, ConfigError>> {
        let mut current = dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(Self::from_file(&config_path));
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Non-empty items of `exclude_logs`
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.nginx
            .exclude_logs
            .split(',')
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.nginx.config, PathBuf::from("/etc/nginx/nginx.conf"));
        assert_eq!(config.nginx.prefix, PathBuf::from("/usr/local/nginx"));
        assert_eq!(config.nginx.max_config_size, 20 * 1024 * 1024);
        assert!(!config.nginx.upload_ssl);
        assert!(config.exclude_patterns().is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[nginx]
config = "/opt/nginx/conf/nginx.conf"
prefix = "/opt/nginx"
exclude_logs = "/var/log/nginx/debug*.log,, *.gz ,/var/log/old/"
upload_ssl = true
"#;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", toml_content).unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();

        assert_eq!(config.nginx.config, PathBuf::from("/opt/nginx/conf/nginx.conf"));
        assert_eq!(config.nginx.prefix, PathBuf::from("/opt/nginx"));
        assert!(config.nginx.upload_ssl);
        assert_eq!(config.nginx.max_config_size, DEFAULT_MAX_SIZE);
        assert_eq!(
            config.exclude_patterns(),
            vec!["/var/log/nginx/debug*.log", "*.gz", "/var/log/old/"]
        );
    }

    #[test]
    fn test_empty_config() {
        let file = NamedTempFile::new().unwrap();
        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.nginx.prefix, PathBuf::from("/usr/local/nginx"));
    }

    #[test]
    fn test_invalid_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[nginx]\nmax_config_size = \"big\"\n").unwrap();

        let err = AgentConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_find_and_load_searches_parents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[nginx]\nprefix = \"/srv/nginx\"\n",
        )
        .unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = AgentConfig::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(config.nginx.prefix, PathBuf::from("/srv/nginx"));
    }
}
