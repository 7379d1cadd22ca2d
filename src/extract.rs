//! Pulls log, status and certificate information out of a merged tree.

use crate::listen::{DEFAULT_LISTEN, ListenAddr};
use crate::sample::sample;
use nginx_agent_log::{COMBINED_FORMAT, ErrorLogLevel};
use nginx_agent_parser::{ConfigTree, ConfigValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, error};

/// What the agent needs to know about one nginx configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigSummary {
    /// Format name -> format string.
    pub log_formats: BTreeMap<String, String>,
    /// Access log path -> format name; `None` means `combined`.
    pub access_logs: BTreeMap<String, Option<String>>,
    /// Error log path -> minimum level.
    pub error_logs: BTreeMap<String, ErrorLogLevel>,
    pub stub_status_urls: Vec<String>,
    pub plus_status_external_urls: Vec<String>,
    pub plus_status_internal_urls: Vec<String>,
    pub ssl_certificates: Vec<PathBuf>,
}

impl ConfigSummary {
    /// The format string an access log is written with.
    ///
    /// Falls back to nginx's predefined `combined` format unless the
    /// configuration redefines it.
    pub fn access_log_format(&self, path: &str) -> Option<&str> {
        let name = self.access_logs.get(path)?.as_deref().unwrap_or("combined");
        match self.log_formats.get(name) {
            Some(format) => Some(format),
            None if name == "combined" => Some(COMBINED_FORMAT),
            None => None,
        }
    }
}

/// Walks a merged tree and builds a [`ConfigSummary`].
#[derive(Debug, Clone)]
pub struct SemanticExtractor {
    prefix: PathBuf,
    config_dir: PathBuf,
}

impl SemanticExtractor {
    /// `prefix` resolves relative log paths; `config_dir` resolves relative
    /// certificate paths.
    pub fn new(prefix: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            config_dir: config_dir.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn extract(&self, tree: &ConfigTree) -> ConfigSummary {
        let mut walker = Walker {
            extractor: self,
            summary: ConfigSummary::default(),
        };
        walker.walk(tree, &WalkContext::default());
        walker.summary
    }

    fn resolve_log(&self, name: &str) -> String {
        if name.starts_with('/') {
            name.to_string()
        } else {
            self.prefix.join(name).display().to_string()
        }
    }
}

/// Values inherited from enclosing blocks. Never mutated; entering a block
/// produces a new context.
#[derive(Debug, Clone, Default)]
struct WalkContext<'t> {
    listen: Option<Rc<[ListenAddr]>>,
    server_name: Option<&'t str>,
    location: Option<&'t str>,
    upstream: Option<&'t str>,
}

impl<'t> WalkContext<'t> {
    fn in_server(&self, server: &'t ConfigTree) -> Self {
        let listen: Vec<ListenAddr> = match server.get("listen") {
            Some(value) => value
                .items()
                .iter()
                .filter_map(ConfigValue::as_text)
                .filter_map(|raw| {
                    if raw.starts_with("unix:") {
                        debug!(listen = raw, "skipping unix socket");
                        return None;
                    }
                    let parsed = ListenAddr::parse(raw);
                    if parsed.is_none() {
                        error!(listen = raw, "failed to parse listen directive");
                    }
                    parsed
                })
                .map(ListenAddr::reachable)
                .collect(),
            None => DEFAULT_LISTEN
                .iter()
                .filter_map(|port| ListenAddr::parse(port))
                .map(ListenAddr::reachable)
                .collect(),
        };

        let server_name = server
            .get("server_name")
            .and_then(|value| value.items().first())
            .and_then(ConfigValue::as_text)
            .and_then(|names| names.split_whitespace().next())
            .or(self.server_name);

        Self {
            listen: Some(listen.into()),
            server_name,
            ..self.clone()
        }
    }

    fn in_upstream(&self, upstream: &'t str) -> Self {
        Self {
            upstream: Some(upstream),
            ..self.clone()
        }
    }

    fn in_location(&self, location: &'t str) -> Self {
        Self {
            location: Some(location),
            ..self.clone()
        }
    }

    /// `host:port/path` for every listen address, or nothing when the
    /// location cannot be turned into a request path.
    fn status_urls(&self, server_preferred: bool) -> Vec<String> {
        let Some(listen) = &self.listen else {
            return Vec::new();
        };
        let location = self.location.unwrap_or("/");
        let last = location.split_whitespace().last().unwrap_or(location);

        let path = if location.starts_with('~') {
            match sample(last) {
                Some(path) if path.starts_with('/') => path,
                Some(path) => format!("/{path}"),
                None => {
                    debug!(location, "bad regex location");
                    return Vec::new();
                }
            }
        } else if last.starts_with('/') {
            last.to_string()
        } else {
            debug!(location, "bad exact location");
            return Vec::new();
        };

        listen
            .iter()
            .map(|addr| {
                let host = match self.server_name {
                    Some(name) if server_preferred => name,
                    _ => addr.addr.as_str(),
                };
                format!("{}:{}{}", host, addr.port, path)
            })
            .collect()
    }
}

struct Walker<'e> {
    extractor: &'e SemanticExtractor,
    summary: ConfigSummary,
}

impl Walker<'_> {
    fn walk<'t>(&mut self, tree: &'t ConfigTree, ctx: &WalkContext<'t>) {
        for (key, value) in tree.iter() {
            match key.as_str() {
                "error_log" => texts(value).for_each(|raw| self.error_log(raw)),
                "access_log" => texts(value).for_each(|raw| self.access_log(raw)),
                "ssl_certificate" => texts(value).for_each(|raw| self.ssl_certificate(raw)),
                "log_format" => {
                    for (name, format) in value.as_compound().into_iter().flatten() {
                        if let Some(format) = format.as_text() {
                            self.summary
                                .log_formats
                                .insert(name.clone(), format.to_string());
                        }
                    }
                }
                "server" if ctx.upstream.is_none() => {
                    for server in value.items().iter().filter_map(ConfigValue::as_block) {
                        self.walk(server, &ctx.in_server(server));
                    }
                }
                "upstream" | "location" if value.as_compound().is_some() => {
                    for (args, block) in value.as_compound().into_iter().flatten() {
                        let inner = if key == "upstream" {
                            ctx.in_upstream(args)
                        } else {
                            ctx.in_location(args)
                        };
                        self.descend(block, &inner);
                    }
                }
                "stub_status" if ctx.listen.is_some() => {
                    for url in ctx.status_urls(false) {
                        push_unique(&mut self.summary.stub_status_urls, url);
                    }
                }
                "status" if ctx.listen.is_some() => {
                    for url in ctx.status_urls(true) {
                        push_unique(&mut self.summary.plus_status_external_urls, url);
                    }
                    for url in ctx.status_urls(false) {
                        push_unique(&mut self.summary.plus_status_internal_urls, url);
                    }
                }
                _ => self.descend(value, ctx),
            }
        }
    }

    fn descend<'t>(&mut self, value: &'t ConfigValue, ctx: &WalkContext<'t>) {
        match value {
            ConfigValue::Leaf { .. } => {}
            ConfigValue::Block { tree, .. } => self.walk(tree, ctx),
            ConfigValue::Compound(entries) => {
                for entry in entries.values() {
                    self.descend(entry, ctx);
                }
            }
            ConfigValue::List(items) => {
                for item in items {
                    self.descend(item, ctx);
                }
            }
        }
    }

    fn error_log(&mut self, raw: &str) {
        if raw == "off" || !is_static_target(raw) {
            return;
        }

        let parts: Vec<&str> = raw.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return;
        };
        let level = parts
            .last()
            .and_then(|last| last.parse::<ErrorLogLevel>().ok())
            .unwrap_or_default();
        let name = strip_quotes(first);
        if name.starts_with("syslog") {
            return;
        }

        // the first definition of a path wins
        self.summary
            .error_logs
            .entry(self.extractor.resolve_log(&name))
            .or_insert(level);
    }

    fn access_log(&mut self, raw: &str) {
        if raw == "off" || !is_static_target(raw) {
            return;
        }

        let parts: Vec<&str> = raw.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return;
        };
        let name = strip_quotes(first);
        if name.starts_with("syslog") {
            return;
        }
        let format = parts
            .get(1)
            .filter(|part| !part.contains('='))
            .map(|part| part.to_string());

        self.summary
            .access_logs
            .insert(self.extractor.resolve_log(&name), format);
    }

    fn ssl_certificate(&mut self, raw: &str) {
        if !is_static_target(raw) {
            return;
        }
        let name = raw.replace('"', "");
        let path = if name.starts_with('/') {
            PathBuf::from(name)
        } else {
            self.extractor.config_dir.join(name)
        };
        if !self.summary.ssl_certificates.contains(&path) {
            self.summary.ssl_certificates.push(path);
        }
    }
}

fn texts(value: &ConfigValue) -> impl Iterator<Item = &str> {
    value.items().iter().filter_map(ConfigValue::as_text)
}

/// Empty values and values built from variables without an `if=` condition
/// cannot be resolved to a file.
fn is_static_target(raw: &str) -> bool {
    if raw.trim().is_empty() {
        return false;
    }
    if raw.contains('$') && !raw.split_whitespace().any(|part| part.starts_with("if=")) {
        debug!(value = raw, "skipping variable target");
        return false;
    }
    true
}

fn strip_quotes(value: &str) -> String {
    value.replace(['\'', '"'], "")
}

fn push_unique(urls: &mut Vec<String>, url: String) {
    if !urls.contains(&url) {
        urls.push(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nginx_agent_parser::ConfigLoader;
    use std::fs;
    use tempfile::TempDir;

    fn extract(config: &str) -> ConfigSummary {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nginx.conf");
        fs::write(&path, config).unwrap();
        let output = ConfigLoader::new(&path).load();
        assert!(output.errors.is_empty(), "{:?}", output.error_messages());
        SemanticExtractor::new("/usr/local/nginx", "/etc/nginx").extract(&output.tree)
    }

    #[test]
    fn test_stub_status_on_wildcard_listen() {
        let summary = extract("http { server { listen 80; location /status { stub_status; } } }");
        assert_eq!(summary.stub_status_urls, vec!["127.0.0.1:80/status"]);
    }

    #[test]
    fn test_default_listen() {
        let summary = extract("http { server { location = /basic_status { stub_status on; } } }");
        assert_eq!(
            summary.stub_status_urls,
            vec!["127.0.0.1:80/basic_status", "127.0.0.1:8000/basic_status"]
        );
    }

    #[test]
    fn test_status_urls_external_and_internal() {
        let summary = extract(
            "http {\n\
             server {\n\
             listen 10.0.0.1:8080;\n\
             listen [::]:8080;\n\
             server_name status.example.com www.example.com;\n\
             location /api { status; }\n\
             }\n\
             }",
        );
        assert_eq!(
            summary.plus_status_external_urls,
            vec!["status.example.com:8080/api"]
        );
        assert_eq!(
            summary.plus_status_internal_urls,
            vec!["10.0.0.1:8080/api", "[::1]:8080/api"]
        );
    }

    #[test]
    fn test_regex_location_is_sampled() {
        let summary = extract(
            "http { server { listen 81; location ~ ^/(nginx_status|status)$ { stub_status; } } }",
        );
        assert_eq!(summary.stub_status_urls, vec!["127.0.0.1:81/nginx_status"]);
    }

    #[test]
    fn test_unusable_locations_yield_no_url() {
        let summary = extract(
            "http { server { listen 80;\n\
             location @named { stub_status; }\n\
             location ~ ^/(?=x) { stub_status; }\n\
             } }",
        );
        assert!(summary.stub_status_urls.is_empty());
    }

    #[test]
    fn test_status_outside_server_is_ignored() {
        let summary = extract("http { location /status { stub_status; } }");
        assert!(summary.stub_status_urls.is_empty());
    }

    #[test]
    fn test_upstream_servers_are_not_walked() {
        let summary = extract("http { upstream backend { server 10.0.0.1:80; server 10.0.0.2:80; } }");
        assert!(summary.stub_status_urls.is_empty());
    }

    #[test]
    fn test_logs() {
        let summary = extract(
            "error_log logs/error.log warn;\n\
             error_log /var/log/nginx/error.log;\n\
             error_log syslog:server=127.0.0.1;\n\
             http {\n\
             log_format main '$remote_addr [$time_local] \"$request\" $status';\n\
             access_log off;\n\
             access_log \"/var/log/nginx/access.log\" main buffer=32k;\n\
             access_log /var/log/nginx/plain.log buffer=32k;\n\
             access_log /var/log/nginx/$host.log;\n\
             access_log /var/log/nginx/cond.log main if=$loggable;\n\
             server { error_log /var/log/nginx/error.log debug; }\n\
             }",
        );

        assert_eq!(
            summary.error_logs,
            BTreeMap::from([
                ("/usr/local/nginx/logs/error.log".to_string(), ErrorLogLevel::Warn),
                ("/var/log/nginx/error.log".to_string(), ErrorLogLevel::Error),
            ])
        );
        assert_eq!(
            summary.access_logs,
            BTreeMap::from([
                ("/var/log/nginx/access.log".to_string(), Some("main".to_string())),
                ("/var/log/nginx/cond.log".to_string(), Some("main".to_string())),
                ("/var/log/nginx/plain.log".to_string(), None),
            ])
        );
        assert_eq!(
            summary.log_formats.get("main").map(String::as_str),
            Some("$remote_addr [$time_local] \"$request\" $status")
        );
        assert_eq!(
            summary.access_log_format("/var/log/nginx/plain.log"),
            Some(COMBINED_FORMAT)
        );
        assert_eq!(
            summary.access_log_format("/var/log/nginx/access.log"),
            Some("$remote_addr [$time_local] \"$request\" $status")
        );
    }

    #[test]
    fn test_wrapped_and_tab_separated_directives() {
        let summary = extract(
            "error_log /var/log/nginx/error.log\twarn;\n\
             http {\n\
             access_log /var/log/nginx/access.log\n        main;\n\
             access_log /var/log/nginx/cond.log\tmain\tif=$loggable;\n\
             server {\n\
             listen 8080\tdefault_server;\n\
             server_name\tstatus.example.com\n        www.example.com;\n\
             location /s { stub_status; }\n\
             location /api { status; }\n\
             }\n\
             }",
        );

        assert_eq!(
            summary.error_logs,
            BTreeMap::from([("/var/log/nginx/error.log".to_string(), ErrorLogLevel::Warn)])
        );
        assert_eq!(
            summary.access_logs,
            BTreeMap::from([
                ("/var/log/nginx/access.log".to_string(), Some("main".to_string())),
                ("/var/log/nginx/cond.log".to_string(), Some("main".to_string())),
            ])
        );
        assert_eq!(summary.stub_status_urls, vec!["127.0.0.1:8080/s"]);
        assert_eq!(
            summary.plus_status_external_urls,
            vec!["status.example.com:8080/api"]
        );
    }

    #[test]
    fn test_ssl_certificates() {
        let summary = extract(
            "http { server {\n\
             ssl_certificate certs/site.crt;\n\
             ssl_certificate_key certs/site.key;\n\
             } server {\n\
             ssl_certificate \"/etc/ssl/other.crt\";\n\
             ssl_certificate $ssl_server_name.crt;\n\
             } server { ssl_certificate certs/site.crt; } }",
        );
        assert_eq!(
            summary.ssl_certificates,
            vec![
                PathBuf::from("/etc/nginx/certs/site.crt"),
                PathBuf::from("/etc/ssl/other.crt")
            ]
        );
    }

    #[test]
    fn test_context_does_not_leak_between_servers() {
        let summary = extract(
            "http {\n\
             server { listen 8080; server_name one.example.com; location /a { } }\n\
             server { listen 9090; location /s { status; } }\n\
             }",
        );
        assert_eq!(summary.plus_status_external_urls, vec!["127.0.0.1:9090/s"]);
    }
}
