//! Cheap change detection without a full parse.
//!
//! Follows `include` (and optionally `ssl_certificate`) lines with a plain
//! line scan and records the `size_mtime_permissions` signature of every file
//! found and of the directories holding them.

use nginx_agent_parser::{FileMeta, resolve_include};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const INCLUDE_PATTERN: &str = r"^[^#]*include\s+(?P<file>[^;]+);";
const SSL_CERTIFICATE_PATTERN: &str = r"^[^#]*ssl_certificate\s+(?P<file>[^;]+);";

/// Signatures of everything the lightweight scan reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStructure {
    pub files: BTreeMap<PathBuf, String>,
    pub directories: BTreeMap<PathBuf, String>,
}

/// Line-oriented scanner for `include` and `ssl_certificate` targets.
#[derive(Debug, Clone)]
pub struct StructureScanner {
    include: Regex,
    ssl_certificate: Regex,
}

impl StructureScanner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            include: Regex::new(INCLUDE_PATTERN)?,
            ssl_certificate: Regex::new(SSL_CERTIFICATE_PATTERN)?,
        })
    }

    /// Collects every file reachable from `root`.
    ///
    /// Relative includes resolve against the including file's directory and
    /// relative certificates against the directory of `root`, the same way a
    /// full load resolves them.
    pub fn collect_all_files(&self, root: &Path, include_ssl_certs: bool) -> FileStructure {
        let config_dir = root.parent().unwrap_or(Path::new("/"));
        let mut found: Vec<PathBuf> = Vec::new();
        self.scan(root, config_dir, include_ssl_certs, &mut found);

        let mut structure = FileStructure::default();
        for path in found {
            if let Some(dir) = path.parent() {
                structure
                    .directories
                    .entry(dir.to_path_buf())
                    .or_insert_with(|| signature(dir));
            }
            let sig = signature(&path);
            structure.files.insert(path, sig);
        }

        debug!(
            root = %root.display(),
            files = structure.files.len(),
            directories = structure.directories.len(),
            "collected structure"
        );
        structure
    }

    fn scan(&self, path: &Path, config_dir: &Path, include_ssl_certs: bool, found: &mut Vec<PathBuf>) {
        if found.iter().any(|seen| seen == path) {
            return;
        }
        found.push(path.to_path_buf());

        let content = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to read");
                return;
            }
        };
        let parent = path.parent().unwrap_or(config_dir);

        for line in content.lines() {
            if line.contains("include") {
                if let Some(caps) = self.include.captures(line) {
                    for included in resolve_include(caps["file"].trim(), parent) {
                        self.scan(&included, config_dir, include_ssl_certs, found);
                    }
                }
            } else if include_ssl_certs
                && line.contains("ssl_certificate")
                && let Some(caps) = self.ssl_certificate.captures(line)
            {
                let cert = caps["file"].trim().replace('"', "");
                let cert = if cert.starts_with('/') {
                    PathBuf::from(cert)
                } else {
                    config_dir.join(cert)
                };
                if !found.contains(&cert) {
                    found.push(cert);
                }
            }
        }
    }
}

fn signature(path: &Path) -> String {
    FileMeta::stat(path).unwrap_or_default().signature()
}
