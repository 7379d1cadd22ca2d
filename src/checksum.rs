use nginx_agent_parser::{FileMeta, SourceFile};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Placeholder for content that could not be read.
const UNREADABLE: &str = "-";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

fn content_hash(path: &Path) -> String {
    match fs::read(path) {
        Ok(content) => sha256_hex(&content),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "checksum input unreadable");
            UNREADABLE.to_string()
        }
    }
}

/// SHA-256 over file contents, permissions and mtimes, directory permissions
/// and mtimes, and certificate contents.
///
/// Contents are read at call time, so an edit that keeps size and mtime
/// still changes the result. Iteration order is the sorted path order of the
/// registries followed by certificate discovery order.
pub fn checksum(
    files: &BTreeMap<PathBuf, SourceFile>,
    directories: &BTreeMap<PathBuf, FileMeta>,
    certificates: &[PathBuf],
) -> String {
    let mut parts: Vec<String> = Vec::new();

    for (path, file) in files {
        parts.push(content_hash(path));
        parts.push(file.meta.permissions.clone());
        parts.push(file.meta.mtime.to_string());
    }
    for meta in directories.values() {
        parts.push(meta.permissions.clone());
        parts.push(meta.mtime.to_string());
    }
    for cert in certificates {
        parts.push(content_hash(cert));
    }

    sha256_hex(parts.join(".").as_bytes())
}
