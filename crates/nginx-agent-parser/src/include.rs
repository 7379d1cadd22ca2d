//! Include path resolution.

use glob::glob;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve an `include` argument to the files it names.
///
/// Surrounding quotes are removed and a relative path is joined to
/// `parent_dir`. A path containing `*` is expanded as a glob (files only,
/// sorted); any other path is returned as-is, whether or not it exists, so
/// that a missing include is reported when it is read.
pub fn resolve_include(pattern: &str, parent_dir: &Path) -> Vec<PathBuf> {
    let pattern = pattern.trim().trim_matches(|c: char| c == '"' || c == '\'');

    let full_path = if Path::new(pattern).is_absolute() {
        PathBuf::from(pattern)
    } else {
        parent_dir.join(pattern)
    };

    if !pattern.contains('*') {
        return vec![full_path];
    }

    let full_pattern = full_path.to_string_lossy().to_string();
    match glob(&full_pattern) {
        Ok(entries) => {
            let mut paths: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
            paths.sort();
            paths
        }
        Err(err) => {
            debug!(pattern = %full_pattern, error = %err, "invalid include pattern, using it literally");
            vec![full_path]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_resolve_include_glob() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        create_test_file(dir, "conf.d/b.conf", "server {}");
        create_test_file(dir, "conf.d/a.conf", "server {}");
        create_test_file(dir, "conf.d/c.txt", "not a conf");
        fs::create_dir_all(dir.join("conf.d/dir.conf")).unwrap();

        let paths = resolve_include("conf.d/*.conf", dir);
        assert_eq!(paths, vec![dir.join("conf.d/a.conf"), dir.join("conf.d/b.conf")]);
    }

    #[test]
    fn test_resolve_include_literal() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        let path = create_test_file(dir, "servers/default.conf", "server {}");
        assert_eq!(resolve_include("\"servers/default.conf\"", dir), vec![path]);
    }

    #[test]
    fn test_resolve_include_missing_literal_is_kept() {
        let temp = TempDir::new().unwrap();
        let paths = resolve_include("missing.conf", temp.path());
        assert_eq!(paths, vec![temp.path().join("missing.conf")]);
    }

    #[test]
    fn test_resolve_include_glob_without_matches() {
        let temp = TempDir::new().unwrap();
        assert!(resolve_include("nonexistent/*.conf", temp.path()).is_empty());
    }

    #[test]
    fn test_resolve_include_absolute() {
        let paths = resolve_include("/etc/nginx/mime.types", Path::new("/somewhere/else"));
        assert_eq!(paths, vec![PathBuf::from("/etc/nginx/mime.types")]);
    }
}
