use serde::Serialize;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Size, modification time and permission bits of a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub mtime: i64,
    /// Permission bits in octal, e.g. `0644`.
    pub permissions: String,
}

/// What an unreadable file is registered with.
impl Default for FileMeta {
    fn default() -> Self {
        Self {
            size: 0,
            mtime: 0,
            permissions: "0000".to_string(),
        }
    }
}

impl FileMeta {
    pub fn stat(path: &Path) -> io::Result<Self> {
        fs::metadata(path).map(|metadata| Self::from_metadata(&metadata))
    }

    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0);

        Self {
            size: metadata.len(),
            mtime,
            permissions: permission_bits(metadata),
        }
    }

    /// `size_mtime_permissions`, the cheap change-detection signature.
    pub fn signature(&self) -> String {
        format!("{}_{}_{}", self.size, self.mtime, self.permissions)
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:04o}", metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> String {
    if metadata.permissions().readonly() {
        "0444".to_string()
    } else {
        "0644".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_stat_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "events {{}}").unwrap();

        let meta = FileMeta::stat(file.path()).unwrap();
        assert_eq!(meta.size, 10);
        assert!(meta.mtime > 0);
        assert_eq!(meta.permissions.len(), 4);
        assert!(meta.signature().starts_with("10_"));
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let file = NamedTempFile::new().unwrap();
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o640)).unwrap();
        assert_eq!(FileMeta::stat(file.path()).unwrap().permissions, "0640");
    }

    #[test]
    fn test_stat_missing() {
        assert!(FileMeta::stat(Path::new("/nonexistent/nginx.conf")).is_err());
    }
}
