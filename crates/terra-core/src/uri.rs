//! Local URI handling
//!
//! Only plain paths and `file://` URIs are readable; any other scheme is
//! rejected with [`DataError::UnsupportedUri`].

use std::path::PathBuf;

use crate::error::{DataError, DataResult};

const FILE_SCHEME: &str = "file://";

/// Resolve a URI to a local path
///
/// # Errors
/// Returns [`DataError::UnsupportedUri`] for remote schemes or empty URIs
pub fn local_path(uri: &str) -> DataResult<PathBuf> {
    if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
        return Ok(PathBuf::from(path));
    }
    if uri.is_empty() || uri.contains("://") {
        return Err(DataError::UnsupportedUri(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

/// Read a whole local file as UTF-8
///
/// # Errors
/// Returns error if the URI is not local or the file cannot be read
pub fn read_text(uri: &str) -> DataResult<String> {
    let path = local_path(uri)?;
    std::fs::read_to_string(&path).map_err(|e| DataError::io_error(path, e))
}

/// Write a local file, creating parent directories
///
/// # Errors
/// Returns error if the URI is not local or writing fails
pub fn write_text(uri: &str, content: &str) -> DataResult<()> {
    let path = create_parent(uri)?;
    std::fs::write(&path, content).map_err(|e| DataError::io_error(path, e))
}

/// Resolve a URI for writing, creating its parent directory
///
/// # Errors
/// Returns error if the URI is not local or the directory cannot be created
pub fn create_parent(uri: &str) -> DataResult<PathBuf> {
    let path = local_path(uri)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DataError::io_error(parent, e))?;
    }
    Ok(path)
}

/// Append a path segment to a URI
#[must_use]
pub fn join(base: &str, segment: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), segment.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_scheme_is_stripped() {
        assert_eq!(local_path("file:///tmp/a.json").unwrap(), PathBuf::from("/tmp/a.json"));
        assert_eq!(local_path("data/a.json").unwrap(), PathBuf::from("data/a.json"));
    }

    #[test]
    fn remote_schemes_rejected() {
        assert!(matches!(local_path("s3://bucket/a.tif"), Err(DataError::UnsupportedUri(_))));
        assert!(matches!(local_path(""), Err(DataError::UnsupportedUri(_))));
    }

    #[test]
    fn join_trims_separators() {
        assert_eq!(join("/out/", "/predict"), "/out/predict");
        assert_eq!(join("file:///out", "s1.tif"), "file:///out/s1.tif");
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let uri = dir.path().join("nested/deeper/x.txt").display().to_string();
        write_text(&uri, "hello").unwrap();
        assert_eq!(read_text(&uri).unwrap(), "hello");
        assert!(matches!(
            read_text(&dir.path().join("missing").display().to_string()),
            Err(DataError::Io { .. })
        ));
    }
}
