//! User-supplied path resolution.
//!
//! Every path string that enters the system through the API goes through
//! [`PathResolver`] before it is used for a copy. Relative paths are
//! anchored to the configured repository root, never to the process
//! working directory, so resolution behaves the same regardless of where
//! the binary was launched from.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Resolves user-supplied path strings to absolute filesystem paths.
///
/// Pure value type: resolution has no side effects beyond an existence
/// check on the final path.
#[derive(Debug, Clone)]
pub struct PathResolver {
    repo_root: PathBuf,
}

impl PathResolver {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Absolute inputs pass through unchanged; relative inputs are joined
    /// onto the repository root.
    fn anchor(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    /// Resolve `raw` to an existing regular file.
    pub fn resolve_file(&self, raw: &str) -> Result<PathBuf, CoreError> {
        let path = self.anchor(raw);
        if !path.is_file() {
            return Err(CoreError::SourceNotFound { path });
        }
        Ok(path)
    }

    /// Resolve `raw` to an existing directory.
    pub fn resolve_dir(&self, raw: &str) -> Result<PathBuf, CoreError> {
        let path = self.anchor(raw);
        if !path.is_dir() {
            return Err(CoreError::SourceNotFound { path });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn absolute_path_passes_through() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("clip.mp4");
        fs::write(&file, b"x").unwrap();

        let resolver = PathResolver::new("/somewhere/else");
        let resolved = resolver.resolve_file(file.to_str().unwrap()).unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn relative_path_anchors_to_repo_root_not_cwd() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("assets/examples/pair1")).unwrap();

        let resolver = PathResolver::new(root.path());
        let resolved = resolver.resolve_dir("assets/examples/pair1").unwrap();

        assert_eq!(resolved, root.path().join("assets/examples/pair1"));
        // The current working directory plays no part in resolution.
        assert!(resolved.starts_with(root.path()));
    }

    #[test]
    fn missing_path_is_source_not_found() {
        let root = TempDir::new().unwrap();
        let resolver = PathResolver::new(root.path());

        let err = resolver.resolve_file("does/not/exist.png").unwrap_err();
        assert!(matches!(err, CoreError::SourceNotFound { .. }));
    }

    #[test]
    fn file_where_directory_expected_is_rejected() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("flat.txt");
        fs::write(&file, b"x").unwrap();

        let resolver = PathResolver::new(root.path());
        let err = resolver.resolve_dir("flat.txt").unwrap_err();
        assert!(matches!(err, CoreError::SourceNotFound { .. }));
    }
}
