use std::path::{Path, PathBuf};

use crate::error::RepoRootNotFound;

/// Walks upward from `start` until a directory containing both `src` and
/// `configs` is found.
pub fn find_repo_root(start: &Path) -> Result<PathBuf, RepoRootNotFound> {
    start
        .ancestors()
        .find(|dir| dir.join("src").is_dir() && dir.join("configs").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| RepoRootNotFound {
            start: start.to_path_buf(),
        })
}

/// Directory containing the running binary.
pub fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
}

/// Where the repo root comes from. Resolved at every launch so a missing
/// root surfaces as a launch-time error instead of a startup failure.
#[derive(Debug, Clone)]
pub enum RepoRootSource {
    /// Search upward from the running binary's directory.
    FromExe,
    /// Search upward from a given directory.
    SearchFrom(PathBuf),
}

impl RepoRootSource {
    pub fn resolve(&self) -> Result<PathBuf, RepoRootNotFound> {
        match self {
            RepoRootSource::FromExe => {
                let start = exe_dir().ok_or_else(|| RepoRootNotFound {
                    start: PathBuf::from("<current exe>"),
                })?;
                find_repo_root(&start)
            }
            RepoRootSource::SearchFrom(start) => find_repo_root(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_nearest_ancestor_with_src_and_configs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("configs")).unwrap();
        let nested = root.join("app").join("bin").join("Release");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_repo_root(&nested).unwrap(), root);
        assert_eq!(find_repo_root(&root).unwrap(), root);
    }

    #[test]
    fn test_requires_both_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("half");
        std::fs::create_dir_all(root.join("src")).unwrap();

        let err = find_repo_root(&root).unwrap_err();
        assert_eq!(err.start, root);
    }
}
