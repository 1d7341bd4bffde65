//! The on-disk cache root.
//!
//! The cache root holds one full working clone per repository under `repos/`, plus the
//! `cache.lock` file that keeps two indexer processes from sharing the same clones.

use crate::Result;
use crate::repository::RepoId;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     cache";

/// Name of the subdirectory holding repository clones.
pub const REPOS_DIR: &str = "repos";

/// Guard that releases the cache lock when dropped
#[derive(Debug)]
pub struct CacheLockGuard(File);

impl Drop for CacheLockGuard {
    fn drop(&mut self) {
        // Lock is automatically released when the file is closed
        if let Err(e) = FileExt::unlock(&self.0) {
            log::warn!(target: LOG_TARGET, "Failed to unlock cache: {e}");
        }
    }
}

/// Create the cache root and its `repos` directory.
///
/// Failure here is fatal to the process: without a usable cache root nothing can be mirrored.
pub fn prepare_cache_root(root: &Path) -> Result<PathBuf> {
    let repos = root.join(REPOS_DIR);
    fs::create_dir_all(&repos).into_app_err_with(|| format!("unable to create cache directory '{}'", repos.display()))?;
    log::debug!(target: LOG_TARGET, "Using cache root '{}'", root.display());
    Ok(repos)
}

/// Acquire an exclusive advisory lock on the cache root for the lifetime of the returned guard
pub async fn acquire_cache_lock(root: &Path) -> Result<CacheLockGuard> {
    let lock_path = root.join("cache.lock");

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("Failed to open cache lock file at '{}'", lock_path.display()))?;

    // Another indexer may hold the lock for a long time
    let file = tokio::task::spawn_blocking(move || {
        FileExt::lock_exclusive(&file)
            .into_app_err_with(|| format!("Failed to acquire exclusive lock on cache at '{}'", lock_path.display()))?;
        log::debug!(target: LOG_TARGET, "Acquired cache lock at '{}'", lock_path.display());
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("Lock task panicked")??;

    Ok(CacheLockGuard(file))
}

/// Location of the working clone for a repository: `<root>/repos/<ID>`.
///
/// Each `/`-separated segment of the ID becomes one directory level.
#[must_use]
pub fn clone_path(root: &Path, id: &RepoId) -> PathBuf {
    id.as_str()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.join(REPOS_DIR), |path, segment| path.join(sanitize_path_component(segment)))
}

/// Sanitize a string for use as a path component
///
/// Removes path traversal sequences and characters that are reserved on common filesystems.
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    // Replace ".." but allow single "." so names like "gopkg.in" survive
    let s = s.replace("..", "__");
    s.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_normal_name() {
        assert_eq!(sanitize_path_component("testify"), "testify");
        assert_eq!(sanitize_path_component("gopkg.in"), "gopkg.in");
    }

    #[test]
    fn test_sanitize_path_traversal() {
        assert_eq!(sanitize_path_component(".."), "__");
        assert_eq!(sanitize_path_component("../etc"), "___etc");
    }

    #[test]
    fn test_sanitize_dangerous_chars() {
        assert_eq!(sanitize_path_component("foo:bar"), "foo_bar");
        assert_eq!(sanitize_path_component("foo\\bar"), "foo_bar");
        assert_eq!(sanitize_path_component("foo|bar"), "foo_bar");
    }

    #[test]
    fn test_clone_path_mirrors_id_segments() {
        let id = RepoId::from_url_str("https://github.com/stretchr/testify").unwrap();
        let path = clone_path(Path::new("/cache"), &id);
        assert_eq!(path, Path::new("/cache/repos/github.com/stretchr/testify"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_prepare_cache_root_creates_repos_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nested").join("root");

        let repos = prepare_cache_root(&root).unwrap();
        assert!(repos.is_dir());
        assert_eq!(repos, root.join(REPOS_DIR));

        // Idempotent on an existing root
        let again = prepare_cache_root(&root).unwrap();
        assert_eq!(again, repos);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_acquire_cache_lock_creates_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = acquire_cache_lock(tmp.path()).await.unwrap();
        assert!(tmp.path().join("cache.lock").exists());
        drop(guard);

        // Lock can be re-acquired after the guard is dropped
        let _guard = acquire_cache_lock(tmp.path()).await.unwrap();
    }
}
