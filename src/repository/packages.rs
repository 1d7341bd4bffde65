use super::extractor::{DocExtractor, ExtractOutcome, SourceDirectory, SourceFile, is_go_source};
use super::{Package, RepoId};
use crate::Result;
use camino::Utf8Path;
use ohno::{EnrichableExt, IntoAppError};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const LOG_TARGET: &str = "  packages";

/// Directories never descended into
const PRUNED_DIRS: &[&str] = &[".git", ".hg", ".svn", ".bzr", "internal", "vendor"];

/// Extra directories skipped in the core distribution, whose test fixtures contain Go code
const CORE_PRUNED_DIRS: &[&str] = &["testdata"];

/// Everything needed to turn one checked-out tree into packages
#[derive(Debug, Clone)]
pub struct PackageTree {
    /// Root of the working clone
    pub clone_dir: PathBuf,
    pub id: RepoId,

    /// Web URL of the repository, used to build browse links
    pub html_url: String,

    /// Name of the checked-out ref
    pub ref_name: String,

    /// Whether this is the core distribution, whose packages live under `src/`
    pub is_core: bool,
}

impl PackageTree {
    fn walk_root(&self) -> PathBuf {
        if self.is_core {
            self.clone_dir.join("src")
        } else {
            self.clone_dir.clone()
        }
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }

        let name = entry.file_name().to_string_lossy();
        PRUNED_DIRS.contains(&name.as_ref()) || (self.is_core && CORE_PRUNED_DIRS.contains(&name.as_ref()))
    }

    /// Import path for a directory, given its `/`-separated path relative to the walk root
    fn import_path(&self, rel_to_walk_root: &str) -> Option<String> {
        if self.is_core {
            let path = rel_to_walk_root.strip_prefix("pkg/").unwrap_or(rel_to_walk_root);
            if path.is_empty() || path == "pkg" {
                return None;
            }
            Some(path.to_string())
        } else if rel_to_walk_root.is_empty() {
            Some(self.id.to_string())
        } else {
            Some(format!("{}/{rel_to_walk_root}", self.id))
        }
    }

    fn browse_url(&self, kind: &str, rel_to_clone: &str) -> String {
        let base = self.html_url.trim_end_matches('/');
        if rel_to_clone.is_empty() {
            format!("{base}/{kind}/{}", self.ref_name)
        } else {
            format!("{base}/{kind}/{}/{rel_to_clone}", self.ref_name)
        }
    }
}

/// Walk a checked-out tree and extract one package per directory holding Go sources.
///
/// Directories are visited in file name order, so the result order is stable for a given tree.
/// A directory the extractor reports as not found yields no package; any other extractor failure
/// fails the whole walk.
pub fn discover_packages(tree: &PackageTree, extractor: &dyn DocExtractor) -> Result<Vec<Package>> {
    let walk_root = tree.walk_root();
    if !walk_root.is_dir() {
        log::debug!(target: LOG_TARGET, "No source tree at '{}'", walk_root.display());
        return Ok(Vec::new());
    }

    let mut packages = Vec::new();
    let walker = WalkDir::new(&walk_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !tree.is_pruned(entry));

    for entry in walker {
        let entry = entry.into_app_err_with(|| format!("unable to walk '{}'", walk_root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        if let Some(package) = package_for_dir(tree, &walk_root, entry.path(), extractor)? {
            log::debug!(target: LOG_TARGET, "Found package '{}' in '{}' at '{}'", package.import_path, tree.id, tree.ref_name);
            packages.push(package);
        }
    }

    Ok(packages)
}

fn package_for_dir(tree: &PackageTree, walk_root: &Path, dir: &Path, extractor: &dyn DocExtractor) -> Result<Option<Package>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).into_app_err_with(|| format!("unable to list '{}'", dir.display()))? {
        let entry = entry.into_app_err_with(|| format!("unable to list '{}'", dir.display()))?;
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }

        if let Ok(name) = entry.file_name().into_string()
            && is_go_source(&name)
        {
            names.push(name);
        }
    }

    if names.is_empty() {
        return Ok(None);
    }
    names.sort();

    let (Some(rel_to_walk_root), Some(rel_to_clone)) = (relative_slash_path(walk_root, dir), relative_slash_path(&tree.clone_dir, dir))
    else {
        log::debug!(target: LOG_TARGET, "Skipping directory with a non UTF-8 path '{}'", dir.display());
        return Ok(None);
    };

    let Some(import_path) = tree.import_path(&rel_to_walk_root) else {
        return Ok(None);
    };

    let mut files = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        let data = fs::read(&path).into_app_err_with(|| format!("unable to read '{}'", path.display()))?;
        let rel_file = if rel_to_clone.is_empty() {
            name.clone()
        } else {
            format!("{rel_to_clone}/{name}")
        };

        files.push(SourceFile {
            browse_url: tree.browse_url("blob", &rel_file),
            name,
            data,
        });
    }

    let source = SourceDirectory {
        path: dir.to_path_buf(),
        browse_url: tree.browse_url("tree", &rel_to_clone),
        import_path,
        files,
    };

    match extractor
        .extract(&source)
        .map_err(|e| e.enrich_with(|| format!("extracting documentation for '{}'", source.import_path)))?
    {
        ExtractOutcome::Found(package) => Ok(Some(*package)),
        ExtractOutcome::NotFound(reason) => {
            log::debug!(target: LOG_TARGET, "No package at '{}': {reason}", source.import_path);
            Ok(None)
        }
    }
}

/// `/`-separated path of `dir` relative to `base`, empty for `base` itself
fn relative_slash_path(base: &Path, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(base).ok()?;
    let rel = Utf8Path::from_path(rel)?;
    Some(rel.components().map(|c| c.as_str()).collect::<Vec<_>>().join("/"))
}
