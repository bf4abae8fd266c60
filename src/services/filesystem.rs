//! Filesystem primitives for the scanner and the rename step
//!
//! Directory listing goes through the [`DirectoryLister`] trait so scans can
//! run against fake trees in tests. Listing never fails: a missing or
//! unreadable path reads as empty and the caller decides what that means.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tokio::fs;
use walkdir::{DirEntry, WalkDir};

/// Directory-listing collaborator used by the scanner.
///
/// Both methods return names (not paths) in listing order. A path that does
/// not exist yields an empty vector, never an error.
pub trait DirectoryLister: Send + Sync {
    fn subdirectories(&self, path: &Path) -> Vec<String>;
    fn files(&self, path: &Path) -> Vec<String>;
}

/// Real-filesystem lister. Lists one level deep, sorted by file name.
pub struct FsLister;

impl DirectoryLister for FsLister {
    fn subdirectories(&self, path: &Path) -> Vec<String> {
        list_level(path, |entry| entry.file_type().is_dir())
    }

    fn files(&self, path: &Path) -> Vec<String> {
        list_level(path, |entry| entry.file_type().is_file())
    }
}

fn list_level(path: &Path, keep: impl Fn(&DirEntry) -> bool) -> Vec<String> {
    WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| keep(entry))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect()
}

/// Rename a file or directory in place, keeping its parent directory.
///
/// Refuses path separators in the new name and never clobbers an existing
/// target. Returns the new full path.
pub async fn rename_entry(path: &Path, new_name: &str) -> Result<PathBuf> {
    if new_name.contains('/') || new_name.contains('\\') {
        return Err(anyhow!("New name cannot contain path separators"));
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("Cannot rename root"))?;
    let target = parent.join(new_name);

    if target.exists() {
        return Err(anyhow!(
            "A file or directory named '{}' already exists",
            new_name
        ));
    }

    fs::rename(path, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    #[test]
    fn test_lister_returns_sorted_names_one_level_deep() {
        let root = tempfile::tempdir().unwrap();
        std_fs::create_dir(root.path().join("b_show")).unwrap();
        std_fs::create_dir(root.path().join("a_show")).unwrap();
        std_fs::create_dir(root.path().join("a_show/season 1")).unwrap();
        std_fs::write(root.path().join("notes.txt"), "x").unwrap();

        let lister = FsLister;
        assert_eq!(
            lister.subdirectories(root.path()),
            vec!["a_show".to_string(), "b_show".to_string()]
        );
        assert_eq!(lister.files(root.path()), vec!["notes.txt".to_string()]);
    }

    #[test]
    fn test_lister_treats_missing_path_as_empty() {
        let lister = FsLister;
        let missing = Path::new("/definitely/not/a/real/path");
        assert!(lister.subdirectories(missing).is_empty());
        assert!(lister.files(missing).is_empty());
    }

    #[tokio::test]
    async fn test_rename_entry_moves_within_parent() {
        let root = tempfile::tempdir().unwrap();
        let old = root.path().join("ep.mkv");
        std_fs::write(&old, "x").unwrap();

        let new = rename_entry(&old, "Show-S01E01.mkv").await.unwrap();
        assert_eq!(new, root.path().join("Show-S01E01.mkv"));
        assert!(new.exists());
        assert!(!old.exists());
    }

    #[tokio::test]
    async fn test_rename_entry_refuses_existing_target() {
        let root = tempfile::tempdir().unwrap();
        let old = root.path().join("a.mkv");
        std_fs::write(&old, "x").unwrap();
        std_fs::write(root.path().join("b.mkv"), "y").unwrap();

        assert!(rename_entry(&old, "b.mkv").await.is_err());
        assert!(old.exists());
    }

    #[tokio::test]
    async fn test_rename_entry_refuses_path_separators() {
        let root = tempfile::tempdir().unwrap();
        let old = root.path().join("a.mkv");
        std_fs::write(&old, "x").unwrap();

        assert!(rename_entry(&old, "../a.mkv").await.is_err());
    }
}
