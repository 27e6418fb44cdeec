// src/usage/files.rs
// Recursive listing of the archive directories.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every file under `root` whose extension is `extension`, in path order
///
/// A missing root yields an empty list.
pub fn list_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
        let path = entry.path();

        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lists_nested_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs/deep")).unwrap();
        fs::write(root.join("index.html"), "").unwrap();
        fs::write(root.join("docs/deep/page.html"), "").unwrap();
        fs::write(root.join("docs.html"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let files = list_files(root, "html").unwrap();
        assert_eq!(
            files,
            vec![
                root.join("docs/deep/page.html"),
                root.join("docs.html"),
                root.join("index.html"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_files(&dir.path().join("absent"), "css").unwrap().is_empty());
    }
}
