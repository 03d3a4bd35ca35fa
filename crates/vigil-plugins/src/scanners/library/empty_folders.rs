//! Folders with no files anywhere below them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::catalog::ScanOutput;
use crate::scanners::{relative, walk};

/// Report every folder under `target` whose subtree holds no files.
pub fn scan(target: &Path) -> anyhow::Result<ScanOutput> {
    anyhow::ensure!(target.is_dir(), "{} is not a directory", target.display());

    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    let mut occupied: BTreeSet<PathBuf> = BTreeSet::new();

    for entry in walk(target) {
        if entry.depth() == 0 {
            continue;
        }
        if entry.file_type().is_dir() {
            dirs.insert(entry.path().to_path_buf());
        } else {
            for ancestor in entry.path().ancestors().skip(1) {
                if ancestor == target || !occupied.insert(ancestor.to_path_buf()) {
                    break;
                }
            }
        }
    }

    let items = dirs
        .difference(&occupied)
        .map(|dir| json!({ "path": relative(target, dir) }))
        .collect();

    Ok(ScanOutput::from_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_nested_empty_folders_are_reported() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("ghost/inner")).unwrap();
        fs::create_dir_all(root.join("docs/drafts")).unwrap();
        fs::write(root.join("docs/index.md"), "").unwrap();

        let output = scan(root).unwrap();
        let paths: Vec<_> = output.items.iter().map(|i| i["path"].clone()).collect();
        assert_eq!(paths, vec![json!("docs/drafts"), json!("ghost"), json!("ghost/inner")]);
    }
}
