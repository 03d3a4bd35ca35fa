//! Core documentation presence.

use std::path::Path;

use serde_json::json;

use crate::catalog::ScanOutput;

const REQUIRED: &[&str] = &["README.md", "ARCHITECTURE.md", "CHANGELOG.md"];

/// Report every required document missing from the root of `target`.
pub fn scan(target: &Path) -> anyhow::Result<ScanOutput> {
    anyhow::ensure!(target.is_dir(), "{} is not a directory", target.display());

    let items = REQUIRED
        .iter()
        .filter(|doc| !target.join(doc).is_file())
        .map(|doc| json!({ "file": doc, "status": "missing" }))
        .collect();

    Ok(ScanOutput::from_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reports_missing_docs() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("README.md"), "# hi").unwrap();

        let output = scan(temp.path()).unwrap();
        assert_eq!(output.count, 2);
        assert_eq!(output.items[0]["file"], "ARCHITECTURE.md");
    }

    #[test]
    fn test_rejects_non_directory() {
        assert!(scan(Path::new("/definitely/not/here")).is_err());
    }
}
