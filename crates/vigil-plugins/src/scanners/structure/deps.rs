//! Dependency manifest discovery.

use std::path::Path;

use serde_json::json;

use crate::catalog::ScanOutput;
use crate::scanners::{relative, walk};

const MANIFESTS: &[(&str, &str)] = &[
    ("Cargo.toml", "cargo"),
    ("package.json", "npm"),
    ("pyproject.toml", "python"),
    ("requirements.txt", "python"),
    ("go.mod", "go"),
    ("Gemfile", "ruby"),
    ("pom.xml", "maven"),
];

/// List dependency manifests below `target`, sorted by path.
pub fn scan(target: &Path) -> anyhow::Result<ScanOutput> {
    anyhow::ensure!(target.is_dir(), "{} is not a directory", target.display());

    let mut found: Vec<(String, &str)> = walk(target)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_str()?;
            MANIFESTS
                .iter()
                .find(|(file, _)| *file == name)
                .map(|(_, ecosystem)| (relative(target, e.path()), *ecosystem))
        })
        .collect();
    found.sort();

    let items = found
        .into_iter()
        .map(|(path, ecosystem)| json!({ "path": path, "ecosystem": ecosystem }))
        .collect();

    Ok(ScanOutput::from_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_finds_manifests_and_skips_vendor_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("Cargo.toml"), "").unwrap();
        fs::create_dir_all(root.join("web")).unwrap();
        fs::write(root.join("web/package.json"), "{}").unwrap();
        fs::create_dir_all(root.join("node_modules/x")).unwrap();
        fs::write(root.join("node_modules/x/package.json"), "{}").unwrap();

        let output = scan(root).unwrap();
        assert_eq!(output.count, 2);
        assert_eq!(output.items[0]["path"], "Cargo.toml");
        assert_eq!(output.items[1]["ecosystem"], "npm");
    }
}
