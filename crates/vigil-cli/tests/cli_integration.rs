//! Integration tests for the vigil CLI.
//!
//! Run with: `cargo test --package vigil-cli --test cli_integration`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const WIDGET_ID: &str = "b5507341-3a45-5121-a8c2-b017b8dce4f0";

/// Run vigil with an isolated config file.
fn run_vigil(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vigil"))
        .current_dir(home)
        .env("VIGIL_CONFIG", home.join("config.json"))
        .env_remove("RUST_LOG")
        .env_remove("VIGIL_ROOT")
        .env_remove("VIGIL_SCANNERS_ROOT")
        .env_remove("VIGIL_REGISTRY_PATH")
        .env_remove("VIGIL_INVENTORY_PATH")
        .env_remove("VIGIL_DATABASE_PATH")
        .args(args)
        .output()
        .expect("Failed to execute vigil command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn write_inventory(dir: &Path) -> PathBuf {
    let path = dir.join("inventory.json");
    fs::write(
        &path,
        r#"{"repos": [
            {"name": "Widget", "owner": {"login": "Acme"}, "url": "https://github.com/Acme/Widget"},
            {"name": "gadget", "owner": "acme"},
            {"url": "https://github.com/acme/broken"}
        ]}"#,
    )
    .unwrap();
    path
}

fn reconcile_json(dir: &Path, extra: &[&str]) -> Value {
    let inventory = write_inventory(dir);
    let registry = dir.join("registry.json");
    let mut args = vec![
        "identity",
        "reconcile",
        "--json",
        "--inventory",
        inventory.to_str().unwrap(),
        "--registry",
        registry.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);

    let output = run_vigil(dir, &args);
    assert!(
        output.status.success(),
        "reconcile should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    json(&output)
}

fn statuses(result: &Value) -> Vec<(String, String)> {
    result["identities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| {
            (
                i["canonical_key"].as_str().unwrap().to_string(),
                i["status"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

// =============================================================================
// Identity Key Tests
// =============================================================================

#[test]
fn test_identity_key_is_deterministic_across_processes() {
    let temp = TempDir::new().unwrap();

    let first = run_vigil(temp.path(), &["identity", "key", "https://github.com/Acme/Widget.git"]);
    let second = run_vigil(temp.path(), &["identity", "key", "github:acme/widget"]);

    assert!(first.status.success());
    assert!(second.status.success());
    assert_eq!(stdout(&first), stdout(&second));
    assert_eq!(
        stdout(&first).trim(),
        format!("github:acme/widget\t{}", WIDGET_ID)
    );
}

#[test]
fn test_identity_key_rejects_garbage() {
    let temp = TempDir::new().unwrap();
    let output = run_vigil(temp.path(), &["identity", "key", "not a repo"]);
    assert!(!output.status.success());
}

// =============================================================================
// Reconcile Tests
// =============================================================================

#[test]
fn test_reconcile_discovers_then_converges() {
    let temp = TempDir::new().unwrap();
    let registry = temp.path().join("registry.json");

    let first = reconcile_json(temp.path(), &["--write"]);
    assert_eq!(first["summary"]["discovered"], 2);
    assert_eq!(first["summary"]["source_issues"], 1);
    assert!(registry.exists());

    let second = reconcile_json(temp.path(), &["--write"]);
    assert_eq!(
        statuses(&second),
        vec![
            ("github:acme/gadget".to_string(), "CONVERGED".to_string()),
            ("github:acme/widget".to_string(), "CONVERGED".to_string()),
        ]
    );
    let settled = fs::read(&registry).unwrap();

    // Once converged, further writes are byte-identical.
    let third = reconcile_json(temp.path(), &["--write"]);
    assert_eq!(statuses(&third), statuses(&second));
    assert_eq!(fs::read(&registry).unwrap(), settled);
    assert!(!temp.path().join("registry.json.lock").exists());
}

#[test]
fn test_reconcile_freezes_conflicting_registry() {
    let temp = TempDir::new().unwrap();
    let registry = temp.path().join("registry.json");
    let stale = "00000000-0000-0000-0000-00000000000a";
    fs::write(
        &registry,
        format!(
            r#"{{"version": 1, "namespace": "c9c22e70-3882-4503-9db6-353d2629000b", "count": 1,
                "projects": [{{"canonical_key": "github:acme/widget", "id": "{}", "status": "CONVERGED"}}]}}"#,
            stale
        ),
    )
    .unwrap();

    let result = reconcile_json(temp.path(), &["--write"]);
    let widget = result["identities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["canonical_key"] == "github:acme/widget")
        .unwrap()
        .clone();
    assert_eq!(widget["status"], "CONFLICT_FREEZE");
    assert_eq!(widget["existing_id"], stale);
    assert_eq!(widget["minted_id"], WIDGET_ID);

    let stored: Value = serde_json::from_slice(&fs::read(&registry).unwrap()).unwrap();
    let record = stored["projects"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["canonical_key"] == "github:acme/widget")
        .unwrap()
        .clone();
    assert_eq!(record["id"], stale);
    assert_eq!(record["status"], "CONFLICT_FREEZE");
}

#[test]
fn test_reconcile_writes_patch_plan() {
    let temp = TempDir::new().unwrap();
    let plan = temp.path().join("plan.json");

    reconcile_json(temp.path(), &["--plan", plan.to_str().unwrap()]);

    let plan: Value = serde_json::from_slice(&fs::read(&plan).unwrap()).unwrap();
    let actions: Vec<_> = plan["patches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, vec!["REGISTER", "REGISTER"]);
    assert!(!temp.path().join("registry.json").exists());
}

#[test]
fn test_reconcile_database_id_is_authoritative() {
    let temp = TempDir::new().unwrap();
    let database = temp.path().join("db.json");
    fs::write(
        &database,
        r#"{"projects": [{"github_url": "https://github.com/acme/gadget", "id": "00000000-0000-0000-0000-000000000001"}]}"#,
    )
    .unwrap();

    let result = reconcile_json(temp.path(), &["--database", database.to_str().unwrap()]);
    let gadget = &result["identities"][0];
    assert_eq!(gadget["canonical_key"], "github:acme/gadget");
    assert_eq!(gadget["status"], "CONFLICT_FREEZE");
    assert_eq!(gadget["existing_id"], "00000000-0000-0000-0000-000000000001");
    assert_eq!(gadget["sources"], serde_json::json!(["inventory", "database"]));
}

#[test]
fn test_reconcile_missing_database_still_completes() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope.json");

    let result = reconcile_json(temp.path(), &["--database", missing.to_str().unwrap()]);
    assert_eq!(result["summary"]["from_database"], 0);
    assert_eq!(result["summary"]["total"], 2);
}

#[test]
fn test_adjudicate_accept_minted() {
    let temp = TempDir::new().unwrap();
    let registry = temp.path().join("registry.json");
    fs::write(
        &registry,
        r#"{"version": 1, "namespace": "c9c22e70-3882-4503-9db6-353d2629000b", "count": 1,
            "projects": [{"canonical_key": "github:acme/widget", "id": "00000000-0000-0000-0000-00000000000a", "status": "CONFLICT_FREEZE"}]}"#,
    )
    .unwrap();
    let registry_arg = registry.to_str().unwrap();

    let output = run_vigil(
        temp.path(),
        &["identity", "adjudicate", "github:acme/widget", "--accept-minted", "--registry", registry_arg],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains(WIDGET_ID));

    let again = run_vigil(
        temp.path(),
        &["identity", "adjudicate", "github:acme/widget", "--acknowledge", "--registry", registry_arg],
    );
    assert!(!again.status.success(), "converged records cannot be adjudicated");

    let result = reconcile_json(temp.path(), &[]);
    assert!(statuses(&result).contains(&(
        "github:acme/widget".to_string(),
        "CONVERGED".to_string()
    )));
}

#[test]
fn test_held_lock_blocks_writers_before_reading() {
    let temp = TempDir::new().unwrap();
    let registry = temp.path().join("registry.json");
    let lock = temp.path().join("registry.json.lock");
    // A parse failure would mean the registry was read despite the lock.
    fs::write(&registry, "{ not json").unwrap();
    fs::write(&lock, "4242\n").unwrap();

    let inventory = write_inventory(temp.path());
    let reconcile = run_vigil(
        temp.path(),
        &[
            "identity",
            "reconcile",
            "--write",
            "--inventory",
            inventory.to_str().unwrap(),
            "--registry",
            registry.to_str().unwrap(),
        ],
    );
    assert!(!reconcile.status.success());
    let stderr = String::from_utf8_lossy(&reconcile.stderr);
    assert!(stderr.contains("locked"), "unexpected error: {}", stderr);

    let adjudicate = run_vigil(
        temp.path(),
        &["identity", "adjudicate", "github:acme/widget", "--acknowledge", "--registry", registry.to_str().unwrap()],
    );
    assert!(!adjudicate.status.success());
    assert!(String::from_utf8_lossy(&adjudicate.stderr).contains("locked"));

    assert_eq!(fs::read(&registry).unwrap(), b"{ not json");
    assert!(lock.exists());
}

#[test]
fn test_adjudicate_requires_resolution() {
    let temp = TempDir::new().unwrap();
    let output = run_vigil(temp.path(), &["identity", "adjudicate", "github:acme/widget"]);
    assert!(!output.status.success());
}

// =============================================================================
// Scanner Tests
// =============================================================================

#[test]
fn test_scanners_list_builtin() {
    let temp = TempDir::new().unwrap();
    let output = run_vigil(temp.path(), &["scanners", "list"]);
    let out = stdout(&output);

    assert!(output.status.success());
    assert!(out.contains("structure"));
    assert!(out.contains("docs"));
    assert!(out.contains("empty_folders"));
}

#[test]
fn test_scanners_run_docs() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("project");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("README.md"), "# project").unwrap();

    let output = run_vigil(temp.path(), &["scanners", "run", "docs", target.to_str().unwrap()]);
    assert!(output.status.success());

    let result = json(&output);
    assert_eq!(result["count"], 2);
}

#[test]
fn test_scanners_run_unknown_fails() {
    let temp = TempDir::new().unwrap();
    let output = run_vigil(temp.path(), &["scanners", "run", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown scanner"));
}

#[test]
fn test_introspect_builtin_is_clean() {
    let temp = TempDir::new().unwrap();
    let output = run_vigil(temp.path(), &["introspect", "--json"]);
    assert!(output.status.success());

    let report = json(&output);
    assert_eq!(
        report["names"],
        serde_json::json!(["deps", "docs", "empty_folders"])
    );
    assert_eq!(report["drift"]["undocumented"], serde_json::json!([]));
    assert_eq!(report["drift"]["missing_files"], serde_json::json!([]));
}

#[test]
fn test_introspect_custom_root_reports_drift() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("scanners");
    fs::create_dir_all(root.join("alpha")).unwrap();
    fs::write(
        root.join("alpha/SCANNER_MANIFEST.yaml"),
        "category: alpha\nscanners:\n  - name: ghost\n    file: ghost.rs\n    function: scan\n",
    )
    .unwrap();
    fs::write(root.join("alpha/stray.rs"), "").unwrap();

    let output = run_vigil(
        temp.path(),
        &["--root", root.to_str().unwrap(), "introspect", "--json"],
    );
    assert!(output.status.success());

    let report = json(&output);
    assert_eq!(report["names"], serde_json::json!([]));
    assert_eq!(report["drift"]["undocumented"], serde_json::json!(["alpha/stray.rs"]));
    assert_eq!(report["drift"]["missing_files"][0]["name"], "ghost");
    assert_eq!(report["issues"][0]["kind"], "file_missing");
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_set_get_roundtrip() {
    let temp = TempDir::new().unwrap();

    let set = run_vigil(temp.path(), &["config", "set", "inventory-path", "inv.json"]);
    assert!(set.status.success());
    assert!(temp.path().join("config.json").exists());

    let get = run_vigil(temp.path(), &["config", "get", "inventory-path"]);
    assert_eq!(stdout(&get).trim(), "inv.json");

    let path = run_vigil(temp.path(), &["config", "path"]);
    assert!(stdout(&path).contains("config.json"));

    let bad = run_vigil(temp.path(), &["config", "get", "nope"]);
    assert!(!bad.status.success());
}
