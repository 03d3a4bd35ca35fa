//! Introspect command: registry contents, load issues and drift.

use anyhow::Result;
use vigil_plugins::IntrospectionReport;

use crate::commands::scanners;
use crate::config::Config;

pub fn execute(config: &Config, json: bool) -> Result<()> {
    let report = scanners::load(config)?.report;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &IntrospectionReport) {
    println!("🔍 Scanner Registry");
    println!("{:─<50}", "");
    println!("📍 Root:       {}", report.root.display());
    println!("🧩 Scanners:   {}", report.names.len());
    println!();

    for (category, summary) in &report.categories {
        println!(
            "📂 {} ({}/{} registered){}",
            category,
            summary.registered.len(),
            summary.declared,
            if summary.description.is_empty() {
                String::new()
            } else {
                format!(" - {}", summary.description)
            }
        );
        for name in &summary.registered {
            println!("   • {}", name);
        }
    }

    if !report.manifest_errors.is_empty() {
        println!();
        println!("❌ Manifest errors:");
        for error in &report.manifest_errors {
            println!("   {}: {}", error.path.display(), error.reason);
        }
    }

    if !report.issues.is_empty() {
        println!();
        println!("⚠️  Load issues:");
        for issue in &report.issues {
            println!("   {}", issue);
        }
    }

    let drift = &report.drift;
    println!();
    if drift.is_clean() {
        println!("✅ No drift between manifests and disk");
        return;
    }

    if !drift.undocumented.is_empty() {
        println!("📄 Undocumented:");
        for path in &drift.undocumented {
            println!("   {}", path);
        }
    }
    if !drift.missing_files.is_empty() {
        println!("🕳️  Missing:");
        for missing in &drift.missing_files {
            println!(
                "   {}/{} ({}::{}, {:?})",
                missing.category, missing.name, missing.file, missing.function, missing.reason
            );
        }
    }
    for mismatch in &drift.category_mismatches {
        println!(
            "🔀 {} declared in {} but found in {}",
            mismatch.file,
            mismatch.declared_in,
            mismatch.found_in.join(", ")
        );
    }
}
