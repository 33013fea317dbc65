pub mod assets;
pub mod catalog;
pub mod pages;
pub mod preview;
pub mod publish;
pub mod serve;
pub mod site;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use site_builder_validator::ValidationReport;
use std::fs;
use std::path::Path;

/// Read a JSON request body from a file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Print a validation report, one finding per line
pub fn print_report(report: &ValidationReport) {
    for error in &report.errors {
        println!("   ✗ {}", error);
    }
    for warning in &report.warnings {
        println!("   ⚠ {}", warning);
    }
    for info in &report.info {
        println!("   ℹ {}", info);
    }
    if !report.orphaned_slots.is_empty() {
        println!(
            "   ⚠ Content kept but not shown by this template: {}",
            report.orphaned_slots.join(", ")
        );
    }
}
