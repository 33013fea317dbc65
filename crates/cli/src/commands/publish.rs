use anyhow::{Context, Result};
use site_builder_generator::PublishReport;
use std::fs;
use std::path::PathBuf;

use crate::context::AppContext;

/// Render a stored page to stdout or a file
pub async fn render(
    ctx: &AppContext,
    site: &str,
    page_id: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let store = ctx.generator.store();
    let config = store.get_site_config(site).await?;
    let page = store.get_page(site, page_id).await?;
    let html = ctx
        .generator
        .render_page(&page, &config)
        .with_context(|| format!("Failed to render page '{}'", page_id))?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).context("Failed to create output directory")?;
            }
            fs::write(&path, html)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Rendered '{}' to {}", page_id, path.display());
        }
        None => print!("{}", html),
    }
    Ok(())
}

/// Publish one page, or the whole site when no page is given
pub async fn publish(ctx: &AppContext, site: &str, page_id: Option<String>) -> Result<()> {
    if let Some(page_id) = page_id {
        println!("📦 Publishing '{}' on {}...", page_id, site);
        let artifact = ctx
            .generator
            .publish_page(site, &page_id)
            .await
            .with_context(|| format!("Failed to publish page '{}'", page_id))?;
        println!("   ✓ {} ({} bytes)", artifact.url, artifact.size);
        if let Some(error) = artifact.invalidation_error {
            println!("   ⚠ Cache invalidation failed: {}", error);
        }
        return Ok(());
    }

    println!("📦 Publishing {}...", site);
    let report = ctx
        .generator
        .publish_all(site)
        .await
        .with_context(|| format!("Failed to publish {}", site))?;
    print_publish_report(&report);

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} pages failed to publish",
            report.failed.len(),
            report.failed.len() + report.published.len()
        );
    }
    Ok(())
}

fn print_publish_report(report: &PublishReport) {
    if report.published.is_empty() && report.failed.is_empty() {
        println!("   Nothing to publish");
        return;
    }
    for artifact in &report.published {
        println!("   ✓ {} ({} bytes)", artifact.url, artifact.size);
    }
    for failure in &report.failed {
        println!("   ✗ {}: {}", failure.page_id, failure.error);
    }
    if let Some(error) = &report.invalidation_error {
        println!("   ⚠ Cache invalidation failed: {}", error);
    }
    println!();
    if report.is_partial() {
        println!("⚠️  Partially published");
    } else if report.is_success() {
        println!("🎉 Published {} pages", report.published.len());
    }
}
