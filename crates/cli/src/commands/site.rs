use anyhow::{Context, Result};
use site_builder_generator::{SettingsUpdate, SiteInit};
use std::path::PathBuf;

use super::{print_report, read_json};
use crate::context::AppContext;

/// Create a site with its settings and a starter home page
pub async fn init(
    ctx: &AppContext,
    site: &str,
    template_id: String,
    color_scheme_id: Option<String>,
    site_name: String,
) -> Result<()> {
    println!("🏗  Initializing site {}...", site);

    let config = ctx
        .generator
        .init_site(
            site,
            SiteInit {
                template_id,
                color_scheme_id,
                site_name,
            },
        )
        .await
        .with_context(|| format!("Failed to initialize {}", site))?;

    println!("   ✓ Name: {}", config.site_name);
    println!("   ✓ Template: {}", config.template_id);
    println!("   ✓ Colors: {}", config.color_scheme_id);
    println!("   ✓ Pages: {}", config.pages.join(", "));
    println!();
    println!("Next steps:");
    println!("  sitebuilder preview {}", site);
    println!("  sitebuilder publish {}", site);
    Ok(())
}

/// Apply a settings update read from a JSON file
pub async fn settings(ctx: &AppContext, site: &str, file: PathBuf) -> Result<()> {
    let update: SettingsUpdate = read_json(&file)?;
    let outcome = ctx
        .generator
        .update_settings(site, update)
        .await
        .with_context(|| format!("Failed to update settings of {}", site))?;

    println!("✅ Settings saved for {}", site);
    println!("   Template: {}", outcome.config.template_id);
    println!("   Colors: {}", outcome.config.color_scheme_id);
    print_report(&outcome.report);
    Ok(())
}
