use anyhow::{Context, Result};
use site_builder_core::artifact_path;
use site_builder_generator::{NewPage, PageUpdate, SeedMode};
use std::io::{self, Write};
use std::path::PathBuf;

use super::{print_report, read_json};
use crate::context::AppContext;

pub async fn list(ctx: &AppContext, site: &str) -> Result<()> {
    let pages = ctx
        .generator
        .store()
        .list_pages(site)
        .await
        .with_context(|| format!("Failed to list pages of {}", site))?;

    if pages.is_empty() {
        println!("No pages. Run 'sitebuilder init {}' first", site);
        return Ok(());
    }

    println!("📄 Pages of {}:", site);
    for page in pages {
        println!(
            "   {:<20} {:<32} /{:<24} {}",
            page.id,
            page.title,
            artifact_path(&page.id, &page.slug),
            page.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn show(ctx: &AppContext, site: &str, page_id: &str) -> Result<()> {
    let page = ctx.generator.store().get_page(site, page_id).await?;
    let json = serde_json::to_string_pretty(&page).context("Failed to serialize page")?;
    println!("{}", json);
    Ok(())
}

pub async fn create(
    ctx: &AppContext,
    site: &str,
    title: String,
    page_id: Option<String>,
    meta_description: String,
    blank: bool,
) -> Result<()> {
    let page = ctx
        .generator
        .add_page(
            site,
            NewPage {
                title,
                page_id,
                meta_description,
                seed: if blank {
                    SeedMode::Blank
                } else {
                    SeedMode::Template
                },
            },
        )
        .await
        .context("Failed to create page")?;

    println!("✅ Created page '{}' at {}", page.id, page.url_path());
    Ok(())
}

pub async fn copy(
    ctx: &AppContext,
    site: &str,
    source: &str,
    title: String,
    page_id: Option<String>,
) -> Result<()> {
    let mut new_page = NewPage::new(title);
    new_page.page_id = page_id;
    let page = ctx
        .generator
        .copy_page(site, source, new_page)
        .await
        .with_context(|| format!("Failed to copy page '{}'", source))?;

    println!("✅ Copied '{}' to '{}' at {}", source, page.id, page.url_path());
    Ok(())
}

pub async fn delete(ctx: &AppContext, site: &str, page_id: &str, force: bool) -> Result<()> {
    if !force {
        print!("❓ Delete page '{}' from {}? (y/N): ", page_id, site);
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("❌ Cancelled");
            return Ok(());
        }
    }

    ctx.generator
        .delete_page(site, page_id)
        .await
        .with_context(|| format!("Failed to delete page '{}'", page_id))?;
    println!("🗑  Deleted page '{}'", page_id);
    Ok(())
}

pub async fn check(ctx: &AppContext, site: &str, page_id: &str) -> Result<()> {
    let report = ctx.generator.page_issues(site, page_id).await?;
    if report.errors.is_empty()
        && report.warnings.is_empty()
        && report.info.is_empty()
        && report.orphaned_slots.is_empty()
    {
        println!("✅ Page '{}' has no issues", page_id);
        return Ok(());
    }

    println!("🔍 Page '{}':", page_id);
    print_report(&report);
    if !report.is_valid() {
        anyhow::bail!("Page '{}' would be rejected on save", page_id);
    }
    Ok(())
}

/// Apply a page update read from a JSON file
pub async fn save(ctx: &AppContext, site: &str, page_id: &str, file: PathBuf) -> Result<()> {
    let update: PageUpdate = read_json(&file)?;
    let page = ctx
        .generator
        .save_page(site, page_id, update)
        .await
        .with_context(|| format!("Failed to save page '{}'", page_id))?;

    let components: usize = page.slots.values().map(Vec::len).sum();
    println!(
        "✅ Saved '{}' ({} components in {} slots)",
        page.id,
        components,
        page.slots.len()
    );
    Ok(())
}
