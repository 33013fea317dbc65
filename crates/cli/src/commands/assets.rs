use anyhow::{Context, Result};
use site_builder_store::AssetUploader;
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::AppContext;

/// Upload an image file; the media type is guessed from its extension
pub async fn upload(ctx: &AppContext, site: &str, file: PathBuf) -> Result<()> {
    let bytes = fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let media_type = guess_media_type(&file);
    let filename = file
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    println!("⬆️  Uploading {} ({})...", filename, media_type);
    let asset = ctx
        .assets
        .upload(site, &filename, &media_type, bytes)
        .await
        .with_context(|| format!("Failed to upload {}", file.display()))?;

    println!("   ✓ {} bytes stored at {}", asset.size, asset.key);
    println!("   URL: {}", asset.url);
    Ok(())
}

pub async fn list(ctx: &AppContext, site: &str) -> Result<()> {
    let assets = ctx.assets.list_assets(site).await?;
    if assets.is_empty() {
        println!("No assets uploaded to {}", site);
        return Ok(());
    }

    println!("🖼  Assets of {}:", site);
    for asset in assets {
        let uploaded = asset
            .uploaded_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("   {:>10}  {}  {}", asset.size, uploaded, asset.url);
    }
    Ok(())
}

fn guess_media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
