use crate::layout::{ASSETS_DIR, assets_prefix, validate_site};
use crate::storage::ObjectStorage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use site_builder_core::Result;
use site_builder_core::config::UploadSettings;
use site_builder_validator::validate_upload;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A stored upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedAsset {
    /// Storage key, `{site}/assets/images/{uuid}.{ext}`
    pub key: String,
    /// Public URL of the asset
    pub url: String,
    pub media_type: String,
    pub size: u64,
}

/// Listing entry for an uploaded asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetInfo {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Accepts image uploads for a site
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(
        &self,
        site: &str,
        filename: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedAsset>;

    /// Uploaded assets, newest first
    async fn list_assets(&self, site: &str) -> Result<Vec<AssetInfo>>;
}

/// [`AssetUploader`] writing into the site's public namespace
pub struct AssetStore {
    storage: Arc<dyn ObjectStorage>,
    settings: UploadSettings,
}

impl AssetStore {
    pub fn new(storage: Arc<dyn ObjectStorage>, settings: UploadSettings) -> Self {
        Self { storage, settings }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }
}

/// Public URL of a storage key under `{site}/`
pub fn public_url(site: &str, key: &str) -> String {
    let path = key
        .strip_prefix(site)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(key);
    format!("https://{}/{}", site, path)
}

#[async_trait]
impl AssetUploader for AssetStore {
    async fn upload(
        &self,
        site: &str,
        filename: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedAsset> {
        validate_site(site)?;
        let image_type = validate_upload(media_type, &bytes, &self.settings)?;

        // Stored names are generated; the client filename is only logged
        let key = format!(
            "{}/{}/{}.{}",
            site,
            ASSETS_DIR,
            Uuid::new_v4().simple(),
            image_type.extension()
        );
        let size = bytes.len() as u64;
        self.storage
            .write(&key, bytes, image_type.media_type())
            .await?;

        info!(site, filename, key = %key, size, "uploaded asset");
        Ok(UploadedAsset {
            url: public_url(site, &key),
            key,
            media_type: image_type.media_type().to_string(),
            size,
        })
    }

    async fn list_assets(&self, site: &str) -> Result<Vec<AssetInfo>> {
        validate_site(site)?;
        let mut assets: Vec<AssetInfo> = self
            .storage
            .list(&assets_prefix(site))
            .await?
            .into_iter()
            .map(|object| AssetInfo {
                url: public_url(site, &object.key),
                key: object.key,
                size: object.size,
                uploaded_at: object.last_modified,
            })
            .collect();
        assets.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(assets)
    }
}
