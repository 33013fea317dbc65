use anyhow::{Context, Result};
use site_builder_core::config::StorageBackend;
use site_builder_core::{AppConfig, Catalog, parse_app_config};
use site_builder_deployer::{S3Storage, WebhookInvalidator};
use site_builder_generator::SiteGenerator;
use site_builder_store::{
    AssetStore, CacheInvalidator, FsStorage, LogInvalidator, MemoryStorage, ObjectStorage,
    PageStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a command needs, built once from the config file
#[derive(Clone)]
pub struct AppContext {
    pub generator: SiteGenerator,
    pub assets: Arc<AssetStore>,
    pub storage: Arc<dyn ObjectStorage>,
    /// Root directory when documents live on the local filesystem
    pub fs_root: Option<PathBuf>,
}

impl AppContext {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        catalog: Catalog,
        config: &AppConfig,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        let store = PageStore::new(storage.clone(), Arc::new(catalog));
        Self {
            generator: SiteGenerator::new(store, invalidator),
            assets: Arc::new(AssetStore::new(storage.clone(), config.uploads.clone())),
            storage,
            fs_root: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        self.generator.catalog()
    }
}

/// Default config location: `~/.sitebuilder/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".sitebuilder").join("config.toml"))
}

/// Load the config file (absent means defaults) and wire up the backends
pub async fn load(config_path: Option<PathBuf>) -> Result<AppContext> {
    let config_path = match config_path {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = parse_app_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let catalog = config
        .load_catalog(&base_dir)
        .context("Failed to load component catalog")?;

    let (storage, fs_root): (Arc<dyn ObjectStorage>, Option<PathBuf>) = match &config.storage {
        StorageBackend::Memory => {
            warn!("memory storage selected; nothing persists after this command");
            (Arc::new(MemoryStorage::new()), None)
        }
        StorageBackend::Filesystem { root } => {
            let root = resolve_root(&base_dir, root);
            (Arc::new(FsStorage::new(root.clone())), Some(root))
        }
        StorageBackend::S3 { bucket, region } => (
            Arc::new(S3Storage::from_env(bucket.clone(), region.clone()).await),
            None,
        ),
    };

    let invalidator: Arc<dyn CacheInvalidator> = match &config.delivery.webhook_url {
        Some(url) => Arc::new(WebhookInvalidator::new(url.clone())?),
        None => Arc::new(LogInvalidator),
    };

    info!(
        backend = storage.backend_name(),
        invalidator = invalidator.name(),
        "loaded configuration"
    );

    let mut context = AppContext::new(storage, catalog, &config, invalidator);
    context.fs_root = fs_root;
    Ok(context)
}

/// Relative storage roots are taken from the config file's directory
fn resolve_root(base_dir: &Path, root: &Path) -> PathBuf {
    if root.is_absolute() {
        root.to_path_buf()
    } else {
        base_dir.join(root)
    }
}
