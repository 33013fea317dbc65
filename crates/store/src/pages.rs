use crate::layout::{
    artifact_key, page_key, site_config_key, validate_page_id, validate_site,
};
use crate::storage::ObjectStorage;
use chrono::Utc;
use site_builder_core::{
    Catalog, ComponentInstance, Error, NavigationItem, PageDocument, PageSummary, ROOT_PAGE_ID,
    Result, SiteConfig, artifact_path, slugify,
};
use site_builder_validator::{ValidationReport, validate_page};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Content of a page about to be created
#[derive(Debug, Clone, Default)]
pub struct PageSeed {
    pub title: String,
    /// Requested id and slug. Derived from the title when absent.
    pub slug: Option<String>,
    pub meta_description: String,
    pub slots: BTreeMap<String, Vec<ComponentInstance>>,
}

impl PageSeed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Persistence of site settings and page documents.
///
/// Nothing is cached: every call reads the current state from storage, and
/// concurrent saves of the same page resolve as last write wins.
#[derive(Clone)]
pub struct PageStore {
    storage: Arc<dyn ObjectStorage>,
    catalog: Arc<Catalog>,
}

impl PageStore {
    pub fn new(storage: Arc<dyn ObjectStorage>, catalog: Arc<Catalog>) -> Self {
        Self { storage, catalog }
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Site settings, or `None` when the site was never initialized
    pub async fn find_site_config(&self, site: &str) -> Result<Option<SiteConfig>> {
        validate_site(site)?;
        match self.storage.read(&site_config_key(site)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_site_config(&self, site: &str) -> Result<SiteConfig> {
        self.find_site_config(site)
            .await?
            .ok_or_else(|| Error::SiteNotFound {
                site: site.to_string(),
            })
    }

    /// Overwrite the site settings, stamping `updated_at`
    pub async fn save_site_config(&self, site: &str, mut config: SiteConfig) -> Result<SiteConfig> {
        validate_site(site)?;
        config.updated_at = Utc::now();
        let bytes = serde_json::to_vec_pretty(&config)?;
        self.storage
            .write(&site_config_key(site), bytes, JSON_CONTENT_TYPE)
            .await?;
        debug!(site, "saved site config");
        Ok(config)
    }

    /// Page summaries in navigation order. An uninitialized site has none.
    pub async fn list_pages(&self, site: &str) -> Result<Vec<PageSummary>> {
        Ok(self
            .load_pages(site)
            .await?
            .iter()
            .map(PageDocument::summary)
            .collect())
    }

    /// Every readable page document of a site, in navigation order.
    ///
    /// Documents that are missing or unreadable are skipped with a warning.
    pub async fn load_pages(&self, site: &str) -> Result<Vec<PageDocument>> {
        let Some(config) = self.find_site_config(site).await? else {
            return Ok(Vec::new());
        };

        let mut pages = Vec::with_capacity(config.pages.len());
        for page_id in &config.pages {
            match self.find_page(site, page_id).await {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => warn!(site, page = %page_id, "page listed in site config has no document"),
                Err(e) => warn!(site, page = %page_id, error = %e, "skipping unreadable page"),
            }
        }
        Ok(pages)
    }

    pub async fn find_page(&self, site: &str, page_id: &str) -> Result<Option<PageDocument>> {
        validate_site(site)?;
        validate_page_id(page_id)?;
        match self.storage.read(&page_key(site, page_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_page(&self, site: &str, page_id: &str) -> Result<PageDocument> {
        self.find_page(site, page_id)
            .await?
            .ok_or_else(|| Error::PageNotFound {
                site: site.to_string(),
                page: page_id.to_string(),
            })
    }

    /// Check a document against the site's template and the catalog
    pub fn check_page(&self, config: &SiteConfig, page: &PageDocument) -> Result<ValidationReport> {
        let template = self.catalog.templates.get(&config.template_id)?;
        Ok(validate_page(page, template, &self.catalog.components))
    }

    /// Overwrite a page document.
    ///
    /// The page must be registered in the site config. The document is
    /// validated against the active template and its slug must not collide
    /// with another page. `created_at` is carried over from the stored
    /// document; `updated_at` is stamped.
    pub async fn save_page(
        &self,
        site: &str,
        page_id: &str,
        mut page: PageDocument,
    ) -> Result<PageDocument> {
        validate_site(site)?;
        validate_page_id(page_id)?;
        if page.id != page_id {
            return Err(Error::Validation(format!(
                "Document id '{}' does not match page '{}'",
                page.id, page_id
            )));
        }

        let mut config = self.get_site_config(site).await?;
        if !config.pages.iter().any(|p| p == page_id) {
            return Err(Error::PageNotFound {
                site: site.to_string(),
                page: page_id.to_string(),
            });
        }

        let report = self.check_page(&config, &page)?.into_result()?;
        for warning in &report.warnings {
            debug!(site, page = page_id, "{}", warning);
        }

        self.ensure_slug_free(site, &config, page_id, &page.slug)
            .await?;

        let previous = self.stored_page(site, page_id).await?;
        if let Some(previous) = &previous {
            page.created_at = previous.created_at;
        }
        page.updated_at = Utc::now();

        let bytes = serde_json::to_vec_pretty(&page)?;
        self.storage
            .write(&page_key(site, page_id), bytes, JSON_CONTENT_TYPE)
            .await?;

        // Keep the navigation entry pointing at the page
        if let Some(previous) = previous
            && (previous.slug != page.slug || previous.title != page.title)
        {
            let old_url = previous.url_path();
            let changed = relink(&mut config.navigation, &old_url, &page);
            if changed {
                self.save_site_config(site, config).await?;
            }
            if previous.slug != page.slug {
                // The old artifact is unreachable under the new slug
                self.storage
                    .delete(&artifact_key(site, &previous.artifact_path()))
                    .await?;
            }
        }

        info!(site, page = page_id, "saved page");
        Ok(page)
    }

    /// Create a page from a seed and register it in the site config and
    /// navigation. Returns the new page id.
    ///
    /// Without a requested slug one is derived from the title and made
    /// unique with a numeric suffix. A requested slug that is taken is a
    /// conflict.
    pub async fn new_page(&self, site: &str, seed: PageSeed) -> Result<String> {
        validate_site(site)?;
        let mut config = self.get_site_config(site).await?;
        let existing = self.load_pages(site).await?;
        let taken = |candidate: &str| {
            candidate == ROOT_PAGE_ID
                || config.pages.iter().any(|p| p == candidate)
                || existing.iter().any(|p| p.slug == candidate)
        };

        let page_id = match &seed.slug {
            Some(requested) => {
                validate_page_id(requested)?;
                if taken(requested) {
                    return Err(Error::Conflict(format!(
                        "Slug '{}' is already used on site '{}'",
                        requested, site
                    )));
                }
                requested.clone()
            }
            None => {
                let base = match slugify(&seed.title) {
                    s if s.is_empty() => "page".to_string(),
                    s => s,
                };
                let mut candidate = base.clone();
                let mut n = 2;
                while taken(&candidate) {
                    candidate = format!("{}-{}", base, n);
                    n += 1;
                }
                candidate
            }
        };

        let mut page = PageDocument::new(&page_id, seed.title);
        page.meta_description = seed.meta_description;
        page.slots = seed.slots;
        self.check_page(&config, &page)?.into_result()?;

        let bytes = serde_json::to_vec_pretty(&page)?;
        self.storage
            .write(&page_key(site, &page_id), bytes, JSON_CONTENT_TYPE)
            .await?;

        config.pages.push(page_id.clone());
        config
            .navigation
            .push(NavigationItem::new(&page.title, page.url_path()));
        self.save_site_config(site, config).await?;

        info!(site, page = %page_id, "created page");
        Ok(page_id)
    }

    /// Remove a page document, its published artifact, its entry in the
    /// page list and its navigation entry. The root page cannot be deleted.
    ///
    /// Returns the site-relative path of the removed artifact.
    pub async fn delete_page(&self, site: &str, page_id: &str) -> Result<String> {
        validate_site(site)?;
        validate_page_id(page_id)?;
        if page_id == ROOT_PAGE_ID {
            return Err(Error::Validation(format!(
                "The root page of site '{}' cannot be deleted",
                site
            )));
        }

        let mut config = self.get_site_config(site).await?;
        let page = self.stored_page(site, page_id).await?;
        let listed = config.pages.iter().any(|p| p == page_id);
        if page.is_none() && !listed {
            return Err(Error::PageNotFound {
                site: site.to_string(),
                page: page_id.to_string(),
            });
        }

        let (artifact, url) = match &page {
            Some(page) => (page.artifact_path(), page.url_path()),
            None => (
                artifact_path(page_id, page_id),
                format!("/{}.html", page_id),
            ),
        };

        self.storage.delete(&artifact_key(site, &artifact)).await?;
        self.storage.delete(&page_key(site, page_id)).await?;

        config.pages.retain(|p| p != page_id);
        unlink(&mut config.navigation, &url);
        self.save_site_config(site, config).await?;

        info!(site, page = page_id, artifact = %artifact, "deleted page");
        Ok(artifact)
    }

    /// Stored document for bookkeeping on save and delete. Backend failures
    /// propagate; a document that no longer parses reads as absent so it
    /// can still be overwritten or removed.
    async fn stored_page(&self, site: &str, page_id: &str) -> Result<Option<PageDocument>> {
        match self.find_page(site, page_id).await {
            Err(Error::Json(e)) => {
                warn!(site, page = page_id, error = %e, "stored document is corrupt");
                Ok(None)
            }
            other => other,
        }
    }

    async fn ensure_slug_free(
        &self,
        site: &str,
        config: &SiteConfig,
        page_id: &str,
        slug: &str,
    ) -> Result<()> {
        if slug.is_empty() {
            return Ok(());
        }
        for other_id in config.pages.iter().filter(|p| *p != page_id) {
            let other_slug = match self.stored_page(site, other_id).await? {
                Some(other) => other.slug,
                None => other_id.clone(),
            };
            if other_slug == slug {
                return Err(Error::Conflict(format!(
                    "Slug '{}' is already used by page '{}' on site '{}'",
                    slug, other_id, site
                )));
            }
        }
        Ok(())
    }
}

/// Point navigation entries for `old_url` at the page's current url and title
fn relink(items: &mut [NavigationItem], old_url: &str, page: &PageDocument) -> bool {
    let mut changed = false;
    for item in items {
        if item.url == old_url {
            item.url = page.url_path();
            item.label = page.title.clone();
            changed = true;
        }
        changed |= relink(&mut item.children, old_url, page);
    }
    changed
}

fn unlink(items: &mut Vec<NavigationItem>, url: &str) {
    items.retain(|item| item.url != url);
    for item in items {
        unlink(&mut item.children, url);
    }
}
