use crate::colors::is_color_key;
use crate::render::{render_component_document, render_page};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use site_builder_core::catalog::{FieldInput, SeedComponent};
use site_builder_core::{
    CUSTOM_SCHEME_ID, Catalog, ComponentInstance, Error, FieldData, NavigationItem, PageDocument,
    ROOT_PAGE_ID, Result, SiteConfig,
};
use site_builder_store::layout::{artifact_key, validate_site};
use site_builder_store::{CacheInvalidator, PageSeed, PageStore};
use site_builder_validator::page::MAX_NESTING_DEPTH;
use site_builder_validator::{ValidationReport, is_hex_color, validate_template_change};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Settings for a new site
#[derive(Debug, Clone, Deserialize)]
pub struct SiteInit {
    pub template_id: String,
    /// Defaults to the template's color scheme
    #[serde(default)]
    pub color_scheme_id: Option<String>,
    pub site_name: String,
}

/// Initial content of a new page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    /// The template's seed components (navigation, footer, ...)
    #[default]
    Template,
    Blank,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPage {
    pub title: String,
    /// Requested id, which is also the slug
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub seed: SeedMode,
}

impl NewPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page_id: None,
            meta_description: String::new(),
            seed: SeedMode::Template,
        }
    }
}

/// Edit of a page. Absent fields keep their stored value; `slots`
/// replaces every slot at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub meta_description: Option<String>,
    pub slots: Option<BTreeMap<String, Vec<ComponentInstance>>>,
}

/// Partial update of the site settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub site_name: Option<String>,
    pub template_id: Option<String>,
    pub color_scheme_id: Option<String>,
    pub color_overrides: Option<BTreeMap<String, String>>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub footer_text: Option<String>,
    pub social_links: Option<BTreeMap<String, String>>,
    pub navigation: Option<Vec<NavigationItem>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsOutcome {
    pub config: SiteConfig,
    /// Pages with content the new template no longer shows
    pub report: ValidationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedArtifact {
    pub page_id: String,
    /// Site-relative path, `index.html` or `{slug}.html`
    pub path: String,
    pub key: String,
    /// Public URL path
    pub url: String,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidation_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFailure {
    pub page_id: String,
    pub error: String,
}

/// Per-page outcome of publishing a whole site
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub site: String,
    pub published: Vec<PublishedArtifact>,
    pub failed: Vec<PageFailure>,
    pub invalidation_error: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl PublishReport {
    fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            published: Vec::new(),
            failed: Vec::new(),
            invalidation_error: None,
            published_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Some pages published, some failed
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() && !self.published.is_empty()
    }
}

/// Renders, persists and publishes the pages of sites.
///
/// Holds no documents between calls; every operation re-reads the store.
#[derive(Clone)]
pub struct SiteGenerator {
    store: PageStore,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl SiteGenerator {
    pub fn new(store: PageStore, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self { store, invalidator }
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        self.store.catalog()
    }

    /// Render a document with the given settings. See [`render_page`].
    pub fn render_page(&self, page: &PageDocument, config: &SiteConfig) -> Result<String> {
        render_page(self.catalog(), page, config)
    }

    /// Render an unsaved document with the site's current settings
    pub async fn render_preview(&self, site: &str, page: &PageDocument) -> Result<String> {
        let config = self.store.get_site_config(site).await?;
        self.render_page(page, &config)
    }

    /// Render a single component. An uninitialized site previews with the
    /// first template of the catalog.
    pub async fn render_component_preview(
        &self,
        site: &str,
        component_type: &str,
        data: FieldData,
    ) -> Result<String> {
        let config = match self.store.find_site_config(site).await? {
            Some(config) => config,
            None => {
                let template = self
                    .catalog()
                    .templates
                    .list()
                    .first()
                    .ok_or_else(|| Error::Validation("The catalog has no templates".to_string()))?;
                SiteConfig::new(&template.id, &template.default_color_scheme, site)
            }
        };
        render_component_document(self.catalog(), &config, component_type, data)
    }

    /// Create the site settings and a starter root page
    pub async fn init_site(&self, site: &str, init: SiteInit) -> Result<SiteConfig> {
        validate_site(site)?;
        if self.store.find_site_config(site).await?.is_some() {
            return Err(Error::Conflict(format!(
                "Site '{}' is already initialized",
                site
            )));
        }
        if init.site_name.trim().is_empty() {
            return Err(Error::Validation("Site name is empty".to_string()));
        }

        let template = self.catalog().templates.get(&init.template_id)?;
        let scheme = init
            .color_scheme_id
            .unwrap_or_else(|| template.default_color_scheme.clone());
        if scheme != CUSTOM_SCHEME_ID {
            self.catalog().color_schemes.get(&scheme)?;
        }

        let mut config = SiteConfig::new(&template.id, scheme, init.site_name.trim());
        config.pages.push(ROOT_PAGE_ID.to_string());
        config.navigation.push(NavigationItem::new("Home", "/"));
        let config = self.store.save_site_config(site, config).await?;

        let mut root = PageDocument::new(ROOT_PAGE_ID, "Home");
        root.slots = self.seed_slots(template.seed.iter().chain(&template.starter));
        self.store.save_page(site, ROOT_PAGE_ID, root).await?;

        info!(site, template = %config.template_id, "initialized site");
        Ok(config)
    }

    /// Create a page, seeded from the template unless asked for a blank one
    pub async fn add_page(&self, site: &str, new_page: NewPage) -> Result<PageDocument> {
        let config = self.store.get_site_config(site).await?;
        let slots = match new_page.seed {
            SeedMode::Template => {
                let template = self.catalog().templates.get(&config.template_id)?;
                self.seed_slots(&template.seed)
            }
            SeedMode::Blank => BTreeMap::new(),
        };

        let page_id = self
            .store
            .new_page(
                site,
                PageSeed {
                    title: new_page.title,
                    slug: new_page.page_id,
                    meta_description: new_page.meta_description,
                    slots,
                },
            )
            .await?;
        self.store.get_page(site, &page_id).await
    }

    /// Duplicate a page's content under a new id. Every component, nested
    /// ones included, gets a fresh instance id.
    pub async fn copy_page(
        &self,
        site: &str,
        source_id: &str,
        new_page: NewPage,
    ) -> Result<PageDocument> {
        let source = self.store.get_page(site, source_id).await?;
        let slots = source
            .slots
            .iter()
            .map(|(slot, items)| {
                let items = items.iter().map(|c| self.fresh_copy(c, 0)).collect();
                (slot.clone(), items)
            })
            .collect();
        let meta_description = if new_page.meta_description.is_empty() {
            source.meta_description
        } else {
            new_page.meta_description
        };

        let page_id = self
            .store
            .new_page(
                site,
                PageSeed {
                    title: new_page.title,
                    slug: new_page.page_id,
                    meta_description,
                    slots,
                },
            )
            .await?;
        info!(site, source = source_id, page = %page_id, "copied page");
        self.store.get_page(site, &page_id).await
    }

    /// Apply an edit to a stored page and save it. A slug change removes
    /// the old artifact and invalidates its path.
    pub async fn save_page(
        &self,
        site: &str,
        page_id: &str,
        update: PageUpdate,
    ) -> Result<PageDocument> {
        let mut page = self.store.get_page(site, page_id).await?;
        let old_path = page.artifact_path();
        if let Some(title) = update.title {
            page.title = title;
        }
        if let Some(slug) = update.slug {
            page.slug = slug;
        }
        if let Some(meta_description) = update.meta_description {
            page.meta_description = meta_description;
        }
        if let Some(slots) = update.slots {
            page.slots = slots;
        }
        let saved = self.store.save_page(site, page_id, page).await?;

        if saved.artifact_path() != old_path {
            self.signal(site, vec![format!("/{}", old_path)]).await;
        }
        Ok(saved)
    }

    /// Delete a page and its published artifact
    pub async fn delete_page(&self, site: &str, page_id: &str) -> Result<()> {
        let path = self.store.delete_page(site, page_id).await?;
        self.signal(site, vec![format!("/{}", path)]).await;
        Ok(())
    }

    /// Update site settings.
    ///
    /// A template change never touches page content: slots the new template
    /// lacks are kept and listed in the returned report.
    pub async fn update_settings(
        &self,
        site: &str,
        update: SettingsUpdate,
    ) -> Result<SettingsOutcome> {
        let mut config = self.store.get_site_config(site).await?;
        let mut report = ValidationReport::default();

        if let Some(site_name) = update.site_name {
            if site_name.trim().is_empty() {
                return Err(Error::Validation("Site name is empty".to_string()));
            }
            config.site_name = site_name.trim().to_string();
        }

        if let Some(template_id) = update.template_id
            && template_id != config.template_id
        {
            let template = self.catalog().templates.get(&template_id)?;
            let pages = self.store.load_pages(site).await?;
            report = validate_template_change(&pages, template);
            config.template_id = template_id;
        }

        if let Some(scheme) = update.color_scheme_id {
            if scheme != CUSTOM_SCHEME_ID {
                self.catalog().color_schemes.get(&scheme)?;
            }
            config.color_scheme_id = scheme;
        }

        if let Some(overrides) = update.color_overrides {
            for (key, value) in &overrides {
                if !is_color_key(key) || !is_hex_color(value) {
                    return Err(Error::Validation(format!(
                        "Color override '{}' = '{}' must be a hex color like #112233",
                        key, value
                    )));
                }
            }
            config.color_overrides = overrides;
        }

        if let Some(logo_url) = update.logo_url {
            config.logo_url = logo_url;
        }
        if let Some(favicon_url) = update.favicon_url {
            config.favicon_url = favicon_url;
        }
        if let Some(footer_text) = update.footer_text {
            config.footer_text = footer_text;
        }
        if let Some(social_links) = update.social_links {
            config.social_links = social_links;
        }
        if let Some(navigation) = update.navigation {
            config.navigation = navigation;
        }

        let config = self.store.save_site_config(site, config).await?;
        for warning in &report.warnings {
            warn!(site, "{}", warning);
        }
        Ok(SettingsOutcome { config, report })
    }

    /// Findings for the editor: orphaned slots, missing required fields,
    /// unknown component types
    pub async fn page_issues(&self, site: &str, page_id: &str) -> Result<ValidationReport> {
        let config = self.store.get_site_config(site).await?;
        let page = self.store.get_page(site, page_id).await?;
        self.store.check_page(&config, &page)
    }

    /// Render a stored page and write it to the site's public namespace
    pub async fn publish_page(&self, site: &str, page_id: &str) -> Result<PublishedArtifact> {
        let config = self.store.get_site_config(site).await?;
        let mut artifact = self.write_page(site, &config, page_id).await?;
        artifact.invalidation_error = self.signal(site, public_paths(&artifact)).await;
        info!(site, page = page_id, key = %artifact.key, "published page");
        Ok(artifact)
    }

    /// Publish every page of a site.
    ///
    /// A page that fails is recorded and the rest still publish. Written
    /// paths are invalidated with a single signal. A site without pages
    /// publishes nothing.
    pub async fn publish_all(&self, site: &str) -> Result<PublishReport> {
        let mut report = PublishReport::new(site);
        let Some(config) = self.store.find_site_config(site).await? else {
            info!(site, "site is not initialized, nothing to publish");
            return Ok(report);
        };

        for page_id in &config.pages {
            match self.write_page(site, &config, page_id).await {
                Ok(artifact) => report.published.push(artifact),
                Err(e) => {
                    warn!(site, page = %page_id, error = %e, "page failed to publish");
                    report.failed.push(PageFailure {
                        page_id: page_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let paths: Vec<String> = report.published.iter().flat_map(public_paths).collect();
        report.invalidation_error = self.signal(site, paths).await;

        info!(
            site,
            published = report.published.len(),
            failed = report.failed.len(),
            "published site"
        );
        Ok(report)
    }

    async fn write_page(
        &self,
        site: &str,
        config: &SiteConfig,
        page_id: &str,
    ) -> Result<PublishedArtifact> {
        let page = self.store.get_page(site, page_id).await?;
        let html = self.render_page(&page, config)?;

        let path = page.artifact_path();
        let key = artifact_key(site, &path);
        let size = html.len();
        self.store
            .storage()
            .write(&key, html.into_bytes(), HTML_CONTENT_TYPE)
            .await?;

        Ok(PublishedArtifact {
            page_id: page_id.to_string(),
            url: page.url_path(),
            path,
            key,
            size,
            invalidation_error: None,
        })
    }

    /// Returns the failure message, if any
    async fn signal(&self, site: &str, paths: Vec<String>) -> Option<String> {
        if paths.is_empty() {
            return None;
        }
        match self.invalidator.invalidate(site, &paths).await {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    site,
                    invalidator = self.invalidator.name(),
                    error = %e,
                    "cache invalidation failed"
                );
                Some(e.to_string())
            }
        }
    }

    fn seed_slots<'a>(
        &self,
        seeds: impl IntoIterator<Item = &'a SeedComponent>,
    ) -> BTreeMap<String, Vec<ComponentInstance>> {
        let mut slots: BTreeMap<String, Vec<ComponentInstance>> = BTreeMap::new();
        for seed in seeds {
            let Some(definition) = self.catalog().components.find(&seed.component) else {
                warn!(component = %seed.component, "skipping unknown seed component");
                continue;
            };
            slots.entry(seed.slot.clone()).or_default().push(ComponentInstance::new(
                new_instance_id(),
                &definition.id,
                definition.default_data.clone(),
            ));
        }
        slots
    }

    fn fresh_copy(&self, instance: &ComponentInstance, depth: usize) -> ComponentInstance {
        let mut copy = instance.clone();
        copy.id = new_instance_id();

        let Some(definition) = self.catalog().components.find(&copy.component_type) else {
            return copy;
        };
        if depth >= MAX_NESTING_DEPTH {
            return copy;
        }
        for field in &definition.editable_fields {
            if matches!(field.input, FieldInput::NestedComponentSlot { .. })
                && let Some(value) = copy.data.get_mut(&field.name)
                && let Ok(children) = serde_json::from_value::<Vec<ComponentInstance>>(value.clone())
            {
                let children: Vec<ComponentInstance> = children
                    .iter()
                    .map(|child| self.fresh_copy(child, depth + 1))
                    .collect();
                if let Ok(fresh) = serde_json::to_value(children) {
                    *value = fresh;
                }
            }
        }
        copy
    }
}

fn new_instance_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("comp-{}", &uuid[..12])
}

/// Paths handed to the cache invalidator for an artifact
fn public_paths(artifact: &PublishedArtifact) -> Vec<String> {
    let mut paths = vec![format!("/{}", artifact.path)];
    if artifact.url == "/" {
        paths.push("/".to_string());
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use site_builder_core::ErrorKind;
    use site_builder_store::{MemoryStorage, ObjectStorage, RecordingInvalidator};

    const SITE: &str = "example.com";

    struct Fixture {
        generator: SiteGenerator,
        storage: Arc<MemoryStorage>,
        invalidator: Arc<RecordingInvalidator>,
    }

    fn fixture_with(invalidator: RecordingInvalidator) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let invalidator = Arc::new(invalidator);
        let store = PageStore::new(storage.clone(), Arc::new(Catalog::builtin().unwrap()));
        Fixture {
            generator: SiteGenerator::new(store, invalidator.clone()),
            storage,
            invalidator,
        }
    }

    async fn initialized() -> Fixture {
        let fixture = fixture_with(RecordingInvalidator::new());
        fixture
            .generator
            .init_site(SITE, init("default"))
            .await
            .unwrap();
        fixture
    }

    fn init(template_id: &str) -> SiteInit {
        SiteInit {
            template_id: template_id.to_string(),
            color_scheme_id: None,
            site_name: "Example".to_string(),
        }
    }

    fn component(id: &str, component_type: &str, data: serde_json::Value) -> ComponentInstance {
        ComponentInstance::new(
            id,
            component_type,
            data.as_object().cloned().unwrap_or_default(),
        )
    }

    async fn artifact(storage: &MemoryStorage, key: &str) -> String {
        String::from_utf8(storage.read(key).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_init_site_creates_starter_root_page() {
        let fixture = initialized().await;
        let store = fixture.generator.store();

        let config = store.get_site_config(SITE).await.unwrap();
        assert_eq!(config.template_id, "default");
        assert_eq!(config.color_scheme_id, "ocean-blue");
        assert_eq!(config.pages, vec![ROOT_PAGE_ID]);

        let root = store.get_page(SITE, ROOT_PAGE_ID).await.unwrap();
        assert_eq!(root.slug, "");
        assert_eq!(root.slot("header")[0].component_type, "nav-main");
        assert_eq!(root.slot("footer")[0].component_type, "footer-simple");
        assert_eq!(root.slot("main")[0].component_type, "text-heading");
    }

    #[tokio::test]
    async fn test_init_site_twice_is_conflict() {
        let fixture = initialized().await;
        let err = fixture
            .generator
            .init_site(SITE, init("default"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_init_site_unknown_template() {
        let fixture = fixture_with(RecordingInvalidator::new());
        let err = fixture
            .generator
            .init_site(SITE, init("no-such-template"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_preview_matches_published_page() {
        let fixture = initialized().await;
        let generator = &fixture.generator;

        let mut slots = generator
            .store()
            .get_page(SITE, ROOT_PAGE_ID)
            .await
            .unwrap()
            .slots;
        slots
            .entry("main".to_string())
            .or_default()
            .push(component("p1", "text-paragraph", json!({"content": "Hello there"})));

        let saved = generator
            .save_page(
                SITE,
                ROOT_PAGE_ID,
                PageUpdate {
                    slots: Some(slots),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap();

        let preview = generator.render_preview(SITE, &saved).await.unwrap();
        let published = generator.publish_page(SITE, ROOT_PAGE_ID).await.unwrap();
        assert_eq!(published.key, "example.com/index.html");
        assert_eq!(artifact(&fixture.storage, &published.key).await, preview);
        assert!(preview.contains("Hello there"));
    }

    #[tokio::test]
    async fn test_add_page_seeds_from_template() {
        let fixture = initialized().await;
        let page = fixture
            .generator
            .add_page(SITE, NewPage::new("About Us"))
            .await
            .unwrap();

        assert_eq!(page.id, "about-us");
        assert_eq!(page.slug, "about-us");
        assert_eq!(page.slot("header").len(), 1);
        assert_eq!(page.slot("footer").len(), 1);
        assert!(page.slot("main").is_empty());

        let blank = fixture
            .generator
            .add_page(
                SITE,
                NewPage {
                    seed: SeedMode::Blank,
                    ..NewPage::new("Blank")
                },
            )
            .await
            .unwrap();
        assert!(blank.slots.is_empty());
    }

    #[tokio::test]
    async fn test_add_page_with_taken_slug_is_conflict() {
        let fixture = initialized().await;
        fixture
            .generator
            .add_page(SITE, NewPage::new("Services"))
            .await
            .unwrap();

        let err = fixture
            .generator
            .add_page(
                SITE,
                NewPage {
                    page_id: Some("services".to_string()),
                    ..NewPage::new("More Services")
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_copy_page_gets_fresh_ids() {
        let fixture = initialized().await;
        let generator = &fixture.generator;

        let mut slots = generator
            .store()
            .get_page(SITE, ROOT_PAGE_ID)
            .await
            .unwrap()
            .slots;
        slots.entry("main".to_string()).or_default().push(component(
            "cols",
            "two-column",
            json!({"left": [{"id": "inner", "type": "text-paragraph", "data": {"content": "Nested"}}]}),
        ));
        generator
            .save_page(
                SITE,
                ROOT_PAGE_ID,
                PageUpdate {
                    slots: Some(slots),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap();

        let source = generator.store().get_page(SITE, ROOT_PAGE_ID).await.unwrap();
        let copy = generator
            .copy_page(SITE, ROOT_PAGE_ID, NewPage::new("Home Copy"))
            .await
            .unwrap();

        assert_eq!(copy.id, "home-copy");
        let source_main = source.slot("main");
        let copy_main = copy.slot("main");
        assert_eq!(source_main.len(), copy_main.len());
        for (a, b) in source_main.iter().zip(copy_main) {
            assert_eq!(a.component_type, b.component_type);
            assert_ne!(a.id, b.id);
        }

        let nested = copy_main[1].data["left"][0]["id"].as_str().unwrap();
        assert_ne!(nested, "inner");
        assert_eq!(copy_main[1].data["left"][0]["data"]["content"], "Nested");

        let config = generator.store().get_site_config(SITE).await.unwrap();
        assert!(config.navigation.iter().any(|n| n.url == "/home-copy.html"));
    }

    #[tokio::test]
    async fn test_save_page_round_trip() {
        let fixture = initialized().await;
        let generator = &fixture.generator;
        generator
            .add_page(SITE, NewPage::new("About"))
            .await
            .unwrap();

        let mut slots = BTreeMap::new();
        slots.insert(
            "main".to_string(),
            vec![
                component("b", "text-heading", json!({"heading": "Second"})),
                component("a", "text-heading", json!({"heading": "First"})),
            ],
        );
        generator
            .save_page(
                SITE,
                "about",
                PageUpdate {
                    title: Some("About Us".to_string()),
                    slots: Some(slots.clone()),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap();

        let loaded = generator.store().get_page(SITE, "about").await.unwrap();
        assert_eq!(loaded.title, "About Us");
        assert_eq!(loaded.slots, slots);
    }

    #[tokio::test]
    async fn test_slug_change_invalidates_old_path() {
        let fixture = initialized().await;
        let generator = &fixture.generator;
        generator.add_page(SITE, NewPage::new("About")).await.unwrap();
        generator.publish_page(SITE, "about").await.unwrap();

        generator
            .save_page(
                SITE,
                "about",
                PageUpdate {
                    slug: Some("about-us".to_string()),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(!fixture.storage.exists("example.com/about.html").await.unwrap());
        let calls = fixture.invalidator.calls().await;
        assert_eq!(
            calls.last().unwrap(),
            &(SITE.to_string(), vec!["/about.html".to_string()])
        );
    }

    #[tokio::test]
    async fn test_title_change_sends_no_invalidation() {
        let fixture = initialized().await;
        let generator = &fixture.generator;
        generator.add_page(SITE, NewPage::new("About")).await.unwrap();
        let before = fixture.invalidator.calls().await.len();

        generator
            .save_page(
                SITE,
                "about",
                PageUpdate {
                    title: Some("About Us".to_string()),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(fixture.invalidator.calls().await.len(), before);
    }

    #[tokio::test]
    async fn test_page_cannot_take_over_the_home_page() {
        let fixture = initialized().await;
        let generator = &fixture.generator;
        generator.add_page(SITE, NewPage::new("About")).await.unwrap();

        let err = generator
            .save_page(
                SITE,
                "about",
                PageUpdate {
                    slug: Some("index".to_string()),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let report = generator.publish_all(SITE).await.unwrap();
        let paths: Vec<&str> = report.published.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["index.html", "about.html"]);
        let home = artifact(&fixture.storage, "example.com/index.html").await;
        assert!(home.contains("<title>Example</title>"));
    }

    #[tokio::test]
    async fn test_custom_color_scheme_reaches_published_html() {
        let fixture = initialized().await;
        let mut overrides = BTreeMap::new();
        overrides.insert("primary".to_string(), "#112233".to_string());

        fixture
            .generator
            .update_settings(
                SITE,
                SettingsUpdate {
                    color_scheme_id: Some("custom".to_string()),
                    color_overrides: Some(overrides),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();

        fixture
            .generator
            .publish_page(SITE, ROOT_PAGE_ID)
            .await
            .unwrap();
        let html = artifact(&fixture.storage, "example.com/index.html").await;
        assert!(html.contains("--color-primary: #112233;"));
    }

    #[tokio::test]
    async fn test_invalid_settings_are_rejected() {
        let fixture = initialized().await;

        let mut overrides = BTreeMap::new();
        overrides.insert("primary".to_string(), "blue".to_string());
        let err = fixture
            .generator
            .update_settings(
                SITE,
                SettingsUpdate {
                    color_overrides: Some(overrides),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = fixture
            .generator
            .update_settings(
                SITE,
                SettingsUpdate {
                    color_scheme_id: Some("plaid".to_string()),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_template_change_preserves_and_reports_orphans() {
        let fixture = initialized().await;
        let generator = &fixture.generator;

        let mut slots = generator
            .store()
            .get_page(SITE, ROOT_PAGE_ID)
            .await
            .unwrap()
            .slots;
        slots.insert(
            "sidebar".to_string(),
            vec![component("about-box", "sidebar-about", json!({"text": "Sidebar words"}))],
        );
        generator
            .save_page(
                SITE,
                ROOT_PAGE_ID,
                PageUpdate {
                    slots: Some(slots),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap();

        let outcome = generator
            .update_settings(
                SITE,
                SettingsUpdate {
                    template_id: Some("portfolio".to_string()),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.config.template_id, "portfolio");
        assert_eq!(outcome.report.orphaned_slots, vec!["sidebar"]);

        // Content is kept but no longer rendered
        let root = generator.store().get_page(SITE, ROOT_PAGE_ID).await.unwrap();
        assert_eq!(root.slot("sidebar").len(), 1);
        generator.publish_page(SITE, ROOT_PAGE_ID).await.unwrap();
        let html = artifact(&fixture.storage, "example.com/index.html").await;
        assert!(!html.contains("Sidebar words"));

        let issues = generator.page_issues(SITE, ROOT_PAGE_ID).await.unwrap();
        assert_eq!(issues.orphaned_slots, vec!["sidebar"]);
    }

    #[tokio::test]
    async fn test_page_issues_reports_missing_required_fields() {
        let fixture = initialized().await;
        let generator = &fixture.generator;

        let mut slots = generator
            .store()
            .get_page(SITE, ROOT_PAGE_ID)
            .await
            .unwrap()
            .slots;
        slots.insert(
            "hero".to_string(),
            vec![component("hero", "hero-text", json!({"title": ""}))],
        );
        generator
            .save_page(
                SITE,
                ROOT_PAGE_ID,
                PageUpdate {
                    slots: Some(slots),
                    ..PageUpdate::default()
                },
            )
            .await
            .unwrap();

        let issues = generator.page_issues(SITE, ROOT_PAGE_ID).await.unwrap();
        assert!(issues.is_valid());
        assert!(issues.warnings.iter().any(|w| w.contains("'title'")));
    }

    #[tokio::test]
    async fn test_publish_all_reports_partial_failure() {
        let fixture = initialized().await;
        let generator = &fixture.generator;
        generator.add_page(SITE, NewPage::new("About")).await.unwrap();
        generator.add_page(SITE, NewPage::new("Contact")).await.unwrap();

        // A corrupt document is a page-level fault
        fixture
            .storage
            .write(
                "example.com/_builder/pages/about.json",
                b"{\"id\": ".to_vec(),
                "application/json",
            )
            .await
            .unwrap();

        let report = generator.publish_all(SITE).await.unwrap();
        assert_eq!(report.published.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].page_id, "about");
        assert!(report.is_partial());
        assert!(!report.is_success());

        assert!(fixture.storage.exists("example.com/index.html").await.unwrap());
        assert!(fixture.storage.exists("example.com/contact.html").await.unwrap());
        assert!(!fixture.storage.exists("example.com/about.html").await.unwrap());

        let calls = fixture.invalidator.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains(&"/index.html".to_string()));
        assert!(calls[0].1.contains(&"/contact.html".to_string()));
    }

    #[tokio::test]
    async fn test_publish_all_on_empty_site_is_noop() {
        let fixture = fixture_with(RecordingInvalidator::new());
        let report = fixture.generator.publish_all(SITE).await.unwrap();
        assert!(report.published.is_empty());
        assert!(report.is_success());
        assert!(fixture.invalidator.calls().await.is_empty());
        assert!(fixture.storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalidation_failure_does_not_fail_publish() {
        let fixture = fixture_with(RecordingInvalidator::failing());
        fixture
            .generator
            .init_site(SITE, init("landing"))
            .await
            .unwrap();

        let artifact = fixture
            .generator
            .publish_page(SITE, ROOT_PAGE_ID)
            .await
            .unwrap();
        assert!(artifact.invalidation_error.is_some());
        assert!(fixture.storage.exists("example.com/index.html").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_page_removes_document_and_artifact() {
        let fixture = initialized().await;
        let generator = &fixture.generator;
        generator.add_page(SITE, NewPage::new("About")).await.unwrap();
        generator.publish_page(SITE, "about").await.unwrap();
        assert!(fixture.storage.exists("example.com/about.html").await.unwrap());

        generator.delete_page(SITE, "about").await.unwrap();

        let err = generator.store().get_page(SITE, "about").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!fixture.storage.exists("example.com/about.html").await.unwrap());

        let calls = fixture.invalidator.calls().await;
        assert_eq!(calls.last().unwrap().1, vec!["/about.html".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_component_publishes_with_placeholder() {
        let fixture = initialized().await;
        let generator = &fixture.generator;

        // Written behind the store's back, as if the type left the catalog
        let mut root = generator.store().get_page(SITE, ROOT_PAGE_ID).await.unwrap();
        root.slots
            .entry("main".to_string())
            .or_default()
            .push(component("gone", "retired-widget", json!({})));
        fixture
            .storage
            .write(
                "example.com/_builder/pages/index.json",
                serde_json::to_vec(&root).unwrap(),
                "application/json",
            )
            .await
            .unwrap();

        let report = generator.publish_all(SITE).await.unwrap();
        assert!(report.is_success());
        let html = artifact(&fixture.storage, "example.com/index.html").await;
        assert!(html.contains("component-error"));
        assert!(html.contains("retired-widget"));
    }

    #[tokio::test]
    async fn test_component_preview() {
        let fixture = fixture_with(RecordingInvalidator::new());
        let html = fixture
            .generator
            .render_component_preview(
                SITE,
                "testimonial",
                json!({"quote": "Great work"}).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();
        assert!(html.contains("Great work"));
        assert!(html.contains("--color-primary"));
    }
}
