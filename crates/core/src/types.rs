use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Page id of a site's root page. Its slug is empty and it publishes to
/// `index.html`.
pub const ROOT_PAGE_ID: &str = "index";

/// Color scheme id designating the site's override map as the full palette.
pub const CUSTOM_SCHEME_ID: &str = "custom";

/// Field values of a component instance, keyed by field name.
pub type FieldData = serde_json::Map<String, Value>;

/// A component placed in a page slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    /// Unique within a page, stable across edits
    pub id: String,
    /// Component definition id
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub data: FieldData,
}

impl ComponentInstance {
    pub fn new(id: impl Into<String>, component_type: impl Into<String>, data: FieldData) -> Self {
        Self {
            id: id.into(),
            component_type: component_type.into(),
            data,
        }
    }
}

/// Persisted structure of one page of one site.
///
/// Slot contents are ordered: insertion order is render order. The map of
/// slots itself is keyed by slot name; the template decides slot order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub slots: BTreeMap<String, Vec<ComponentInstance>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl PageDocument {
    /// Create an empty page. The root page always gets an empty slug.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let id = id.into();
        let slug = if id == ROOT_PAGE_ID {
            String::new()
        } else {
            id.clone()
        };
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            slug,
            meta_description: String::new(),
            slots: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_PAGE_ID
    }

    /// Components of a slot in render order (empty when the slot is absent)
    pub fn slot(&self, name: &str) -> &[ComponentInstance] {
        self.slots.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every component instance of the page, slot by slot
    pub fn components(&self) -> impl Iterator<Item = (&str, &ComponentInstance)> {
        self.slots
            .iter()
            .flat_map(|(slot, items)| items.iter().map(move |c| (slot.as_str(), c)))
    }

    /// Relative path of the published artifact for this page
    pub fn artifact_path(&self) -> String {
        artifact_path(&self.id, &self.slug)
    }

    /// Public URL path used in navigation
    pub fn url_path(&self) -> String {
        if self.is_root() || self.slug.is_empty() {
            "/".to_string()
        } else {
            format!("/{}.html", self.slug)
        }
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Artifact path for a page: the root page maps to the site index.
pub fn artifact_path(page_id: &str, slug: &str) -> String {
    if page_id == ROOT_PAGE_ID || slug.is_empty() {
        "index.html".to_string()
    } else {
        format!("{}.html", slug)
    }
}

/// Listing entry for a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub updated_at: DateTime<Utc>,
}

/// A navigation menu item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationItem {
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub children: Vec<NavigationItem>,
}

impl NavigationItem {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            children: Vec::new(),
        }
    }
}

/// Site-wide settings, one per site (domain)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_version")]
    pub version: String,
    pub template_id: String,
    pub color_scheme_id: String,
    #[serde(default)]
    pub color_overrides: BTreeMap<String, String>,
    pub site_name: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub favicon_url: String,
    /// Page ids in navigation and publish order
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub navigation: Vec<NavigationItem>,
    #[serde(default)]
    pub footer_text: String,
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl SiteConfig {
    pub fn new(
        template_id: impl Into<String>,
        color_scheme_id: impl Into<String>,
        site_name: impl Into<String>,
    ) -> Self {
        let site_name = site_name.into();
        let now = Utc::now();
        Self {
            version: default_version(),
            template_id: template_id.into(),
            color_scheme_id: color_scheme_id.into(),
            color_overrides: BTreeMap::new(),
            footer_text: format!(
                "© {} {}. All rights reserved.",
                now.format("%Y"),
                site_name
            ),
            site_name,
            logo_url: String::new(),
            favicon_url: String::new(),
            pages: Vec::new(),
            navigation: Vec::new(),
            social_links: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn uses_custom_colors(&self) -> bool {
        self.color_scheme_id == CUSTOM_SCHEME_ID
    }
}

/// URL-safe slug: lowercase ASCII alphanumerics joined by single hyphens.
///
/// ```text
/// slugify("About Us")      → "about-us"
/// slugify("Beats & Bass")  → "beats-bass"
/// slugify("Café")          → "caf"
/// ```
pub fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
