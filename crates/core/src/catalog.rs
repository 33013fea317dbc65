//! Read-only catalogs of component definitions, page templates and color
//! schemes.
//!
//! A [`Catalog`] is built once at startup from static definition data and
//! handed to whoever needs it. Nothing mutates it afterwards.

use crate::error::{Error, Result};
use crate::types::{CUSTOM_SCHEME_ID, FieldData};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Built-in catalog shipped with the binary
const BUILTIN_CATALOG: &str = include_str!("../catalog/builtin.toml");

/// Color keys every palette resolves, with the neutral values used when a
/// scheme (or a custom override map) leaves one out.
pub const NEUTRAL_PALETTE: &[(&str, &str)] = &[
    ("primary", "#0066cc"),
    ("secondary", "#475569"),
    ("accent", "#f59e0b"),
    ("background", "#ffffff"),
    ("surface", "#f8fafc"),
    ("text", "#1a1a2e"),
    ("text-muted", "#6b7280"),
    ("border", "#e2e8f0"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentCategory {
    Hero,
    Navigation,
    Content,
    Gallery,
    Contact,
    Footer,
    Sidebar,
}

impl ComponentCategory {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "hero" => Self::Hero,
            "navigation" => Self::Navigation,
            "content" => Self::Content,
            "gallery" => Self::Gallery,
            "contact" => Self::Contact,
            "footer" => Self::Footer,
            "sidebar" => Self::Sidebar,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Navigation => "navigation",
            Self::Content => "content",
            Self::Gallery => "gallery",
            Self::Contact => "contact",
            Self::Footer => "footer",
            Self::Sidebar => "sidebar",
        }
    }
}

/// Renderer a component definition dispatches to.
///
/// Several definitions may share a kind and differ only in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Navigation,
    HeroText,
    HeroImage,
    Heading,
    Paragraph,
    Markdown,
    Image,
    Gallery,
    FeatureGrid,
    TwoColumn,
    Testimonial,
    ContactForm,
    CallToAction,
    Spacer,
    SidebarAbout,
    Footer,
}

impl ComponentKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "navigation" => Self::Navigation,
            "hero-text" => Self::HeroText,
            "hero-image" => Self::HeroImage,
            "heading" => Self::Heading,
            "paragraph" => Self::Paragraph,
            "markdown" => Self::Markdown,
            "image" => Self::Image,
            "gallery" => Self::Gallery,
            "feature-grid" => Self::FeatureGrid,
            "two-column" => Self::TwoColumn,
            "testimonial" => Self::Testimonial,
            "contact-form" => Self::ContactForm,
            "call-to-action" => Self::CallToAction,
            "spacer" => Self::Spacer,
            "sidebar-about" => Self::SidebarAbout,
            "footer" => Self::Footer,
            _ => return None,
        })
    }
}

/// Input widget of an editable field, with its kind-specific constraints
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldInput {
    Text,
    Textarea,
    Url,
    Email,
    Select {
        options: Vec<String>,
    },
    Checkbox,
    Color,
    Image,
    ImageList,
    Range {
        min: f64,
        max: f64,
        step: f64,
    },
    NestedComponentSlot {
        allowed_categories: Vec<ComponentCategory>,
    },
    RepeatingArray {
        item_fields: Vec<EditableField>,
    },
}

/// An editable field of a component definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditableField {
    pub name: String,
    #[serde(flatten)]
    pub input: FieldInput,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub placeholder: String,
    pub help_text: String,
}

/// Definition of a reusable component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ComponentCategory,
    pub kind: ComponentKind,
    pub thumbnail: String,
    pub editable_fields: Vec<EditableField>,
    pub default_data: FieldData,
}

impl ComponentDefinition {
    pub fn field(&self, name: &str) -> Option<&EditableField> {
        self.editable_fields.iter().find(|f| f.name == name)
    }

    /// Instance data merged over the definition defaults. Instance values
    /// win; fields missing from both fall back to the field's own default.
    pub fn merged_data(&self, data: &FieldData) -> FieldData {
        let mut merged = self.default_data.clone();
        for field in &self.editable_fields {
            if !merged.contains_key(&field.name)
                && let Some(default) = &field.default
            {
                merged.insert(field.name.clone(), default.clone());
            }
        }
        for (key, value) in data {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// A region of a template where components can be placed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSlot {
    pub id: String,
    pub name: String,
    /// Empty means every category is accepted
    pub allowed_categories: Vec<ComponentCategory>,
    pub max_items: usize,
    pub min_items: usize,
}

impl TemplateSlot {
    pub fn accepts(&self, category: ComponentCategory) -> bool {
        self.allowed_categories.is_empty() || self.allowed_categories.contains(&category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateCategory {
    Business,
    Portfolio,
    Landing,
    Blog,
}

/// A component a template places on new pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedComponent {
    pub slot: String,
    pub component: String,
}

/// Definition of a page template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    pub thumbnail: String,
    pub slots: Vec<TemplateSlot>,
    pub default_color_scheme: String,
    /// Layout features, e.g. `sidebar`, `sticky-header`
    pub features: Vec<String>,
    /// Components placed on every new page
    pub seed: Vec<SeedComponent>,
    /// Extra components placed on the root page of a new site
    pub starter: Vec<SeedComponent>,
    /// Template-specific CSS appended to the base stylesheet
    pub stylesheet: String,
}

impl TemplateDefinition {
    pub fn slot(&self, id: &str) -> Option<&TemplateSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn declares_slot(&self, id: &str) -> bool {
        self.slot(id).is_some()
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// A named color palette
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorScheme {
    pub id: String,
    pub name: String,
    pub colors: BTreeMap<String, String>,
}

/// Catalog entries are looked up by id
pub trait CatalogEntry {
    /// Catalog name used in NotFound errors
    const CATALOG: &'static str;

    fn id(&self) -> &str;
}

impl CatalogEntry for ComponentDefinition {
    const CATALOG: &'static str = "component";

    fn id(&self) -> &str {
        &self.id
    }
}

impl CatalogEntry for TemplateDefinition {
    const CATALOG: &'static str = "template";

    fn id(&self) -> &str {
        &self.id
    }
}

impl CatalogEntry for ColorScheme {
    const CATALOG: &'static str = "color scheme";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Immutable lookup table preserving definition order
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Vec<T>,
    index: BTreeMap<String, usize>,
}

impl<T: CatalogEntry> Registry<T> {
    pub fn new(entries: Vec<T>) -> Result<Self> {
        let mut index = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.id().to_string(), i).is_some() {
                return Err(Error::ConfigParse(format!(
                    "Duplicate {} id '{}'",
                    T::CATALOG,
                    entry.id()
                )));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn list(&self) -> &[T] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Result<&T> {
        self.find(id).ok_or_else(|| Error::DefinitionNotFound {
            catalog: T::CATALOG,
            id: id.to_string(),
        })
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type ComponentRegistry = Registry<ComponentDefinition>;
pub type TemplateRegistry = Registry<TemplateDefinition>;
pub type ColorSchemeRegistry = Registry<ColorScheme>;

impl Registry<ComponentDefinition> {
    pub fn by_category(&self, category: ComponentCategory) -> Vec<&ComponentDefinition> {
        self.entries
            .iter()
            .filter(|c| c.category == category)
            .collect()
    }
}

/// The three registries, validated against each other
#[derive(Debug, Clone)]
pub struct Catalog {
    pub components: ComponentRegistry,
    pub templates: TemplateRegistry,
    pub color_schemes: ColorSchemeRegistry,
}

impl Catalog {
    pub fn new(
        components: Vec<ComponentDefinition>,
        templates: Vec<TemplateDefinition>,
        color_schemes: Vec<ColorScheme>,
    ) -> Result<Self> {
        let catalog = Self {
            components: Registry::new(components)?,
            templates: Registry::new(templates)?,
            color_schemes: Registry::new(color_schemes)?,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog embedded in the binary
    pub fn builtin() -> Result<Self> {
        crate::config::parse_catalog_toml_str(BUILTIN_CATALOG)
    }

    fn validate(&self) -> Result<()> {
        if self.color_schemes.contains(CUSTOM_SCHEME_ID) {
            return Err(Error::ConfigParse(format!(
                "Color scheme id '{}' is reserved",
                CUSTOM_SCHEME_ID
            )));
        }

        for component in self.components.list() {
            for field in &component.editable_fields {
                validate_field(&component.id, field)?;
            }
        }

        for template in self.templates.list() {
            let mut slot_ids = HashSet::new();
            for slot in &template.slots {
                if !slot_ids.insert(slot.id.as_str()) {
                    return Err(Error::ConfigParse(format!(
                        "Template '{}' declares slot '{}' twice",
                        template.id, slot.id
                    )));
                }
                if slot.min_items > slot.max_items {
                    return Err(Error::ConfigParse(format!(
                        "Template '{}' slot '{}': min_items > max_items",
                        template.id, slot.id
                    )));
                }
            }

            if !self.color_schemes.contains(&template.default_color_scheme) {
                return Err(Error::ConfigParse(format!(
                    "Template '{}' references unknown color scheme '{}'",
                    template.id, template.default_color_scheme
                )));
            }

            for seed in template.seed.iter().chain(&template.starter) {
                if !template.declares_slot(&seed.slot) {
                    return Err(Error::ConfigParse(format!(
                        "Template '{}' seeds undeclared slot '{}'",
                        template.id, seed.slot
                    )));
                }
                if !self.components.contains(&seed.component) {
                    return Err(Error::ConfigParse(format!(
                        "Template '{}' seeds unknown component '{}'",
                        template.id, seed.component
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_field(component_id: &str, field: &EditableField) -> Result<()> {
    match &field.input {
        FieldInput::Select { options } => {
            if options.is_empty() {
                return Err(Error::ConfigParse(format!(
                    "Component '{}' field '{}': select without options",
                    component_id, field.name
                )));
            }
            if let Some(Value::String(default)) = &field.default
                && !options.contains(default)
            {
                return Err(Error::ConfigParse(format!(
                    "Component '{}' field '{}': default '{}' is not an option",
                    component_id, field.name, default
                )));
            }
        }
        FieldInput::Range { min, max, .. } if min > max => {
            return Err(Error::ConfigParse(format!(
                "Component '{}' field '{}': range min > max",
                component_id, field.name
            )));
        }
        FieldInput::RepeatingArray { item_fields } => {
            for item in item_fields {
                validate_field(component_id, item)?;
            }
        }
        _ => {}
    }
    Ok(())
}
