use crate::catalog::{
    Catalog, ColorScheme, ComponentCategory, ComponentDefinition, ComponentKind,
    EditableField, FieldInput, SeedComponent, TemplateCategory, TemplateDefinition, TemplateSlot,
};
use crate::error::{Error, Result};
use crate::types::FieldData;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Largest accepted upload, in bytes (5 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Media types accepted for uploaded assets
pub const DEFAULT_ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

// ============================================================================
// Catalog definitions
// ============================================================================

/// Raw TOML catalog structure
#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    component: Vec<RawComponent>,
    #[serde(default)]
    template: Vec<RawTemplate>,
    #[serde(default)]
    color_scheme: Vec<RawColorScheme>,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    category: String,
    kind: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    field: Vec<RawField>,
    #[serde(default)]
    default_data: FieldData,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type", default = "default_field_type")]
    input: String,
    label: Option<String>,
    #[serde(default)]
    required: bool,
    default: Option<Value>,
    options: Option<Vec<String>>,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
    #[serde(default)]
    allowed_categories: Vec<String>,
    #[serde(default)]
    item_field: Vec<RawField>,
    #[serde(default)]
    placeholder: String,
    #[serde(default)]
    help_text: String,
}

fn default_field_type() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    category: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    slot: Vec<RawSlot>,
    default_color_scheme: String,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    seed: Vec<RawSeed>,
    #[serde(default)]
    starter: Vec<RawSeed>,
    #[serde(default)]
    stylesheet: String,
}

#[derive(Debug, Deserialize)]
struct RawSlot {
    id: String,
    name: Option<String>,
    #[serde(default)]
    allowed_categories: Vec<String>,
    #[serde(default = "default_max_items")]
    max_items: usize,
    #[serde(default)]
    min_items: usize,
}

fn default_max_items() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct RawSeed {
    slot: String,
    component: String,
}

#[derive(Debug, Deserialize)]
struct RawColorScheme {
    id: String,
    name: String,
    colors: BTreeMap<String, String>,
}

/// Load a catalog definition file
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let content = fs::read_to_string(path)?;
    parse_catalog_toml_str(&content)
}

/// Parse a catalog from a TOML string
pub fn parse_catalog_toml_str(content: &str) -> Result<Catalog> {
    let raw: RawCatalog = toml::from_str(content)?;

    let components = raw
        .component
        .into_iter()
        .map(convert_component)
        .collect::<Result<Vec<_>>>()?;

    let templates = raw
        .template
        .into_iter()
        .map(convert_template)
        .collect::<Result<Vec<_>>>()?;

    let color_schemes = raw
        .color_scheme
        .into_iter()
        .map(|s| ColorScheme {
            id: s.id,
            name: s.name,
            colors: s.colors,
        })
        .collect();

    Catalog::new(components, templates, color_schemes)
}

fn convert_component(raw: RawComponent) -> Result<ComponentDefinition> {
    let category = parse_category(&raw.category, &raw.id)?;
    let kind = ComponentKind::parse(&raw.kind).ok_or_else(|| {
        Error::ConfigParse(format!(
            "Component '{}' has unknown kind '{}'",
            raw.id, raw.kind
        ))
    })?;

    let editable_fields = raw
        .field
        .into_iter()
        .map(|f| convert_field(f, &raw.id))
        .collect::<Result<Vec<_>>>()?;

    Ok(ComponentDefinition {
        id: raw.id,
        name: raw.name,
        description: raw.description,
        category,
        kind,
        thumbnail: raw.thumbnail,
        editable_fields,
        default_data: raw.default_data,
    })
}

fn convert_field(raw: RawField, component_id: &str) -> Result<EditableField> {
    let input = match raw.input.as_str() {
        "text" => FieldInput::Text,
        "textarea" => FieldInput::Textarea,
        "url" => FieldInput::Url,
        "email" => FieldInput::Email,
        "checkbox" => FieldInput::Checkbox,
        "color" => FieldInput::Color,
        "image" => FieldInput::Image,
        "image-list" => FieldInput::ImageList,
        "select" => FieldInput::Select {
            options: raw.options.unwrap_or_default(),
        },
        "range" => FieldInput::Range {
            min: raw.min.unwrap_or(0.0),
            max: raw.max.unwrap_or(100.0),
            step: raw.step.unwrap_or(1.0),
        },
        "nested-component-slot" => FieldInput::NestedComponentSlot {
            allowed_categories: raw
                .allowed_categories
                .iter()
                .filter(|c| c.as_str() != "*")
                .map(|c| parse_category(c, component_id))
                .collect::<Result<Vec<_>>>()?,
        },
        "repeating-array" => FieldInput::RepeatingArray {
            item_fields: raw
                .item_field
                .into_iter()
                .map(|f| convert_field(f, component_id))
                .collect::<Result<Vec<_>>>()?,
        },
        other => {
            return Err(Error::ConfigParse(format!(
                "Component '{}' field '{}' has unknown type '{}'",
                component_id, raw.name, other
            )));
        }
    };

    Ok(EditableField {
        label: raw.label.unwrap_or_else(|| raw.name.clone()),
        name: raw.name,
        input,
        required: raw.required,
        default: raw.default,
        placeholder: raw.placeholder,
        help_text: raw.help_text,
    })
}

fn convert_template(raw: RawTemplate) -> Result<TemplateDefinition> {
    let category = match raw.category.as_str() {
        "business" => TemplateCategory::Business,
        "portfolio" => TemplateCategory::Portfolio,
        "landing" => TemplateCategory::Landing,
        "blog" => TemplateCategory::Blog,
        other => {
            return Err(Error::ConfigParse(format!(
                "Template '{}' has unknown category '{}'",
                raw.id, other
            )));
        }
    };

    let slots = raw
        .slot
        .into_iter()
        .map(|s| {
            let allowed_categories = s
                .allowed_categories
                .iter()
                .filter(|c| c.as_str() != "*")
                .map(|c| parse_category(c, &raw.id))
                .collect::<Result<Vec<_>>>()?;
            Ok(TemplateSlot {
                name: s.name.unwrap_or_else(|| s.id.clone()),
                id: s.id,
                allowed_categories,
                max_items: s.max_items,
                min_items: s.min_items,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let seeds = |raw: Vec<RawSeed>| {
        raw.into_iter()
            .map(|s| SeedComponent {
                slot: s.slot,
                component: s.component,
            })
            .collect::<Vec<_>>()
    };

    Ok(TemplateDefinition {
        id: raw.id,
        name: raw.name,
        description: raw.description,
        category,
        thumbnail: raw.thumbnail,
        slots,
        default_color_scheme: raw.default_color_scheme,
        features: raw.features,
        seed: seeds(raw.seed),
        starter: seeds(raw.starter),
        stylesheet: raw.stylesheet,
    })
}

fn parse_category(s: &str, owner: &str) -> Result<ComponentCategory> {
    ComponentCategory::parse(s).ok_or_else(|| {
        Error::ConfigParse(format!("'{}' references unknown category '{}'", owner, s))
    })
}

// ============================================================================
// Application configuration
// ============================================================================

/// Where documents, artifacts and assets are persisted
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Memory,
    Filesystem { root: PathBuf },
    S3 { bucket: String, region: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: DEFAULT_ALLOWED_IMAGE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliverySettings {
    /// Endpoint notified with the paths to invalidate after a publish
    pub webhook_url: Option<String>,
}

/// Validated application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub uploads: UploadSettings,
    pub delivery: DeliverySettings,
    /// Replacement catalog, relative to the config file
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Filesystem {
                root: PathBuf::from("sites"),
            },
            uploads: UploadSettings::default(),
            delivery: DeliverySettings::default(),
            catalog_path: None,
        }
    }
}

impl AppConfig {
    /// Catalog named by the configuration, or the built-in one
    pub fn load_catalog(&self, base_dir: &Path) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => load_catalog(base_dir.join(path)),
            None => Catalog::builtin(),
        }
    }
}

/// Raw TOML configuration structure
#[derive(Debug, Default, Deserialize)]
struct RawAppConfig {
    #[serde(default)]
    storage: Option<RawStorage>,
    #[serde(default)]
    uploads: Option<RawUploads>,
    #[serde(default)]
    delivery: Option<RawDelivery>,
    #[serde(default)]
    catalog: Option<RawCatalogRef>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    backend: String,
    root: Option<String>,
    bucket: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUploads {
    max_bytes: Option<u64>,
    allowed_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawDelivery {
    webhook_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCatalogRef {
    path: String,
}

/// Parse the application config file; a missing file yields the defaults
pub fn parse_app_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_app_config_str(&content)
}

/// Parse the application config from a string (useful for testing)
pub fn parse_app_config_str(content: &str) -> Result<AppConfig> {
    let raw: RawAppConfig = toml::from_str(content)?;
    let defaults = AppConfig::default();

    let storage = match raw.storage {
        None => defaults.storage,
        Some(s) => match s.backend.as_str() {
            "memory" => StorageBackend::Memory,
            "fs" => StorageBackend::Filesystem {
                root: PathBuf::from(s.root.unwrap_or_else(|| "sites".to_string())),
            },
            "s3" => {
                let bucket = s.bucket.filter(|b| !b.trim().is_empty()).ok_or_else(|| {
                    Error::ConfigParse("storage.bucket is required for the s3 backend".to_string())
                })?;
                StorageBackend::S3 {
                    bucket,
                    region: s.region,
                }
            }
            other => {
                return Err(Error::ConfigParse(format!(
                    "Unknown storage backend '{}', expected fs, memory or s3",
                    other
                )));
            }
        },
    };

    let uploads = match raw.uploads {
        None => defaults.uploads,
        Some(u) => {
            let allowed_types = u.allowed_types.unwrap_or(defaults.uploads.allowed_types);
            if let Some(bad) = allowed_types.iter().find(|t| !t.starts_with("image/")) {
                return Err(Error::ConfigParse(format!(
                    "uploads.allowed_types only accepts image types, got '{}'",
                    bad
                )));
            }
            UploadSettings {
                max_bytes: u.max_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
                allowed_types,
            }
        }
    };

    let delivery = DeliverySettings {
        webhook_url: raw.delivery.and_then(|d| d.webhook_url),
    };

    let catalog_path = match raw.catalog {
        Some(c) => Some(validate_path(&c.path, "catalog.path")?),
        None => None,
    };

    Ok(AppConfig {
        storage,
        uploads,
        delivery,
        catalog_path,
    })
}

/// Validate and convert a path string to PathBuf.
///
/// Rejects absolute paths and parent directory references (`..`) so that a
/// config file cannot point outside its own directory.
///
/// ```text
/// validate_path("catalog.toml", "catalog.path")         → Ok(PathBuf)
/// validate_path("/etc/passwd", "catalog.path")          → Err("Absolute paths not allowed...")
/// validate_path("../../catalog.toml", "catalog.path")   → Err("Parent directory references...")
/// ```
pub fn validate_path(path_str: &str, field_name: &str) -> Result<PathBuf> {
    let path = Path::new(path_str);

    if path.is_absolute() {
        return Err(Error::ConfigParse(format!(
            "Absolute paths not allowed in '{}': '{}'. Use relative paths only.",
            field_name, path_str
        )));
    }

    for component in path.components() {
        if component == std::path::Component::ParentDir {
            return Err(Error::ConfigParse(format!(
                "Parent directory references (..) not allowed in '{}': '{}'",
                field_name, path_str
            )));
        }
    }

    if path_str.trim().is_empty() {
        return Err(Error::ConfigParse(format!(
            "Empty path in '{}' field",
            field_name
        )));
    }

    Ok(path.to_path_buf())
}
