use crate::ValidationReport;
use site_builder_core::catalog::{
    ComponentCategory, ComponentRegistry, EditableField, FieldInput, TemplateDefinition,
};
use site_builder_core::{ComponentInstance, FieldData, PageDocument, ROOT_PAGE_ID, slugify};
use serde_json::Value;
use std::collections::HashSet;

/// How deep nested component slots may go
pub const MAX_NESTING_DEPTH: usize = 3;

/// Validate a page document against its site's template and the component
/// catalog.
///
/// Errors: undeclared slots, unknown component types, duplicate instance
/// ids, components in slots that do not accept their category, slot
/// capacity overflow, and field values the definition does not allow.
/// Missing required fields are only warnings: they render as empty content.
pub fn validate_page(
    page: &PageDocument,
    template: &TemplateDefinition,
    components: &ComponentRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let page_ctx = format!("page '{}'", page.id);

    if page.title.trim().is_empty() {
        report.errors.push(format!("{}: title is empty", page_ctx));
    }

    if page.is_root() {
        if !page.slug.is_empty() {
            report
                .errors
                .push(format!("{}: the root page must have an empty slug", page_ctx));
        }
    } else if page.slug.is_empty() || slugify(&page.slug) != page.slug {
        report.errors.push(format!(
            "{}: slug '{}' must be lowercase letters, digits and hyphens",
            page_ctx, page.slug
        ));
    } else if page.slug == ROOT_PAGE_ID {
        // `index.html` belongs to the root page
        report.errors.push(format!(
            "{}: slug '{}' is reserved for the root page",
            page_ctx, page.slug
        ));
    }

    for slot_name in page.slots.keys() {
        if !template.declares_slot(slot_name) {
            report.errors.push(format!(
                "{}: slot '{}' is not declared by template '{}'",
                page_ctx, slot_name, template.id
            ));
            report.orphaned_slots.push(slot_name.clone());
        }
    }

    for slot in &template.slots {
        let items = page.slot(&slot.id);
        if items.len() > slot.max_items {
            report.errors.push(format!(
                "{}: slot '{}' holds {} components, at most {} allowed",
                page_ctx,
                slot.id,
                items.len(),
                slot.max_items
            ));
        }
        if items.len() < slot.min_items {
            report.warnings.push(format!(
                "{}: slot '{}' should hold at least {} components",
                page_ctx, slot.id, slot.min_items
            ));
        }
    }

    let mut seen_ids = HashSet::new();
    for (slot_name, instance) in page.components() {
        let allowed = template
            .slot(slot_name)
            .map(|s| s.allowed_categories.clone())
            .unwrap_or_default();
        let mut checker = Checker {
            components,
            report: &mut report,
            seen_ids: &mut seen_ids,
        };
        checker.instance(&page_ctx, slot_name, instance, &allowed, 0);
    }

    report
}

/// Re-validate existing pages against a template the site is switching to.
///
/// Content in slots the new template does not declare is preserved; it is
/// reported so the editor can offer manual cleanup.
pub fn validate_template_change<'a>(
    pages: impl IntoIterator<Item = &'a PageDocument>,
    template: &TemplateDefinition,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    for page in pages {
        for (slot_name, items) in &page.slots {
            if items.is_empty() || template.declares_slot(slot_name) {
                continue;
            }
            report.warnings.push(format!(
                "page '{}': {} component(s) in slot '{}' will not render with template '{}'",
                page.id,
                items.len(),
                slot_name,
                template.id
            ));
            if !report.orphaned_slots.contains(slot_name) {
                report.orphaned_slots.push(slot_name.clone());
            }
        }
    }
    report
}

struct Checker<'a> {
    components: &'a ComponentRegistry,
    report: &'a mut ValidationReport,
    seen_ids: &'a mut HashSet<String>,
}

impl Checker<'_> {
    fn instance(
        &mut self,
        page_ctx: &str,
        slot: &str,
        instance: &ComponentInstance,
        allowed: &[ComponentCategory],
        depth: usize,
    ) {
        let ctx = format!(
            "{}, component '{}' ({})",
            page_ctx, instance.id, instance.component_type
        );

        if instance.id.trim().is_empty() {
            self.report
                .errors
                .push(format!("{}: component id is empty", ctx));
        } else if !self.seen_ids.insert(instance.id.clone()) {
            self.report
                .errors
                .push(format!("{}: duplicate component id", ctx));
        }

        let components = self.components;
        let Some(definition) = components.find(&instance.component_type) else {
            self.report
                .errors
                .push(format!("{}: unknown component type", ctx));
            return;
        };

        if !allowed.is_empty() && !allowed.contains(&definition.category) {
            self.report.errors.push(format!(
                "{}: category '{}' is not allowed in '{}'",
                ctx,
                definition.category.as_str(),
                slot
            ));
        }

        for key in instance.data.keys() {
            if definition.field(key).is_none() {
                self.report
                    .info
                    .push(format!("{}: field '{}' is not used by this component", ctx, key));
            }
        }

        let merged = definition.merged_data(&instance.data);
        self.fields(&ctx, &definition.editable_fields, &merged, depth);
    }

    fn fields(&mut self, ctx: &str, fields: &[EditableField], data: &FieldData, depth: usize) {
        for field in fields {
            match data.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        self.report
                            .warnings
                            .push(format!("{}: required field '{}' is missing", ctx, field.name));
                    }
                }
                Some(Value::String(s)) if s.trim().is_empty() && field.required => {
                    self.report
                        .warnings
                        .push(format!("{}: required field '{}' is empty", ctx, field.name));
                }
                Some(value) => self.value(ctx, field, value, depth),
            }
        }
    }

    fn value(&mut self, ctx: &str, field: &EditableField, value: &Value, depth: usize) {
        let field_ctx = format!("{}: field '{}'", ctx, field.name);
        match &field.input {
            FieldInput::Text | FieldInput::Textarea => {
                if !value.is_string() {
                    self.error(&field_ctx, "expected text");
                }
            }
            FieldInput::Url | FieldInput::Image => match value.as_str() {
                Some(url) if is_unsafe_url(url) => self.error(&field_ctx, "unsafe URL scheme"),
                Some(_) => {}
                None => self.error(&field_ctx, "expected a URL"),
            },
            FieldInput::Email => match value.as_str() {
                Some(email) if !email.is_empty() && !is_valid_email(email) => {
                    self.error(&field_ctx, "invalid email address")
                }
                Some(_) => {}
                None => self.error(&field_ctx, "expected an email address"),
            },
            FieldInput::Color => match value.as_str() {
                Some(color) if !color.is_empty() && !is_hex_color(color) => {
                    self.error(&field_ctx, "expected a hex color like #112233")
                }
                Some(_) => {}
                None => self.error(&field_ctx, "expected a color"),
            },
            FieldInput::Checkbox => {
                if !value.is_boolean() {
                    self.error(&field_ctx, "expected true or false");
                }
            }
            FieldInput::Select { options } => {
                let choice = match value {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                };
                match choice {
                    Some(c) if options.contains(&c) => {}
                    Some(c) => self.error(
                        &field_ctx,
                        &format!("'{}' is not one of {}", c, options.join(", ")),
                    ),
                    None => self.error(&field_ctx, "expected one of the options"),
                }
            }
            FieldInput::Range { min, max, .. } => match value.as_f64() {
                Some(n) if n < *min || n > *max => {
                    self.error(&field_ctx, &format!("{} is outside {}..={}", n, min, max))
                }
                Some(_) => {}
                None => self.error(&field_ctx, "expected a number"),
            },
            FieldInput::ImageList => match value.as_array() {
                Some(items) => {
                    for item in items {
                        match item.as_str() {
                            Some(url) if is_unsafe_url(url) => {
                                self.error(&field_ctx, "unsafe URL scheme")
                            }
                            Some(_) => {}
                            None => self.error(&field_ctx, "expected a list of image URLs"),
                        }
                    }
                }
                None => self.error(&field_ctx, "expected a list of image URLs"),
            },
            FieldInput::NestedComponentSlot { allowed_categories } => {
                if depth + 1 > MAX_NESTING_DEPTH {
                    self.error(&field_ctx, "components are nested too deeply");
                    return;
                }
                match serde_json::from_value::<Vec<ComponentInstance>>(value.clone()) {
                    Ok(children) => {
                        for child in &children {
                            self.instance(ctx, &field.name, child, allowed_categories, depth + 1);
                        }
                    }
                    Err(e) => self.error(&field_ctx, &format!("expected components: {}", e)),
                }
            }
            FieldInput::RepeatingArray { item_fields } => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        let item_ctx = format!("{}[{}]", field_ctx, i);
                        match item.as_object() {
                            Some(obj) => self.fields(&item_ctx, item_fields, obj, depth),
                            None => self.error(&item_ctx, "expected an object"),
                        }
                    }
                }
                None => self.error(&field_ctx, "expected a list"),
            },
        }
    }

    fn error(&mut self, ctx: &str, message: &str) {
        self.report.errors.push(format!("{}: {}", ctx, message));
    }
}

/// Schemes that would execute script when placed in href/src. Inline
/// `data:` URLs are only allowed for images.
pub fn is_unsafe_url(url: &str) -> bool {
    let lowered: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    lowered.starts_with("javascript:")
        || lowered.starts_with("vbscript:")
        || (lowered.starts_with("data:") && !lowered.starts_with("data:image/"))
}

/// Basic email validation: one '@', non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub fn is_hex_color(s: &str) -> bool {
    let Some(hex) = s.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
}
