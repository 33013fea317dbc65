use crate::colors::{color_css, resolve_palette};
use crate::components::{RenderContext, render_component, try_render};
use crate::html::{html_escape, safe_url};
use site_builder_core::catalog::TemplateDefinition;
use site_builder_core::{Catalog, ComponentInstance, Error, FieldData, PageDocument, Result, SiteConfig};

/// Stylesheet shared by every template. Colors come from the
/// `--color-*` properties emitted by [`color_css`].
const BASE_CSS: &str = r#"*, *::before, *::after { box-sizing: border-box; }
body {
  margin: 0;
  font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
  line-height: 1.6;
  color: var(--color-text);
  background: var(--color-background);
}
a { color: var(--color-primary); }
img { max-width: 100%; height: auto; }
.btn {
  display: inline-block;
  padding: 0.75rem 1.5rem;
  border-radius: 6px;
  background: var(--color-primary);
  color: var(--color-background);
  text-decoration: none;
  font-weight: 600;
}
.btn:hover { background: var(--color-secondary); }
.site-header { background: var(--color-surface); }
.site-nav { display: flex; align-items: center; gap: 2rem; max-width: 1200px; margin: 0 auto; padding: 1rem 2rem; }
.site-nav.sticky, body.sticky-header .site-header { position: sticky; top: 0; z-index: 10; }
.nav-brand { font-size: 1.25rem; font-weight: 700; color: var(--color-text); text-decoration: none; }
.nav-logo { max-height: 40px; }
.nav-links { display: flex; gap: 1.5rem; list-style: none; margin: 0 0 0 auto; padding: 0; }
.nav-links a { color: var(--color-text); text-decoration: none; }
.nav-links a.active { color: var(--color-primary); font-weight: 600; }
.nav-dropdown { list-style: none; padding-left: 1rem; }
.hero { padding: 5rem 2rem; background: var(--color-surface); }
.hero h1 { font-size: 3rem; margin: 0 0 1rem; }
.hero-subtitle { font-size: 1.25rem; color: var(--color-text-muted); }
.hero-image { position: relative; background-size: cover; background-position: center; color: #ffffff; }
.hero-overlay { position: absolute; inset: 0; background: #000000; }
.hero-content { position: relative; }
.align-left { text-align: left; }
.align-center { text-align: center; }
.align-right { text-align: right; }
.layout { max-width: 1200px; margin: 0 auto; padding: 2rem; }
.layout-sidebar { display: grid; grid-template-columns: 1fr 280px; gap: 2rem; }
.layout-main > .component { margin-bottom: 2rem; }
.section-subtitle, .feature-description, .role { color: var(--color-text-muted); }
.image-small { max-width: 320px; }
.image-medium { max-width: 640px; }
.caption { color: var(--color-text-muted); font-size: 0.9rem; }
.gallery-grid, .feature-grid { display: grid; gap: 1rem; }
.columns-2 { grid-template-columns: repeat(2, 1fr); }
.columns-3 { grid-template-columns: repeat(3, 1fr); }
.columns-4 { grid-template-columns: repeat(4, 1fr); }
.feature-card { padding: 1.5rem; border: 1px solid var(--color-border); border-radius: 8px; background: var(--color-surface); }
.feature-icon { font-size: 2rem; }
.two-column { display: grid; gap: 2rem; }
.ratio-50-50 { grid-template-columns: 1fr 1fr; }
.ratio-60-40 { grid-template-columns: 3fr 2fr; }
.ratio-40-60 { grid-template-columns: 2fr 3fr; }
.testimonial { margin: 0; padding: 2rem; border-left: 4px solid var(--color-accent); background: var(--color-surface); }
.avatar { width: 48px; height: 48px; border-radius: 50%; vertical-align: middle; margin-right: 0.5rem; }
.contact-form form { display: grid; gap: 1rem; max-width: 560px; }
.contact-form label { display: grid; gap: 0.25rem; }
.contact-form input, .contact-form textarea { padding: 0.5rem; border: 1px solid var(--color-border); border-radius: 4px; }
.cta-banner { padding: 3rem 2rem; text-align: center; color: var(--color-background); border-radius: 8px; }
.cta-banner .btn { background: var(--color-background); color: var(--color-primary); }
.sidebar-about { padding: 1.5rem; background: var(--color-surface); border-radius: 8px; }
.site-footer { margin-top: 3rem; padding: 2rem; background: var(--color-surface); border-top: 1px solid var(--color-border); }
.footer-content { max-width: 1200px; margin: 0 auto; display: flex; flex-wrap: wrap; gap: 1rem; justify-content: space-between; }
.social-links { display: flex; gap: 1rem; }
.component-error { padding: 1rem; border: 2px dashed #dc2626; color: #dc2626; background: #fef2f2; font-family: monospace; }
@media (max-width: 768px) {
  .layout-sidebar, .two-column, .columns-3, .columns-4 { grid-template-columns: 1fr; }
  .nav-links { display: none; }
  .hero h1 { font-size: 2rem; }
}
"#;

/// Render a page document to a complete HTML document.
///
/// Pure: the output depends only on the catalog, the document and the site
/// settings, so an unsaved document renders exactly like a stored one.
/// Slots the template does not declare are ignored. Broken components
/// become placeholders; only a missing template fails the page.
pub fn render_page(catalog: &Catalog, page: &PageDocument, config: &SiteConfig) -> Result<String> {
    let template = template_for(catalog, config)?;
    let ctx = RenderContext {
        catalog,
        config,
        current_url: page.url_path(),
    };

    let slot_html = |slot: &str| -> String {
        page.slot(slot)
            .iter()
            .map(|instance| render_component(&ctx, instance, 0))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let with_sidebar = template.has_feature("sidebar")
        && template.declares_slot("main")
        && template.declares_slot("sidebar")
        && !page.slot("sidebar").is_empty();

    let mut body = String::new();
    for slot in &template.slots {
        let id = slot.id.as_str();
        let content = slot_html(id);
        let section = match id {
            "header" => format!(r#"<header class="site-header" data-slot="header">{}</header>"#, content),
            "footer" => format!(r#"<footer class="site-footer" data-slot="footer">{}</footer>"#, content),
            "main" if with_sidebar => format!(
                r#"<div class="layout layout-sidebar">
<main class="layout-main" data-slot="main">{}</main>
<aside class="layout-aside" data-slot="sidebar">{}</aside>
</div>"#,
                content,
                slot_html("sidebar")
            ),
            "main" => format!(
                r#"<div class="layout"><main class="layout-main" data-slot="main">{}</main></div>"#,
                content
            ),
            "sidebar" if with_sidebar => continue,
            "sidebar" => format!(
                r#"<aside class="layout layout-aside" data-slot="sidebar">{}</aside>"#,
                content
            ),
            other => format!(
                r#"<section class="slot slot-{}" data-slot="{}">{}</section>"#,
                html_escape(other),
                html_escape(other),
                content
            ),
        };
        body.push_str(&section);
        body.push('\n');
    }

    let title = if page.is_root() || page.title == config.site_name {
        html_escape(&config.site_name)
    } else {
        format!(
            "{} | {}",
            html_escape(&page.title),
            html_escape(&config.site_name)
        )
    };

    let colors = color_css(&resolve_palette(config, &catalog.color_schemes));
    Ok(document(template, config, &colors, &title, &page.meta_description, &body))
}

/// One component in a minimal styled document, for the component picker
pub fn render_component_document(
    catalog: &Catalog,
    config: &SiteConfig,
    component_type: &str,
    data: FieldData,
) -> Result<String> {
    let template = template_for(catalog, config)?;
    catalog.components.get(component_type)?;

    let ctx = RenderContext {
        catalog,
        config,
        current_url: String::new(),
    };
    let instance = ComponentInstance::new("preview", component_type, data);
    let body = format!(
        r#"<div class="layout component-preview"><main class="layout-main">{}</main></div>"#,
        try_render(&ctx, &instance, 0)?
    );
    let title = format!("Preview: {}", html_escape(component_type));
    let colors = color_css(&resolve_palette(config, &catalog.color_schemes));
    Ok(document(template, config, &colors, &title, "", &body))
}

fn template_for<'a>(catalog: &'a Catalog, config: &SiteConfig) -> Result<&'a TemplateDefinition> {
    catalog.templates.find(&config.template_id).ok_or_else(|| {
        Error::Validation(format!(
            "Site template '{}' does not exist",
            config.template_id
        ))
    })
}

fn document(
    template: &TemplateDefinition,
    config: &SiteConfig,
    colors: &str,
    title: &str,
    description: &str,
    body: &str,
) -> String {
    let description = if description.is_empty() {
        String::new()
    } else {
        format!(
            "\n    <meta name=\"description\" content=\"{}\">",
            html_escape(description)
        )
    };
    let favicon = if config.favicon_url.is_empty() {
        String::new()
    } else {
        format!(
            "\n    <link rel=\"icon\" href=\"{}\">",
            safe_url(&config.favicon_url)
        )
    };
    let body_class = if template.has_feature("sticky-header") {
        format!("template-{} sticky-header", html_escape(&template.id))
    } else {
        format!("template-{}", html_escape(&template.id))
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>{}{}
    <style>
{}{}{}
    </style>
</head>
<body id="top" class="{}">
{}</body>
</html>
"#,
        title, description, favicon, colors, BASE_CSS, template.stylesheet, body_class, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heading(id: &str, text: &str) -> ComponentInstance {
        let data = json!({ "heading": text });
        ComponentInstance::new(id, "text-heading", data.as_object().cloned().unwrap_or_default())
    }

    fn site() -> SiteConfig {
        SiteConfig::new("default", "ocean-blue", "Example")
    }

    #[test]
    fn test_render_is_deterministic() {
        let catalog = Catalog::builtin().unwrap();
        let mut page = PageDocument::new("about", "About");
        page.slots
            .insert("main".to_string(), vec![heading("a", "One"), heading("b", "Two")]);

        let first = render_page(&catalog, &page, &site()).unwrap();
        let second = render_page(&catalog, &page.clone(), &site()).unwrap();
        assert_eq!(first, second);
        assert!(first.find("One").unwrap() < first.find("Two").unwrap());
        assert!(first.contains("<title>About | Example</title>"));
    }

    #[test]
    fn test_unknown_type_does_not_blank_the_page() {
        let catalog = Catalog::builtin().unwrap();
        let mut page = PageDocument::new("about", "About");
        page.slots.insert(
            "main".to_string(),
            vec![
                heading("a", "Before"),
                ComponentInstance::new("x", "retired-widget", FieldData::new()),
                heading("b", "After"),
            ],
        );

        let html = render_page(&catalog, &page, &site()).unwrap();
        let before = html.find("Before").unwrap();
        let placeholder = html.find("component-error\" data-component-id=\"x\"").unwrap();
        let after = html.find("After").unwrap();
        assert!(before < placeholder && placeholder < after);
    }

    #[test]
    fn test_orphaned_slots_are_ignored() {
        let catalog = Catalog::builtin().unwrap();
        let mut page = PageDocument::new("about", "About");
        page.slots
            .insert("banner".to_string(), vec![heading("a", "Orphaned text")]);

        let html = render_page(&catalog, &page, &site()).unwrap();
        assert!(!html.contains("Orphaned text"));
    }

    #[test]
    fn test_custom_primary_color() {
        let catalog = Catalog::builtin().unwrap();
        let mut config = site();
        config.color_scheme_id = "custom".to_string();
        config
            .color_overrides
            .insert("primary".to_string(), "#112233".to_string());

        let html = render_page(&catalog, &PageDocument::new("index", "Home"), &config).unwrap();
        assert!(html.contains("--color-primary: #112233;"));
        assert!(html.contains("var(--color-primary)"));
        assert!(!html.contains("--color-primary: #0066cc;"));
    }

    #[test]
    fn test_missing_template_is_a_validation_error() {
        let catalog = Catalog::builtin().unwrap();
        let mut config = site();
        config.template_id = "retired".to_string();

        let err = render_page(&catalog, &PageDocument::new("index", "Home"), &config).unwrap_err();
        assert_eq!(err.kind(), site_builder_core::ErrorKind::Validation);
    }

    #[test]
    fn test_sidebar_layout() {
        let catalog = Catalog::builtin().unwrap();
        let mut page = PageDocument::new("index", "Home");
        page.slots
            .insert("main".to_string(), vec![heading("a", "Main text")]);
        let html = render_page(&catalog, &page, &site()).unwrap();
        assert!(!html.contains("layout-sidebar\""));

        page.slots
            .insert("sidebar".to_string(), vec![heading("b", "Side text")]);
        let html = render_page(&catalog, &page, &site()).unwrap();
        assert!(html.contains("layout layout-sidebar"));
        assert!(html.find("Main text").unwrap() < html.find("Side text").unwrap());
    }

    #[test]
    fn test_template_features_and_meta() {
        let catalog = Catalog::builtin().unwrap();
        let mut config = SiteConfig::new("business-classic", "modern-blue", "Acme");
        config.favicon_url = "https://acme.com/favicon.png".to_string();
        let mut page = PageDocument::new("index", "Home");
        page.meta_description = "We make \"things\"".to_string();

        let html = render_page(&catalog, &page, &config).unwrap();
        assert!(html.contains(r#"class="template-business-classic sticky-header""#));
        assert!(html.contains(r#"<meta name="description" content="We make &quot;things&quot;">"#));
        assert!(html.contains(r#"<link rel="icon" href="https://acme.com/favicon.png">"#));
        assert!(html.contains(".layout-sidebar { grid-template-columns: 1fr 300px; }"));
        assert!(html.contains("<title>Acme</title>"));
    }

    #[test]
    fn test_component_document() {
        let catalog = Catalog::builtin().unwrap();
        let html =
            render_component_document(&catalog, &site(), "hero-text", FieldData::new()).unwrap();
        assert!(html.contains("Welcome to Our Site"));
        assert!(html.starts_with("<!DOCTYPE html>"));

        let err = render_component_document(&catalog, &site(), "nope", FieldData::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
