//! Component renderers, dispatched on [`ComponentKind`].

use crate::html::{Fields, css_color, html_escape, safe_url};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};
use serde_json::Value;
use site_builder_core::catalog::ComponentKind;
use site_builder_core::{Catalog, ComponentInstance, Error, NavigationItem, Result, SiteConfig};
use site_builder_validator::is_unsafe_url;
use site_builder_validator::page::MAX_NESTING_DEPTH;
use tracing::warn;

/// What a component may need beyond its own data
pub struct RenderContext<'a> {
    pub catalog: &'a Catalog,
    pub config: &'a SiteConfig,
    /// URL path of the page being rendered, marks the active menu entry
    pub current_url: String,
}

/// Render one component instance.
///
/// Never fails: an unknown type or a broken instance becomes a visible
/// placeholder so the rest of the page still renders.
pub fn render_component(ctx: &RenderContext, instance: &ComponentInstance, depth: usize) -> String {
    match try_render(ctx, instance, depth) {
        Ok(html) => html,
        Err(err) => {
            warn!(
                component = %instance.id,
                component_type = %instance.component_type,
                error = %err,
                "rendering placeholder"
            );
            placeholder(instance, &err)
        }
    }
}

/// Render one component, failing instead of degrading to a placeholder
pub fn try_render(ctx: &RenderContext, instance: &ComponentInstance, depth: usize) -> Result<String> {
    let fail = |reason: &str| Error::Render {
        component_id: instance.id.clone(),
        component_type: instance.component_type.clone(),
        reason: reason.to_string(),
    };

    let definition = ctx
        .catalog
        .components
        .find(&instance.component_type)
        .ok_or_else(|| fail("unknown component type"))?;

    let data = definition.merged_data(&instance.data);
    let f = Fields::new(&data);

    let body = match definition.kind {
        ComponentKind::Navigation => navigation(ctx, &f),
        ComponentKind::HeroText => hero_text(&f),
        ComponentKind::HeroImage => hero_image(&f),
        ComponentKind::Heading => heading(&f),
        ComponentKind::Paragraph => paragraph(&f),
        ComponentKind::Markdown => markdown(&f.text("markdown")),
        ComponentKind::Image => image(&f),
        ComponentKind::Gallery => gallery(&f),
        ComponentKind::FeatureGrid => feature_grid(&f),
        ComponentKind::TwoColumn => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(fail("components are nested too deeply"));
            }
            two_column(ctx, &f, depth).map_err(|reason| fail(&reason))?
        }
        ComponentKind::Testimonial => testimonial(&f),
        ComponentKind::ContactForm => contact_form(&f),
        ComponentKind::CallToAction => call_to_action(&f),
        ComponentKind::Spacer => spacer(&f),
        ComponentKind::SidebarAbout => sidebar_about(&f),
        ComponentKind::Footer => footer(ctx, &f),
    };

    Ok(format!(
        r#"<div class="component component-{}" data-component-id="{}">
{}
</div>"#,
        html_escape(&definition.id),
        html_escape(&instance.id),
        body
    ))
}

fn placeholder(instance: &ComponentInstance, err: &Error) -> String {
    let reason = match err {
        Error::Render { reason, .. } => reason.clone(),
        other => other.to_string(),
    };
    format!(
        r#"<div class="component-error" data-component-id="{}" role="alert">Component <code>{}</code> could not be rendered: {}</div>"#,
        html_escape(&instance.id),
        html_escape(&instance.component_type),
        html_escape(&reason)
    )
}

fn navigation(ctx: &RenderContext, f: &Fields) -> String {
    let config = ctx.config;
    let brand = if f.flag("show_logo") && !config.logo_url.is_empty() {
        format!(
            r#"<img src="{}" alt="{}" class="nav-logo">"#,
            safe_url(&config.logo_url),
            html_escape(&config.site_name)
        )
    } else {
        html_escape(&config.site_name)
    };

    let cta = if f.text("cta_text").is_empty() {
        String::new()
    } else {
        format!(
            r#"<a href="{}" class="btn nav-cta">{}</a>"#,
            f.url("cta_link"),
            f.escaped("cta_text")
        )
    };

    format!(
        r#"<nav class="site-nav{}">
    <a href="/" class="nav-brand">{}</a>
    {}
    {}
</nav>"#,
        if f.flag("sticky") { " sticky" } else { "" },
        brand,
        nav_list(&config.navigation, &ctx.current_url, "nav-links"),
        cta
    )
}

fn nav_list(items: &[NavigationItem], current_url: &str, class: &str) -> String {
    if items.is_empty() {
        return String::new();
    }
    let entries: String = items
        .iter()
        .map(|item| {
            let active = if item.url == current_url {
                r#" class="active" aria-current="page""#
            } else {
                ""
            };
            format!(
                r#"<li><a href="{}"{}>{}</a>{}</li>"#,
                safe_url(&item.url),
                active,
                html_escape(&item.label),
                nav_list(&item.children, current_url, "nav-dropdown")
            )
        })
        .collect();
    format!(r#"<ul class="{}">{}</ul>"#, class, entries)
}

fn button(f: &Fields, text_field: &str, link_field: &str) -> String {
    if f.text(text_field).is_empty() {
        return String::new();
    }
    format!(
        r#"<a href="{}" class="btn">{}</a>"#,
        f.url(link_field),
        f.escaped(text_field)
    )
}

fn optional(tag: &str, class: &str, text: String) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!(r#"<{tag} class="{class}">{text}</{tag}>"#)
    }
}

fn hero_text(f: &Fields) -> String {
    format!(
        r#"<section class="hero hero-text align-{}">
    <h1>{}</h1>
    {}
    {}
</section>"#,
        f.choice("alignment", &["left", "center", "right"], "center"),
        f.escaped("title"),
        optional("p", "hero-subtitle", f.escaped("subtitle")),
        button(f, "cta_text", "cta_link")
    )
}

fn hero_image(f: &Fields) -> String {
    let opacity = f.number("overlay_opacity").unwrap_or(40.0).clamp(0.0, 90.0) / 100.0;
    let background = match f.url("background_image") {
        url if url.is_empty() || url == "#" => String::new(),
        url => format!(r#" style="background-image: url(&quot;{}&quot;)""#, url),
    };
    format!(
        r#"<section class="hero hero-image"{}>
    <div class="hero-overlay" style="opacity: {:.2}"></div>
    <div class="hero-content">
        <h1>{}</h1>
        {}
        {}
    </div>
</section>"#,
        background,
        opacity,
        f.escaped("title"),
        optional("p", "hero-subtitle", f.escaped("subtitle")),
        button(f, "cta_text", "cta_link")
    )
}

fn heading(f: &Fields) -> String {
    let level = f.choice("level", &["h1", "h2", "h3"], "h2");
    let anchor = match f.escaped("anchor_id") {
        id if id.is_empty() => String::new(),
        id => format!(r#" id="{}""#, id),
    };
    format!(
        r#"<div class="section-heading align-{}"{}>
    <{level}>{}</{level}>
    {}
</div>"#,
        f.choice("alignment", &["left", "center", "right"], "left"),
        anchor,
        f.escaped("heading"),
        optional("p", "section-subtitle", f.escaped("subtitle")),
    )
}

fn paragraph(f: &Fields) -> String {
    let content = f.text("content").replace("\r\n", "\n");
    let paragraphs: String = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", html_escape(p).replace('\n', "<br>")))
        .collect();
    format!(
        r#"<div class="text-block align-{}">{}</div>"#,
        f.choice("alignment", &["left", "center", "right"], "left"),
        paragraphs
    )
}

/// Markdown to HTML. Raw HTML in the source is escaped, not passed through.
pub fn markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::new();
    html::push_html(&mut out, events);
    format!(r#"<div class="rich-text">{}</div>"#, out)
}

fn image(f: &Fields) -> String {
    let img = match f.url("src") {
        src if src.is_empty() => String::new(),
        src => format!(
            r#"<img src="{}" alt="{}" loading="lazy">"#,
            src,
            f.escaped("alt")
        ),
    };
    format!(
        r#"<figure class="image image-{}">{}{}</figure>"#,
        f.choice("width", &["small", "medium", "full"], "full"),
        img,
        optional("figcaption", "caption", f.escaped("caption"))
    )
}

fn gallery(f: &Fields) -> String {
    let lightbox = f.flag("show_lightbox");
    let images: String = f
        .list("images")
        .iter()
        .filter_map(Value::as_str)
        .filter(|src| !src.trim().is_empty())
        .map(|src| {
            let src = safe_url(src);
            let img = format!(r#"<img src="{}" alt="" loading="lazy">"#, src);
            if lightbox {
                format!(r#"<a href="{}" class="gallery-item" target="_blank">{}</a>"#, src, img)
            } else {
                format!(r#"<div class="gallery-item">{}</div>"#, img)
            }
        })
        .collect();
    format!(
        r#"<section class="gallery">
    {}
    <div class="gallery-grid columns-{}">{}</div>
</section>"#,
        optional("h2", "section-title", f.escaped("title")),
        f.choice("columns", &["2", "3", "4"], "3"),
        images
    )
}

fn feature_grid(f: &Fields) -> String {
    let items: String = f
        .list("items")
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let item = Fields::new(item);
            format!(
                r#"<div class="feature-card">
        {}
        <h3>{}</h3>
        {}
    </div>"#,
                optional("div", "feature-icon", item.escaped("icon")),
                item.escaped("title"),
                optional("p", "feature-description", item.escaped("description"))
            )
        })
        .collect();
    format!(
        r#"<section class="features">
    {}
    <div class="feature-grid columns-{}">{}</div>
</section>"#,
        optional("h2", "section-title", f.escaped("title")),
        f.choice("columns", &["2", "3", "4"], "3"),
        items
    )
}

fn two_column(ctx: &RenderContext, f: &Fields, depth: usize) -> std::result::Result<String, String> {
    let column = |name: &str| -> std::result::Result<String, String> {
        let children: Vec<ComponentInstance> = match f.raw(name) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| format!("column '{}' does not hold components: {}", name, e))?,
        };
        Ok(children
            .iter()
            .map(|child| render_component(ctx, child, depth + 1))
            .collect::<Vec<_>>()
            .join("\n"))
    };

    Ok(format!(
        r#"<div class="two-column ratio-{}">
    <div class="column column-left">{}</div>
    <div class="column column-right">{}</div>
</div>"#,
        f.choice("ratio", &["50-50", "60-40", "40-60"], "50-50"),
        column("left")?,
        column("right")?
    ))
}

fn testimonial(f: &Fields) -> String {
    let avatar = match f.url("avatar") {
        src if src.is_empty() => String::new(),
        src => format!(r#"<img src="{}" alt="" class="avatar">"#, src),
    };
    format!(
        r#"<blockquote class="testimonial">
    <p>{}</p>
    <footer>{}{}{}</footer>
</blockquote>"#,
        f.escaped("quote"),
        avatar,
        optional("cite", "author", f.escaped("author")),
        optional("span", "role", f.escaped("role"))
    )
}

fn contact_form(f: &Fields) -> String {
    let phone = if f.flag("show_phone") {
        r#"<label>Phone <input type="tel" name="phone"></label>"#
    } else {
        ""
    };
    let submit = match f.escaped("submit_text") {
        s if s.is_empty() => "Send".to_string(),
        s => s,
    };
    format!(
        r#"<section class="contact-form" id="contact">
    {}
    <form action="mailto:{}" method="post" enctype="text/plain">
        <label>Name <input type="text" name="name" required></label>
        <label>Email <input type="email" name="email" required></label>
        {}
        <label>Message <textarea name="message" rows="5" required></textarea></label>
        <button type="submit" class="btn">{}</button>
    </form>
</section>"#,
        optional("h2", "section-title", f.escaped("title")),
        f.escaped("email"),
        phone,
        submit
    )
}

fn call_to_action(f: &Fields) -> String {
    format!(
        r#"<section class="cta-banner" style="background: {}">
    <h2>{}</h2>
    {}
    {}
</section>"#,
        css_color(&f.text("background"), "var(--color-primary)"),
        f.escaped("heading"),
        optional("p", "cta-text", f.escaped("text")),
        button(f, "button_text", "button_link")
    )
}

fn spacer(f: &Fields) -> String {
    let height = f.number("height").unwrap_or(40.0).clamp(0.0, 400.0);
    format!(
        r#"<div class="spacer" style="height: {}px" aria-hidden="true"></div>"#,
        height.round() as u32
    )
}

fn sidebar_about(f: &Fields) -> String {
    let image = match f.url("image") {
        src if src.is_empty() => String::new(),
        src => format!(r#"<img src="{}" alt="">"#, src),
    };
    format!(
        r#"<div class="sidebar-about">
    {}
    {}
    {}
</div>"#,
        optional("h3", "sidebar-title", f.escaped("title")),
        image,
        optional("p", "sidebar-text", f.escaped("text"))
    )
}

fn footer(ctx: &RenderContext, f: &Fields) -> String {
    let copyright = match f.text("copyright_text") {
        text if text.trim().is_empty() => html_escape(&ctx.config.footer_text),
        text => html_escape(&text),
    };

    // `name|url` lines first, then the site-wide links
    let mut links: Vec<(String, String)> = f
        .text("social_links")
        .lines()
        .filter_map(|line| line.split_once('|'))
        .map(|(name, url)| (name.trim().to_string(), url.trim().to_string()))
        .filter(|(name, url)| !name.is_empty() && !url.is_empty())
        .collect();
    for (name, url) in &ctx.config.social_links {
        if !links.iter().any(|(n, _)| n == name) {
            links.push((name.clone(), url.clone()));
        }
    }

    let social = if links.is_empty() {
        String::new()
    } else {
        let items: String = links
            .iter()
            .map(|(name, url)| {
                format!(
                    r#"<a href="{}" rel="noopener">{}</a>"#,
                    safe_url(url),
                    html_escape(name)
                )
            })
            .collect();
        format!(r#"<div class="social-links">{}</div>"#, items)
    };

    let back_to_top = if f.flag("show_back_to_top") {
        "<a href=\"#top\" class=\"back-to-top\">Back to top</a>"
    } else {
        ""
    };

    format!(
        r#"<div class="footer-content">
    <p class="copyright">{}</p>
    {}
    {}
</div>"#,
        copyright, social, back_to_top
    )
}
