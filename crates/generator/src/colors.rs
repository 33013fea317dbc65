use site_builder_core::SiteConfig;
use site_builder_core::catalog::{ColorSchemeRegistry, NEUTRAL_PALETTE};
use site_builder_validator::is_hex_color;
use std::collections::BTreeMap;
use tracing::warn;

/// Resolve the palette a site renders with.
///
/// Starts from the neutral palette, then applies the named scheme and the
/// site's overrides on top. With the `custom` scheme the overrides are the
/// whole palette. Any key still unresolved keeps its neutral value, so
/// rendering never fails over a color.
pub fn resolve_palette(
    config: &SiteConfig,
    schemes: &ColorSchemeRegistry,
) -> BTreeMap<String, String> {
    let mut palette: BTreeMap<String, String> = NEUTRAL_PALETTE
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if !config.uses_custom_colors() {
        match schemes.find(&config.color_scheme_id) {
            Some(scheme) => apply(&mut palette, &scheme.colors),
            None => warn!(
                scheme = %config.color_scheme_id,
                "unknown color scheme, using neutral colors"
            ),
        }
    }
    apply(&mut palette, &config.color_overrides);

    palette
}

fn apply(palette: &mut BTreeMap<String, String>, colors: &BTreeMap<String, String>) {
    for (key, value) in colors {
        if !is_color_key(key) || !is_hex_color(value) {
            warn!(key = %key, value = %value, "ignoring invalid color");
            continue;
        }
        palette.insert(key.clone(), value.clone());
    }
}

/// Keys become CSS custom property names
pub fn is_color_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// CSS custom properties for a palette: `--color-{key}`
pub fn color_css(palette: &BTreeMap<String, String>) -> String {
    let mut css = String::from(":root {\n");
    for (key, value) in palette {
        css.push_str(&format!("  --color-{}: {};\n", key, value));
    }
    css.push_str("}\n");
    css
}
