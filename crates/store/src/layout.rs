//! Storage key layout.
//!
//! ```text
//! {site}/_builder/site.json            site settings
//! {site}/_builder/pages/{page_id}.json page documents
//! {site}/index.html                    root page
//! {site}/{slug}.html                   other pages
//! {site}/assets/images/{name}.{ext}    uploaded assets
//! ```

use site_builder_core::{Error, Result, slugify};

pub const BUILDER_DIR: &str = "_builder";
pub const ASSETS_DIR: &str = "assets/images";

/// Sites are addressed by domain: lowercase labels of letters, digits and
/// hyphens separated by dots.
pub fn validate_site(site: &str) -> Result<()> {
    let valid = !site.is_empty()
        && site.len() <= 253
        && site.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        });

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Invalid site '{}': expected a lowercase domain name",
            site
        )))
    }
}

/// Page ids are slugs: lowercase letters, digits and single hyphens
pub fn validate_page_id(page_id: &str) -> Result<()> {
    if page_id.is_empty() || slugify(page_id) != page_id {
        return Err(Error::Validation(format!(
            "Invalid page id '{}': use lowercase letters, digits and hyphens",
            page_id
        )));
    }
    Ok(())
}

pub fn site_config_key(site: &str) -> String {
    format!("{}/{}/site.json", site, BUILDER_DIR)
}

pub fn pages_prefix(site: &str) -> String {
    format!("{}/{}/pages/", site, BUILDER_DIR)
}

pub fn page_key(site: &str, page_id: &str) -> String {
    format!("{}{}.json", pages_prefix(site), page_id)
}

/// Key of a published artifact, `path` as returned by
/// [`site_builder_core::PageDocument::artifact_path`]
pub fn artifact_key(site: &str, path: &str) -> String {
    format!("{}/{}", site, path)
}

pub fn assets_prefix(site: &str) -> String {
    format!("{}/{}/", site, ASSETS_DIR)
}
