//! HTML generation and page lifecycle for the site builder.
//!
//! [`render_page`] turns a page document into a complete HTML document;
//! [`SiteGenerator`] wraps it with persistence and publishing.

pub mod colors;
pub mod components;
pub mod html;
pub mod render;
mod site;

pub use colors::{color_css, resolve_palette};
pub use render::{render_component_document, render_page};
pub use site::{
    NewPage, PageFailure, PageUpdate, PublishReport, PublishedArtifact, SeedMode,
    SettingsOutcome, SettingsUpdate, SiteGenerator, SiteInit,
};
