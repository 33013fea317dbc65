//! Validation of page documents against the catalog, and of uploaded assets.

pub mod page;
pub mod upload;

pub use page::{
    is_hex_color, is_unsafe_url, is_valid_email, validate_page, validate_template_change,
};
pub use upload::{ImageType, validate_upload};

use serde::Serialize;

/// Findings of a validation pass.
///
/// `errors` block a save; `warnings` are surfaced to the editor but the
/// document still renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
    /// Slots holding content the active template no longer declares
    pub orphaned_slots: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold the errors into a single validation error
    pub fn into_result(self) -> site_builder_core::Result<Self> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(site_builder_core::Error::Validation(self.errors.join("; ")))
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.info.extend(other.info);
        for slot in other.orphaned_slots {
            if !self.orphaned_slots.contains(&slot) {
                self.orphaned_slots.push(slot);
            }
        }
    }
}
