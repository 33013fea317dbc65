//! Remote collaborators: S3 object storage and webhook cache invalidation.

pub mod s3;
pub mod webhook;

pub use s3::S3Storage;
pub use webhook::WebhookInvalidator;
