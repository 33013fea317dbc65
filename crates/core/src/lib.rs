pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::Catalog;
pub use config::{AppConfig, parse_app_config};
pub use error::{Error, ErrorKind, Result};
pub use types::*;
