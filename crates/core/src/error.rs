use thiserror::Error;

/// Broad failure classes, used by callers that map errors onto transports
/// (HTTP status codes, CLI exit messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Render,
    Storage,
    Config,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Site '{site}' is not initialized")]
    SiteNotFound { site: String },

    #[error("Page '{page}' not found on site '{site}'")]
    PageNotFound { site: String, page: String },

    #[error("Unknown {catalog} '{id}'")]
    DefinitionNotFound { catalog: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Component '{component_id}' ({component_type}) failed to render: {reason}")]
    Render {
        component_id: String,
        component_type: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigParse(_) => ErrorKind::Config,
            Error::Io(_) | Error::Storage(_) => ErrorKind::Storage,
            Error::Json(_) | Error::Validation(_) => ErrorKind::Validation,
            Error::SiteNotFound { .. }
            | Error::PageNotFound { .. }
            | Error::DefinitionNotFound { .. } => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Render { .. } => ErrorKind::Render,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
