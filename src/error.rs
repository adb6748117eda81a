use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelmapError {
    /// Structural problems: missing descriptors, invalid keys, broken links, unregistered types.
    #[error("Schema error: {0}")]
    Schema(String),
    /// Runtime failures against the store. The driver error is kept when there is one.
    #[error("Access error: {message}")]
    Access {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RelmapError>;

impl RelmapError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
    pub fn access(message: impl Into<String>) -> Self {
        Self::Access { message: message.into(), source: None }
    }
    /// Wraps a driver error with the operation that raised it.
    pub fn wrap(message: impl Into<String>, source: rusqlite::Error) -> Self {
        let message = format!("{}: {}", message.into(), source);
        Self::Access { message, source: Some(source) }
    }
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
    pub fn is_access(&self) -> bool {
        matches!(self, Self::Access { .. })
    }
}

// Helper conversions
impl From<rusqlite::Error> for RelmapError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Access { message: e.to_string(), source: Some(e) }
    }
}
impl From<config::ConfigError> for RelmapError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
