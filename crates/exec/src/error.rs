use klio_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("packaging error: {0}")]
    Packaging(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),
    #[error("existence check failed for {path}: {source}")]
    ExistenceCheck {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ExecError {
    pub fn unsupported<T: Into<String>>(message: T) -> Self {
        Self::Unsupported(message.into())
    }
}

impl From<serde_json::Error> for ExecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
