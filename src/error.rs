use thiserror::Error;

/// Portico application error types
///
/// These cover startup and configuration failures. Request-path errors have
/// their own taxonomy in [`crate::gateway::GatewayError`] so they can be
/// mapped onto HTTP responses.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl Error {
    pub fn settings(message: impl Into<String>) -> Self {
        Self::Settings(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
