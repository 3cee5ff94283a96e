//! Custom error types for tutoria

use thiserror::Error;

/// Main error type for tutoria operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("PDF extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Chat completion error: {0}")]
    Chat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Course not found: {0}")]
    CourseNotFound(i64),

    #[error("Knowledge file not found: {0}")]
    FileNotFound(i64),

    #[error("Chat session not found: {0}")]
    SessionNotFound(i64),

    #[error("Not initialized: run 'tutoria init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for tutoria
pub type Result<T> = std::result::Result<T, Error>;
