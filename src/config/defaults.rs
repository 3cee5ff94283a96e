//! Default values for configuration

use std::path::PathBuf;

/// Default chat completion base URL
pub fn default_chat_base_url() -> String {
    std::env::var("TUTORIA_CHAT_BASE_URL")
        .unwrap_or_else(|_| "https://api.openai.com".to_string())
}

/// Default chat completion model
pub fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default environment variable holding the chat API key
pub fn default_chat_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default temperature for the assistant reply
pub fn default_chat_temperature() -> f32 {
    0.7
}

/// Temperature pinned low for topic classification determinism
pub fn default_classifier_temperature() -> f32 {
    0.1
}

/// Default embedding base URL
pub fn default_embedding_base_url() -> String {
    std::env::var("TUTORIA_EMBEDDING_BASE_URL")
        .unwrap_or_else(|_| "https://api.openai.com".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default environment variable holding the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default batch size for embedding requests
pub fn default_embedding_batch_size() -> usize {
    100
}

/// Maximum feature dimension for the lexical fallback vectorizer
pub fn default_lexical_max_features() -> usize {
    384
}

/// Default maximum characters per chunk
pub fn default_chunk_size() -> usize {
    1000
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    200
}

/// Default number of chunks injected as retrieval context
pub fn default_max_context_chunks() -> usize {
    3
}

/// Fixed weight every active student contributes to group/course aggregates
pub fn default_student_weight() -> f64 {
    10.0
}

/// Number of prior turns replayed into the assistant completion
pub fn default_history_limit() -> usize {
    20
}

/// Default database file location
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("TUTORIA_DB_PATH") {
        return PathBuf::from(path);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutoria")
        .join("tutoria.db")
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TUTORIA_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutoria")
        .join("config.toml")
}
