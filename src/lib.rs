//! tutoria - course knowledge-base RAG pipeline and topic analytics

pub mod chat;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod kb;
pub mod llm;
pub mod rank;
pub mod store;
pub mod topics;
