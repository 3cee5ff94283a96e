//! CLI command implementations

mod chat;
mod course;
mod ingest;
mod init;
mod query;
mod stats;

pub use chat::*;
pub use course::*;
pub use ingest::*;
pub use init::*;
pub use query::*;
pub use stats::*;
