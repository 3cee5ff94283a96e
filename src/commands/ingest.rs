//! Knowledge-file ingestion commands

use crate::config::Config;
use crate::embed::FallbackEmbedder;
use crate::error::{Error, Result};
use crate::kb::{KnowledgeBaseProcessor, ProcessOutcome};
use crate::store::{Db, KnowledgeFile};
use std::path::Path;
use tracing::info;

/// Register a PDF with a course and run the processing pipeline on it
pub async fn cmd_ingest(
    config: &Config,
    db: &Db,
    course_id: i64,
    path: &Path,
    name: Option<String>,
) -> Result<(KnowledgeFile, ProcessOutcome)> {
    db.get_course(course_id)
        .await?
        .ok_or(Error::CourseNotFound(course_id))?;

    if !path.is_file() {
        return Err(Error::Config(format!("File not found: {}", path.display())));
    }
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Config(format!("Not a file path: {}", path.display())))?,
    };

    let path_str = path.to_string_lossy();
    let file = db.insert_knowledge_file(course_id, &name, &path_str).await?;
    info!("Registered '{}' (id {}) with course {}", name, file.id, course_id);

    let outcome = processor(config, db)?.process(file.id).await?;
    Ok((file, outcome))
}

/// Re-run processing on an already registered file, for retrying failures
/// or picking up new chunking settings.
pub async fn cmd_reprocess(config: &Config, db: &Db, file_id: i64) -> Result<ProcessOutcome> {
    processor(config, db)?.process(file_id).await
}

pub async fn cmd_remove_file(db: &Db, file_id: i64) -> Result<()> {
    db.get_knowledge_file(file_id)
        .await?
        .ok_or(Error::FileNotFound(file_id))?;
    db.delete_knowledge_file(file_id).await?;
    info!("Removed knowledge file {}", file_id);
    Ok(())
}

pub fn print_process_outcome(name: &str, outcome: &ProcessOutcome) {
    if outcome.success {
        println!("✓ Processed '{}'", name);
        println!("  Chunks: {}", outcome.chunks_count);
        println!("  Text length: {} chars", outcome.text_length);
    } else {
        println!("✗ Processing failed for '{}'", name);
        if let Some(error) = &outcome.error {
            println!("  {}", error);
        }
        println!("  The file stays registered; retry with 'reprocess'.");
    }
}

fn processor(config: &Config, db: &Db) -> Result<KnowledgeBaseProcessor> {
    let embedder = FallbackEmbedder::from_config(&config.embedding)?;
    Ok(KnowledgeBaseProcessor::new(
        db.clone(),
        Box::new(embedder),
        config.chunk.clone(),
        config.retrieval.clone(),
        config.embedding.batch_size,
    ))
}
