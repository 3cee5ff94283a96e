//! Query command implementation

use crate::config::Config;
use crate::embed::FallbackEmbedder;
use crate::error::{Error, Result};
use crate::kb::KnowledgeBaseProcessor;
use crate::rank::RankedChunk;
use crate::store::Db;
use serde::Serialize;
use tracing::info;

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<RankedChunk>,
}

/// Search a course's knowledge base directly, without the chat flow
pub async fn cmd_query(
    config: &Config,
    db: &Db,
    course_id: i64,
    query: &str,
    limit: usize,
) -> Result<QueryResult> {
    db.get_course(course_id)
        .await?
        .ok_or(Error::CourseNotFound(course_id))?;

    info!("Querying course {}: {}", course_id, query);

    let embedder = FallbackEmbedder::from_config(&config.embedding)?;
    let processor = KnowledgeBaseProcessor::new(
        db.clone(),
        Box::new(embedder),
        config.chunk.clone(),
        config.retrieval.clone(),
        config.embedding.batch_size,
    );
    let results = processor.find_relevant_chunks(query, course_id, limit).await?;
    info!("Returning {} results", results.len());

    Ok(QueryResult {
        query: query.to_string(),
        results,
    })
}

/// Print query results to console
pub fn print_query_results(result: &QueryResult) {
    println!("\n🔍 Query: {}\n", result.query);
    println!("Found {} results:\n", result.results.len());

    for (i, r) in result.results.iter().enumerate() {
        println!(
            "{}. [score: {:.3}] {} (chunk {})",
            i + 1,
            r.score,
            r.file_name,
            r.chunk_index
        );
        let preview: String = r.text.chars().take(200).collect();
        let suffix = if r.text.chars().count() > 200 { "..." } else { "" };
        println!("   {}{}\n", preview.trim().replace('\n', " "), suffix);
    }
}
