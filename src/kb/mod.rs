//! Knowledge-base processing and retrieval
//!
//! Orchestrates the full pipeline for uploaded course material: extract
//! text from the PDF, clean it, chunk it, embed the chunks, and persist
//! everything on the file record. Also assembles the retrieval context
//! injected into the assistant completion for a student query.

use crate::chunk::chunk_text;
use crate::config::{ChunkConfig, RetrievalConfig};
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::extract::{clean_text, extract_pdf_text};
use crate::rank::{rank_chunks, FileChunks, RankedChunk};
use crate::store::{Db, KnowledgeFile};
use tracing::{debug, info, warn};

/// Outcome of processing one knowledge file. Failures are reported here,
/// never raised: the file record always ends up in a consistent state.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub success: bool,
    pub chunks_count: usize,
    pub text_length: usize,
    pub error: Option<String>,
}

impl ProcessOutcome {
    fn success(chunks_count: usize, text_length: usize) -> Self {
        Self {
            success: true,
            chunks_count,
            text_length,
            error: None,
        }
    }

    fn failure(error: String) -> Self {
        Self {
            success: false,
            chunks_count: 0,
            text_length: 0,
            error: Some(error),
        }
    }
}

/// Knowledge-base processor with explicit dependencies
pub struct KnowledgeBaseProcessor {
    db: Db,
    embedder: Box<dyn Embedder>,
    chunk_config: ChunkConfig,
    retrieval_config: RetrievalConfig,
    embed_batch_size: usize,
}

impl KnowledgeBaseProcessor {
    pub fn new(
        db: Db,
        embedder: Box<dyn Embedder>,
        chunk_config: ChunkConfig,
        retrieval_config: RetrievalConfig,
        embed_batch_size: usize,
    ) -> Self {
        Self {
            db,
            embedder,
            chunk_config,
            retrieval_config,
            embed_batch_size,
        }
    }

    /// Process a registered knowledge file end to end.
    ///
    /// On success the record carries the cleaned text, chunks, embeddings,
    /// and `processed = true`. On any failure the record keeps
    /// `processed = false` with the error message, so the upload can be
    /// reprocessed later.
    pub async fn process(&self, file_id: i64) -> Result<ProcessOutcome> {
        let file = self
            .db
            .get_knowledge_file(file_id)
            .await?
            .ok_or(Error::FileNotFound(file_id))?;

        info!("Processing knowledge file '{}' (id {})", file.name, file.id);

        match self.run_pipeline(&file).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                warn!("Processing failed for '{}': {}", file.name, message);
                self.db.mark_file_failed(file.id, &message).await?;
                Ok(ProcessOutcome::failure(message))
            }
        }
    }

    async fn run_pipeline(&self, file: &KnowledgeFile) -> Result<ProcessOutcome> {
        let bytes = std::fs::read(&file.file_path)?;
        let extracted = extract_pdf_text(&bytes)?;
        let cleaned = clean_text(&extracted);
        debug!(
            "Extracted {} chars, {} after cleanup",
            extracted.len(),
            cleaned.len()
        );

        let chunks = chunk_text(&cleaned, &self.chunk_config);
        if chunks.is_empty() {
            return Err(Error::Extraction(
                "No text could be extracted from the PDF".to_string(),
            ));
        }
        debug!("Created {} chunks", chunks.len());

        let embeddings =
            embed_in_batches(self.embedder.as_ref(), chunks.clone(), self.embed_batch_size)
                .await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "Embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let text_length = cleaned.chars().count();
        self.db
            .mark_file_processed(file.id, &cleaned, &chunks, &embeddings)
            .await?;

        info!(
            "Processed '{}': {} chunks, {} chars",
            file.name,
            chunks.len(),
            text_length
        );
        Ok(ProcessOutcome::success(chunks.len(), text_length))
    }

    /// Find the most relevant chunks for a query across a course's
    /// processed files.
    pub async fn find_relevant_chunks(
        &self,
        query: &str,
        course_id: i64,
        limit: usize,
    ) -> Result<Vec<RankedChunk>> {
        let files = self.db.processed_files(course_id).await?;
        if files.is_empty() {
            debug!("No processed files for course {}", course_id);
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(vec![query.to_string()])
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Retrieval("No embedding returned for query".to_string()))?;

        let mut candidates: Vec<FileChunks> = Vec::with_capacity(files.len());
        for file in files {
            let name = file.name.clone();
            match file.into_file_chunks() {
                Ok(fc) => candidates.push(fc),
                // Inconsistent records are skipped, not fatal
                Err(e) => warn!("Skipping file '{}': {}", name, e),
            }
        }

        Ok(rank_chunks(&query_embedding, &candidates, limit))
    }

    /// Assemble the retrieval context block for a student query.
    ///
    /// Empty string means "no augmentation available" and is not an error.
    /// The `[Fuente N]:` markers are load-bearing: existing prompts depend
    /// on them literally.
    pub async fn retrieve_context(&self, query: &str, course_id: i64) -> Result<String> {
        let relevant = self
            .find_relevant_chunks(query, course_id, self.retrieval_config.max_context_chunks)
            .await?;

        if relevant.is_empty() {
            return Ok(String::new());
        }

        let sources = relevant
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                debug!(
                    "Fuente {} (score {:.4}): {} chars from '{}'",
                    i + 1,
                    chunk.score,
                    chunk.text.len(),
                    chunk.file_name
                );
                format!("[Fuente {}]: {}", i + 1, chunk.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(format!(
            "Información relevante de la base de conocimiento del curso:\n\n\
             {sources}\n\n\
             ---\n\n\
             Pregunta del estudiante: {query}\n\n\
             Por favor, responde la pregunta utilizando la información de la base de \
             conocimiento cuando sea relevante. Si la información de la base de conocimiento \
             no es suficiente para responder completamente, puedes complementar con \
             conocimiento general, pero menciona claramente qué parte viene de los materiales \
             del curso."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{Embedding, EmbeddingKind, EmbeddingTag};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Deterministic embedder: vector derives from text length
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: Vec<String>) -> crate::error::Result<Vec<Embedding>> {
            let tag = EmbeddingTag::new(EmbeddingKind::Semantic, 2);
            Ok(texts
                .iter()
                .map(|t| {
                    let len = t.chars().count() as f32;
                    Embedding::new(vec![len, 1.0], tag)
                })
                .collect())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// Embedder that records the size of every batch it receives
    struct BatchRecordingEmbedder {
        batches: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl Embedder for BatchRecordingEmbedder {
        async fn embed(&self, texts: Vec<String>) -> crate::error::Result<Vec<Embedding>> {
            self.batches.lock().unwrap().push(texts.len());
            StubEmbedder.embed(texts).await
        }

        fn name(&self) -> &str {
            "batch-recording"
        }
    }

    async fn processor() -> (KnowledgeBaseProcessor, Db) {
        let db = Db::connect_memory().await.unwrap();
        let processor = KnowledgeBaseProcessor::new(
            db.clone(),
            Box::new(StubEmbedder),
            ChunkConfig::default(),
            RetrievalConfig::default(),
            100,
        );
        (processor, db)
    }

    /// Build a complete one-page PDF showing `text`, with xref offsets
    /// computed while the objects are appended so the file is always valid.
    fn minimal_pdf(text: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_offset = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );
        pdf
    }

    fn write_pdf(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, minimal_pdf(text)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_process_valid_pdf_marks_processed() {
        let (processor, db) = processor().await;
        let course = db.insert_course("Curso").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "apuntes.pdf", "Los arboles binarios tienen dos hijos.");

        let file = db
            .insert_knowledge_file(course.id, "apuntes.pdf", path.to_str().unwrap())
            .await
            .unwrap();

        let outcome = processor.process(file.id).await.unwrap();
        assert!(outcome.success, "unexpected failure: {:?}", outcome.error);
        assert_eq!(outcome.chunks_count, 1);
        assert!(outcome.text_length > 0);

        let stored = db.get_knowledge_file(file.id).await.unwrap().unwrap();
        assert!(stored.processed);
        assert!(stored.processing_error.is_none());
        let fc = stored.into_file_chunks().unwrap();
        assert_eq!(fc.chunks.len(), fc.embeddings.len());
        assert!(fc.chunks[0].contains("arboles binarios"));
    }

    #[tokio::test]
    async fn test_embedding_uses_configured_batch_size() {
        let db = Db::connect_memory().await.unwrap();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let processor = KnowledgeBaseProcessor::new(
            db.clone(),
            Box::new(BatchRecordingEmbedder {
                batches: batches.clone(),
            }),
            ChunkConfig {
                chunk_size: 10,
                chunk_overlap: 2,
            },
            RetrievalConfig::default(),
            2,
        );
        let course = db.insert_course("Curso").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "f.pdf", "aaaaaaaaaa bbbbbbbbbb cccccccccc dddddddddd");
        let file = db
            .insert_knowledge_file(course.id, "f.pdf", path.to_str().unwrap())
            .await
            .unwrap();

        let outcome = processor.process(file.id).await.unwrap();
        assert!(outcome.success, "unexpected failure: {:?}", outcome.error);

        let recorded = batches.lock().unwrap().clone();
        assert!(recorded.len() > 1, "expected multiple batches, got {:?}", recorded);
        assert!(recorded.iter().all(|&n| n <= 2), "oversized batch in {:?}", recorded);
        assert_eq!(recorded.iter().sum::<usize>(), outcome.chunks_count);
    }

    #[tokio::test]
    async fn test_process_invalid_pdf_records_failure() {
        let (processor, db) = processor().await;
        let course = db.insert_course("Curso").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"this is not a pdf").unwrap();

        let file = db
            .insert_knowledge_file(course.id, "bad.pdf", path.to_str().unwrap())
            .await
            .unwrap();

        let outcome = processor.process(file.id).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.is_some());

        let stored = db.get_knowledge_file(file.id).await.unwrap().unwrap();
        assert!(!stored.processed);
        assert!(stored.processing_error.is_some());
    }

    #[tokio::test]
    async fn test_process_missing_file_record() {
        let (processor, _db) = processor().await;
        let err = processor.process(999).await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound(999)));
    }

    #[tokio::test]
    async fn test_retrieve_context_empty_without_processed_files() {
        let (processor, db) = processor().await;
        let course = db.insert_course("Curso").await.unwrap();
        let context = processor
            .retrieve_context("¿Qué es un árbol?", course.id)
            .await
            .unwrap();
        assert_eq!(context, "");
    }

    #[tokio::test]
    async fn test_retrieve_context_formats_sources() {
        let (processor, db) = processor().await;
        let course = db.insert_course("Curso").await.unwrap();
        let file = db
            .insert_knowledge_file(course.id, "apuntes.pdf", "/tmp/apuntes.pdf")
            .await
            .unwrap();

        let tag = EmbeddingTag::new(EmbeddingKind::Semantic, 2);
        let chunks = vec![
            "Los árboles binarios tienen dos hijos.".to_string(),
            "El ordenamiento rápido divide el arreglo.".to_string(),
        ];
        let embeddings = vec![
            Embedding::new(vec![16.0, 1.0], tag),
            Embedding::new(vec![3.0, 1.0], tag),
        ];
        db.mark_file_processed(file.id, "texto", &chunks, &embeddings)
            .await
            .unwrap();

        // Query of 16 chars matches the first chunk's stub vector exactly
        let query = "aaaaaaaaaaaaaaaa";
        let context = processor.retrieve_context(query, course.id).await.unwrap();
        assert!(context.contains("[Fuente 1]: Los árboles binarios"));
        assert!(context.contains("[Fuente 2]:"));
        assert!(context.contains("Pregunta del estudiante: aaaaaaaaaaaaaaaa"));
        assert!(context.starts_with("Información relevante"));
    }

    #[tokio::test]
    async fn test_retrieve_skips_inconsistent_file() {
        let (processor, db) = processor().await;
        let course = db.insert_course("Curso").await.unwrap();
        let file = db
            .insert_knowledge_file(course.id, "roto.pdf", "/tmp/roto.pdf")
            .await
            .unwrap();

        // Two chunks but one embedding: the stored record is inconsistent
        // and retrieval must skip it rather than rank it.
        let tag = EmbeddingTag::new(EmbeddingKind::Semantic, 2);
        db.mark_file_processed(
            file.id,
            "texto",
            &["uno".to_string(), "dos".to_string()],
            &[Embedding::new(vec![1.0, 0.0], tag)],
        )
        .await
        .unwrap();

        let context = processor.retrieve_context("uno", course.id).await.unwrap();
        assert_eq!(context, "");
    }
}
