//! Similarity ranking of knowledge-base chunks
//!
//! Scores a query vector against every candidate chunk and returns the
//! top results in a deterministic order. Files whose chunk and embedding
//! counts disagree are skipped whole, and chunks whose embedding tag does
//! not match the query's are never scored against it.

use crate::embed::Embedding;
use serde::Serialize;
use tracing::warn;

/// One source file's chunks with their embeddings
#[derive(Debug, Clone)]
pub struct FileChunks {
    pub file_id: i64,
    pub name: String,
    pub chunks: Vec<String>,
    pub embeddings: Vec<Embedding>,
}

/// A chunk scored against a query
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub text: String,
    pub score: f32,
    pub file_id: i64,
    pub file_name: String,
    pub chunk_index: usize,
}

/// Dot product of two equal-length vectors
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity between two vectors, 0.0 when either has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// Rank all candidate chunks against a query embedding.
///
/// Results come back sorted by descending score; ties break by original
/// (file, chunk position) order so repeated calls are stable. At most
/// `limit` results are returned.
pub fn rank_chunks(query: &Embedding, files: &[FileChunks], limit: usize) -> Vec<RankedChunk> {
    let mut ranked = Vec::new();

    for (file_index, file) in files.iter().enumerate() {
        if file.chunks.is_empty() || file.chunks.len() != file.embeddings.len() {
            warn!(
                "Skipping file '{}': {} chunks but {} embeddings",
                file.name,
                file.chunks.len(),
                file.embeddings.len()
            );
            continue;
        }

        for (chunk_index, (chunk, embedding)) in
            file.chunks.iter().zip(file.embeddings.iter()).enumerate()
        {
            if !embedding.tag.compatible(&query.tag) {
                warn!(
                    "Skipping chunk {} of '{}': embedding space {:?} does not match query {:?}",
                    chunk_index, file.name, embedding.tag, query.tag
                );
                continue;
            }

            let score = cosine_similarity(&query.vector, &embedding.vector);
            ranked.push((file_index, chunk_index, chunk, score));
        }
    }

    ranked.sort_by(|a, b| {
        b.3.total_cmp(&a.3)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(file_index, chunk_index, chunk, score)| RankedChunk {
            text: chunk.clone(),
            score,
            file_id: files[file_index].file_id,
            file_name: files[file_index].name.clone(),
            chunk_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbeddingKind, EmbeddingTag};

    fn semantic(vector: Vec<f32>) -> Embedding {
        let dimension = vector.len();
        Embedding::new(vector, EmbeddingTag::new(EmbeddingKind::Semantic, dimension))
    }

    fn lexical(vector: Vec<f32>) -> Embedding {
        let dimension = vector.len();
        Embedding::new(vector, EmbeddingTag::new(EmbeddingKind::Lexical, dimension))
    }

    fn file(file_id: i64, chunks: Vec<&str>, embeddings: Vec<Embedding>) -> FileChunks {
        FileChunks {
            file_id,
            name: format!("file-{file_id}.pdf"),
            chunks: chunks.into_iter().map(String::from).collect(),
            embeddings,
        }
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.3, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let query = semantic(vec![1.0, 0.0, 0.0]);
        let files = vec![file(
            1,
            vec!["lejos", "exacto", "medio"],
            vec![
                semantic(vec![0.0, 1.0, 0.0]),
                semantic(vec![1.0, 0.0, 0.0]),
                semantic(vec![0.7, 0.7, 0.0]),
            ],
        )];

        let ranked = rank_chunks(&query, &files, 3);
        assert_eq!(ranked[0].text, "exacto");
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_limit_truncates() {
        let query = semantic(vec![1.0, 0.0]);
        let files = vec![file(
            1,
            vec!["a", "b", "c", "d"],
            vec![
                semantic(vec![1.0, 0.0]),
                semantic(vec![0.9, 0.1]),
                semantic(vec![0.8, 0.2]),
                semantic(vec![0.7, 0.3]),
            ],
        )];
        assert_eq!(rank_chunks(&query, &files, 3).len(), 3);
    }

    #[test]
    fn test_fewer_candidates_than_limit() {
        let query = semantic(vec![1.0, 0.0]);
        let files = vec![file(1, vec!["solo"], vec![semantic(vec![1.0, 0.0])])];
        assert_eq!(rank_chunks(&query, &files, 3).len(), 1);
    }

    #[test]
    fn test_tie_break_by_file_then_position() {
        let query = semantic(vec![1.0, 0.0]);
        let files = vec![
            file(
                2,
                vec!["f2c0", "f2c1"],
                vec![semantic(vec![1.0, 0.0]), semantic(vec![1.0, 0.0])],
            ),
            file(5, vec!["f5c0"], vec![semantic(vec![1.0, 0.0])]),
        ];

        let ranked = rank_chunks(&query, &files, 3);
        assert_eq!(ranked[0].text, "f2c0");
        assert_eq!(ranked[1].text, "f2c1");
        assert_eq!(ranked[2].text, "f5c0");
    }

    #[test]
    fn test_mismatched_file_skipped_entirely() {
        let query = semantic(vec![1.0, 0.0]);
        let files = vec![
            file(
                1,
                vec!["roto", "roto2"],
                vec![semantic(vec![1.0, 0.0])], // count mismatch
            ),
            file(2, vec!["sano"], vec![semantic(vec![0.5, 0.5])]),
        ];

        let ranked = rank_chunks(&query, &files, 3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].text, "sano");
    }

    #[test]
    fn test_incompatible_tags_never_scored() {
        let query = semantic(vec![1.0, 0.0]);
        let files = vec![file(
            1,
            vec!["lexico", "semantico"],
            vec![lexical(vec![1.0, 0.0]), semantic(vec![0.2, 0.8])],
        )];

        let ranked = rank_chunks(&query, &files, 3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].text, "semantico");
    }
}
