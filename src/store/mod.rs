//! SQLite persistence for tutoria
//!
//! This module handles all local storage:
//! - Courses, groups, enrollments, and the topic taxonomy
//! - Chat sessions and messages
//! - Knowledge-base files with their chunks and embeddings
//! - Topic weights produced by the classifier

mod schema;

pub use schema::*;

use crate::embed::{Embedding, EmbeddingKind, EmbeddingTag};
use crate::error::{Error, Result};
use crate::rank::FileChunks;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use tracing::{debug, info};

/// Message sender kinds
pub const SENDER_USER: &str = "user";
pub const SENDER_BOT: &str = "bot";

/// An optional inclusive date range filter
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    fn start_param(&self) -> Option<String> {
        self.start.map(|d| d.to_string())
    }

    fn end_param(&self) -> Option<String> {
        self.end.map(|d| d.to_string())
    }
}

/// A course
#[derive(Debug, Clone, FromRow)]
pub struct Course {
    pub id: i64,
    pub name: String,
}

/// A group (section) of a course
#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
}

/// One topic of a course's taxonomy
#[derive(Debug, Clone, FromRow)]
pub struct CourseTopic {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub is_active: bool,
}

/// A chat session
#[derive(Debug, Clone, FromRow)]
pub struct ChatSession {
    pub id: i64,
    pub student_id: i64,
    pub course_id: Option<i64>,
    pub name: String,
    pub created_at: String,
}

/// One message in a session
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub sender: String,
    pub message: String,
    pub created_at: String,
}

impl ChatMessage {
    pub fn is_user(&self) -> bool {
        self.sender == SENDER_USER
    }
}

/// An uploaded knowledge-base file
#[derive(Debug, Clone, FromRow)]
pub struct KnowledgeFile {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub file_path: String,
    pub extracted_text: Option<String>,
    pub chunks_json: Option<String>,
    pub embeddings_json: Option<String>,
    pub embedding_backend: Option<String>,
    pub embedding_dimension: Option<i64>,
    pub processed: bool,
    pub processing_error: Option<String>,
    pub uploaded_at: String,
}

impl KnowledgeFile {
    /// Parse the stored chunk list
    pub fn chunks(&self) -> Result<Vec<String>> {
        match &self.chunks_json {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Parse the stored embeddings, re-attaching the file's embedding tag
    /// and validating chunk/embedding parity and per-vector dimension.
    pub fn embeddings(&self) -> Result<Vec<Embedding>> {
        let vectors: Vec<Vec<f32>> = match &self.embeddings_json {
            Some(json) => serde_json::from_str(json)?,
            None => return Ok(Vec::new()),
        };

        let backend: EmbeddingKind = self
            .embedding_backend
            .as_deref()
            .ok_or_else(|| {
                Error::Retrieval(format!("File '{}' has embeddings but no backend tag", self.name))
            })?
            .parse()?;
        let dimension = self.embedding_dimension.unwrap_or(0) as usize;

        if let Some(mismatch) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(Error::Retrieval(format!(
                "File '{}' has a stored vector of dimension {}, expected {}",
                self.name,
                mismatch.len(),
                dimension
            )));
        }

        let tag = EmbeddingTag::new(backend, dimension);
        Ok(vectors
            .into_iter()
            .map(|vector| Embedding::new(vector, tag))
            .collect())
    }

    /// Convert into ranker input, validating stored invariants
    pub fn into_file_chunks(self) -> Result<FileChunks> {
        let chunks = self.chunks()?;
        let embeddings = self.embeddings()?;
        if chunks.len() != embeddings.len() {
            return Err(Error::Retrieval(format!(
                "File '{}' has {} chunks but {} embeddings",
                self.name,
                chunks.len(),
                embeddings.len()
            )));
        }
        Ok(FileChunks {
            file_id: self.id,
            name: self.name,
            chunks,
            embeddings,
        })
    }
}

/// One unit of classified-topic evidence
#[derive(Debug, Clone, FromRow)]
pub struct TopicWeight {
    pub id: i64,
    pub message_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub topic_id: i64,
    pub date: String,
}

/// Per-topic message count for one student
#[derive(Debug, Clone, FromRow)]
pub struct TopicCount {
    pub topic: String,
    pub count: i64,
}

/// Per-day activity row
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct DailyActivity {
    pub date: String,
    pub total_messages: i64,
    pub unique_students: i64,
    pub unique_topics: i64,
}

/// Per-topic activity row over a date range
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct TopicActivity {
    pub topic: String,
    pub total_count: i64,
    pub unique_students: i64,
}

/// Database handle
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Connect to the database file, creating it if missing
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Connect to an existing database. Unlike `connect` this never
    /// creates the file: a missing database means `init` has not run.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }
        Self::connect(db_path).await
    }

    /// Connect to an in-memory database (tests)
    pub async fn connect_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        // A single connection so every query sees the same in-memory db
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    // ===== Courses, groups, enrollments, topics =====

    pub async fn insert_course(&self, name: &str) -> Result<Course> {
        let result = sqlx::query("INSERT INTO courses (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(Course {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub async fn get_course(&self, id: i64) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    pub async fn insert_group(&self, course_id: i64, name: &str) -> Result<Group> {
        let result = sqlx::query("INSERT INTO groups (course_id, name) VALUES (?, ?)")
            .bind(course_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(Group {
            id: result.last_insert_rowid(),
            course_id,
            name: name.to_string(),
        })
    }

    pub async fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(group)
    }

    pub async fn insert_enrollment(
        &self,
        student_id: i64,
        group_id: Option<i64>,
        course_id: i64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO enrollments (student_id, group_id, course_id) VALUES (?, ?, ?)")
            .bind(student_id)
            .bind(group_id)
            .bind(course_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Distinct students enrolled in a course (any group or direct)
    pub async fn course_students(&self, course_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT student_id FROM enrollments WHERE course_id = ? ORDER BY student_id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Students enrolled through a specific group
    pub async fn group_students(&self, group_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT student_id FROM enrollments WHERE group_id = ? ORDER BY student_id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn insert_topic(
        &self,
        course_id: i64,
        name: &str,
        description: Option<&str>,
        keywords: Option<&str>,
        is_active: bool,
    ) -> Result<CourseTopic> {
        let result = sqlx::query(
            r#"
            INSERT INTO course_topics (course_id, name, description, keywords, is_active)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(course_id)
        .bind(name)
        .bind(description)
        .bind(keywords)
        .bind(is_active)
        .execute(&self.pool)
        .await?;
        Ok(CourseTopic {
            id: result.last_insert_rowid(),
            course_id,
            name: name.to_string(),
            description: description.map(String::from),
            keywords: keywords.map(String::from),
            is_active,
        })
    }

    /// Active topics of a course, the candidate set for classification
    pub async fn active_topics(&self, course_id: i64) -> Result<Vec<CourseTopic>> {
        let topics = sqlx::query_as::<_, CourseTopic>(
            "SELECT * FROM course_topics WHERE course_id = ? AND is_active = 1 ORDER BY id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(topics)
    }

    /// Whether a topic id is an active topic of this course
    pub async fn is_active_topic(&self, topic_id: i64, course_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM course_topics WHERE id = ? AND course_id = ? AND is_active = 1",
        )
        .bind(topic_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    // ===== Chat sessions and messages =====

    pub async fn insert_session(
        &self,
        student_id: i64,
        course_id: Option<i64>,
        name: &str,
    ) -> Result<ChatSession> {
        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO chat_sessions (student_id, course_id, name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(student_id)
        .bind(course_id)
        .bind(name)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(ChatSession {
            id: result.last_insert_rowid(),
            student_id,
            course_id,
            name: name.to_string(),
            created_at,
        })
    }

    pub async fn get_session(&self, id: i64) -> Result<Option<ChatSession>> {
        let session = sqlx::query_as::<_, ChatSession>("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn insert_message(
        &self,
        session_id: i64,
        sender: &str,
        message: &str,
    ) -> Result<ChatMessage> {
        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO chat_messages (session_id, sender, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(sender)
        .bind(message)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            session_id,
            sender: sender.to_string(),
            message: message.to_string(),
            created_at,
        })
    }

    pub async fn get_message(&self, id: i64) -> Result<Option<ChatMessage>> {
        let message = sqlx::query_as::<_, ChatMessage>("SELECT * FROM chat_messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    /// The last `limit` messages of a session in chronological order
    pub async fn recent_messages(&self, session_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM (
                SELECT * FROM chat_messages WHERE session_id = ? ORDER BY id DESC LIMIT ?
            ) ORDER BY id ASC
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    // ===== Knowledge files =====

    /// Register an uploaded file, initially unprocessed
    pub async fn insert_knowledge_file(
        &self,
        course_id: i64,
        name: &str,
        file_path: &str,
    ) -> Result<KnowledgeFile> {
        let uploaded_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO knowledge_files (course_id, name, file_path, uploaded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(course_id)
        .bind(name)
        .bind(file_path)
        .bind(&uploaded_at)
        .execute(&self.pool)
        .await?;
        Ok(KnowledgeFile {
            id: result.last_insert_rowid(),
            course_id,
            name: name.to_string(),
            file_path: file_path.to_string(),
            extracted_text: None,
            chunks_json: None,
            embeddings_json: None,
            embedding_backend: None,
            embedding_dimension: None,
            processed: false,
            processing_error: None,
            uploaded_at,
        })
    }

    pub async fn get_knowledge_file(&self, id: i64) -> Result<Option<KnowledgeFile>> {
        let file = sqlx::query_as::<_, KnowledgeFile>("SELECT * FROM knowledge_files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    /// All processed files for a course
    pub async fn processed_files(&self, course_id: i64) -> Result<Vec<KnowledgeFile>> {
        let files = sqlx::query_as::<_, KnowledgeFile>(
            "SELECT * FROM knowledge_files WHERE course_id = ? AND processed = 1 ORDER BY id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    /// Persist a successful processing run
    pub async fn mark_file_processed(
        &self,
        file_id: i64,
        extracted_text: &str,
        chunks: &[String],
        embeddings: &[Embedding],
    ) -> Result<()> {
        let tag = embeddings
            .first()
            .map(|e| e.tag)
            .ok_or_else(|| Error::Embedding("Cannot persist zero embeddings".to_string()))?;
        let vectors: Vec<&Vec<f32>> = embeddings.iter().map(|e| &e.vector).collect();

        sqlx::query(
            r#"
            UPDATE knowledge_files SET
                extracted_text = ?,
                chunks_json = ?,
                embeddings_json = ?,
                embedding_backend = ?,
                embedding_dimension = ?,
                processed = 1,
                processing_error = NULL
            WHERE id = ?
            "#,
        )
        .bind(extracted_text)
        .bind(serde_json::to_string(chunks)?)
        .bind(serde_json::to_string(&vectors)?)
        .bind(tag.backend.to_string())
        .bind(tag.dimension as i64)
        .bind(file_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist a failed processing run
    pub async fn mark_file_failed(&self, file_id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE knowledge_files SET processed = 0, processing_error = ? WHERE id = ?")
            .bind(error)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_knowledge_file(&self, file_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM knowledge_files WHERE id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Topic weights =====

    /// Insert a topic weight; the unique constraint on message_id makes a
    /// duplicate insert fail rather than create a second row.
    pub async fn insert_topic_weight(
        &self,
        message_id: i64,
        student_id: i64,
        course_id: i64,
        topic_id: i64,
        date: NaiveDate,
    ) -> Result<TopicWeight> {
        let date = date.to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO topic_weights (message_id, student_id, course_id, topic_id, date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(message_id)
        .bind(student_id)
        .bind(course_id)
        .bind(topic_id)
        .bind(&date)
        .execute(&self.pool)
        .await?;
        Ok(TopicWeight {
            id: result.last_insert_rowid(),
            message_id,
            student_id,
            course_id,
            topic_id,
            date,
        })
    }

    pub async fn weight_for_message(&self, message_id: i64) -> Result<Option<TopicWeight>> {
        let weight =
            sqlx::query_as::<_, TopicWeight>("SELECT * FROM topic_weights WHERE message_id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(weight)
    }

    /// Per-topic message counts for one student in one course
    pub async fn student_topic_counts(
        &self,
        student_id: i64,
        course_id: i64,
        range: DateRange,
    ) -> Result<Vec<TopicCount>> {
        let counts = sqlx::query_as::<_, TopicCount>(
            r#"
            SELECT ct.name AS topic, COUNT(*) AS count
            FROM topic_weights tw
            JOIN course_topics ct ON ct.id = tw.topic_id
            WHERE tw.student_id = ? AND tw.course_id = ?
              AND (? IS NULL OR tw.date >= ?)
              AND (? IS NULL OR tw.date <= ?)
            GROUP BY ct.name
            ORDER BY count DESC, ct.name ASC
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(range.start_param())
        .bind(range.start_param())
        .bind(range.end_param())
        .bind(range.end_param())
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    /// Per-day totals for a course
    pub async fn daily_activity(
        &self,
        course_id: i64,
        range: DateRange,
    ) -> Result<Vec<DailyActivity>> {
        let rows = sqlx::query_as::<_, DailyActivity>(
            r#"
            SELECT date,
                   COUNT(*) AS total_messages,
                   COUNT(DISTINCT student_id) AS unique_students,
                   COUNT(DISTINCT topic_id) AS unique_topics
            FROM topic_weights
            WHERE course_id = ?
              AND (? IS NULL OR date >= ?)
              AND (? IS NULL OR date <= ?)
            GROUP BY date
            ORDER BY date ASC
            "#,
        )
        .bind(course_id)
        .bind(range.start_param())
        .bind(range.start_param())
        .bind(range.end_param())
        .bind(range.end_param())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Per-topic totals over an inclusive date range
    pub async fn topic_activity(
        &self,
        course_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TopicActivity>> {
        let rows = sqlx::query_as::<_, TopicActivity>(
            r#"
            SELECT ct.name AS topic,
                   COUNT(*) AS total_count,
                   COUNT(DISTINCT tw.student_id) AS unique_students
            FROM topic_weights tw
            JOIN course_topics ct ON ct.id = tw.topic_id
            WHERE tw.course_id = ? AND tw.date >= ? AND tw.date <= ?
            GROUP BY ct.name
            ORDER BY total_count DESC, ct.name ASC
            "#,
        )
        .bind(course_id)
        .bind(start.to_string())
        .bind(end.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
