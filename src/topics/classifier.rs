//! LLM-backed topic classification of chat messages
//!
//! Maps a single user message to at most one active topic of the
//! session's course. Classification is best-effort: the chat flow logs
//! failures and continues, and a message never gets a second weight.

use crate::error::{Error, Result};
use crate::llm::{ChatModel, ChatRequest};
use crate::store::{ChatMessage, CourseTopic, Db, TopicWeight};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Literal token the model must answer when no topic matches. Existing
/// prompts depend on this exact spelling.
pub const NO_TOPIC: &str = "NO_TOPIC";

/// Topic classifier with explicit dependencies
pub struct TopicClassifier {
    db: Db,
    chat_model: Arc<dyn ChatModel>,
    temperature: f32,
}

impl TopicClassifier {
    pub fn new(db: Db, chat_model: Arc<dyn ChatModel>, temperature: f32) -> Self {
        Self {
            db,
            chat_model,
            temperature,
        }
    }

    /// Classify one persisted message.
    ///
    /// Returns `Ok(None)` when the message is not eligible (bot-authored,
    /// session without a course, no active topics, already weighted) or
    /// when the model answers `NO_TOPIC` or something unusable. Backend
    /// failures surface as `Error::Classification` so the caller can log
    /// them; they must never block the chat flow.
    pub async fn classify(&self, message_id: i64) -> Result<Option<TopicWeight>> {
        let message = self
            .db
            .get_message(message_id)
            .await?
            .ok_or_else(|| Error::Classification(format!("Message {} not found", message_id)))?;

        if !message.is_user() {
            return Ok(None);
        }

        let session = self
            .db
            .get_session(message.session_id)
            .await?
            .ok_or(Error::SessionNotFound(message.session_id))?;
        let Some(course_id) = session.course_id else {
            return Ok(None);
        };

        // One weight per message, checked up front; the unique constraint
        // on topic_weights.message_id backstops concurrent attempts.
        if self.db.weight_for_message(message.id).await?.is_some() {
            debug!("Message {} already has a topic weight", message.id);
            return Ok(None);
        }

        let topics = self.db.active_topics(course_id).await?;
        if topics.is_empty() {
            return Ok(None);
        }

        let Some(topic_id) = self.ask_model(&message, &topics).await? else {
            return Ok(None);
        };

        // The model may hallucinate an id outside the candidate set
        if !self.db.is_active_topic(topic_id, course_id).await? {
            debug!(
                "Model answered topic {} which is not active in course {}",
                topic_id, course_id
            );
            return Ok(None);
        }

        let weight = self
            .db
            .insert_topic_weight(
                message.id,
                session.student_id,
                course_id,
                topic_id,
                Utc::now().date_naive(),
            )
            .await?;

        info!(
            "Message {} classified as topic {} in course {}",
            message.id, topic_id, course_id
        );
        Ok(Some(weight))
    }

    async fn ask_model(
        &self,
        message: &ChatMessage,
        topics: &[CourseTopic],
    ) -> Result<Option<i64>> {
        let request = ChatRequest::new(classification_prompt(topics), message.message.clone())
            .with_temperature(self.temperature);

        let answer = self
            .chat_model
            .complete(request)
            .await
            .map_err(|e| Error::Classification(e.to_string()))?;

        if answer == NO_TOPIC {
            return Ok(None);
        }
        Ok(answer.parse::<i64>().ok())
    }
}

/// Candidate list handed to the model as part of the system instruction
fn topics_context(topics: &[CourseTopic]) -> String {
    topics
        .iter()
        .map(|topic| {
            let mut info = format!("ID: {}, Nombre: {}", topic.id, topic.name);
            if let Some(description) = &topic.description {
                info.push_str(&format!(", Descripción: {}", description));
            }
            if let Some(keywords) = &topic.keywords {
                info.push_str(&format!(", Palabras clave: {}", keywords));
            }
            info
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt with strict criteria; the model must answer a bare topic
/// id or the literal `NO_TOPIC` token.
fn classification_prompt(topics: &[CourseTopic]) -> String {
    format!(
        "Eres un analizador de temas educativos. Analiza si el mensaje del estudiante \
         está relacionado con alguno de los temas del curso.\n\n\
         TEMAS DISPONIBLES:\n\
         {}\n\n\
         CRITERIOS ESTRICTOS:\n\
         - Solo responde con un tema si el mensaje está CLARAMENTE relacionado\n\
         - El mensaje debe mencionar conceptos, preguntas o problemas del tema\n\
         - Saludos, despedidas, agradecimientos generales = NO_TOPIC\n\
         - Preguntas administrativas no relacionadas con el contenido = NO_TOPIC\n\
         - Conversación casual = NO_TOPIC\n\n\
         RESPONDE SOLO CON:\n\
         - El ID del tema (número) si está relacionado\n\
         - \"NO_TOPIC\" si no está relacionado\n\n\
         NO uses JSON, solo responde el ID o NO_TOPIC.",
        topics_context(topics)
    )
}
