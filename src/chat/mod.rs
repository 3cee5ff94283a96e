//! Chat flow orchestration
//!
//! Ties the pieces together for one student message: persist it, classify
//! it against the course topics, retrieve knowledge-base context, run the
//! assistant completion with session history, and persist the reply.
//! Classification and retrieval are best-effort; only persistence failures
//! abort the flow.

use crate::config::ChatModelConfig;
use crate::error::{Error, Result};
use crate::kb::KnowledgeBaseProcessor;
use crate::llm::{ChatModel, ChatRequest, ChatTurn};
use crate::store::{ChatMessage, Db, SENDER_BOT, SENDER_USER};
use crate::topics::TopicClassifier;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reply sent when the completion backend is unavailable
const FALLBACK_REPLY: &str = "Lo siento, estoy teniendo problemas para responder en este \
                              momento. Por favor, intenta de nuevo en unos minutos.";

fn tutor_system_prompt() -> String {
    "Eres un tutor educativo amable y paciente que ayuda a estudiantes universitarios. \
     Responde de forma clara y concisa, con ejemplos cuando ayuden a entender. \
     Si la pregunta no está relacionada con el estudio, redirige amablemente la \
     conversación hacia los temas del curso."
        .to_string()
}

/// Result of handling one student message
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub user_message: ChatMessage,
    pub bot_message: ChatMessage,
    /// Whether the reply used knowledge-base context
    pub used_context: bool,
}

/// Orchestrates the full per-message chat flow
pub struct ChatService {
    db: Db,
    chat_model: Arc<dyn ChatModel>,
    classifier: TopicClassifier,
    kb: KnowledgeBaseProcessor,
    config: ChatModelConfig,
}

impl ChatService {
    pub fn new(
        db: Db,
        chat_model: Arc<dyn ChatModel>,
        classifier: TopicClassifier,
        kb: KnowledgeBaseProcessor,
        config: ChatModelConfig,
    ) -> Self {
        Self {
            db,
            chat_model,
            classifier,
            kb,
            config,
        }
    }

    /// Handle one incoming student message end to end.
    ///
    /// The user message is always persisted first, so analytics see it even
    /// if everything downstream fails. A completion failure produces a
    /// generic apology reply instead of an error.
    pub async fn handle_message(&self, session_id: i64, text: &str) -> Result<ChatExchange> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;

        let user_message = self.db.insert_message(session_id, SENDER_USER, text).await?;

        // Best-effort: a classifier outage must not block the reply
        if let Err(e) = self.classifier.classify(user_message.id).await {
            warn!("Topic classification failed for message {}: {}", user_message.id, e);
        }

        let context = match session.course_id {
            Some(course_id) => match self.kb.retrieve_context(text, course_id).await {
                Ok(context) => context,
                Err(e) => {
                    warn!("Context retrieval failed for course {}: {}", course_id, e);
                    String::new()
                }
            },
            None => String::new(),
        };
        let used_context = !context.is_empty();

        let history = self.history_turns(session_id, user_message.id).await?;
        // With context, the augmented block already embeds the question
        let content = if used_context {
            context
        } else {
            text.to_string()
        };

        let request = ChatRequest::new(tutor_system_prompt(), content)
            .with_history(history)
            .with_temperature(self.config.temperature);

        let reply = match self.chat_model.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat completion failed: {}", e);
                FALLBACK_REPLY.to_string()
            }
        };

        let bot_message = self.db.insert_message(session_id, SENDER_BOT, &reply).await?;
        debug!(
            "Session {}: replied to message {} ({} context)",
            session_id,
            user_message.id,
            if used_context { "with" } else { "without" }
        );

        Ok(ChatExchange {
            user_message,
            bot_message,
            used_context,
        })
    }

    /// Prior session turns, excluding the message currently being answered
    async fn history_turns(&self, session_id: i64, current_id: i64) -> Result<Vec<ChatTurn>> {
        let messages = self
            .db
            .recent_messages(session_id, self.config.history_limit)
            .await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.id != current_id)
            .map(|m| {
                if m.is_user() {
                    ChatTurn::user(m.message)
                } else {
                    ChatTurn::assistant(m.message)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkConfig, RetrievalConfig};
    use crate::embed::{Embedder, Embedding, EmbeddingKind, EmbeddingTag};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
            let tag = EmbeddingTag::new(EmbeddingKind::Semantic, 2);
            Ok(texts
                .iter()
                .map(|t| Embedding::new(vec![t.chars().count() as f32, 1.0], tag))
                .collect())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// Records every request; classification calls get NO_TOPIC, everything
    /// else the scripted reply.
    struct RecordingModel {
        reply: std::result::Result<String, String>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl RecordingModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("backend down".to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn tutor_requests(&self) -> Vec<ChatRequest> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| !r.system.contains("analizador de temas"))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, request: ChatRequest) -> Result<String> {
            let classification = request.system.contains("analizador de temas");
            self.requests.lock().unwrap().push(request);
            if classification {
                return Ok(crate::topics::NO_TOPIC.to_string());
            }
            self.reply.clone().map_err(Error::Chat)
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn service(db: Db, model: Arc<RecordingModel>) -> ChatService {
        let config = ChatModelConfig::default();
        let classifier =
            TopicClassifier::new(db.clone(), model.clone(), config.classifier_temperature);
        let kb = KnowledgeBaseProcessor::new(
            db.clone(),
            Box::new(StubEmbedder),
            ChunkConfig::default(),
            RetrievalConfig::default(),
            100,
        );
        ChatService::new(db, model, classifier, kb, config)
    }

    #[tokio::test]
    async fn test_persists_both_sides_of_exchange() {
        let db = Db::connect_memory().await.unwrap();
        let course = db.insert_course("Curso").await.unwrap();
        let session = db.insert_session(1, Some(course.id), "New Chat").await.unwrap();

        let model = RecordingModel::replying("Un árbol es una estructura jerárquica.");
        let service = service(db.clone(), model);

        let exchange = service
            .handle_message(session.id, "¿Qué es un árbol?")
            .await
            .unwrap();
        assert!(exchange.user_message.is_user());
        assert_eq!(exchange.bot_message.sender, SENDER_BOT);
        assert!(!exchange.used_context);

        let messages = db.recent_messages(session.id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "¿Qué es un árbol?");
        assert_eq!(messages[1].message, "Un árbol es una estructura jerárquica.");
    }

    #[tokio::test]
    async fn test_unknown_session_is_an_error() {
        let db = Db::connect_memory().await.unwrap();
        let service = service(db, RecordingModel::replying("hola"));
        let err = service.handle_message(404, "hola").await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(404)));
    }

    #[tokio::test]
    async fn test_completion_failure_yields_fallback_reply() {
        let db = Db::connect_memory().await.unwrap();
        let session = db.insert_session(1, None, "New Chat").await.unwrap();

        let service = service(db.clone(), RecordingModel::failing());
        let exchange = service.handle_message(session.id, "hola").await.unwrap();
        assert_eq!(exchange.bot_message.message, FALLBACK_REPLY);

        // The failed exchange is still fully persisted
        let messages = db.recent_messages(session.id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_augments_with_knowledge_base_context() {
        let db = Db::connect_memory().await.unwrap();
        let course = db.insert_course("Curso").await.unwrap();
        let session = db.insert_session(1, Some(course.id), "New Chat").await.unwrap();

        let file = db
            .insert_knowledge_file(course.id, "apuntes.pdf", "/tmp/apuntes.pdf")
            .await
            .unwrap();
        let tag = EmbeddingTag::new(EmbeddingKind::Semantic, 2);
        db.mark_file_processed(
            file.id,
            "texto",
            &["Los árboles binarios tienen dos hijos.".to_string()],
            &[Embedding::new(vec![4.0, 1.0], tag)],
        )
        .await
        .unwrap();

        let model = RecordingModel::replying("Claro.");
        let service = service(db, model.clone());

        let exchange = service.handle_message(session.id, "hola").await.unwrap();
        assert!(exchange.used_context);

        let tutor = model.tutor_requests();
        assert_eq!(tutor.len(), 1);
        assert!(tutor[0].user_message.contains("[Fuente 1]:"));
        assert!(tutor[0].user_message.contains("Pregunta del estudiante: hola"));
        // The stored user message stays the raw text
        assert_eq!(exchange.user_message.message, "hola");
    }

    #[tokio::test]
    async fn test_history_replayed_in_role_order() {
        let db = Db::connect_memory().await.unwrap();
        let session = db.insert_session(1, None, "New Chat").await.unwrap();
        db.insert_message(session.id, SENDER_USER, "primera pregunta")
            .await
            .unwrap();
        db.insert_message(session.id, SENDER_BOT, "primera respuesta")
            .await
            .unwrap();

        let model = RecordingModel::replying("segunda respuesta");
        let service = service(db, model.clone());
        service.handle_message(session.id, "segunda pregunta").await.unwrap();

        let tutor = model.tutor_requests();
        let history = &tutor[0].history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].content, "primera pregunta");
        assert_eq!(history[1].role, "assistant");
        // The current question rides in user_message, not history
        assert_eq!(tutor[0].user_message, "segunda pregunta");
    }

    #[tokio::test]
    async fn test_session_without_course_skips_retrieval_and_classification() {
        let db = Db::connect_memory().await.unwrap();
        let session = db.insert_session(1, None, "New Chat").await.unwrap();

        let model = RecordingModel::replying("hola");
        let service = service(db, model.clone());
        let exchange = service.handle_message(session.id, "hola").await.unwrap();
        assert!(!exchange.used_context);
        // Only the tutor completion ran
        assert_eq!(model.requests.lock().unwrap().len(), 1);
    }
}
