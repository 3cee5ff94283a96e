//! Chat command implementation

use crate::chat::{ChatExchange, ChatService};
use crate::config::Config;
use crate::embed::FallbackEmbedder;
use crate::error::Result;
use crate::kb::KnowledgeBaseProcessor;
use crate::llm::HttpChatModel;
use crate::store::Db;
use crate::topics::TopicClassifier;
use std::sync::Arc;

/// Send one message into a session and print the assistant reply
pub async fn cmd_chat(
    config: &Config,
    db: &Db,
    session_id: i64,
    message: &str,
) -> Result<ChatExchange> {
    let chat_model = Arc::new(HttpChatModel::new(&config.chat_model)?);
    let classifier = TopicClassifier::new(
        db.clone(),
        chat_model.clone(),
        config.chat_model.classifier_temperature,
    );
    let embedder = FallbackEmbedder::from_config(&config.embedding)?;
    let kb = KnowledgeBaseProcessor::new(
        db.clone(),
        Box::new(embedder),
        config.chunk.clone(),
        config.retrieval.clone(),
        config.embedding.batch_size,
    );

    let service = ChatService::new(
        db.clone(),
        chat_model,
        classifier,
        kb,
        config.chat_model.clone(),
    );
    service.handle_message(session_id, message).await
}

pub fn print_exchange(exchange: &ChatExchange) {
    if exchange.used_context {
        println!("(respuesta con material del curso)\n");
    }
    println!("{}", exchange.bot_message.message);
}
