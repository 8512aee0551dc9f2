use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::providers::ChatService;

pub const GREETING: &str =
    "Hi! I can help you with route details and travel advice. Ask me anything!";
pub const FAILURE_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Conversation transcript backed by the remote chat endpoint.
pub struct ChatAssistant {
    service: Arc<dyn ChatService>,
    transcript: Vec<ChatMessage>,
}

impl ChatAssistant {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            service,
            transcript: vec![ChatMessage::assistant(GREETING)],
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Returns the appended reply, or `None` for blank input.
    pub async fn send(
        &mut self,
        message: &str,
        context: &serde_json::Value,
    ) -> Option<&ChatMessage> {
        if message.trim().is_empty() {
            return None;
        }
        self.transcript.push(ChatMessage {
            role: ChatRole::User,
            text: message.to_string(),
        });

        let reply = match self.service.chat(message, context).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("chat request failed: {err}");
                FAILURE_REPLY.to_string()
            }
        };
        self.transcript.push(ChatMessage::assistant(reply));
        self.transcript.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct ScriptedChat {
        fail: bool,
        seen: Mutex<Vec<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl ChatService for ScriptedChat {
        async fn chat(
            &self,
            message: &str,
            context: &serde_json::Value,
        ) -> Result<String, ClientError> {
            self.seen
                .lock()
                .await
                .push((message.to_string(), context.clone()));
            if self.fail {
                return Err(ClientError::Unavailable("down".to_string()));
            }
            Ok(format!("echo: {message}"))
        }
    }

    #[tokio::test]
    async fn transcript_starts_with_greeting_and_ignores_blank_input() {
        let service = Arc::new(ScriptedChat::default());
        let mut chat = ChatAssistant::new(service.clone());
        assert_eq!(chat.transcript(), &[ChatMessage::assistant(GREETING)]);

        assert!(chat.send("   ", &serde_json::Value::Null).await.is_none());
        assert_eq!(chat.transcript().len(), 1);
        assert!(service.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn reply_is_appended_and_context_forwarded() {
        let service = Arc::new(ScriptedChat::default());
        let mut chat = ChatAssistant::new(service.clone());
        let context = serde_json::json!({ "origin": "Ameerpet" });

        let reply = chat.send("how long?", &context).await.cloned();

        assert_eq!(reply, Some(ChatMessage::assistant("echo: how long?")));
        assert_eq!(chat.transcript().len(), 3);
        assert_eq!(chat.transcript()[1].role, ChatRole::User);
        assert_eq!(
            service.seen.lock().await.as_slice(),
            &[("how long?".to_string(), context)]
        );
    }

    #[tokio::test]
    async fn failure_appends_apology() {
        let service = Arc::new(ScriptedChat {
            fail: true,
            ..ScriptedChat::default()
        });
        let mut chat = ChatAssistant::new(service);

        let reply = chat.send("hello", &serde_json::Value::Null).await.cloned();

        assert_eq!(reply.map(|m| m.text), Some(FAILURE_REPLY.to_string()));
    }
}
