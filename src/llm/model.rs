//! Blocking model handle used by commands and the AI fallback
//!
//! The resolution loop is synchronous, so the async [`LlmClient`] is driven
//! on a shared tokio runtime with `block_on`. Each handle carries its own
//! system prompt and, optionally, the running conversation.

use crate::core::error::{AssistantError, Result};
use crate::llm::client::{LlmClient, Message};
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

/// Capability to generate a text reply to a prompt
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Forget earlier exchanges; stateless generators have nothing to do
    fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// Chat history bookkeeping, independent of the transport
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    keep_history: bool,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(keep_history: bool) -> Self {
        Self {
            keep_history,
            messages: Vec::new(),
        }
    }

    /// Messages to send for a new user prompt
    pub fn prepare(&self, prompt: &str) -> Vec<Message> {
        let mut messages = if self.keep_history {
            self.messages.clone()
        } else {
            Vec::new()
        };
        messages.push(Message::user(prompt));
        messages
    }

    /// Remember a completed exchange (no-op without history)
    pub fn record(&mut self, prompt: &str, reply: &str) {
        if self.keep_history {
            self.messages.push(Message::user(prompt));
            self.messages.push(Message::assistant(reply));
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A configured model: client, system prompt and conversation
pub struct ModelHandle {
    runtime: Arc<Runtime>,
    client: LlmClient,
    system_prompt: String,
    conversation: Mutex<Conversation>,
}

impl ModelHandle {
    pub fn new(runtime: Arc<Runtime>, client: LlmClient, system_prompt: impl Into<String>, keep_history: bool) -> Self {
        Self {
            runtime,
            client,
            system_prompt: system_prompt.into(),
            conversation: Mutex::new(Conversation::new(keep_history)),
        }
    }

    /// Drop the chat history, keeping only the system prompt
    pub fn clear_history(&self) -> Result<()> {
        self.lock_conversation()?.clear();
        Ok(())
    }

    fn lock_conversation(&self) -> Result<std::sync::MutexGuard<'_, Conversation>> {
        self.conversation
            .lock()
            .map_err(|_| AssistantError::LlmError("conversation lock poisoned".into()))
    }
}

impl TextGenerator for ModelHandle {
    fn generate(&self, prompt: &str) -> Result<String> {
        let messages = self.lock_conversation()?.prepare(prompt);
        let reply = self
            .runtime
            .block_on(self.client.complete_chat(&self.system_prompt, &messages))?;
        let reply = reply.trim().to_string();

        self.lock_conversation()?.record(prompt, &reply);
        Ok(reply)
    }

    fn reset(&self) -> Result<()> {
        self.clear_history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_without_history() {
        let mut conversation = Conversation::new(false);
        conversation.record("hello", "hi there");
        assert!(conversation.is_empty());
        assert_eq!(conversation.prepare("again"), vec![Message::user("again")]);
    }

    #[test]
    fn test_conversation_keeps_turns_in_order() {
        let mut conversation = Conversation::new(true);
        conversation.record("hello", "hi there");
        let messages = conversation.prepare("how are you");
        assert_eq!(
            messages,
            vec![
                Message::user("hello"),
                Message::assistant("hi there"),
                Message::user("how are you"),
            ]
        );

        conversation.clear();
        assert_eq!(conversation.len(), 0);
    }

    #[test]
    fn test_reset_clears_model_history() {
        let runtime = Arc::new(Runtime::new().unwrap());
        let client = LlmClient::new(
            String::new(),
            "http://localhost:8080/v1/chat/completions".into(),
            "local".into(),
        );
        let model = ModelHandle::new(runtime, client, "You are Azazel.", true);

        model.lock_conversation().unwrap().record("hello", "hi there");
        assert_eq!(model.lock_conversation().unwrap().len(), 2);

        model.reset().unwrap();
        assert!(model.lock_conversation().unwrap().is_empty());
        assert_eq!(
            model.lock_conversation().unwrap().prepare("again"),
            vec![Message::user("again")]
        );
    }
}
