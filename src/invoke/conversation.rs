//! Multi-turn conversation state on top of the invocation client.

use crate::invoke::{ChatMessage, ChatRequest};

/// Accumulates the message list for a chat session and produces requests
/// from it.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// System prompts go in front of the history.
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.messages.insert(0, ChatMessage::system(content));
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// A request carrying the current history.
    pub fn request(&self, stream: bool) -> ChatRequest {
        ChatRequest {
            messages: self.messages.clone(),
            stream,
            ..Default::default()
        }
    }
}

/// Fold a separate reasoning channel into transcript text.
pub fn fold_reasoning(content: &str, reasoning: &str) -> String {
    if reasoning.is_empty() {
        content.to_string()
    } else {
        format!("<Reasoning>\n{reasoning}\n</Reasoning>\n{content}")
    }
}
