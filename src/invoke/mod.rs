//! Endpoint invocation: request/response types, record framing, per-engine
//! adapters and the client that drives one call.

pub mod backend;
pub mod client;
pub mod conversation;
pub mod frame;

pub use backend::{BackendAdapter, EngineDialect};
pub use client::{decode_event_stream, Deadline, EndpointAddress, InvocationClient, WireDialect};
pub use conversation::Conversation;
pub use frame::{DecoderState, FrameDecoder};

use serde::{Deserialize, Serialize};

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Backend-agnostic chat completion request. The adapter translates this
/// into whatever the engine actually expects on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Served model name; filled with the deployment's model id when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    /// Generic reasoning toggle; each engine dialect spells it differently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_reasoning: Option<bool>,
}

/// Which channel a streaming delta belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Content,
    Reasoning,
}

/// Normalized incremental completion event, identical across engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub delta: String,
    pub kind: DeltaKind,
    /// Set on the event carrying the backend's finish marker. Its delta may
    /// be empty; termination itself is user-visible.
    pub is_final: bool,
}

/// Normalized unary completion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub finish_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unix timestamp the backend stamped the completion with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
