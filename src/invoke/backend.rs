//! Per-engine backend adapters.
//!
//! Engines differ in what they expect in a request and in how they frame
//! generated text, but every difference is captured by one of three
//! transformations: request out, streaming record in, whole body in. The
//! engines form a small closed set, so the dialects are tagged variants
//! dispatched here rather than an open trait hierarchy.

use serde_json::{json, Map, Value};

use crate::error::InvokeError;
use crate::invoke::{ChatRequest, CompletionOutcome, DeltaKind, StreamEvent};
use crate::registry::EngineType;
use crate::resolver::ExecutableConfig;

/// Wire dialect of one engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineDialect {
    /// vLLM's OpenAI-compatible server; exposes a separate
    /// `reasoning_content` delta channel.
    Vllm,
    /// Text Generation Inference's OpenAI-compatible route; no reasoning
    /// channel.
    Tgi,
    /// llama.cpp `llama-server`; OpenAI-compatible with a
    /// `reasoning_format` request knob.
    LlamaCpp,
    /// Ollama's native chat API: NDJSON records with `message`/`done`
    /// instead of `choices`.
    Ollama,
}

impl EngineDialect {
    pub fn for_engine(engine: EngineType) -> Self {
        match engine {
            EngineType::Vllm => EngineDialect::Vllm,
            EngineType::Tgi => EngineDialect::Tgi,
            EngineType::LlamaCpp => EngineDialect::LlamaCpp,
            EngineType::Ollama => EngineDialect::Ollama,
        }
    }

    fn engine_name(&self) -> &'static str {
        match self {
            EngineDialect::Vllm => "vllm",
            EngineDialect::Tgi => "tgi",
            EngineDialect::LlamaCpp => "llama.cpp",
            EngineDialect::Ollama => "ollama",
        }
    }
}

/// Adapter binding an engine dialect to one deployment.
#[derive(Debug, Clone)]
pub struct BackendAdapter {
    dialect: EngineDialect,
    served_model_id: String,
}

impl BackendAdapter {
    pub fn new(dialect: EngineDialect, served_model_id: impl Into<String>) -> Self {
        Self {
            dialect,
            served_model_id: served_model_id.into(),
        }
    }

    /// The adapter for a resolved deployment. Ollama deployments serve the
    /// model under its Ollama registry name, so requests are rewritten to
    /// that id.
    pub fn for_config(config: &ExecutableConfig) -> Self {
        let dialect = EngineDialect::for_engine(config.engine.engine_type);
        let served = match (dialect, &config.model.ollama_model_id) {
            (EngineDialect::Ollama, Some(ollama_id)) => ollama_id.clone(),
            _ => config.model.model_id.clone(),
        };
        Self::new(dialect, served)
    }

    pub fn dialect(&self) -> EngineDialect {
        self.dialect
    }

    fn protocol_error(&self, message: impl Into<String>) -> InvokeError {
        InvokeError::BackendProtocol {
            engine: self.dialect.engine_name().to_string(),
            message: message.into(),
        }
    }

    /// Translate the generic request into the engine's dialect.
    pub fn transform_request(&self, request: &ChatRequest) -> Result<Value, InvokeError> {
        let mut body = match serde_json::to_value(request)
            .map_err(|e| InvokeError::Request(e.to_string()))?
        {
            Value::Object(map) => map,
            _ => return Err(InvokeError::Request("request is not an object".to_string())),
        };
        if !matches!(body.get("model"), Some(Value::String(_))) {
            body.insert("model".to_string(), json!(self.served_model_id));
        } else if self.dialect == EngineDialect::Ollama {
            body.insert("model".to_string(), json!(self.served_model_id));
        }

        let reasoning = match body.remove("enable_reasoning") {
            Some(Value::Bool(b)) => Some(b),
            _ => None,
        };
        match self.dialect {
            EngineDialect::Vllm => {
                if let Some(enabled) = reasoning {
                    body.insert(
                        "chat_template_kwargs".to_string(),
                        json!({ "enable_thinking": enabled }),
                    );
                }
            }
            EngineDialect::LlamaCpp => {
                if let Some(enabled) = reasoning {
                    let format = if enabled { "auto" } else { "none" };
                    body.insert("reasoning_format".to_string(), json!(format));
                }
            }
            EngineDialect::Ollama => {
                return Ok(Value::Object(self.ollama_request(body, reasoning)));
            }
            // TGI has no reasoning channel; the toggle is dropped.
            EngineDialect::Tgi => {}
        }
        Ok(Value::Object(body))
    }

    /// Ollama's native chat API keeps sampling knobs under `options` and
    /// spells the reasoning toggle `think`.
    fn ollama_request(
        &self,
        mut body: Map<String, Value>,
        reasoning: Option<bool>,
    ) -> Map<String, Value> {
        let mut options = Map::new();
        if let Some(v) = body.remove("temperature") {
            options.insert("temperature".to_string(), v);
        }
        if let Some(v) = body.remove("top_p") {
            options.insert("top_p".to_string(), v);
        }
        if let Some(v) = body.remove("max_tokens") {
            options.insert("num_predict".to_string(), v);
        }
        if !options.is_empty() {
            body.insert("options".to_string(), Value::Object(options));
        }
        if let Some(enabled) = reasoning {
            body.insert("think".to_string(), json!(enabled));
        }
        body
    }

    /// Map one decoded streaming record to a normalized event. `None` means
    /// the record carries nothing user-visible (keep-alive) and must be
    /// skipped, not emitted empty.
    pub fn transform_streaming_event(
        &self,
        record: &Value,
    ) -> Result<Option<StreamEvent>, InvokeError> {
        let obj = record
            .as_object()
            .ok_or_else(|| self.protocol_error("record is not a JSON object"))?;
        if obj.is_empty() {
            // Keep-alive record.
            return Ok(None);
        }
        match self.dialect {
            EngineDialect::Ollama => self.ollama_streaming_event(obj),
            _ => self.openai_streaming_event(obj),
        }
    }

    fn openai_streaming_event(
        &self,
        obj: &Map<String, Value>,
    ) -> Result<Option<StreamEvent>, InvokeError> {
        let choices = obj
            .get("choices")
            .and_then(Value::as_array)
            .ok_or_else(|| self.protocol_error("record has no choices array"))?;
        let choice = match choices.first() {
            Some(c) => c,
            None => return Ok(None),
        };
        let delta = choice
            .get("delta")
            .and_then(Value::as_object)
            .ok_or_else(|| self.protocol_error("choice has no delta object"))?;
        let finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        let reasoning = delta
            .get("reasoning_content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content = delta
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if !content.is_empty() {
            Ok(Some(StreamEvent {
                delta: content.to_string(),
                kind: DeltaKind::Content,
                is_final: finish_reason.is_some(),
            }))
        } else if !reasoning.is_empty() {
            Ok(Some(StreamEvent {
                delta: reasoning.to_string(),
                kind: DeltaKind::Reasoning,
                is_final: finish_reason.is_some(),
            }))
        } else if finish_reason.is_some() {
            // Finish marker with an empty delta: termination is visible.
            Ok(Some(StreamEvent {
                delta: String::new(),
                kind: DeltaKind::Content,
                is_final: true,
            }))
        } else {
            // Role announcement or other contentless chunk.
            Ok(None)
        }
    }

    fn ollama_streaming_event(
        &self,
        obj: &Map<String, Value>,
    ) -> Result<Option<StreamEvent>, InvokeError> {
        let message = obj
            .get("message")
            .and_then(Value::as_object)
            .ok_or_else(|| self.protocol_error("record has no message object"))?;
        let done = obj.get("done").and_then(Value::as_bool).unwrap_or(false);
        let thinking = message
            .get("thinking")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if !content.is_empty() {
            Ok(Some(StreamEvent {
                delta: content.to_string(),
                kind: DeltaKind::Content,
                is_final: done,
            }))
        } else if !thinking.is_empty() {
            Ok(Some(StreamEvent {
                delta: thinking.to_string(),
                kind: DeltaKind::Reasoning,
                is_final: done,
            }))
        } else if done {
            Ok(Some(StreamEvent {
                delta: String::new(),
                kind: DeltaKind::Content,
                is_final: true,
            }))
        } else {
            Ok(None)
        }
    }

    /// Decode a full (non-streaming) response body once.
    pub fn transform_response(&self, body: &Value) -> Result<CompletionOutcome, InvokeError> {
        let obj = body
            .as_object()
            .ok_or_else(|| self.protocol_error("response is not a JSON object"))?;
        match self.dialect {
            EngineDialect::Ollama => self.ollama_response(obj),
            _ => self.openai_response(obj),
        }
    }

    fn openai_response(&self, obj: &Map<String, Value>) -> Result<CompletionOutcome, InvokeError> {
        let choice = obj
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| self.protocol_error("response has no choices"))?;
        let message = choice
            .get("message")
            .and_then(Value::as_object)
            .ok_or_else(|| self.protocol_error("choice has no message object"))?;
        let text = message
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| self.protocol_error("message has no content"))?
            .to_string();
        let reasoning = message
            .get("reasoning_content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .unwrap_or("stop")
            .to_string();
        Ok(CompletionOutcome {
            text,
            reasoning,
            finish_reason,
            id: obj.get("id").and_then(Value::as_str).map(str::to_string),
            created: obj.get("created").and_then(Value::as_i64),
            model: obj.get("model").and_then(Value::as_str).map(str::to_string),
        })
    }

    fn ollama_response(&self, obj: &Map<String, Value>) -> Result<CompletionOutcome, InvokeError> {
        let message = obj
            .get("message")
            .and_then(Value::as_object)
            .ok_or_else(|| self.protocol_error("response has no message object"))?;
        let text = message
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| self.protocol_error("message has no content"))?
            .to_string();
        let reasoning = message
            .get("thinking")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let created = obj
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.timestamp());
        Ok(CompletionOutcome {
            text,
            reasoning,
            finish_reason: obj
                .get("done_reason")
                .and_then(Value::as_str)
                .unwrap_or("stop")
                .to_string(),
            id: None,
            created,
            model: obj.get("model").and_then(Value::as_str).map(str::to_string),
        })
    }
}
