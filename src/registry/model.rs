//! Model records: identity, family, and the admissible deployment tuples.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::CapabilityTuple;

/// What kind of workload the model serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Llm,
    Vlm,
    Embedding,
    Rerank,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Llm => "llm",
            ModelType::Vlm => "vlm",
            ModelType::Embedding => "embedding",
            ModelType::Rerank => "rerank",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSeries {
    #[serde(rename = "qwen2.5")]
    Qwen25,
    Qwen3,
    #[serde(rename = "deepseek-r1")]
    DeepseekR1,
    Llama3,
    Glm4,
    Mistral,
}

impl ModelSeries {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSeries::Qwen25 => "qwen2.5",
            ModelSeries::Qwen3 => "qwen3",
            ModelSeries::DeepseekR1 => "deepseek-r1",
            ModelSeries::Llama3 => "llama3",
            ModelSeries::Glm4 => "glm4",
            ModelSeries::Mistral => "mistral",
        }
    }
}

impl fmt::Display for ModelSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployable model and its admissible deployment combinations.
///
/// Immutable once registered; the capability graph hands out shared
/// references only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub model_id: String,
    pub series: ModelSeries,
    pub model_type: ModelType,
    #[serde(default)]
    pub description: String,
    /// Upstream hub id the weights come from, when different from ours.
    #[serde(default)]
    pub huggingface_model_id: Option<String>,
    /// Name the model is registered under in an Ollama runtime; requests
    /// against an Ollama deployment are rewritten to this id.
    #[serde(default)]
    pub ollama_model_id: Option<String>,
    /// Admissible (engine, instance, service, framework) combinations.
    /// Not necessarily a full cross product of the per-axis projections.
    pub tuples: Vec<CapabilityTuple>,
}

impl Model {
    /// Projection of the tuple set on the engine axis, deduplicated,
    /// in first-occurrence order.
    pub fn supported_engines(&self) -> Vec<crate::registry::EngineType> {
        let mut seen = Vec::new();
        for t in &self.tuples {
            if !seen.contains(&t.engine) {
                seen.push(t.engine);
            }
        }
        seen
    }

    pub fn supported_instances(&self) -> Vec<crate::registry::InstanceType> {
        let mut seen = Vec::new();
        for t in &self.tuples {
            if !seen.contains(&t.instance) {
                seen.push(t.instance);
            }
        }
        seen
    }

    pub fn supported_services(&self) -> Vec<crate::registry::ServiceType> {
        let mut seen = Vec::new();
        for t in &self.tuples {
            if !seen.contains(&t.service) {
                seen.push(t.service);
            }
        }
        seen
    }

    pub fn supported_frameworks(&self) -> Vec<crate::registry::FrameworkType> {
        let mut seen = Vec::new();
        for t in &self.tuples {
            if !seen.contains(&t.framework) {
                seen.push(t.framework);
            }
        }
        seen
    }
}
