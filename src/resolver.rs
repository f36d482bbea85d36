//! Compatibility resolution: from a model id plus caller constraints to an
//! executable configuration.
//!
//! Resolution is a pure function over the capability graph. All four axes
//! are resolved against the admissible tuple set jointly, so a combination
//! that is valid per axis but absent from the set is rejected. Any axis
//! left ambiguous is a hard failure carrying the candidate list; no default
//! is ever inferred for an ambiguous axis.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::DEFAULT_MODEL_TAG;
use crate::error::{Axis, ResolveError};
use crate::registry::{
    CapabilityGraph, CapabilityTuple, Engine, EngineType, Framework, FrameworkType, Instance,
    InstanceType, Model, Service, ServiceType, TupleQuery,
};

/// Axis-scoped parameter overlays merged into the resolved records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraParams {
    #[serde(default)]
    pub model_params: Map<String, Value>,
    #[serde(default)]
    pub engine_params: Map<String, Value>,
    #[serde(default)]
    pub instance_params: Map<String, Value>,
    #[serde(default)]
    pub service_params: Map<String, Value>,
    #[serde(default)]
    pub framework_params: Map<String, Value>,
}

impl ExtraParams {
    pub fn is_empty(&self) -> bool {
        self.model_params.is_empty()
            && self.engine_params.is_empty()
            && self.instance_params.is_empty()
            && self.service_params.is_empty()
            && self.framework_params.is_empty()
    }
}

/// Caller input to [`Resolver::resolve`]. Unset axes are picked from the
/// admissible set when unambiguous.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveRequest {
    pub model_id: String,
    pub engine: Option<EngineType>,
    pub instance: Option<InstanceType>,
    pub service: Option<ServiceType>,
    pub framework: Option<FrameworkType>,
    pub region: String,
    pub model_bucket: Option<String>,
    pub model_tag: Option<String>,
    pub extra_params: ExtraParams,
}

/// The fully resolved, immutable deployment/invocation descriptor. The only
/// object the invocation client needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableConfig {
    pub model: Model,
    pub engine: Engine,
    pub instance: Instance,
    pub service: Service,
    pub framework: Framework,
    pub region: String,
    pub model_bucket: Option<String>,
    pub model_tag: String,
    pub extra_params: ExtraParams,
}

impl ExecutableConfig {
    pub fn tuple(&self) -> CapabilityTuple {
        CapabilityTuple {
            engine: self.engine.engine_type,
            instance: self.instance.instance_type,
            service: self.service.service_type,
            framework: self.framework.framework_type,
        }
    }

    /// GPU parallelism the engine should be launched with: an engine
    /// override wins over the instance topology.
    pub fn gpu_parallelism(&self) -> u32 {
        self.engine
            .custom_gpu_num
            .or(self.instance.gpu_num)
            .unwrap_or(1)
    }
}

/// Resolves deployment requests against one capability graph.
pub struct Resolver<'a> {
    graph: &'a CapabilityGraph,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a CapabilityGraph) -> Self {
        Self { graph }
    }

    /// Resolve the engine axis alone: verify an explicit request against
    /// the model's engine projection, or pick the single admissible engine.
    pub fn resolve_engine(
        &self,
        model_id: &str,
        requested: Option<EngineType>,
    ) -> Result<EngineType, ResolveError> {
        let candidates: Vec<EngineType> = self.graph.model(model_id)?.supported_engines();
        Self::resolve_axis(model_id, Axis::Engine, requested, candidates)
    }

    pub fn resolve_instance(
        &self,
        model_id: &str,
        requested: Option<InstanceType>,
    ) -> Result<InstanceType, ResolveError> {
        let candidates: Vec<InstanceType> = self.graph.model(model_id)?.supported_instances();
        Self::resolve_axis(model_id, Axis::Instance, requested, candidates)
    }

    pub fn resolve_service(
        &self,
        model_id: &str,
        requested: Option<ServiceType>,
    ) -> Result<ServiceType, ResolveError> {
        let candidates: Vec<ServiceType> = self.graph.model(model_id)?.supported_services();
        Self::resolve_axis(model_id, Axis::Service, requested, candidates)
    }

    pub fn resolve_framework(
        &self,
        model_id: &str,
        requested: Option<FrameworkType>,
    ) -> Result<FrameworkType, ResolveError> {
        let candidates: Vec<FrameworkType> = self.graph.model(model_id)?.supported_frameworks();
        Self::resolve_axis(model_id, Axis::Framework, requested, candidates)
    }

    fn resolve_axis<T>(
        model_id: &str,
        axis: Axis,
        requested: Option<T>,
        candidates: Vec<T>,
    ) -> Result<T, ResolveError>
    where
        T: Copy + PartialEq + std::fmt::Display,
    {
        match requested {
            Some(value) if candidates.contains(&value) => Ok(value),
            Some(value) => Err(ResolveError::IncompatibleCombination {
                model_id: model_id.to_string(),
                requested: format!("{axis}={value}"),
            }),
            None => match candidates.as_slice() {
                [only] => Ok(*only),
                _ => Err(ResolveError::AmbiguousSelection {
                    model_id: model_id.to_string(),
                    axis,
                    candidates: candidates.iter().map(T::to_string).collect(),
                }),
            },
        }
    }

    /// Resolve all four axes jointly against the admissible tuple set and
    /// materialize the executable configuration.
    pub fn resolve(&self, request: &ResolveRequest) -> Result<ExecutableConfig, ResolveError> {
        let model = self.graph.model(&request.model_id)?;
        let query = TupleQuery {
            engine: request.engine,
            instance: request.instance,
            service: request.service,
            framework: request.framework,
        };
        let candidates = self.graph.find(&request.model_id, &query)?;
        if candidates.is_empty() {
            return Err(ResolveError::IncompatibleCombination {
                model_id: request.model_id.clone(),
                requested: query.to_string(),
            });
        }

        let tuple = CapabilityTuple {
            engine: Self::joint_axis(
                &request.model_id,
                Axis::Engine,
                query.engine,
                candidates.iter().map(|t| t.engine),
            )?,
            instance: Self::joint_axis(
                &request.model_id,
                Axis::Instance,
                query.instance,
                candidates.iter().map(|t| t.instance),
            )?,
            service: Self::joint_axis(
                &request.model_id,
                Axis::Service,
                query.service,
                candidates.iter().map(|t| t.service),
            )?,
            framework: Self::joint_axis(
                &request.model_id,
                Axis::Framework,
                query.framework,
                candidates.iter().map(|t| t.framework),
            )?,
        };
        debug!(model_id = %request.model_id, %tuple, "resolved deployment tuple");

        self.materialize(model, tuple, request)
    }

    /// Collapse one axis of the candidate tuples: the constrained value if
    /// given, the unique projected value otherwise.
    fn joint_axis<T>(
        model_id: &str,
        axis: Axis,
        constrained: Option<T>,
        projection: impl Iterator<Item = T>,
    ) -> Result<T, ResolveError>
    where
        T: Copy + PartialEq + std::fmt::Display,
    {
        if let Some(value) = constrained {
            return Ok(value);
        }
        let mut distinct: Vec<T> = Vec::new();
        for value in projection {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        match distinct.as_slice() {
            [only] => Ok(*only),
            _ => Err(ResolveError::AmbiguousSelection {
                model_id: model_id.to_string(),
                axis,
                candidates: distinct.iter().map(T::to_string).collect(),
            }),
        }
    }

    fn materialize(
        &self,
        model: &Model,
        tuple: CapabilityTuple,
        request: &ResolveRequest,
    ) -> Result<ExecutableConfig, ResolveError> {
        // The graph validated these records at registration time.
        let engine = self
            .graph
            .engine(tuple.engine)
            .expect("registered engine")
            .clone();
        let instance = self
            .graph
            .instance(tuple.instance)
            .expect("registered instance")
            .clone();
        let service = self
            .graph
            .service(tuple.service)
            .expect("registered service")
            .clone();
        let framework = self
            .graph
            .framework(tuple.framework)
            .expect("registered framework")
            .clone();
        let params = &request.extra_params;

        Ok(ExecutableConfig {
            model: apply_overlay(model, &params.model_params, "model")?,
            engine: apply_overlay(&engine, &params.engine_params, "engine")?,
            instance: apply_overlay(&instance, &params.instance_params, "instance")?,
            service: apply_overlay(&service, &params.service_params, "service")?,
            framework: apply_overlay(&framework, &params.framework_params, "framework")?,
            region: request.region.clone(),
            model_bucket: request.model_bucket.clone(),
            model_tag: request
                .model_tag
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_TAG.to_string()),
            extra_params: request.extra_params.clone(),
        })
    }
}

/// Merge a JSON overlay into a typed record: serialize, overwrite top-level
/// keys, deserialize back. An overlay that does not fit the record's shape
/// is an `InvalidOverlay` error.
fn apply_overlay<T>(
    record: &T,
    overlay: &Map<String, Value>,
    target: &str,
) -> Result<T, ResolveError>
where
    T: Clone + Serialize + serde::de::DeserializeOwned,
{
    if overlay.is_empty() {
        return Ok(record.clone());
    }
    let invalid = |reason: String| ResolveError::InvalidOverlay {
        target: target.to_string(),
        reason,
    };
    let mut value = serde_json::to_value(record).map_err(|e| invalid(e.to_string()))?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| invalid("record is not a JSON object".to_string()))?;
    for (key, val) in overlay {
        obj.insert(key.clone(), val.clone());
    }
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CapabilityGraph;

    fn graph() -> &'static CapabilityGraph {
        CapabilityGraph::builtin()
    }

    fn request(model_id: &str) -> ResolveRequest {
        ResolveRequest {
            model_id: model_id.to_string(),
            region: "us-east-1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn unknown_model_fails() {
        let resolver = Resolver::new(graph());
        assert!(matches!(
            resolver.resolve(&request("no-such-model")),
            Err(ResolveError::UnknownModel(_))
        ));
    }

    #[test]
    fn single_tuple_model_resolves_without_constraints() {
        let resolver = Resolver::new(graph());
        // Qwen2.5-72B admits vllm on g5.48xlarge only, but two services.
        let mut req = request("Qwen2.5-72B-Instruct");
        req.service = Some(ServiceType::Sagemaker);
        let config = resolver.resolve(&req).unwrap();
        assert_eq!(config.engine.engine_type, EngineType::Vllm);
        assert_eq!(config.instance.instance_type, InstanceType::G548Xlarge);
        assert_eq!(config.gpu_parallelism(), 8);
    }

    #[test]
    fn ambiguous_axis_lists_candidates() {
        let resolver = Resolver::new(graph());
        let err = resolver.resolve(&request("Qwen2.5-72B-Instruct")).unwrap_err();
        match err {
            ResolveError::AmbiguousSelection { axis, candidates, .. } => {
                assert_eq!(axis, Axis::Service);
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected AmbiguousSelection, got {other:?}"),
        }
    }

    #[test]
    fn jointly_absent_combination_is_incompatible() {
        let resolver = Resolver::new(graph());
        // Ollama on Qwen2.5-7B exists, and so does sagemaker, but never
        // together in one tuple.
        let mut req = request("Qwen2.5-7B-Instruct");
        req.engine = Some(EngineType::Ollama);
        req.service = Some(ServiceType::Sagemaker);
        let err = resolver.resolve(&req).unwrap_err();
        assert!(matches!(err, ResolveError::IncompatibleCombination { .. }));

        // Per-axis resolution alone would have accepted both values.
        assert!(resolver
            .resolve_engine("Qwen2.5-7B-Instruct", Some(EngineType::Ollama))
            .is_ok());
        assert!(resolver
            .resolve_service("Qwen2.5-7B-Instruct", Some(ServiceType::Sagemaker))
            .is_ok());
    }

    #[test]
    fn engine_params_overlay_is_applied() {
        let resolver = Resolver::new(graph());
        let mut req = request("Qwen2.5-72B-Instruct");
        req.service = Some(ServiceType::Sagemaker);
        req.extra_params.engine_params.insert(
            "cli_args".to_string(),
            Value::String("--max-model-len 8192".to_string()),
        );
        let config = resolver.resolve(&req).unwrap();
        assert_eq!(config.engine.cli_args, "--max-model-len 8192");
    }

    #[test]
    fn bad_overlay_shape_is_rejected() {
        let resolver = Resolver::new(graph());
        let mut req = request("Qwen2.5-72B-Instruct");
        req.service = Some(ServiceType::Sagemaker);
        req.extra_params
            .engine_params
            .insert("server_port".to_string(), Value::String("not-a-port".to_string()));
        assert!(matches!(
            resolver.resolve(&req),
            Err(ResolveError::InvalidOverlay { .. })
        ));
    }
}
