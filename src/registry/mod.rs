//! Capability registry: which (engine, instance, service, framework)
//! combinations each model can be deployed with.
//!
//! The registry is pure data. It is loaded once at process start (from the
//! built-in catalog plus an optional TOML file) and never mutated
//! afterwards, so it is safe for unsynchronized concurrent reads.

pub mod catalog;
pub mod model;

pub use model::{Model, ModelSeries, ModelType};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Axis, RegistryError, ResolveError};

/// Inference runtime identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineType {
    #[serde(rename = "vllm")]
    Vllm,
    #[serde(rename = "tgi")]
    Tgi,
    #[serde(rename = "llama.cpp")]
    LlamaCpp,
    #[serde(rename = "ollama")]
    Ollama,
}

impl EngineType {
    pub const ALL: [EngineType; 4] = [
        EngineType::Vllm,
        EngineType::Tgi,
        EngineType::LlamaCpp,
        EngineType::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Vllm => "vllm",
            EngineType::Tgi => "tgi",
            EngineType::LlamaCpp => "llama.cpp",
            EngineType::Ollama => "ollama",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|e| e.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown engine type: {s}"))
    }
}

/// Compute shape identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceType {
    #[serde(rename = "g4dn.2xlarge")]
    G4dn2Xlarge,
    #[serde(rename = "g5.xlarge")]
    G5Xlarge,
    #[serde(rename = "g5.2xlarge")]
    G52Xlarge,
    #[serde(rename = "g5.4xlarge")]
    G54Xlarge,
    #[serde(rename = "g5.12xlarge")]
    G512Xlarge,
    #[serde(rename = "g5.48xlarge")]
    G548Xlarge,
    #[serde(rename = "g6e.2xlarge")]
    G6e2Xlarge,
    #[serde(rename = "local")]
    Local,
}

impl InstanceType {
    pub const ALL: [InstanceType; 8] = [
        InstanceType::G4dn2Xlarge,
        InstanceType::G5Xlarge,
        InstanceType::G52Xlarge,
        InstanceType::G54Xlarge,
        InstanceType::G512Xlarge,
        InstanceType::G548Xlarge,
        InstanceType::G6e2Xlarge,
        InstanceType::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::G4dn2Xlarge => "g4dn.2xlarge",
            InstanceType::G5Xlarge => "g5.xlarge",
            InstanceType::G52Xlarge => "g5.2xlarge",
            InstanceType::G54Xlarge => "g5.4xlarge",
            InstanceType::G512Xlarge => "g5.12xlarge",
            InstanceType::G548Xlarge => "g5.48xlarge",
            InstanceType::G6e2Xlarge => "g6e.2xlarge",
            InstanceType::Local => "local",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|i| i.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown instance type: {s}"))
    }
}

/// Hosting platform that determines the network invocation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Sagemaker,
    Ec2,
    Ecs,
    Local,
}

impl ServiceType {
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Sagemaker,
        ServiceType::Ec2,
        ServiceType::Ecs,
        ServiceType::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Sagemaker => "sagemaker",
            ServiceType::Ec2 => "ec2",
            ServiceType::Ecs => "ecs",
            ServiceType::Local => "local",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown service type: {s}"))
    }
}

/// Serving-process wrapper bridging engine output to the service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkType {
    Fastapi,
    Custom,
}

impl FrameworkType {
    pub const ALL: [FrameworkType; 2] = [FrameworkType::Fastapi, FrameworkType::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkType::Fastapi => "fastapi",
            FrameworkType::Custom => "custom",
        }
    }
}

impl fmt::Display for FrameworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown framework type: {s}"))
    }
}

/// Engine record: runtime identifier plus the launch template fields the
/// serve command is rendered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub engine_type: EngineType,
    #[serde(default)]
    pub description: String,
    /// Port the engine's OpenAI-compatible server listens on.
    pub server_port: u16,
    /// Args every deployment of this engine gets.
    #[serde(default)]
    pub default_cli_args: String,
    /// Per-deployment extra args.
    #[serde(default)]
    pub cli_args: String,
    /// `export K=V && ...` prefix prepended to the serve command.
    #[serde(default)]
    pub environment_variables: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides the instance GPU count for parallelism if set.
    #[serde(default)]
    pub custom_gpu_num: Option<u32>,
}

/// Instance record: the compute shape hosting the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_type: InstanceType,
    /// None for shapes with no fixed GPU topology (e.g. local).
    #[serde(default)]
    pub gpu_num: Option<u32>,
    pub vcpu: u32,
    /// Memory in GiB.
    pub memory: u32,
    #[serde(default)]
    pub description: String,
}

/// Service record: the hosting platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service_type: ServiceType,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Framework record: the serving-process shim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    pub framework_type: FrameworkType,
    #[serde(default)]
    pub description: String,
}

/// One admissible deployment combination for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityTuple {
    pub engine: EngineType,
    pub instance: InstanceType,
    pub service: ServiceType,
    pub framework: FrameworkType,
}

impl fmt::Display for CapabilityTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.engine, self.instance, self.service, self.framework
        )
    }
}

/// Partial constraint over a capability tuple; unset axes match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TupleQuery {
    pub engine: Option<EngineType>,
    pub instance: Option<InstanceType>,
    pub service: Option<ServiceType>,
    pub framework: Option<FrameworkType>,
}

impl TupleQuery {
    pub fn matches(&self, tuple: &CapabilityTuple) -> bool {
        self.engine.map_or(true, |e| e == tuple.engine)
            && self.instance.map_or(true, |i| i == tuple.instance)
            && self.service.map_or(true, |s| s == tuple.service)
            && self.framework.map_or(true, |f| f == tuple.framework)
    }
}

impl fmt::Display for TupleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn axis<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "*".to_string(), T::to_string)
        }
        write!(
            f,
            "({}, {}, {}, {})",
            axis(&self.engine),
            axis(&self.instance),
            axis(&self.service),
            axis(&self.framework)
        )
    }
}

/// Per-model set-membership index, one set per axis, for O(1) candidate
/// filtering without scanning the tuple list.
#[derive(Debug, Clone, Default)]
struct AxisIndex {
    engines: HashSet<EngineType>,
    instances: HashSet<InstanceType>,
    services: HashSet<ServiceType>,
    frameworks: HashSet<FrameworkType>,
}

impl AxisIndex {
    fn build(tuples: &[CapabilityTuple]) -> Self {
        let mut index = AxisIndex::default();
        for t in tuples {
            index.engines.insert(t.engine);
            index.instances.insert(t.instance);
            index.services.insert(t.service);
            index.frameworks.insert(t.framework);
        }
        index
    }

    /// False when some constrained axis value never occurs for the model,
    /// which lets `find` reject without touching the tuple list.
    fn admits(&self, query: &TupleQuery) -> bool {
        query.engine.map_or(true, |e| self.engines.contains(&e))
            && query.instance.map_or(true, |i| self.instances.contains(&i))
            && query.service.map_or(true, |s| self.services.contains(&s))
            && query.framework.map_or(true, |f| self.frameworks.contains(&f))
    }
}

#[derive(Debug, Clone)]
struct ModelEntry {
    model: Model,
    index: AxisIndex,
}

/// The capability graph: models keyed by id plus the axis records their
/// tuples reference.
#[derive(Debug, Clone, Default)]
pub struct CapabilityGraph {
    engines: HashMap<EngineType, Engine>,
    instances: HashMap<InstanceType, Instance>,
    services: HashMap<ServiceType, Service>,
    frameworks: HashMap<FrameworkType, Framework>,
    models: HashMap<String, ModelEntry>,
}

impl CapabilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide graph built from the declarative catalog.
    pub fn builtin() -> &'static CapabilityGraph {
        &catalog::BUILTIN
    }

    pub fn register_engine(&mut self, engine: Engine) {
        self.engines.insert(engine.engine_type, engine);
    }

    pub fn register_instance(&mut self, instance: Instance) {
        self.instances.insert(instance.instance_type, instance);
    }

    pub fn register_service(&mut self, service: Service) {
        self.services.insert(service.service_type, service);
    }

    pub fn register_framework(&mut self, framework: Framework) {
        self.frameworks.insert(framework.framework_type, framework);
    }

    /// Register a model. Every tuple must reference axis records that are
    /// already registered.
    pub fn register_model(&mut self, model: Model) -> Result<(), RegistryError> {
        if model.tuples.is_empty() {
            return Err(RegistryError::EmptyTupleSet(model.model_id.clone()));
        }
        if self.models.contains_key(&model.model_id) {
            return Err(RegistryError::DuplicateModel(model.model_id.clone()));
        }
        for t in &model.tuples {
            if !self.engines.contains_key(&t.engine) {
                return Err(self.unregistered(&model.model_id, Axis::Engine, t.engine));
            }
            if !self.instances.contains_key(&t.instance) {
                return Err(self.unregistered(&model.model_id, Axis::Instance, t.instance));
            }
            if !self.services.contains_key(&t.service) {
                return Err(self.unregistered(&model.model_id, Axis::Service, t.service));
            }
            if !self.frameworks.contains_key(&t.framework) {
                return Err(self.unregistered(&model.model_id, Axis::Framework, t.framework));
            }
        }
        let index = AxisIndex::build(&model.tuples);
        self.models
            .insert(model.model_id.clone(), ModelEntry { model, index });
        Ok(())
    }

    fn unregistered(
        &self,
        model_id: &str,
        axis: Axis,
        value: impl fmt::Display,
    ) -> RegistryError {
        RegistryError::UnregisteredAxisValue {
            model_id: model_id.to_string(),
            axis,
            value: value.to_string(),
        }
    }

    pub fn model(&self, model_id: &str) -> Result<&Model, ResolveError> {
        self.models
            .get(model_id)
            .map(|e| &e.model)
            .ok_or_else(|| ResolveError::UnknownModel(model_id.to_string()))
    }

    /// All model ids with their declared model type, sorted by id.
    pub fn supported_models(&self) -> Vec<(&str, ModelType)> {
        let mut out: Vec<_> = self
            .models
            .values()
            .map(|e| (e.model.model_id.as_str(), e.model.model_type))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// The full admissible tuple set for a model.
    pub fn supported_tuples(&self, model_id: &str) -> Result<&[CapabilityTuple], ResolveError> {
        self.models
            .get(model_id)
            .map(|e| e.model.tuples.as_slice())
            .ok_or_else(|| ResolveError::UnknownModel(model_id.to_string()))
    }

    /// Tuples of `model_id` matching a partial constraint. The per-axis
    /// membership index rejects impossible constraints before any scan.
    pub fn find(
        &self,
        model_id: &str,
        query: &TupleQuery,
    ) -> Result<Vec<CapabilityTuple>, ResolveError> {
        let entry = self
            .models
            .get(model_id)
            .ok_or_else(|| ResolveError::UnknownModel(model_id.to_string()))?;
        if !entry.index.admits(query) {
            return Ok(Vec::new());
        }
        Ok(entry
            .model
            .tuples
            .iter()
            .filter(|t| query.matches(t))
            .copied()
            .collect())
    }

    pub fn engine(&self, engine_type: EngineType) -> Option<&Engine> {
        self.engines.get(&engine_type)
    }

    pub fn instance(&self, instance_type: InstanceType) -> Option<&Instance> {
        self.instances.get(&instance_type)
    }

    pub fn service(&self, service_type: ServiceType) -> Option<&Service> {
        self.services.get(&service_type)
    }

    pub fn framework(&self, framework_type: FrameworkType) -> Option<&Framework> {
        self.frameworks.get(&framework_type)
    }
}
