//! Built-in declarative catalog of engines, instances, services, frameworks
//! and models, plus loading of user-supplied registry files.
//!
//! The catalog is data, not behavior: admissible combinations are declared
//! here and queried through [`CapabilityGraph`]. A registry file can add
//! models on top of the built-ins at process start.

use std::path::Path;

use lazy_static::lazy_static;
use serde::Deserialize;

use crate::error::RegistryError;
use crate::registry::model::{Model, ModelSeries, ModelType};
use crate::registry::{
    CapabilityGraph, CapabilityTuple, Engine, EngineType, Framework, FrameworkType, Instance,
    InstanceType, Service, ServiceType,
};

lazy_static! {
    /// Process-wide graph assembled from the built-in catalog.
    pub(crate) static ref BUILTIN: CapabilityGraph =
        build_builtin().expect("built-in catalog is self-consistent");
}

/// Cross product of per-axis lists, for models whose admissible set is the
/// full combination of what they support on each axis.
pub fn cross(
    engines: &[EngineType],
    instances: &[InstanceType],
    services: &[ServiceType],
    frameworks: &[FrameworkType],
) -> Vec<CapabilityTuple> {
    let mut tuples = Vec::new();
    for &engine in engines {
        for &instance in instances {
            for &service in services {
                for &framework in frameworks {
                    tuples.push(CapabilityTuple {
                        engine,
                        instance,
                        service,
                        framework,
                    });
                }
            }
        }
    }
    tuples
}

fn engines() -> Vec<Engine> {
    vec![
        Engine {
            engine_type: EngineType::Vllm,
            description: "vLLM batching transformer server".to_string(),
            server_port: 8000,
            default_cli_args: "--max-num-seqs 10 --disable-log-stats".to_string(),
            cli_args: String::new(),
            environment_variables: String::new(),
            api_key: None,
            custom_gpu_num: None,
        },
        Engine {
            engine_type: EngineType::Tgi,
            description: "Text Generation Inference launcher".to_string(),
            server_port: 8080,
            default_cli_args: "--max-total-tokens 16000 --max-concurrent-requests 10".to_string(),
            cli_args: String::new(),
            environment_variables: String::new(),
            api_key: None,
            custom_gpu_num: None,
        },
        Engine {
            engine_type: EngineType::LlamaCpp,
            description: "llama.cpp server for GGUF-quantized checkpoints".to_string(),
            server_port: 11434,
            default_cli_args: String::new(),
            cli_args: String::new(),
            environment_variables: String::new(),
            api_key: None,
            custom_gpu_num: None,
        },
        Engine {
            engine_type: EngineType::Ollama,
            description: "Ollama runtime".to_string(),
            server_port: 11434,
            default_cli_args: String::new(),
            environment_variables: "export OLLAMA_FLASH_ATTENTION=1 && export OLLAMA_KEEP_ALIVE=-1"
                .to_string(),
            cli_args: String::new(),
            api_key: None,
            custom_gpu_num: None,
        },
    ]
}

fn instances() -> Vec<Instance> {
    vec![
        Instance {
            instance_type: InstanceType::G4dn2Xlarge,
            gpu_num: Some(1),
            vcpu: 8,
            memory: 32,
            description: "1x NVIDIA T4, cost-effective entry GPU shape".to_string(),
        },
        Instance {
            instance_type: InstanceType::G5Xlarge,
            gpu_num: Some(1),
            vcpu: 4,
            memory: 16,
            description: "1x NVIDIA A10G".to_string(),
        },
        Instance {
            instance_type: InstanceType::G52Xlarge,
            gpu_num: Some(1),
            vcpu: 8,
            memory: 32,
            description: "1x NVIDIA A10G".to_string(),
        },
        Instance {
            instance_type: InstanceType::G54Xlarge,
            gpu_num: Some(1),
            vcpu: 16,
            memory: 64,
            description: "1x NVIDIA A10G".to_string(),
        },
        Instance {
            instance_type: InstanceType::G512Xlarge,
            gpu_num: Some(4),
            vcpu: 48,
            memory: 192,
            description: "4x NVIDIA A10G".to_string(),
        },
        Instance {
            instance_type: InstanceType::G548Xlarge,
            gpu_num: Some(8),
            vcpu: 192,
            memory: 768,
            description: "8x NVIDIA A10G".to_string(),
        },
        Instance {
            instance_type: InstanceType::G6e2Xlarge,
            gpu_num: Some(1),
            vcpu: 8,
            memory: 64,
            description: "1x NVIDIA L40S".to_string(),
        },
        Instance {
            instance_type: InstanceType::Local,
            gpu_num: None,
            vcpu: 0,
            memory: 0,
            description: "local machine".to_string(),
        },
    ]
}

fn services() -> Vec<Service> {
    vec![
        Service {
            service_type: ServiceType::Sagemaker,
            name: "Amazon SageMaker AI real-time inference".to_string(),
            description: "Fully managed low-latency endpoints with autoscaling".to_string(),
        },
        Service {
            service_type: ServiceType::Ec2,
            name: "Amazon EC2".to_string(),
            description: "Bare virtual machine hosting".to_string(),
        },
        Service {
            service_type: ServiceType::Ecs,
            name: "Amazon ECS".to_string(),
            description: "Managed container orchestration behind a load balancer".to_string(),
        },
        Service {
            service_type: ServiceType::Local,
            name: "Local".to_string(),
            description: String::new(),
        },
    ]
}

fn frameworks() -> Vec<Framework> {
    vec![
        Framework {
            framework_type: FrameworkType::Fastapi,
            description: "REST shim in front of the engine's server".to_string(),
        },
        Framework {
            framework_type: FrameworkType::Custom,
            description: "Engine-provided serving surface, no shim".to_string(),
        },
    ]
}

const GPU_SERVICES: [ServiceType; 3] = [ServiceType::Sagemaker, ServiceType::Ec2, ServiceType::Ecs];

fn models() -> Vec<Model> {
    let fastapi = [FrameworkType::Fastapi];
    vec![
        Model {
            model_id: "Qwen2.5-7B-Instruct".to_string(),
            series: ModelSeries::Qwen25,
            model_type: ModelType::Llm,
            description: "Qwen 2.5 7B instruction-tuned".to_string(),
            huggingface_model_id: Some("Qwen/Qwen2.5-7B-Instruct".to_string()),
            ollama_model_id: Some("qwen2.5:7b-instruct".to_string()),
            tuples: {
                let mut t = cross(
                    &[EngineType::Vllm, EngineType::Tgi],
                    &[
                        InstanceType::G52Xlarge,
                        InstanceType::G54Xlarge,
                        InstanceType::G6e2Xlarge,
                    ],
                    &GPU_SERVICES,
                    &fastapi,
                );
                // Ollama serves this checkpoint on bare hosts only.
                t.extend(cross(
                    &[EngineType::Ollama],
                    &[InstanceType::G52Xlarge, InstanceType::Local],
                    &[ServiceType::Ec2, ServiceType::Local],
                    &[FrameworkType::Custom],
                ));
                t
            },
        },
        Model {
            model_id: "Qwen2.5-72B-Instruct".to_string(),
            series: ModelSeries::Qwen25,
            model_type: ModelType::Llm,
            description: "Qwen 2.5 72B instruction-tuned; needs a multi-GPU shape".to_string(),
            huggingface_model_id: Some("Qwen/Qwen2.5-72B-Instruct".to_string()),
            ollama_model_id: None,
            tuples: cross(
                &[EngineType::Vllm],
                &[InstanceType::G548Xlarge],
                &[ServiceType::Sagemaker, ServiceType::Ec2],
                &fastapi,
            ),
        },
        Model {
            model_id: "Qwen3-8B".to_string(),
            series: ModelSeries::Qwen3,
            model_type: ModelType::Llm,
            description: "Qwen 3 8B with a switchable reasoning channel".to_string(),
            huggingface_model_id: Some("Qwen/Qwen3-8B".to_string()),
            ollama_model_id: Some("qwen3:8b".to_string()),
            tuples: {
                let mut t = cross(
                    &[EngineType::Vllm],
                    &[
                        InstanceType::G52Xlarge,
                        InstanceType::G54Xlarge,
                        InstanceType::G6e2Xlarge,
                    ],
                    &GPU_SERVICES,
                    &fastapi,
                );
                t.extend(cross(
                    &[EngineType::Ollama],
                    &[InstanceType::Local],
                    &[ServiceType::Local],
                    &[FrameworkType::Custom],
                ));
                t
            },
        },
        Model {
            model_id: "DeepSeek-R1-Distill-Qwen-7B".to_string(),
            series: ModelSeries::DeepseekR1,
            model_type: ModelType::Llm,
            description: "DeepSeek R1 distillation; always emits a reasoning channel".to_string(),
            huggingface_model_id: Some("deepseek-ai/DeepSeek-R1-Distill-Qwen-7B".to_string()),
            ollama_model_id: Some("deepseek-r1:7b".to_string()),
            tuples: {
                let mut t = cross(
                    &[EngineType::Vllm],
                    &[InstanceType::G52Xlarge, InstanceType::G54Xlarge],
                    &GPU_SERVICES,
                    &fastapi,
                );
                // The GGUF quantization fits a single small GPU.
                t.extend(cross(
                    &[EngineType::LlamaCpp],
                    &[InstanceType::G4dn2Xlarge, InstanceType::G5Xlarge],
                    &[ServiceType::Sagemaker, ServiceType::Ecs],
                    &fastapi,
                ));
                t
            },
        },
        Model {
            model_id: "Llama-3.1-8B-Instruct".to_string(),
            series: ModelSeries::Llama3,
            model_type: ModelType::Llm,
            description: "Meta Llama 3.1 8B instruction-tuned".to_string(),
            huggingface_model_id: Some("meta-llama/Llama-3.1-8B-Instruct".to_string()),
            ollama_model_id: Some("llama3.1:8b".to_string()),
            tuples: cross(
                &[EngineType::Vllm, EngineType::Tgi],
                &[
                    InstanceType::G52Xlarge,
                    InstanceType::G54Xlarge,
                    InstanceType::G512Xlarge,
                ],
                &GPU_SERVICES,
                &fastapi,
            ),
        },
        Model {
            model_id: "GLM-4-9B-Chat".to_string(),
            series: ModelSeries::Glm4,
            model_type: ModelType::Llm,
            description: "GLM-4 9B chat".to_string(),
            huggingface_model_id: Some("THUDM/glm-4-9b-chat".to_string()),
            ollama_model_id: None,
            tuples: cross(
                &[EngineType::Vllm],
                &[InstanceType::G52Xlarge, InstanceType::G54Xlarge],
                &[ServiceType::Sagemaker, ServiceType::Ecs],
                &fastapi,
            ),
        },
        Model {
            model_id: "Mistral-7B-Instruct-v0.3".to_string(),
            series: ModelSeries::Mistral,
            model_type: ModelType::Llm,
            description: "Mistral 7B instruction-tuned".to_string(),
            huggingface_model_id: Some("mistralai/Mistral-7B-Instruct-v0.3".to_string()),
            ollama_model_id: Some("mistral:7b-instruct".to_string()),
            tuples: {
                let mut t = cross(
                    &[EngineType::Vllm, EngineType::Tgi],
                    &[InstanceType::G52Xlarge, InstanceType::G6e2Xlarge],
                    &GPU_SERVICES,
                    &fastapi,
                );
                t.extend(cross(
                    &[EngineType::LlamaCpp],
                    &[InstanceType::G4dn2Xlarge],
                    &[ServiceType::Ecs],
                    &fastapi,
                ));
                t
            },
        },
    ]
}

fn build_builtin() -> Result<CapabilityGraph, RegistryError> {
    let mut graph = CapabilityGraph::new();
    for engine in engines() {
        graph.register_engine(engine);
    }
    for instance in instances() {
        graph.register_instance(instance);
    }
    for service in services() {
        graph.register_service(service);
    }
    for framework in frameworks() {
        graph.register_framework(framework);
    }
    for model in models() {
        graph.register_model(model)?;
    }
    Ok(graph)
}

/// One model declaration in a registry file. Either an explicit tuple list
/// or per-axis lists that expand to their cross product.
#[derive(Debug, Deserialize)]
struct ModelDecl {
    model_id: String,
    series: ModelSeries,
    model_type: ModelType,
    #[serde(default)]
    description: String,
    #[serde(default)]
    huggingface_model_id: Option<String>,
    #[serde(default)]
    ollama_model_id: Option<String>,
    #[serde(default)]
    engines: Vec<EngineType>,
    #[serde(default)]
    instances: Vec<InstanceType>,
    #[serde(default)]
    services: Vec<ServiceType>,
    #[serde(default)]
    frameworks: Vec<FrameworkType>,
    #[serde(default)]
    tuples: Vec<CapabilityTuple>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    models: Vec<ModelDecl>,
}

impl ModelDecl {
    fn into_model(self) -> Model {
        let tuples = if self.tuples.is_empty() {
            cross(&self.engines, &self.instances, &self.services, &self.frameworks)
        } else {
            self.tuples
        };
        Model {
            model_id: self.model_id,
            series: self.series,
            model_type: self.model_type,
            description: self.description,
            huggingface_model_id: self.huggingface_model_id,
            ollama_model_id: self.ollama_model_id,
            tuples,
        }
    }
}

/// Parse additional model declarations from a TOML registry file.
pub fn load_models(path: &Path) -> Result<Vec<Model>, RegistryError> {
    let raw = std::fs::read_to_string(path)?;
    let settings = config::Config::builder()
        .add_source(config::File::from_str(&raw, config::FileFormat::Toml))
        .build()
        .map_err(|e| RegistryError::File(e.to_string()))?;
    let file: RegistryFile = settings
        .try_deserialize()
        .map_err(|e| RegistryError::File(e.to_string()))?;
    Ok(file.models.into_iter().map(ModelDecl::into_model).collect())
}

/// The built-in graph extended with the models from an optional registry
/// file. Called once at startup; the result is read-only afterwards.
pub fn load_graph(extra_registry: Option<&Path>) -> Result<CapabilityGraph, RegistryError> {
    let mut graph = build_builtin()?;
    if let Some(path) = extra_registry {
        for model in load_models(path)? {
            tracing::debug!(model_id = %model.model_id, "registering model from registry file");
            graph.register_model(model)?;
        }
    }
    Ok(graph)
}
