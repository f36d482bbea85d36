//! Engine serve-command rendering.
//!
//! Each engine is launched by a shell command built from its launch
//! template and the resolved instance topology. The command is consumed by
//! the provisioning layer (container entrypoint or instance user-data).

use crate::registry::EngineType;
use crate::resolver::ExecutableConfig;

/// Render the serve command for a resolved deployment. `model_path` is
/// where the provisioning layer placed the weights.
pub fn render_serve_command(config: &ExecutableConfig, model_path: &str) -> String {
    let engine = &config.engine;
    let port = engine.server_port;
    let model_id = &config.model.model_id;
    let parallelism = config.gpu_parallelism();

    let mut command = match engine.engine_type {
        EngineType::Vllm => format!(
            "vllm serve {model_path} --port {port} --trust-remote-code \
             --served-model-name={model_id} --tensor-parallel-size={parallelism} \
             {} {}",
            engine.default_cli_args, engine.cli_args,
        ),
        EngineType::Tgi => format!(
            "text-generation-launcher --trust-remote-code --model-id {model_path} \
             --port {port} --num-shard {parallelism} {} {}",
            engine.default_cli_args, engine.cli_args,
        ),
        EngineType::LlamaCpp => format!(
            "llama-server --n-gpu-layers {} -dev {} --no-webui --port {port} \
             -m {model_path} --alias {model_id} {} {}",
            i32::MAX,
            cuda_devices(parallelism),
            engine.default_cli_args,
            engine.cli_args,
        ),
        EngineType::Ollama => {
            let serving = config
                .model
                .ollama_model_id
                .as_deref()
                .unwrap_or(model_id);
            format!(
                "export OLLAMA_HOST=0.0.0.0:{port} && export OLLAMA_MODELS=\"{model_path}\" \
                 && ollama serve & ollama run {serving} {} {}",
                engine.default_cli_args, engine.cli_args,
            )
        }
    };
    command = command.trim_end().to_string();

    if !engine.environment_variables.is_empty() {
        command = format!("{} && {}", engine.environment_variables, command);
    }
    if let Some(api_key) = engine.api_key.as_deref() {
        command.push_str(&format!(" --api-key {api_key}"));
    }
    collapse_spaces(&command)
}

fn cuda_devices(count: u32) -> String {
    (0..count.max(1))
        .map(|i| format!("CUDA{i}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EngineType, InstanceType, ServiceType};
    use crate::resolver::{ResolveRequest, Resolver};

    fn config(
        model_id: &str,
        engine: EngineType,
        instance: InstanceType,
        service: ServiceType,
    ) -> ExecutableConfig {
        let resolver = Resolver::new(crate::registry::CapabilityGraph::builtin());
        resolver
            .resolve(&ResolveRequest {
                model_id: model_id.to_string(),
                engine: Some(engine),
                instance: Some(instance),
                service: Some(service),
                framework: None,
                region: "us-east-1".to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn vllm_command_uses_instance_parallelism() {
        let cfg = config(
            "Qwen2.5-72B-Instruct",
            EngineType::Vllm,
            InstanceType::G548Xlarge,
            ServiceType::Sagemaker,
        );
        let cmd = render_serve_command(&cfg, "/opt/ml/model");
        assert!(cmd.starts_with("vllm serve /opt/ml/model"));
        assert!(cmd.contains("--tensor-parallel-size=8"));
        assert!(cmd.contains("--served-model-name=Qwen2.5-72B-Instruct"));
    }

    #[test]
    fn llamacpp_command_lists_cuda_devices() {
        let cfg = config(
            "DeepSeek-R1-Distill-Qwen-7B",
            EngineType::LlamaCpp,
            InstanceType::G5Xlarge,
            ServiceType::Sagemaker,
        );
        let cmd = render_serve_command(&cfg, "/models/r1.gguf");
        assert!(cmd.contains("-dev CUDA0"));
        assert!(cmd.contains("--alias DeepSeek-R1-Distill-Qwen-7B"));
    }

    #[test]
    fn ollama_command_exports_env_and_runs_registry_name() {
        let cfg = config(
            "Qwen3-8B",
            EngineType::Ollama,
            InstanceType::Local,
            ServiceType::Local,
        );
        let cmd = render_serve_command(&cfg, "/var/lib/ollama");
        assert!(cmd.contains("OLLAMA_HOST=0.0.0.0:11434"));
        assert!(cmd.contains("ollama run qwen3:8b"));
        assert!(cmd.starts_with("export OLLAMA_FLASH_ATTENTION=1"));
    }
}
