//! Command definitions.

use clap::{Args, Subcommand};

use crate::registry::{EngineType, FrameworkType, InstanceType, ServiceType};

#[derive(Subcommand)]
pub enum Commands {
    /// List the models in the capability registry
    Models(ModelsCommand),
    /// Resolve a deployment plan without deploying
    Plan(PlanCommand),
    /// Invoke a deployed endpoint
    Invoke(InvokeCommand),
}

#[derive(Args)]
pub struct ModelsCommand {
    /// Also print every admissible deployment combination
    #[arg(long)]
    pub detailed: bool,
}

/// Axis constraints shared by plan and invoke.
#[derive(Args, Clone)]
pub struct TupleArgs {
    /// Inference engine (vllm, tgi, llama.cpp, ollama)
    #[arg(long)]
    pub engine: Option<EngineType>,

    /// Instance type (e.g. g5.2xlarge)
    #[arg(long)]
    pub instance: Option<InstanceType>,

    /// Hosting service (sagemaker, ec2, ecs, local)
    #[arg(long)]
    pub service: Option<ServiceType>,

    /// Serving framework (fastapi, custom)
    #[arg(long)]
    pub framework: Option<FrameworkType>,
}

#[derive(Args)]
pub struct PlanCommand {
    /// Model ID
    pub model_id: String,

    #[command(flatten)]
    pub tuple: TupleArgs,

    /// Deployment tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Region override
    #[arg(long)]
    pub region: Option<String>,

    /// Extra parameters as a JSON object, e.g.
    /// '{"engine_params":{"cli_args":"--max-model-len 8192"}}'
    #[arg(long)]
    pub extra_params: Option<String>,

    /// Also render the engine serve command for this weights path
    #[arg(long)]
    pub model_path: Option<String>,
}

#[derive(Args)]
pub struct InvokeCommand {
    /// Model ID
    pub model_id: String,

    /// Endpoint base URL produced by the deployment layer
    #[arg(long)]
    pub endpoint: String,

    #[command(flatten)]
    pub tuple: TupleArgs,

    /// Deployment tag
    #[arg(long)]
    pub tag: Option<String>,

    /// One-shot prompt; without it an interactive session starts
    #[arg(long, short = 'm')]
    pub message: Option<String>,

    /// System prompt prepended to the conversation
    #[arg(long)]
    pub system: Option<String>,

    /// Disable streaming and await the full response
    #[arg(long)]
    pub no_stream: bool,

    /// Toggle the model's reasoning channel where the engine supports it
    #[arg(long)]
    pub enable_reasoning: Option<bool>,

    /// Per-call timeout in seconds (overrides configuration)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}
