//! Resolution soundness, completeness and idempotence over the capability
//! graph.

use modelport_core::error::ResolveError;
use modelport_core::registry::model::{Model, ModelSeries, ModelType};
use modelport_core::registry::{
    CapabilityGraph, CapabilityTuple, Engine, EngineType, Framework, FrameworkType, Instance,
    InstanceType, Service, ServiceType,
};
use modelport_core::resolver::{ResolveRequest, Resolver};

fn request(model_id: &str) -> ResolveRequest {
    ResolveRequest {
        model_id: model_id.to_string(),
        region: "us-east-1".to_string(),
        ..Default::default()
    }
}

fn constrained(model_id: &str, tuple: &CapabilityTuple) -> ResolveRequest {
    ResolveRequest {
        engine: Some(tuple.engine),
        instance: Some(tuple.instance),
        service: Some(tuple.service),
        framework: Some(tuple.framework),
        ..request(model_id)
    }
}

/// A graph admitting exactly one tuple for "demo-model".
fn single_tuple_graph() -> CapabilityGraph {
    let mut graph = CapabilityGraph::new();
    graph.register_engine(Engine {
        engine_type: EngineType::Vllm,
        description: String::new(),
        server_port: 8000,
        default_cli_args: String::new(),
        cli_args: String::new(),
        environment_variables: String::new(),
        api_key: None,
        custom_gpu_num: None,
    });
    graph.register_instance(Instance {
        instance_type: InstanceType::G52Xlarge,
        gpu_num: Some(1),
        vcpu: 8,
        memory: 32,
        description: String::new(),
    });
    graph.register_service(Service {
        service_type: ServiceType::Sagemaker,
        name: "sagemaker".to_string(),
        description: String::new(),
    });
    graph.register_framework(Framework {
        framework_type: FrameworkType::Fastapi,
        description: String::new(),
    });
    graph
        .register_model(Model {
            model_id: "demo-model".to_string(),
            series: ModelSeries::Qwen25,
            model_type: ModelType::Llm,
            description: String::new(),
            huggingface_model_id: None,
            ollama_model_id: None,
            tuples: vec![CapabilityTuple {
                engine: EngineType::Vllm,
                instance: InstanceType::G52Xlarge,
                service: ServiceType::Sagemaker,
                framework: FrameworkType::Fastapi,
            }],
        })
        .unwrap();
    graph
}

#[test]
fn resolution_is_sound_for_every_admissible_tuple() {
    let graph = CapabilityGraph::builtin();
    let resolver = Resolver::new(graph);
    for (model_id, _) in graph.supported_models() {
        let tuples = graph.supported_tuples(model_id).unwrap();
        for tuple in tuples {
            let config = resolver
                .resolve(&constrained(model_id, tuple))
                .unwrap_or_else(|e| panic!("{model_id} {tuple} should resolve: {e}"));
            // The result must be a member of the admissible set.
            assert!(tuples.contains(&config.tuple()));
            assert_eq!(config.tuple(), *tuple);
        }
    }
}

#[test]
fn unique_constraint_resolves_to_that_tuple() {
    let graph = single_tuple_graph();
    let resolver = Resolver::new(&graph);
    let mut req = request("demo-model");
    req.engine = Some(EngineType::Vllm);
    let config = resolver.resolve(&req).unwrap();
    assert_eq!(
        config.tuple(),
        CapabilityTuple {
            engine: EngineType::Vllm,
            instance: InstanceType::G52Xlarge,
            service: ServiceType::Sagemaker,
            framework: FrameworkType::Fastapi,
        }
    );
}

#[test]
fn zero_match_constraint_is_incompatible() {
    let graph = single_tuple_graph();
    let resolver = Resolver::new(&graph);
    let mut req = request("demo-model");
    req.engine = Some(EngineType::Tgi);
    assert!(matches!(
        resolver.resolve(&req),
        Err(ResolveError::IncompatibleCombination { .. })
    ));
}

#[test]
fn unconstrained_single_tuple_model_resolves_fully() {
    let graph = single_tuple_graph();
    let resolver = Resolver::new(&graph);
    let config = resolver.resolve(&request("demo-model")).unwrap();
    assert_eq!(config.engine.engine_type, EngineType::Vllm);
    assert_eq!(config.model_tag, "dev");
}

#[test]
fn resolution_is_idempotent() {
    let graph = CapabilityGraph::builtin();
    let resolver = Resolver::new(graph);
    let mut req = request("Llama-3.1-8B-Instruct");
    req.engine = Some(EngineType::Vllm);
    req.instance = Some(InstanceType::G512Xlarge);
    req.service = Some(ServiceType::Ecs);
    let first = resolver.resolve(&req).unwrap();
    let second = resolver.resolve(&req).unwrap();
    assert_eq!(first, second);
}

#[test]
fn ambiguity_reports_the_open_axis() {
    let graph = CapabilityGraph::builtin();
    let resolver = Resolver::new(graph);
    // Llama 3.1 8B admits two engines; leaving the engine open must not
    // silently pick one.
    let err = resolver
        .resolve(&request("Llama-3.1-8B-Instruct"))
        .unwrap_err();
    match err {
        ResolveError::AmbiguousSelection { candidates, .. } => {
            assert!(candidates.len() > 1);
        }
        other => panic!("expected AmbiguousSelection, got {other:?}"),
    }
}

#[test]
fn unknown_model_is_surfaced_verbatim() {
    let resolver = Resolver::new(CapabilityGraph::builtin());
    match resolver.resolve(&request("not-a-model")) {
        Err(ResolveError::UnknownModel(id)) => assert_eq!(id, "not-a-model"),
        other => panic!("expected UnknownModel, got {other:?}"),
    }
}
