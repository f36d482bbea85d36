//! Command handlers.

use std::io::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::commands::{InvokeCommand, ModelsCommand, PlanCommand, TupleArgs};
use crate::config::AppConfig;
use crate::deploy::{command::render_serve_command, naming};
use crate::error::InvokeError;
use crate::invoke::conversation::fold_reasoning;
use crate::invoke::{
    Conversation, DeltaKind, EndpointAddress, InvocationClient, StreamEvent,
};
use crate::registry::{catalog, CapabilityGraph};
use crate::resolver::{ExtraParams, ResolveRequest, Resolver};

fn load_graph(app: &AppConfig) -> Result<CapabilityGraph> {
    catalog::load_graph(app.registry_file.as_deref()).context("loading capability registry")
}

fn resolve_request(
    model_id: &str,
    tuple: &TupleArgs,
    tag: Option<String>,
    region: String,
    extra_params: ExtraParams,
) -> ResolveRequest {
    ResolveRequest {
        model_id: model_id.to_string(),
        engine: tuple.engine,
        instance: tuple.instance,
        service: tuple.service,
        framework: tuple.framework,
        region,
        model_bucket: None,
        model_tag: tag,
        extra_params,
    }
}

pub async fn handle_models(cmd: ModelsCommand, app: AppConfig) -> Result<()> {
    let graph = load_graph(&app)?;
    for (model_id, model_type) in graph.supported_models() {
        let model = graph.model(model_id)?;
        println!("{model_id}  [{model_type}, {}]", model.series);
        if let Some(hub_id) = &model.huggingface_model_id {
            println!("    weights: {hub_id}");
        }
        if cmd.detailed {
            for tuple in graph.supported_tuples(model_id)? {
                println!("    {tuple}");
            }
        }
    }
    Ok(())
}

pub async fn handle_plan(cmd: PlanCommand, app: AppConfig) -> Result<()> {
    let graph = load_graph(&app)?;
    let extra_params: ExtraParams = match &cmd.extra_params {
        Some(raw) => serde_json::from_str(raw).context("parsing --extra-params")?,
        None => ExtraParams::default(),
    };
    let request = resolve_request(
        &cmd.model_id,
        &cmd.tuple,
        cmd.tag,
        cmd.region.unwrap_or_else(|| app.region.clone()),
        extra_params,
    );
    let config = Resolver::new(&graph).resolve(&request)?;

    println!("model:      {}", config.model.model_id);
    println!("tuple:      {}", config.tuple());
    println!("region:     {}", config.region);
    println!(
        "deployment: {}",
        naming::deployment_name(&config.model.model_id, &config.model_tag)
    );
    println!(
        "path:       {}",
        naming::invocation_path(&config.model.model_id, &config.model_tag)
    );
    if let Some(model_path) = &cmd.model_path {
        println!("serve:      {}", render_serve_command(&config, model_path));
    }
    Ok(())
}

pub async fn handle_invoke(cmd: InvokeCommand, app: AppConfig) -> Result<()> {
    let graph = load_graph(&app)?;
    let request = resolve_request(
        &cmd.model_id,
        &cmd.tuple,
        cmd.tag.clone(),
        app.region.clone(),
        ExtraParams::default(),
    );
    let config = Resolver::new(&graph).resolve(&request)?;
    let timeout = cmd
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| app.timeout());
    let client = InvocationClient::with_timeout(
        config,
        EndpointAddress::new(cmd.endpoint.clone()),
        timeout,
    )?;

    let mut conversation = Conversation::new();
    if let Some(system) = &cmd.system {
        conversation.add_system_message(system);
    }

    if let Some(message) = &cmd.message {
        conversation.add_user_message(message);
        run_turn(&client, &conversation, &cmd).await?;
        return Ok(());
    }

    // Interactive session; "exit" or EOF ends it, Ctrl+C aborts the
    // in-flight response only.
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        print!("User: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message == "exit" {
            break;
        }
        if message.is_empty() {
            continue;
        }
        conversation.add_user_message(message);
        let reply = run_turn(&client, &conversation, &cmd).await?;
        conversation.add_assistant_message(reply);
    }
    Ok(())
}

/// Drive one completion and print it as it arrives. Returns the content
/// text for the conversation history.
async fn run_turn(
    client: &InvocationClient,
    conversation: &Conversation,
    cmd: &InvokeCommand,
) -> Result<String> {
    let mut request = conversation.request(!cmd.no_stream);
    request.enable_reasoning = cmd.enable_reasoning;

    if cmd.no_stream {
        let outcome = client.invoke(&request).await?;
        println!(
            "Assistant: {}",
            fold_reasoning(&outcome.text, outcome.reasoning.as_deref().unwrap_or(""))
        );
        return Ok(outcome.text);
    }

    let cancel = CancellationToken::new();
    let events = client.invoke_stream(&request, cancel.clone()).await?;
    futures::pin_mut!(events);

    println!("Assistant:");
    let mut out = std::io::stdout();
    let mut content = String::new();
    let mut reasoning_open = false;
    loop {
        let item = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                continue;
            }
            item = events.next() => item,
        };
        let Some(item) = item else { break };
        match item {
            Ok(StreamEvent { delta, kind, .. }) => {
                match kind {
                    DeltaKind::Reasoning => {
                        if !reasoning_open && !delta.is_empty() {
                            write!(out, "<Reasoning>")?;
                            reasoning_open = true;
                        }
                        write!(out, "{delta}")?;
                    }
                    DeltaKind::Content => {
                        if reasoning_open {
                            write!(out, "</Reasoning>")?;
                            reasoning_open = false;
                        }
                        write!(out, "{delta}")?;
                        content.push_str(&delta);
                    }
                }
                out.flush()?;
            }
            // One bad record does not end the stream.
            Err(err @ InvokeError::Decode { .. }) => warn!("{err}"),
            Err(err) => return Err(err.into()),
        }
    }
    if reasoning_open {
        write!(out, "</Reasoning>")?;
    }
    writeln!(out)?;
    Ok(content)
}
