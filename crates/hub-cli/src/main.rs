use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = hub_config::HubConfigFile::load(&cli.config)
        .with_context(|| format!("loading hub config from {}", cli.config.display()))?;

    // `Hub::initialize` is async, but the ambient registry's constructor is
    // sync (spec.md §9 only requires idempotent *retrieval* across
    // reloads); connect first, then register the already-built instance.
    let connected = tool_hub::Hub::initialize(config.servers.clone()).await;
    let hub = hub_core::registry::get_or_init(move || connected);

    match cli.command {
        Commands::ListConnections => list_connections(&hub).await,
        Commands::ListTools { server } => list_tools(&hub, &server),
        Commands::CallTool {
            server,
            tool,
            arguments,
        } => call_tool(&hub, &config, &server, &tool, &arguments).await,
        Commands::RunComposed { definition, params } => run_composed(&hub, &definition, &params).await,
    }
}

async fn list_connections(hub: &tool_hub::Hub) -> Result<()> {
    for record in hub.list_connections().await {
        println!(
            "{}\t{:?}\t{}",
            record.name,
            record.status,
            record.last_error.unwrap_or_default()
        );
    }
    Ok(())
}

fn list_tools(hub: &tool_hub::Hub, server: &str) -> Result<()> {
    for tool in hub.list_tools(server) {
        println!("{}\t{}", tool.name, tool.description.unwrap_or_default());
    }
    Ok(())
}

async fn call_tool(
    hub: &Arc<tool_hub::Hub>,
    config: &hub_config::HubConfigFile,
    server: &str,
    tool: &str,
    arguments: &str,
) -> Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(arguments).context("arguments must be a JSON object")?;

    let server_contexts = config
        .servers
        .iter()
        .map(|s| {
            let ctx = hub_core::ServerContext {
                config: config.server_context(&s.name),
                ..Default::default()
            };
            (s.name.clone(), ctx)
        })
        .collect();

    let executor = hub_executor::ToolExecutor::with_server_contexts(
        hub.clone(),
        config.executor.clone(),
        Arc::new(hub_executor::AlwaysConfirm),
        None,
        server_contexts,
    );
    let result = executor.execute_tool(server, tool, arguments).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_composed(hub: &Arc<tool_hub::Hub>, definition: &std::path::Path, params: &str) -> Result<()> {
    let definition = std::fs::read_to_string(definition)
        .with_context(|| format!("reading composed tool definition {}", definition.display()))?;
    let tool: hub_composer::ComposedTool =
        serde_json::from_str(&definition).context("parsing composed tool definition")?;
    let params: serde_json::Value = serde_json::from_str(params).context("params must be a JSON object")?;

    let composer = hub_composer::Composer::new(hub.clone());
    composer.register_tool(tool.clone())?;
    let result = composer.execute_tool(&tool.name, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
