mod config;
mod support;

use std::path::Path;

use serde_json::Value;
use taskmcp::tool_api::{BatchOperation, ToolClient, ToolClientBuilder, ToolError};

use crate::config::{parse_cli_command, Action, CliConfig};
use crate::support::telemetry::init_telemetry;

#[tokio::main]
async fn main() {
    let config = match parse_cli_command() {
        Ok(config) => config,
        Err(config::ConfigError::Clap(err)) => err.exit(),
        Err(err) => {
            eprintln!("[taskmcp] Error: {err}");
            std::process::exit(1);
        }
    };

    init_telemetry(config.log_level);

    if let Err(err) = run(config).await {
        eprintln!("[taskmcp] Error: {err}");
        std::process::exit(1);
    }
}

async fn run(config: CliConfig) -> Result<(), String> {
    let client = ToolClientBuilder::from_config(config.client)
        .build()
        .map_err(|err| err.to_string())?;

    let outcome = dispatch(&client, config.transport, config.action).await;
    client.close().await;

    let value = outcome.map_err(render_tool_error)?;
    let rendered = serde_json::to_string_pretty(&value)
        .map_err(|err| format!("Failed to serialize output: {err}"))?;
    println!("{rendered}");
    Ok(())
}

async fn dispatch(
    client: &ToolClient,
    transport: taskmcp::tool_api::Transport,
    action: Action,
) -> Result<Value, ToolError> {
    match action {
        Action::Health => client.health_check().await,
        Action::Metrics => client.get_metrics().await,
        Action::Call { tool, input } => client.execute(transport, &tool, input).await,
        Action::CreateChange {
            title,
            slug,
            options,
        } => client.create_change(&title, &slug, options).await,
        Action::ArchiveChange { slug } => client.archive_change(&slug).await,
        Action::ActiveChanges(query) => client.get_active_changes(query).await,
        Action::Batch { file } => {
            let operations = read_batch_file(&file)?;
            let outcomes = client.execute_batch(operations).await;
            let failed = outcomes.iter().filter(|outcome| !outcome.is_success()).count();
            if failed > 0 {
                tracing::warn!("{failed} of {} batch operation(s) failed", outcomes.len());
            }
            serde_json::to_value(outcomes)
                .map_err(|err| ToolError::config(format!("Failed to serialize batch: {err}")))
        }
    }
}

fn read_batch_file(path: &Path) -> Result<Vec<BatchOperation>, ToolError> {
    let body = std::fs::read_to_string(path).map_err(|err| {
        ToolError::config(format!("Failed to read {}: {err}", path.display()))
    })?;
    serde_json::from_str::<Vec<BatchOperation>>(&body).map_err(|err| {
        ToolError::config(format!(
            "{} must hold a JSON array of {{tool, input}} objects: {err}",
            path.display()
        ))
    })
}

fn render_tool_error(err: ToolError) -> String {
    match err.details() {
        Some(details) => format!("{err}\nDetails: {details}"),
        None => err.to_string(),
    }
}
