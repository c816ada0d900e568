use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use gateway_agent_sdk::agent::{AgentLoop, ToolTraceEntry, TurnOutcome, TurnRequest};
use gateway_agent_sdk::config::AppConfig;
use gateway_agent_sdk::gateway::GatewayToolProvider;
use gateway_agent_sdk::guard::PromptGuard;
use gateway_agent_sdk::helpers::TraceRecorder;
use gateway_agent_sdk::logging;
use gateway_agent_sdk::tools::ToolRegistry;

/// What the caller gets back; the conversation stays internal
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnReport {
    final_text: String,
    truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncation_reason: Option<String>,
    iterations: usize,
    tool_trace: Vec<ToolTraceEntry>,
}

impl From<TurnOutcome> for TurnReport {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            final_text: outcome.final_text,
            truncated: outcome.truncated,
            truncation_reason: outcome.truncation_reason,
            iterations: outcome.iterations,
            tool_trace: outcome.tool_trace,
        }
    }
}

/// Payload from the first argument, or stdin when there is none
fn read_payload() -> Result<Value> {
    let raw = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read payload from stdin")?;
            buf
        }
    };

    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&raw).context("payload is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init_logging()?;
    tracing::info!("=== Gateway Agent Starting ===");

    let request = TurnRequest::from_payload(&read_payload()?)?;
    let config = AppConfig::from_env()?;

    let mut registry = ToolRegistry::new();
    if let Some(gateway) = &config.gateway {
        let provider = GatewayToolProvider::from_config(gateway)?;
        registry.add_provider(&provider).await?;
    }
    tracing::info!("Registered {} tools", registry.len());

    let mut agent = AgentLoop::new(Arc::new(config.model_client()), Arc::new(registry))
        .with_config(config.agent_config())
        .with_guard(PromptGuard::new()?);

    if let Some(path) = &config.trace_file {
        agent = agent.with_observer(Arc::new(TraceRecorder::create(path)?));
    }

    let outcome = agent.run(request).await?;
    tracing::info!(
        "Turn finished after {} tool rounds (truncated: {})",
        outcome.iterations,
        outcome.truncated
    );

    println!("{}", serde_json::to_string(&TurnReport::from(outcome))?);

    tracing::info!("=== Gateway Agent Shutting Down ===");
    Ok(())
}
