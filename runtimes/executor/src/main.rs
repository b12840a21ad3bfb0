use anyhow::{Context, Result};
use clap::Parser;
use playground_executor::cli::{Cli, Command};
use playground_executor::{CodeExecutor, Tool, ToolInput, ToolInvocation};
use playground_shared::Language;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let executor = Arc::new(CodeExecutor::new(cli.config.into_config()));

    match cli.command {
        Command::Serve => serve(executor).await,
        Command::Run {
            language,
            timeout_ms,
            code,
        } => run(&executor, language, timeout_ms, code).await,
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&executor.descriptors())?);
            Ok(())
        }
    }
}

async fn serve(executor: Arc<CodeExecutor>) -> Result<()> {
    info!("Serving tool calls on stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolInvocation>(&line) {
            Ok(invocation) => executor.handle_invocation(invocation).await,
            Err(e) => {
                warn!("Rejected malformed request: {}", e);
                json!({ "error": format!("Invalid request: {e}") })
            }
        };

        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn run(
    executor: &CodeExecutor,
    language: Language,
    timeout_ms: Option<u64>,
    code: Option<String>,
) -> Result<()> {
    let code = match code {
        Some(code) => code,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read code from stdin")?;
            buf
        }
    };

    let tool = match language {
        Language::JavaScript => Tool::RunJs,
        Language::Python => Tool::RunPython,
    };
    let input = ToolInput {
        code,
        timeout_ms: timeout_ms.map(|ms| ms as f64),
    };

    let result = executor.execute(input.into_request(language)).await;
    let success = result.success;
    println!("{}", serde_json::to_string_pretty(&tool.render(result)?)?);

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
