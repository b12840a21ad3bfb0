//! Language dispatch and the `runJs` / `runPython` tool contract.

pub mod cli;
mod tools;
mod types;

pub use tools::*;
pub use types::*;

use javascript_runtime::{JavaScriptConfig, JavaScriptRuntime};
use playground_shared::{ExecutionRequest, ExecutionResult, Executor, Language};
use python_runtime::{PythonConfig, PythonRuntime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool input: {0}")]
    InvalidInput(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub javascript: JavaScriptConfig,
    pub python: PythonConfig,
}

/// Routes requests to the runtime for their language. Holds configuration
/// only; every call builds and tears down its own context or process.
pub struct CodeExecutor {
    javascript: JavaScriptRuntime,
    python: PythonRuntime,
}

impl CodeExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            javascript: JavaScriptRuntime::new(config.javascript),
            python: PythonRuntime::new(config.python),
        }
    }

    pub fn runtime(&self, language: Language) -> &dyn Executor {
        match language {
            Language::JavaScript => &self.javascript,
            Language::Python => &self.python,
        }
    }

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        self.runtime(request.language).execute(request).await
    }

    pub fn default_timeout_ms(&self, tool: Tool) -> u64 {
        match tool {
            Tool::RunJs => self.javascript.config().default_timeout_ms,
            Tool::RunPython => self.python.config().default_timeout_ms,
        }
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        Tool::ALL
            .iter()
            .map(|tool| tool.descriptor(self.default_timeout_ms(*tool)))
            .collect()
    }

    /// Executes one tool call and returns its wire record. Execution
    /// failures are part of the record; only an unknown tool or malformed
    /// input is an error.
    pub async fn call_tool(&self, tool_name: &str, input: Value) -> Result<Value, BridgeError> {
        let tool = Tool::from_name(tool_name)
            .ok_or_else(|| BridgeError::UnknownTool(tool_name.to_string()))?;
        let input: ToolInput = serde_json::from_value(input)?;
        debug!(tool = %tool, "Dispatching tool call");

        let result = self.execute(input.into_request(tool.language())).await;
        Ok(tool.render(result)?)
    }

    /// Handles one `serve` request, folding every error into an
    /// `{"error": ...}` record.
    pub async fn handle_invocation(&self, invocation: ToolInvocation) -> Value {
        let mut response = match self.call_tool(&invocation.tool, invocation.input).await {
            Ok(record) => record,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        if let (Some(id), Some(object)) = (invocation.id, response.as_object_mut()) {
            object.insert("id".to_string(), id);
        }
        response
    }
}

impl Default for CodeExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}
