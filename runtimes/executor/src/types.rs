use playground_shared::{ExecutionRequest, ExecutionResult, Language};
use serde::{Deserialize, Serialize};

/// Input of both tools: `{ code, timeoutMs? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInput {
    pub code: String,
    /// Accepts the older `timeout` key as well. Numbers may arrive as floats.
    #[serde(default, alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<f64>,
}

impl ToolInput {
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
            .filter(|ms| ms.is_finite() && *ms >= 1.0)
            .map(|ms| ms.ceil() as u64)
    }

    pub fn into_request(self, language: Language) -> ExecutionRequest {
        let timeout_ms = self.timeout_ms();
        let request = ExecutionRequest::new(language, self.code);
        match timeout_ms {
            Some(ms) => request.with_timeout_ms(ms),
            None => request,
        }
    }
}

/// One line of the `serve` protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Opaque correlation value echoed back in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub tool: String,
    pub input: serde_json::Value,
}

/// `runJs` output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunJsOutput {
    pub success: bool,
    pub result: String,
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl From<ExecutionResult> for RunJsOutput {
    fn from(result: ExecutionResult) -> Self {
        Self {
            success: result.success,
            result: result.output,
            logs: result.logs,
            error: result.error,
            execution_time_ms: result.execution_time_ms,
        }
    }
}

/// `runPython` output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPythonOutput {
    pub success: bool,
    pub stdout: String,
    /// The diagnostic for failed runs, warnings for successful ones.
    pub stderr: String,
    pub exit_code: i32,
    pub execution_time_ms: u64,
}

impl From<ExecutionResult> for RunPythonOutput {
    fn from(result: ExecutionResult) -> Self {
        let stderr = match result.error {
            Some(diagnostic) => diagnostic,
            None => result.logs.join("\n"),
        };

        Self {
            success: result.success,
            stdout: result.output,
            stderr,
            exit_code: result.exit_code.unwrap_or(-1),
            execution_time_ms: result.execution_time_ms,
        }
    }
}
