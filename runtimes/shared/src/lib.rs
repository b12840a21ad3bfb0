use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

pub mod errors;
pub mod process;
pub mod security;

pub use errors::*;
pub use process::*;
pub use security::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Python,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "js" | "javascript" | "node" => Ok(Language::JavaScript),
            "py" | "python" | "python3" => Ok(Language::Python),
            other => Err(RuntimeError::InvalidLanguage(other.to_string())),
        }
    }
}

/// Upper bound applied to caller-supplied timeouts unless configured otherwise.
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 300_000;

/// One inbound request to run a snippet. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub id: Uuid,
    pub source_code: String,
    pub language: Language,
    /// `None` means "use the runtime's default".
    pub timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(language: Language, source_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_code: source_code.into(),
            language,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Resolves the effective timeout: absent or zero falls back to
    /// `default_ms`, anything above `max_ms` is clamped.
    pub fn effective_timeout(&self, default_ms: u64, max_ms: u64) -> Duration {
        let requested = match self.timeout_ms {
            Some(ms) if ms > 0 => ms,
            _ => default_ms,
        };
        Duration::from_millis(requested.min(max_ms.max(1)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Syntax,
    Runtime,
    Timeout,
    Launch,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Syntax => "syntax",
            FailureKind::Runtime => "runtime",
            FailureKind::Timeout => "timeout",
            FailureKind::Launch => "launch",
        }
    }
}

/// Outcome of a single execution.
///
/// Built only through [`ExecutionResult::succeeded`] and
/// [`ExecutionResult::failed`]: a successful result never carries a
/// diagnostic and a failed one always does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub logs: Vec<String>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>, logs: Vec<String>, elapsed: Duration) -> Self {
        Self {
            success: true,
            output: output.into(),
            logs,
            error: None,
            failure: None,
            exit_code: None,
            execution_time_ms: elapsed_ms(elapsed),
        }
    }

    pub fn failed(kind: FailureKind, diagnostic: impl Into<String>, elapsed: Duration) -> Self {
        let mut diagnostic = diagnostic.into();
        if diagnostic.trim().is_empty() {
            diagnostic = format!("{} error", kind.as_str());
        }

        Self {
            success: false,
            output: String::new(),
            logs: Vec::new(),
            error: Some(diagnostic),
            failure: Some(kind),
            exit_code: None,
            execution_time_ms: elapsed_ms(elapsed),
        }
    }

    pub fn timed_out(timeout: Duration, elapsed: Duration) -> Self {
        Self::failed(FailureKind::Timeout, timeout_message(timeout), elapsed)
    }

    /// Keeps whatever the code printed before it failed.
    pub fn with_partial_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn diagnostic(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    pub fn outcome_label(&self) -> &'static str {
        match self.failure {
            None => "success",
            Some(kind) => kind.as_str(),
        }
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!("Execution timed out after {}ms", timeout.as_millis())
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// A code runner for one language class. Implementations never fail: every
/// error is reported through the returned [`ExecutionResult`].
#[async_trait]
pub trait Executor: Send + Sync {
    fn language(&self) -> Language;
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult;
}

pub fn record_execution(language: Language, result: &ExecutionResult) {
    metrics::counter!(
        "playground_executions_total",
        "language" => language.as_str(),
        "outcome" => result.outcome_label()
    )
    .increment(1);
    metrics::histogram!("playground_execution_duration_ms", "language" => language.as_str())
        .record(result.execution_time_ms as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_never_carries_diagnostic() {
        let result = ExecutionResult::succeeded("4", vec![], Duration::from_millis(3));
        assert!(result.success);
        assert_eq!(result.error, None);
        assert_eq!(result.failure, None);
        assert_eq!(result.execution_time_ms, 3);
    }

    #[test]
    fn test_failure_always_carries_diagnostic() {
        let result = ExecutionResult::failed(FailureKind::Runtime, "  ", Duration::ZERO);
        assert!(!result.success);
        assert_eq!(result.diagnostic(), "runtime error");
        assert_eq!(result.outcome_label(), "runtime");
    }

    #[test]
    fn test_timeout_message() {
        let result =
            ExecutionResult::timed_out(Duration::from_millis(200), Duration::from_millis(204));
        assert_eq!(result.diagnostic(), "Execution timed out after 200ms");
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(result.execution_time_ms, 204);
    }

    #[test]
    fn test_effective_timeout() {
        let request = ExecutionRequest::new(Language::JavaScript, "1");
        assert_eq!(request.effective_timeout(5000, 60_000), Duration::from_millis(5000));

        let request = request.with_timeout_ms(0);
        assert_eq!(request.effective_timeout(5000, 60_000), Duration::from_millis(5000));

        let request = request.with_timeout_ms(120_000);
        assert_eq!(request.effective_timeout(5000, 60_000), Duration::from_millis(60_000));

        let request = request.with_timeout_ms(200);
        assert_eq!(request.effective_timeout(5000, 60_000), Duration::from_millis(200));
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("js".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("Python".parse::<Language>().unwrap(), Language::Python);
        assert!("ruby".parse::<Language>().is_err());
    }
}
