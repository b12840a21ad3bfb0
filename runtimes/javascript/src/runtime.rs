use async_trait::async_trait;
use playground_shared::{
    record_execution, EnvPolicy, ExecutionRequest, ExecutionResult, Executor,
    FailureKind, Language, RuntimeError, DEFAULT_MAX_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::context::{self, EvalLimits, EvalOutcome, Evaluation};
use crate::node;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JavaScriptBackend {
    /// In-process QuickJS context with an allowlisted global scope.
    #[default]
    Embedded,
    /// `node -p` subprocess. Has full host access; opt-in only.
    Node,
}

impl FromStr for JavaScriptBackend {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "embedded" | "quickjs" => Ok(JavaScriptBackend::Embedded),
            "node" | "nodejs" => Ok(JavaScriptBackend::Node),
            other => Err(RuntimeError::InvalidConfig {
                key: "javascript backend".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaScriptConfig {
    pub backend: JavaScriptBackend,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub memory_limit_bytes: usize,
    pub max_stack_size_bytes: usize,
    pub node_binary: String,
    pub env: EnvPolicy,
}

impl Default for JavaScriptConfig {
    fn default() -> Self {
        Self {
            backend: JavaScriptBackend::Embedded,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
            memory_limit_bytes: 64 * 1024 * 1024, // 64MB per context
            max_stack_size_bytes: 1024 * 1024,
            node_binary: "node".to_string(),
            env: EnvPolicy::default(),
        }
    }
}

impl JavaScriptConfig {
    fn limits(&self) -> EvalLimits {
        EvalLimits {
            memory_limit_bytes: self.memory_limit_bytes,
            max_stack_size_bytes: self.max_stack_size_bytes,
        }
    }
}

pub struct JavaScriptRuntime {
    config: JavaScriptConfig,
}

impl JavaScriptRuntime {
    pub fn new(config: JavaScriptConfig) -> Self {
        info!("Initializing JavaScript runtime ({:?} backend)", config.backend);
        Self { config }
    }

    pub fn new_default() -> Self {
        Self::new(JavaScriptConfig::default())
    }

    pub fn config(&self) -> &JavaScriptConfig {
        &self.config
    }

    /// Races the evaluation worker against the timeout. When the timer wins
    /// the engine is interrupted and the worker still awaited, so the
    /// context is gone before a result exists.
    async fn execute_embedded(
        &self,
        request: &ExecutionRequest,
        timeout: Duration,
    ) -> ExecutionResult {
        let start = Instant::now();
        let cancel = Arc::new(AtomicBool::new(false));

        let source = request.source_code.clone();
        let limits = self.config.limits();
        let worker_cancel = cancel.clone();
        let mut worker =
            tokio::task::spawn_blocking(move || context::evaluate(&source, &limits, worker_cancel));

        let joined = match tokio::time::timeout(timeout, &mut worker).await {
            Ok(joined) => joined,
            Err(_) => {
                debug!(id = %request.id, "timeout fired, interrupting context");
                cancel.store(true, Ordering::Relaxed);
                worker.await
            }
        };
        let elapsed = start.elapsed();

        match joined {
            Ok(Ok(evaluation)) => into_result(evaluation, timeout, elapsed),
            Ok(Err(setup)) => {
                ExecutionResult::failed(FailureKind::Launch, setup.to_string(), elapsed)
            }
            Err(join) => ExecutionResult::failed(
                FailureKind::Runtime,
                RuntimeError::Worker(join.to_string()).to_string(),
                elapsed,
            ),
        }
    }
}

fn into_result(evaluation: Evaluation, timeout: Duration, elapsed: Duration) -> ExecutionResult {
    let Evaluation { outcome, logs } = evaluation;
    match outcome {
        EvalOutcome::Completed(output) => ExecutionResult::succeeded(output, logs, elapsed),
        EvalOutcome::Thrown { kind, message } => {
            ExecutionResult::failed(kind, message, elapsed).with_logs(logs)
        }
        EvalOutcome::Interrupted => ExecutionResult::timed_out(timeout, elapsed).with_logs(logs),
    }
}

#[async_trait]
impl Executor for JavaScriptRuntime {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let timeout =
            request.effective_timeout(self.config.default_timeout_ms, self.config.max_timeout_ms);
        debug!(
            id = %request.id,
            backend = ?self.config.backend,
            bytes = request.source_code.len(),
            "Executing JavaScript with timeout {:?}",
            timeout
        );

        let result = match self.config.backend {
            JavaScriptBackend::Embedded => self.execute_embedded(&request, timeout).await,
            JavaScriptBackend::Node => node::execute(&self.config, &request, timeout).await,
        };

        if result.success {
            info!(
                id = %request.id,
                "JavaScript executed successfully in {}ms",
                result.execution_time_ms
            );
        } else {
            warn!(
                id = %request.id,
                outcome = result.outcome_label(),
                "JavaScript execution failed: {}",
                result.diagnostic()
            );
        }

        record_execution(Language::JavaScript, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!("embedded".parse::<JavaScriptBackend>().unwrap(), JavaScriptBackend::Embedded);
        assert_eq!("QuickJS".parse::<JavaScriptBackend>().unwrap(), JavaScriptBackend::Embedded);
        assert_eq!("node".parse::<JavaScriptBackend>().unwrap(), JavaScriptBackend::Node);

        let err = "v8".parse::<JavaScriptBackend>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration value for javascript backend: v8");
    }

    #[test]
    fn test_default_config() {
        let config = JavaScriptConfig::default();
        assert_eq!(config.backend, JavaScriptBackend::Embedded);
        assert_eq!(config.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.max_timeout_ms, DEFAULT_MAX_TIMEOUT_MS);
        assert_eq!(config.memory_limit_bytes, 64 * 1024 * 1024);
        assert!(config.env.fixed.is_empty());
    }
}
