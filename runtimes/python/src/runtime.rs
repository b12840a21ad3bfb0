use async_trait::async_trait;
use playground_shared::{
    record_execution, run_supervised, EnvPolicy, ExecutionRequest, ExecutionResult, Executor,
    FailureKind, Language, ProcessOutput, ProcessSpec, DEFAULT_MAX_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::program::{ProgramBuilder, WrappedProgram};
use crate::traceback;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    pub interpreter: String,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    /// Try to preload numpy and matplotlib (Agg backend) before user code.
    pub preload_scientific: bool,
    pub env: EnvPolicy,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
            preload_scientific: true,
            env: EnvPolicy::python(),
        }
    }
}

pub struct PythonRuntime {
    config: PythonConfig,
    builder: ProgramBuilder,
}

impl PythonRuntime {
    pub fn new(config: PythonConfig) -> Self {
        info!("Initializing Python runtime with interpreter {}", config.interpreter);
        let builder = ProgramBuilder::standard(config.preload_scientific);
        Self { config, builder }
    }

    pub fn new_default() -> Self {
        Self::new(PythonConfig::default())
    }

    pub fn config(&self) -> &PythonConfig {
        &self.config
    }
}

#[async_trait]
impl Executor for PythonRuntime {
    fn language(&self) -> Language {
        Language::Python
    }

    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();
        let timeout =
            request.effective_timeout(self.config.default_timeout_ms, self.config.max_timeout_ms);
        debug!(
            id = %request.id,
            bytes = request.source_code.len(),
            "Executing Python with timeout {:?}",
            timeout
        );

        let program = self.builder.build(&request.source_code);
        let spec = ProcessSpec::new(&self.config.interpreter, timeout)
            .arg("-c")
            .arg(program.text())
            .envs(self.config.env.resolve_from_host());

        let result = match run_supervised(&spec).await {
            Ok(output) => interpret(output, &program, timeout),
            Err(e) => {
                let kind = e.failure_kind();
                let diagnostic = match kind {
                    FailureKind::Launch => format!(
                        "Failed to execute Python: {}. Make sure Python 3 is installed.",
                        e.reason()
                    ),
                    _ => e.to_string(),
                };
                ExecutionResult::failed(kind, diagnostic, start.elapsed()).with_exit_code(-1)
            }
        };

        if result.success {
            info!(
                id = %request.id,
                "Python executed successfully in {}ms",
                result.execution_time_ms
            );
        } else {
            warn!(
                id = %request.id,
                outcome = result.outcome_label(),
                exit_code = ?result.exit_code,
                "Python execution failed"
            );
        }

        record_execution(Language::Python, &result);
        result
    }
}

/// Maps a finished interpreter process onto a result. Stdout is the primary
/// output in every case; stderr is a diagnostic only when the run failed and
/// is otherwise kept as log lines.
pub fn interpret(
    output: ProcessOutput,
    program: &WrappedProgram,
    timeout: Duration,
) -> ExecutionResult {
    let stdout = output.stdout.trim();

    if output.timed_out {
        return ExecutionResult::timed_out(timeout, output.elapsed)
            .with_partial_output(stdout)
            .with_exit_code(output.wire_exit_code());
    }

    if output.success() {
        return ExecutionResult::succeeded(stdout, output.stderr_lines(), output.elapsed)
            .with_exit_code(0);
    }

    let stderr = traceback::rewrite_line_numbers(output.stderr.trim(), program.user_line_offset());
    let diagnostic = if stderr.is_empty() {
        output.describe_exit()
    } else {
        stderr
    };

    ExecutionResult::failed(traceback::classify(&diagnostic), diagnostic, output.elapsed)
        .with_partial_output(stdout)
        .with_exit_code(output.wire_exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn output(stdout: &str, stderr: &str, exit_code: Option<i32>) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
            signal: None,
            timed_out: false,
            elapsed: Duration::from_millis(40),
        }
    }

    #[test]
    fn test_interpret_success_keeps_warnings_as_logs() {
        let program = ProgramBuilder::standard(false).build("print(1)");
        let result = interpret(
            output("1\n", "<string>:5: DeprecationWarning: old\n", Some(0)),
            &program,
            Duration::from_secs(30),
        );
        assert!(result.success);
        assert_eq!(result.output, "1");
        assert_eq!(result.error, None);
        assert_eq!(result.logs, vec!["<string>:5: DeprecationWarning: old"]);
        assert_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn test_interpret_failure_rewrites_traceback() {
        let program = ProgramBuilder::standard(false).build("print('a')\n1/0");
        let line = program.user_line_offset() + 2;
        let stderr = format!(
            "Traceback (most recent call last):\n  \
             File \"<string>\", line {line}, in <module>\n\
             ZeroDivisionError: division by zero\n"
        );
        let result = interpret(output("a\n", &stderr, Some(1)), &program, Duration::from_secs(30));

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Runtime));
        assert!(result.diagnostic().contains("line 2, in <module>"));
        assert_eq!(result.output, "a");
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn test_interpret_silent_crash() {
        let program = ProgramBuilder::new().build("");
        let crashed = ProcessOutput {
            signal: Some(11),
            ..output("", "", None)
        };
        let result = interpret(crashed, &program, Duration::from_secs(30));
        assert_eq!(result.diagnostic(), "Process terminated by signal 11");
        assert_eq!(result.exit_code, Some(-1));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let runtime = PythonRuntime::new(PythonConfig {
            interpreter: "/nonexistent/python3".to_string(),
            ..PythonConfig::default()
        });
        let result = runtime
            .execute(ExecutionRequest::new(Language::Python, "print(1)"))
            .await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Launch));
        assert!(result.diagnostic().starts_with("Failed to execute Python:"));
        assert!(result.diagnostic().ends_with("Make sure Python 3 is installed."));
    }

    #[tokio::test]
    async fn test_print_and_math() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let result = PythonRuntime::new_default()
            .execute(ExecutionRequest::new(
                Language::Python,
                "print(math.factorial(10))\nprint(json.dumps({'a': 1}))",
            ))
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, "3628800\n{\"a\": 1}");
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_exception_reports_user_line() {
        if !python_available() {
            return;
        }
        let result = PythonRuntime::new_default()
            .execute(ExecutionRequest::new(Language::Python, "x = 1\nraise ValueError('boom')"))
            .await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Runtime));
        assert!(result.diagnostic().contains("ValueError: boom"));
        assert!(result.diagnostic().contains("line 2"));
        assert_eq!(result.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_syntax_error() {
        if !python_available() {
            return;
        }
        let result = PythonRuntime::new_default()
            .execute(ExecutionRequest::new(Language::Python, "def broken(:\n    pass"))
            .await;
        assert_eq!(result.failure, Some(FailureKind::Syntax));
    }

    #[tokio::test]
    async fn test_timeout_terminates_interpreter() {
        if !python_available() {
            return;
        }
        let start = Instant::now();
        let result = PythonRuntime::new(PythonConfig {
            preload_scientific: false,
            ..PythonConfig::default()
        })
        .execute(
            ExecutionRequest::new(Language::Python, "print('tick')\nwhile True:\n    pass")
                .with_timeout_ms(300),
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(result.diagnostic(), "Execution timed out after 300ms");
        assert_eq!(result.output, "tick");
        assert!(result.execution_time_ms >= 300);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_environment_is_filtered() {
        if !python_available() {
            return;
        }
        std::env::set_var("PLAYGROUND_PYTHON_TEST_TOKEN", "secret");
        let result = PythonRuntime::new_default()
            .execute(ExecutionRequest::new(
                Language::Python,
                "import os\n\
                 print(os.environ.get('PLAYGROUND_PYTHON_TEST_TOKEN', 'absent'), \
                 os.environ.get('PYTHONUNBUFFERED'))",
            ))
            .await;
        assert_eq!(result.output, "absent 1");
    }

    #[tokio::test]
    async fn test_nul_byte_is_not_a_launch_failure() {
        let result = PythonRuntime::new_default()
            .execute(ExecutionRequest::new(Language::Python, "print('a\0b')"))
            .await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Syntax));
        assert!(result.diagnostic().contains("nul byte"));
        assert!(!result.diagnostic().contains("Make sure Python 3 is installed"));
        assert_eq!(result.exit_code, Some(-1));
    }

    #[tokio::test]
    async fn test_background_child_does_not_swallow_output() {
        if !python_available() {
            return;
        }
        let start = Instant::now();
        let result = PythonRuntime::new(PythonConfig {
            preload_scientific: false,
            ..PythonConfig::default()
        })
        .execute(ExecutionRequest::new(
            Language::Python,
            "import subprocess\nprint(42)\nsubprocess.Popen(['sleep', '4'])",
        ))
        .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, "42");
        assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
    }
}
