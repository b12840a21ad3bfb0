//! `node -p` backend. The snippet runs with the full Node.js API, so this
//! path offers timeout and environment isolation only.

use playground_shared::{
    run_supervised, ExecutionRequest, ExecutionResult, FailureKind, ProcessOutput, ProcessSpec,
};
use std::time::{Duration, Instant};

use crate::JavaScriptConfig;

pub async fn execute(
    config: &JavaScriptConfig,
    request: &ExecutionRequest,
    timeout: Duration,
) -> ExecutionResult {
    let start = Instant::now();
    let spec = ProcessSpec::new(&config.node_binary, timeout)
        .arg("-p")
        .arg(&request.source_code)
        .envs(config.env.resolve_from_host());

    match run_supervised(&spec).await {
        Ok(output) => interpret(output, timeout),
        Err(e) => {
            let kind = e.failure_kind();
            let diagnostic = match kind {
                FailureKind::Launch => format!(
                    "Failed to execute Node.js: {}. Make sure Node.js is installed.",
                    e.reason()
                ),
                _ => e.to_string(),
            };
            ExecutionResult::failed(kind, diagnostic, start.elapsed()).with_exit_code(-1)
        }
    }
}

/// Maps a finished `node -p` process onto a result. The printed value is
/// the trimmed stdout, `"undefined"` when nothing was printed.
pub fn interpret(output: ProcessOutput, timeout: Duration) -> ExecutionResult {
    if output.timed_out {
        return ExecutionResult::timed_out(timeout, output.elapsed)
            .with_partial_output(output.stdout.trim())
            .with_exit_code(output.wire_exit_code());
    }

    if output.success() {
        let printed = output.stdout.trim();
        let printed = if printed.is_empty() { "undefined" } else { printed };
        return ExecutionResult::succeeded(printed, output.stderr_lines(), output.elapsed)
            .with_exit_code(0);
    }

    let stderr = output.stderr.trim();
    let diagnostic = if stderr.is_empty() {
        output.describe_exit()
    } else {
        stderr.to_string()
    };
    let kind = if diagnostic.contains("SyntaxError") {
        FailureKind::Syntax
    } else {
        FailureKind::Runtime
    };

    ExecutionResult::failed(kind, diagnostic, output.elapsed)
        .with_partial_output(output.stdout.trim())
        .with_exit_code(output.wire_exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(
        stdout: &str,
        stderr: &str,
        exit_code: Option<i32>,
        timed_out: bool,
    ) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
            signal: None,
            timed_out,
            elapsed: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_empty_stdout_prints_undefined() {
        let result = interpret(output("\n", "", Some(0), false), Duration::from_secs(5));
        assert!(result.success);
        assert_eq!(result.output, "undefined");
        assert_eq!(result.execution_time_ms, 12);
    }

    #[test]
    fn test_syntax_error_classification() {
        let stderr = "[eval]:1\n2 +\n   \n\nSyntaxError: Unexpected end of input\n";
        let result = interpret(output("", stderr, Some(1), false), Duration::from_secs(5));
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Syntax));
        assert!(result.diagnostic().ends_with("Unexpected end of input"));
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn test_timeout_wins_over_exit_status() {
        let result = interpret(output("partial", "", None, true), Duration::from_millis(300));
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(result.diagnostic(), "Execution timed out after 300ms");
        assert_eq!(result.output, "partial");
        assert_eq!(result.exit_code, Some(-1));
    }
}
