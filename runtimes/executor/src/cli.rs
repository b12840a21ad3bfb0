//! Command line of `playground-tool`. Every runtime setting can also be
//! given through its `PLAYGROUND_*` environment variable.

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use javascript_runtime::JavaScriptBackend;
use playground_shared::Language;

use crate::ExecutorConfig;

#[derive(Parser, Debug)]
#[command(name = "playground-tool", version)]
#[command(about = "Sandboxed JavaScript and Python execution for agent tools")]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer JSON-line tool calls from stdin.
    Serve,
    /// Run a single snippet and print its record.
    Run {
        #[arg(short, long, default_value = "js")]
        language: Language,
        #[arg(short, long)]
        timeout_ms: Option<u64>,
        /// Source code; read from stdin when omitted.
        code: Option<String>,
    },
    /// Print the tool descriptors.
    Tools,
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// JavaScript backend: embedded or node
    #[arg(long, global = true, env = "PLAYGROUND_JS_BACKEND")]
    pub js_backend: Option<JavaScriptBackend>,

    /// Default runJs timeout in milliseconds
    #[arg(long, global = true, env = "PLAYGROUND_JS_TIMEOUT_MS")]
    pub js_timeout_ms: Option<u64>,

    /// Memory limit of each embedded JavaScript context
    #[arg(long, global = true, env = "PLAYGROUND_JS_MEMORY_LIMIT_BYTES")]
    pub js_memory_limit_bytes: Option<usize>,

    /// Node.js binary for the node backend
    #[arg(long, global = true, env = "PLAYGROUND_NODE_BIN")]
    pub node_bin: Option<String>,

    /// Python interpreter to launch
    #[arg(long, global = true, env = "PLAYGROUND_PYTHON_BIN")]
    pub python_bin: Option<String>,

    /// Default runPython timeout in milliseconds
    #[arg(long, global = true, env = "PLAYGROUND_PYTHON_TIMEOUT_MS")]
    pub python_timeout_ms: Option<u64>,

    /// Preload numpy and matplotlib before user code
    #[arg(
        long,
        global = true,
        env = "PLAYGROUND_PYTHON_PRELOAD",
        value_parser = BoolishValueParser::new()
    )]
    pub python_preload: Option<bool>,

    /// Upper bound for caller-supplied timeouts
    #[arg(long, global = true, env = "PLAYGROUND_MAX_TIMEOUT_MS")]
    pub max_timeout_ms: Option<u64>,

    /// Extra host variables passed to interpreter subprocesses
    #[arg(long, global = true, env = "PLAYGROUND_ENV_PASSTHROUGH", value_delimiter = ',')]
    pub env_passthrough: Vec<String>,
}

impl ConfigArgs {
    pub fn into_config(self) -> ExecutorConfig {
        let mut config = ExecutorConfig::default();
        self.apply(&mut config);
        config
    }

    pub fn apply(self, config: &mut ExecutorConfig) {
        let js = &mut config.javascript;
        let py = &mut config.python;

        if let Some(backend) = self.js_backend {
            js.backend = backend;
        }
        if let Some(ms) = self.js_timeout_ms {
            js.default_timeout_ms = ms;
        }
        if let Some(bytes) = self.js_memory_limit_bytes {
            js.memory_limit_bytes = bytes;
        }
        if let Some(node) = self.node_bin {
            js.node_binary = node;
        }
        if let Some(python) = self.python_bin {
            py.interpreter = python;
        }
        if let Some(ms) = self.python_timeout_ms {
            py.default_timeout_ms = ms;
        }
        if let Some(preload) = self.python_preload {
            py.preload_scientific = preload;
        }
        if let Some(ms) = self.max_timeout_ms {
            js.max_timeout_ms = ms;
            py.max_timeout_ms = ms;
        }

        let extra: Vec<String> = self
            .env_passthrough
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if !extra.is_empty() {
            js.env = std::mem::take(&mut js.env).allow(extra.clone());
            py.env = std::mem::take(&mut py.env).allow(extra);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "playground-tool",
            "--js-backend",
            "node",
            "--python-timeout-ms",
            "1000",
            "--python-preload",
            "false",
            "--env-passthrough",
            "OMP_NUM_THREADS, HF_HOME",
            "run",
            "-l",
            "python",
            "--max-timeout-ms",
            "60000",
            "print(1)",
        ])
        .unwrap();

        match &cli.command {
            Command::Run { language, code, .. } => {
                assert_eq!(*language, Language::Python);
                assert_eq!(code.as_deref(), Some("print(1)"));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let config = cli.config.into_config();
        assert_eq!(config.javascript.backend, JavaScriptBackend::Node);
        assert_eq!(config.python.default_timeout_ms, 1000);
        assert!(!config.python.preload_scientific);
        assert_eq!(config.javascript.max_timeout_ms, 60_000);
        assert_eq!(config.python.max_timeout_ms, 60_000);
        for policy in [&config.javascript.env, &config.python.env] {
            assert!(policy.passthrough.contains(&"OMP_NUM_THREADS".to_string()));
            assert!(policy.passthrough.contains(&"HF_HOME".to_string()));
        }
        assert_eq!(config.python.env.fixed.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_environment_supplies_settings() {
        std::env::set_var("PLAYGROUND_NODE_BIN", "/opt/node/bin/node");
        let cli = Cli::try_parse_from(["playground-tool", "tools"]).unwrap();
        assert!(matches!(cli.command, Command::Tools));
        assert_eq!(cli.config.into_config().javascript.node_binary, "/opt/node/bin/node");
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["playground-tool", "--js-backend", "v8", "tools"]).is_err());
    }

    #[test]
    fn test_unset_flags_keep_defaults() {
        let config = ConfigArgs::default().into_config();
        assert_eq!(config.javascript.default_timeout_ms, 5000);
        assert_eq!(config.python.default_timeout_ms, 30_000);
        assert!(config.python.preload_scientific);
    }
}
