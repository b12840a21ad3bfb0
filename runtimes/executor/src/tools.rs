use playground_shared::{ExecutionResult, Language};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::types::{RunJsOutput, RunPythonOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    RunJs,
    RunPython,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::RunJs, Tool::RunPython];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::RunJs => "runJs",
            Tool::RunPython => "runPython",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn language(&self) -> Language {
        match self {
            Tool::RunJs => Language::JavaScript,
            Tool::RunPython => Language::Python,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tool::RunJs => "Run JavaScript Code",
            Tool::RunPython => "Run Python Code",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::RunJs => {
                "Evaluate JavaScript in an isolated engine with no file, network or process \
                 access. The value of the last expression is returned as the result; objects \
                 are pretty-printed as JSON. console.log/info/warn/error output is captured in \
                 order. Useful for calculations, data transformation and quick algorithm checks."
            }
            Tool::RunPython => {
                "Run a Python 3 script in a fresh interpreter. Anything printed to stdout is \
                 returned; tracebacks and warnings are returned on stderr. math, json and sys \
                 are pre-imported, and numpy (as np) and matplotlib (as plt, non-interactive) \
                 when installed."
            }
        }
    }

    pub fn descriptor(&self, default_timeout_ms: u64) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
            input_schema: input_schema(self.language(), default_timeout_ms),
        }
    }

    /// Renders a result as this tool's wire record.
    pub fn render(&self, result: ExecutionResult) -> Result<Value, serde_json::Error> {
        match self {
            Tool::RunJs => serde_json::to_value(RunJsOutput::from(result)),
            Tool::RunPython => serde_json::to_value(RunPythonOutput::from(result)),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
}

fn input_schema(language: Language, default_timeout_ms: u64) -> Value {
    let timeout = format!("Execution timeout in milliseconds (default {default_timeout_ms}).");
    let code = match language {
        Language::JavaScript => "JavaScript source. The last expression is the result.",
        Language::Python => "Python source. Use print() to produce output.",
    };

    json!({
        "type": "object",
        "properties": {
            "code": {
                "type": "string",
                "description": code,
            },
            "timeoutMs": {
                "type": "number",
                "description": timeout,
                "default": default_timeout_ms,
            },
        },
        "required": ["code"],
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use playground_shared::FailureKind;
    use std::time::Duration;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Tool::from_name("runJs"), Some(Tool::RunJs));
        assert_eq!(Tool::from_name("runPython"), Some(Tool::RunPython));
        assert_eq!(Tool::from_name("runjs"), None);
        assert_eq!(Tool::from_name("runRuby"), None);
    }

    #[test]
    fn test_descriptor_schema() {
        let descriptor = Tool::RunJs.descriptor(5000);
        assert_eq!(descriptor.title, "Run JavaScript Code");

        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["name"], "runJs");
        assert_eq!(value["inputSchema"]["required"], json!(["code"]));
        assert_eq!(value["inputSchema"]["properties"]["timeoutMs"]["default"], 5000);

        let python = Tool::RunPython.descriptor(30_000);
        assert_eq!(python.input_schema["properties"]["timeoutMs"]["default"], 30_000);
    }

    #[test]
    fn test_render_selects_record_shape() {
        let result = ExecutionResult::failed(
            FailureKind::Timeout,
            "Execution timed out after 10ms",
            Duration::from_millis(10),
        )
        .with_exit_code(-1);

        let js = Tool::RunJs.render(result.clone()).unwrap();
        assert_eq!(js["error"], "Execution timed out after 10ms");
        assert!(js.get("exitCode").is_none());

        let py = Tool::RunPython.render(result).unwrap();
        assert_eq!(py["stderr"], "Execution timed out after 10ms");
        assert_eq!(py["exitCode"], -1);
        assert!(py.get("logs").is_none());
    }
}
