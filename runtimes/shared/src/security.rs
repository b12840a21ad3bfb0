use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Globals exposed to embedded JavaScript. Anything not listed here (or in
/// [`LANGUAGE_CONSTANTS`]) is removed from the evaluation context before
/// user code runs.
pub const JS_GLOBAL_ALLOWLIST: &[&str] = &[
    // math and serialization
    "Math",
    "JSON",
    // core constructors
    "Array",
    "Object",
    "String",
    "Number",
    "Boolean",
    "Date",
    "RegExp",
    // free functions
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    // collections
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "Promise",
    // typed arrays
    "Int8Array",
    "Uint8Array",
    "Int16Array",
    "Uint16Array",
    "Int32Array",
    "Uint32Array",
    "Float32Array",
    "Float64Array",
    "BigInt64Array",
    "BigUint64Array",
    "ArrayBuffer",
    "DataView",
    "BigInt",
    // errors
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
];

/// Non-configurable or self-referential globals that stay in place untouched.
pub const LANGUAGE_CONSTANTS: &[&str] = &["globalThis", "undefined", "NaN", "Infinity"];

/// Name of the logging binding installed by the runtime itself.
pub const CONSOLE_BINDING: &str = "console";

pub fn is_allowed_global(name: &str) -> bool {
    name == CONSOLE_BINDING
        || JS_GLOBAL_ALLOWLIST.contains(&name)
        || LANGUAGE_CONSTANTS.contains(&name)
}

/// Host variables an interpreter needs to start and locate its libraries.
pub const DEFAULT_ENV_PASSTHROUGH: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "TMPDIR",
    "TMP",
    "TEMP",
    "SYSTEMROOT",
    "PYTHONPATH",
    "PYTHONHOME",
    "VIRTUAL_ENV",
    "NODE_PATH",
];

/// Environment handed to interpreter subprocesses. The child starts from an
/// empty environment; only `passthrough` names are copied from the host and
/// `fixed` values are always set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvPolicy {
    pub passthrough: Vec<String>,
    pub fixed: BTreeMap<String, String>,
}

impl Default for EnvPolicy {
    fn default() -> Self {
        Self {
            passthrough: DEFAULT_ENV_PASSTHROUGH.iter().map(|s| s.to_string()).collect(),
            fixed: BTreeMap::new(),
        }
    }
}

impl EnvPolicy {
    pub fn python() -> Self {
        Self::default()
            .with_fixed("PYTHONUNBUFFERED", "1")
            .with_fixed("PYTHONDONTWRITEBYTECODE", "1")
            .with_fixed("MPLBACKEND", "Agg")
    }

    pub fn with_fixed(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fixed.insert(key.into(), value.into());
        self
    }

    pub fn allow(mut self, names: impl IntoIterator<Item = String>) -> Self {
        for name in names {
            if !self.passthrough.contains(&name) {
                self.passthrough.push(name);
            }
        }
        self
    }

    /// Resolves the child environment against `lookup`, usually the host's
    /// `std::env::var`. Fixed values win over host values.
    pub fn resolve<F>(&self, lookup: F) -> BTreeMap<String, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = BTreeMap::new();
        for name in &self.passthrough {
            if let Some(value) = lookup(name) {
                env.insert(name.clone(), value);
            }
        }
        for (key, value) in &self.fixed {
            env.insert(key.clone(), value.clone());
        }
        env
    }

    pub fn resolve_from_host(&self) -> BTreeMap<String, String> {
        self.resolve(|name| std::env::var(name).ok())
    }
}
