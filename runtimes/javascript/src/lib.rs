pub mod console;
pub mod context;
pub mod format;
pub mod node;
pub mod runtime;

pub use runtime::JavaScriptBackend;
pub use runtime::JavaScriptConfig;
pub use runtime::JavaScriptRuntime;
