pub mod program;
pub mod runtime;
pub mod traceback;

pub use program::{ProgramBuilder, WrappedProgram};
pub use runtime::{PythonConfig, PythonRuntime};
