//! Isolated QuickJS evaluation contexts.
//!
//! Every evaluation gets a fresh runtime and context. The context's globals
//! are replaced by an explicit [`CapabilitySet`] before user code runs, and
//! both are dropped before the evaluation returns.

use playground_shared::{
    FailureKind, RuntimeError, CONSOLE_BINDING, JS_GLOBAL_ALLOWLIST, LANGUAGE_CONSTANTS,
};
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Runtime, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::console::{self, LogSink};
use crate::format::{coerce_to_string, format_result};

#[derive(Debug, Clone, Copy)]
pub struct EvalLimits {
    pub memory_limit_bytes: usize,
    pub max_stack_size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalOutcome {
    Completed(String),
    Thrown { kind: FailureKind, message: String },
    Interrupted,
}

#[derive(Debug)]
pub struct Evaluation {
    pub outcome: EvalOutcome,
    pub logs: Vec<String>,
}

/// Name to value map installed as the only globals of a context.
pub struct CapabilitySet<'js> {
    bindings: BTreeMap<&'static str, Value<'js>>,
}

impl<'js> CapabilitySet<'js> {
    /// Collects the allowlisted intrinsics from a fresh context and adds the
    /// capturing `console`.
    pub fn build(ctx: &Ctx<'js>, sink: &LogSink) -> rquickjs::Result<Self> {
        let globals = ctx.globals();
        let mut bindings = BTreeMap::new();

        for &name in JS_GLOBAL_ALLOWLIST {
            let value: Value<'js> = globals.get(name)?;
            if value.is_undefined() {
                debug!(binding = name, "intrinsic not available in this engine");
                continue;
            }
            bindings.insert(name, value);
        }
        bindings.insert(CONSOLE_BINDING, console::create(ctx, sink)?.into_value());

        Ok(Self { bindings })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ + use<'_, 'js> {
        self.bindings.keys().copied()
    }

    /// Strips every global not in the set and (re)defines the set's bindings.
    pub fn apply(&self, ctx: &Ctx<'js>) -> rquickjs::Result<()> {
        let globals = ctx.globals();
        let existing: Vec<String> = ctx.eval("Object.getOwnPropertyNames(globalThis)")?;

        for name in existing {
            if LANGUAGE_CONSTANTS.contains(&name.as_str())
                || self.bindings.contains_key(name.as_str())
            {
                continue;
            }
            if let Err(e) = globals.remove(name.as_str()) {
                let _ = ctx.catch();
                warn!(binding = %name, error = %e, "could not remove global");
            }
        }

        for (name, value) in &self.bindings {
            globals.set(*name, value.clone())?;
        }

        Ok(())
    }
}

/// Runs `source` as a global script and formats its completion value.
///
/// Setting `cancel` makes the engine abort at its next interrupt check; the
/// outcome is then [`EvalOutcome::Interrupted`]. `Err` means the context
/// itself could not be built.
pub fn evaluate(
    source: &str,
    limits: &EvalLimits,
    cancel: Arc<AtomicBool>,
) -> Result<Evaluation, RuntimeError> {
    let runtime = Runtime::new().map_err(setup_error)?;
    runtime.set_memory_limit(limits.memory_limit_bytes);
    runtime.set_max_stack_size(limits.max_stack_size_bytes);

    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupted.clone();
    runtime.set_interrupt_handler(Some(Box::new(move || {
        let stop = cancel.load(Ordering::Relaxed);
        if stop {
            handler_flag.store(true, Ordering::Relaxed);
        }
        stop
    })));

    let context = Context::full(&runtime).map_err(setup_error)?;
    let sink = LogSink::default();

    let outcome = context.with(|ctx| -> Result<EvalOutcome, RuntimeError> {
        let capabilities = CapabilitySet::build(&ctx, &sink).map_err(setup_error)?;
        capabilities.apply(&ctx).map_err(setup_error)?;

        let outcome = match ctx.eval::<Value, _>(source).catch(&ctx) {
            Ok(value) => EvalOutcome::Completed(format_result(&ctx, &value)),
            Err(caught) => classify(&ctx, caught),
        };
        Ok(outcome)
    })?;

    drop(context);
    drop(runtime);

    let outcome = if interrupted.load(Ordering::Relaxed) {
        EvalOutcome::Interrupted
    } else {
        outcome
    };

    Ok(Evaluation {
        outcome,
        logs: sink.take(),
    })
}

fn classify<'js>(ctx: &Ctx<'js>, caught: CaughtError<'js>) -> EvalOutcome {
    match caught {
        CaughtError::Exception(exception) => {
            let name: Option<String> = exception.as_object().get("name").ok().flatten();
            let message = exception.message().unwrap_or_default();
            let kind = if name.as_deref() == Some("SyntaxError") {
                FailureKind::Syntax
            } else {
                FailureKind::Runtime
            };
            let message = if message.is_empty() {
                name.unwrap_or_else(|| "Error".to_string())
            } else {
                message
            };
            EvalOutcome::Thrown { kind, message }
        }
        CaughtError::Value(value) => EvalOutcome::Thrown {
            kind: FailureKind::Runtime,
            message: coerce_to_string(ctx, &value),
        },
        CaughtError::Error(error) => EvalOutcome::Thrown {
            kind: FailureKind::Runtime,
            message: error.to_string(),
        },
    }
}

fn setup_error(error: rquickjs::Error) -> RuntimeError {
    RuntimeError::ContextSetup(error.to_string())
}
