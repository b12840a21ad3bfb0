use parking_lot::Mutex;
use playground_shared::{MAX_CAPTURE_BYTES, TRUNCATION_MARKER};
use rquickjs::{function::Rest, Ctx, Function, Object, Value};
use std::sync::Arc;

use crate::format::format_log_arg;

/// `console` methods and the prefix each one writes.
const METHODS: &[(&str, &str)] = &[
    ("log", ""),
    ("info", ""),
    ("warn", "[WARN] "),
    ("error", "[ERROR] "),
];

/// Ordered buffer behind the in-context `console`. Lines are kept until
/// their total size reaches the limit; after that a single
/// [`TRUNCATION_MARKER`] line is appended and further output is dropped.
#[derive(Clone)]
pub struct LogSink(Arc<Mutex<LogBuffer>>);

struct LogBuffer {
    lines: Vec<String>,
    bytes: usize,
    limit: usize,
    full: bool,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::with_limit(MAX_CAPTURE_BYTES)
    }
}

impl LogSink {
    pub fn with_limit(limit: usize) -> Self {
        Self(Arc::new(Mutex::new(LogBuffer {
            lines: Vec::new(),
            bytes: 0,
            limit,
            full: false,
        })))
    }

    pub fn is_full(&self) -> bool {
        self.0.lock().full
    }

    pub fn push(&self, line: String) {
        let mut buffer = self.0.lock();
        if buffer.full {
            return;
        }
        if buffer.bytes + line.len() > buffer.limit {
            buffer.full = true;
            buffer.lines.push(TRUNCATION_MARKER.to_string());
            return;
        }
        buffer.bytes += line.len();
        buffer.lines.push(line);
    }

    pub fn take(&self) -> Vec<String> {
        let mut buffer = self.0.lock();
        buffer.bytes = 0;
        std::mem::take(&mut buffer.lines)
    }
}

/// Builds a `console` object whose methods append to `sink` instead of
/// touching any real output stream.
pub fn create<'js>(ctx: &Ctx<'js>, sink: &LogSink) -> rquickjs::Result<Object<'js>> {
    let console = Object::new(ctx.clone())?;

    for &(method, prefix) in METHODS {
        let sink = sink.clone();
        let function = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
                if sink.is_full() {
                    return;
                }
                let line = args
                    .0
                    .iter()
                    .map(|arg| format_log_arg(&ctx, arg))
                    .collect::<Vec<_>>()
                    .join(" ");
                sink.push(format!("{prefix}{line}"));
            },
        )?;
        console.set(method, function)?;
    }

    Ok(console)
}
