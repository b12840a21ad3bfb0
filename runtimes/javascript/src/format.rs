//! Conversion of evaluated values into the text handed back to callers.

use rquickjs::{convert::Coerced, Ctx, Undefined, Value};

const UNPRINTABLE: &str = "[unprintable value]";

/// Formats the completion value of a script.
///
/// `undefined` and `null` print as their names, objects and arrays as
/// pretty JSON when they serialize, everything else through `String(v)`.
pub fn format_result<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    if value.is_undefined() {
        return "undefined".to_string();
    }
    if value.is_null() {
        return "null".to_string();
    }
    if is_structured(value) {
        if let Some(json) = to_pretty_json(ctx, value) {
            return json;
        }
    }
    coerce_to_string(ctx, value)
}

/// Formats one `console` argument. Unlike results, `null` goes through JSON
/// like any other `typeof "object"` value.
pub fn format_log_arg<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    if value.is_null() || is_structured(value) {
        if let Some(json) = to_pretty_json(ctx, value) {
            return json;
        }
    }
    coerce_to_string(ctx, value)
}

pub fn coerce_to_string<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    match value.get::<Coerced<String>>() {
        Ok(Coerced(text)) => text,
        Err(_) => {
            // Symbols and objects with a throwing toString end up here.
            let _ = ctx.catch();
            UNPRINTABLE.to_string()
        }
    }
}

fn is_structured(value: &Value<'_>) -> bool {
    value.is_object() && !value.is_function()
}

fn to_pretty_json<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Option<String> {
    match ctx.json_stringify_replacer_space(value.clone(), Undefined, 2) {
        Ok(Some(json)) => json.to_string().ok(),
        Ok(None) => None,
        Err(_) => {
            // Cycles and BigInt members fall back to string coercion.
            let _ = ctx.catch();
            None
        }
    }
}
