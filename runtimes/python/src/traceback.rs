use once_cell::sync::Lazy;
use playground_shared::FailureKind;
use regex::{Captures, Regex};

static PROGRAM_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"File "<string>", line (\d+)"#).expect("valid frame pattern"));

static PARSE_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(SyntaxError|IndentationError|TabError)\b").expect("valid error pattern")
});

/// Shifts `<string>` frame line numbers back by `offset` so they point at
/// the user's source instead of the wrapped program. Frames inside the
/// preamble are left alone.
pub fn rewrite_line_numbers(stderr: &str, offset: usize) -> String {
    PROGRAM_FRAME
        .replace_all(stderr, |caps: &Captures| match caps[1].parse::<usize>() {
            Ok(line) if line > offset => format!("File \"<string>\", line {}", line - offset),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

pub fn classify(stderr: &str) -> FailureKind {
    if PARSE_ERROR.is_match(stderr) {
        FailureKind::Syntax
    } else {
        FailureKind::Runtime
    }
}
