//! Composition of the program text handed to `python -c`.
//!
//! The preamble and the user's source are kept as separate, labelled
//! segments and joined once at build time. The user segment always comes
//! last and starts on a fresh line, so the number of lines before it is
//! known and tracebacks can be mapped back to the user's own numbering.

const USER_SEGMENT_LABEL: &str = "user code";

const IMPORTS: &str = "\
import sys
import math
import json
from io import StringIO
";

const NUMPY: &str = "\
try:
    import numpy as np
except ImportError:
    pass
";

// Agg keeps plotting non-interactive; plt.show() becomes a no-op.
const MATPLOTLIB: &str = "\
try:
    import matplotlib
    matplotlib.use('Agg')
    import matplotlib.pyplot as plt
except ImportError:
    pass
";

#[derive(Debug, Clone)]
struct Segment {
    label: &'static str,
    body: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    preamble: Vec<Segment>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard library imports, plus numpy and matplotlib when
    /// `scientific` is set. Missing optional packages are ignored.
    pub fn standard(scientific: bool) -> Self {
        let builder = Self::new().with_segment("imports", IMPORTS);
        if scientific {
            builder
                .with_segment("numpy", NUMPY)
                .with_segment("matplotlib", MATPLOTLIB)
        } else {
            builder
        }
    }

    pub fn with_segment(mut self, label: &'static str, body: impl Into<String>) -> Self {
        self.preamble.push(Segment {
            label,
            body: body.into(),
        });
        self
    }

    pub fn build(&self, user_source: &str) -> WrappedProgram {
        let mut text = String::new();
        for segment in &self.preamble {
            push_segment(&mut text, segment.label, &segment.body);
        }
        push_header(&mut text, USER_SEGMENT_LABEL);
        let user_line_offset = text.lines().count();
        text.push_str(user_source);

        WrappedProgram {
            text,
            user_line_offset,
        }
    }
}

fn push_header(text: &mut String, label: &str) {
    text.push_str("# --- ");
    text.push_str(label);
    text.push_str(" ---\n");
}

fn push_segment(text: &mut String, label: &str, body: &str) {
    push_header(text, label);
    text.push_str(body);
    if !body.ends_with('\n') {
        text.push('\n');
    }
}

#[derive(Debug, Clone)]
pub struct WrappedProgram {
    text: String,
    user_line_offset: usize,
}

impl WrappedProgram {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lines preceding the first line of user source.
    pub fn user_line_offset(&self) -> usize {
        self.user_line_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_source_follows_preamble() {
        let program = ProgramBuilder::standard(true).build("print(1)\nprint(2)");
        let lines: Vec<&str> = program.text().lines().collect();

        assert_eq!(lines[0], "# --- imports ---");
        assert_eq!(lines[program.user_line_offset()], "print(1)");
        assert_eq!(lines[program.user_line_offset() - 1], "# --- user code ---");
        assert!(program.text().contains("matplotlib.use('Agg')"));
        assert!(program.text().ends_with("print(2)"));
    }

    #[test]
    fn test_segment_without_trailing_newline() {
        let program = ProgramBuilder::new()
            .with_segment("setup", "x = 1")
            .build("print(x)");
        assert_eq!(program.text(), "# --- setup ---\nx = 1\n# --- user code ---\nprint(x)");
        assert_eq!(program.user_line_offset(), 3);
    }

    #[test]
    fn test_plain_preamble_skips_scientific_imports() {
        let program = ProgramBuilder::standard(false).build("pass");
        assert!(!program.text().contains("numpy"));
        assert!(program.text().contains("import math"));
    }

    #[test]
    fn test_user_source_is_verbatim() {
        let source = "s = \"\"\"\n${code}\n\"\"\"\nprint(s)";
        let program = ProgramBuilder::standard(true).build(source);
        assert!(program.text().ends_with(source));
    }
}
