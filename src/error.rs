// ABOUTME: Error taxonomy and traceback rendering for the sandboxed interpreter
//
// Grounded in examples/TrevorS-lisp-llm-sandbox/src/error.rs for the thiserror
// idiom and examples/original_source/draconic/exceptions.py +
// draconic/utils.py for the exact taxonomy and traceback layout.

use crate::ast::Span;
use thiserror::Error;

/// The four limit-breach kinds. These can never be caught by `try`/`except`
/// in a script (spec.md §4.2, §4.6).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    #[error("number too high")]
    NumberTooHigh,
    #[error("iterable too long")]
    IterableTooLong,
    #[error("too many statements")]
    TooManyStatements,
    #[error("too much recursion")]
    TooMuchRecursion,
}

/// The full error taxonomy a script (or the host) can observe, per
/// spec.md §4.2.
#[derive(Error, Debug, Clone)]
pub enum ExcKind {
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("name '{0}' is not defined")]
    NotDefined(String),
    #[error("{0}")]
    FeatureNotAvailable(String),
    #[error("{0}")]
    ValueError(String),
    #[error(transparent)]
    Limit(#[from] LimitKind),
    #[error("{0}")]
    Annotated(String),
}

impl ExcKind {
    /// The name used both for script-level `except "TypeName":` matching
    /// and for the final line of a rendered traceback.
    pub fn type_name(&self) -> &'static str {
        match self {
            ExcKind::SyntaxError(_) => "SyntaxError",
            ExcKind::NotDefined(_) => "NotDefined",
            ExcKind::FeatureNotAvailable(_) => "FeatureNotAvailable",
            ExcKind::ValueError(_) => "ValueError",
            ExcKind::Limit(LimitKind::NumberTooHigh) => "NumberTooHigh",
            ExcKind::Limit(LimitKind::IterableTooLong) => "IterableTooLong",
            ExcKind::Limit(LimitKind::TooManyStatements) => "TooManyStatements",
            ExcKind::Limit(LimitKind::TooMuchRecursion) => "TooMuchRecursion",
            ExcKind::Annotated(_) => "Annotated",
        }
    }

    pub fn is_limit(&self) -> bool {
        matches!(self, ExcKind::Limit(_))
    }
}

/// One frame of a fully-annotated error: the offending node's position and
/// the user function it occurred in, if any (spec.md's "in which function"
/// tag, attached lazily when unwinding crosses a user frame).
#[derive(Debug, Clone)]
pub struct Frame {
    pub span: Span,
    pub in_function: Option<String>,
}

/// A script-level error carrying its full nested-call traceback chain
/// (spec.md §4.2's `Nested`/`Annotated` variants, collapsed here into one
/// struct with a frame stack rather than a Rust-side linked list of
/// exception subclasses — see DESIGN.md).
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ExcKind,
    /// Innermost frame first.
    pub frames: Vec<Frame>,
    /// The source text the error occurred in, kept so the traceback
    /// renderer can quote the offending line.
    pub source: String,
}

impl RuntimeError {
    pub fn new(kind: ExcKind, span: Span, source: impl Into<String>) -> Self {
        Self { kind, frames: vec![Frame { span, in_function: None }], source: source.into() }
    }

    /// Tags the innermost frame with the user function that was executing
    /// when the error propagated across its call boundary (spec.md §4.6
    /// step 4: "On any error, attach the function name as the frame tag
    /// before rethrowing").
    pub fn tag_function(mut self, name: &str) -> Self {
        if let Some(frame) = self.frames.last_mut() {
            if frame.in_function.is_none() {
                frame.in_function = Some(name.to_string());
            }
        }
        self
    }

    /// Pushes a new outer frame, used when an error surfaces across a
    /// user-function-call boundary (the `Nested` taxonomy case).
    pub fn push_frame(mut self, span: Span) -> Self {
        self.frames.push(Frame { span, in_function: None });
        self
    }

    pub fn is_limit(&self) -> bool {
        self.kind.is_limit()
    }

    /// Renders a CPython-`traceback`-style report, ported line-for-line from
    /// `draconic.utils.format_traceback`.
    pub fn render_traceback(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        let lines: Vec<&str> = self.source.split('\n').collect();
        for frame in self.frames.iter().rev() {
            let in_func = match &frame.in_function {
                Some(name) => format!(", in {name}"),
                None => String::new(),
            };
            out.push_str(&format!("  Line {}, col {}{}\n", frame.span.line, frame.span.col, in_func));
            out.push_str(&indent(&pointer_line(&lines, frame.span), "    "));
        }
        out.push_str(&format!("{}: {}\n", self.kind.type_name(), self.kind));
        out
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.type_name(), self.kind)
    }
}

impl std::error::Error for RuntimeError {}

fn pointer_line(lines: &[&str], span: Span) -> String {
    let line = lines.get(span.line as usize).copied().unwrap_or("");
    if span.end_line != span.line {
        return format!("{line}\n{}^\n", " ".repeat(span.col as usize));
    }
    let width = (span.end_col.saturating_sub(span.col)).max(1) as usize;
    format!("{line}\n{}{}\n", " ".repeat(span.col as usize), "^".repeat(width))
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines().map(|l| format!("{prefix}{l}\n")).collect()
}

/// An error raised by a deep helper (operator implementation, container
/// mutator) that has no access to the current AST node. The evaluator
/// catches this at the enclosing node's visit and reattaches the span,
/// per spec.md §4.2 and §9 ("Postponed errors... should be mirrored
/// exactly"). This is the sole channel by which non-evaluator code reports
/// errors; it is never exposed to the host.
#[derive(Debug, Clone)]
pub struct Postponed(pub ExcKind);

impl Postponed {
    pub fn at(self, span: Span, source: &str) -> RuntimeError {
        RuntimeError::new(self.0, span, source.to_string())
    }
}

pub type PResult<T> = Result<T, Postponed>;
pub type EvalResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_errors_report_their_taxonomy_name() {
        let err = RuntimeError::new(ExcKind::Limit(LimitKind::NumberTooHigh), Span::point(0, 0), "1");
        assert_eq!(err.kind.type_name(), "NumberTooHigh");
        assert!(err.is_limit());
    }

    #[test]
    fn traceback_renders_caret_under_span() {
        let span = Span { line: 0, col: 2, end_line: 0, end_col: 5 };
        let err = RuntimeError::new(ExcKind::ValueError("bad".into()), span, "1 + abc");
        let tb = err.render_traceback();
        assert!(tb.contains("Traceback (most recent call last):"));
        assert!(tb.contains("1 + abc"));
        assert!(tb.contains("^^^"));
        assert!(tb.ends_with("ValueError: bad\n"));
    }

    #[test]
    fn function_tag_only_applies_once() {
        let err = RuntimeError::new(ExcKind::NotDefined("x".into()), Span::point(0, 0), "x")
            .tag_function("outer")
            .tag_function("inner");
        assert_eq!(err.frames[0].in_function.as_deref(), Some("outer"));
    }
}
