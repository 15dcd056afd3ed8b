// ABOUTME: The tree-walking evaluator: expression dispatch plus statement execution
//
// Split into `simple` (spec.md §4.5 — expression-only node kinds) and `full`
// (spec.md §4.6 — everything requiring mutable environment state: literals
// with starred unpacking, comprehensions, assignment, control flow,
// functions/closures, pattern matching, try/except). `full::Evaluator` owns
// the dispatch loop; `simple` supplies leaf-level expression logic it calls
// into, mirroring examples/TrevorS-lisp-llm-sandbox's `eval.rs` split between
// `eval_expr` and statement execution, generalized to this language's larger
// statement grammar.

mod full;
mod methods;
mod pattern;
mod simple;

pub use full::Evaluator;

use crate::ast::Span;
use crate::error::{Postponed, RuntimeError};
use crate::value::Value;

/// What a statement (or block of statements) produced: either it ran to
/// completion, or it is carrying a control-flow signal up to whichever
/// construct can absorb it (spec.md §9 "Outcome sum type").
#[derive(Debug, Clone)]
pub enum Outcome {
    Normal,
    Return(Value),
    Break,
    Continue,
}

impl Outcome {
    pub fn is_normal(&self) -> bool {
        matches!(self, Outcome::Normal)
    }
}

/// Lifts a [`Postponed`] error raised by a leaf helper into a fully
/// positioned [`RuntimeError`] at `span` (spec.md §4.2 "postponed error"
/// idiom) — the one place this reattachment happens, called from every node
/// visitor that invokes operator/container code.
pub(crate) fn at(span: Span, source: &str, err: Postponed) -> RuntimeError {
    err.at(span, source)
}
