// ABOUTME: The host-facing surface (spec.md §6) — `Interpreter` owns a
// persistent `Evaluator` so locals survive across calls, per spec.md §7's
// REPL-style reuse guarantee, while only resetting the resource counters on
// `eval`/`execute` entry.
//
// Grounded in examples/TrevorS-lisp-llm-sandbox/src/sandbox.rs for the
// "construct once, run many scripts against persistent state" shape, adapted
// from that Lisp sandbox's single `run` entry point to this spec's three
// distinct entry points.

use std::rc::Rc;

use crate::ast::{ExprNode, Span, StmtNode};
use crate::config::Config;
use crate::containers::{SafeMapping, SafeSequence, SafeSet, SafeString};
use crate::env::Builtins;
use crate::error::{EvalResult, ExcKind, RuntimeError};
use crate::eval::{Evaluator, Outcome};
use crate::parser;
use crate::value::Value;

/// The last error's rendered report, kept so a host can display it without
/// reconstructing the traceback itself (SPEC_FULL.md §6).
pub type Traceback = String;

/// A sandboxed interpreter instance: one [`Config`], one builtin map, one
/// persistent environment of locals that survives across calls.
pub struct Interpreter {
    evaluator: Evaluator,
    last_traceback: Option<Traceback>,
}

impl Interpreter {
    /// Builds a fresh interpreter. `builtins` are merged with the default
    /// container-constructor/type bindings according to
    /// `config.builtins_extend_default` (spec.md §4.1, §6).
    pub fn new(config: Config, builtins: Builtins) -> Self {
        let config = Rc::new(config);
        let mut merged = default_builtins(&config);
        if config.builtins_extend_default {
            merged.merge_extend(builtins);
        } else {
            merged = builtins;
        }
        let source = Rc::new(String::new());
        Self { evaluator: Evaluator::new(config, merged, source), last_traceback: None }
    }

    /// The mutable builtin map (spec.md §6: "mutable from the host side
    /// between runs").
    pub fn builtins_mut(&mut self) -> &mut Builtins {
        &mut self.evaluator.builtins
    }

    /// The rendered traceback of the most recent error, if any call since
    /// construction has failed.
    pub fn traceback(&self) -> Option<&Traceback> {
        self.last_traceback.as_ref()
    }

    /// Parses `source` as a single expression, resets counters, evaluates
    /// it, and returns its value. Empty source yields `Value::None`. A
    /// top-level `return`/`break`/`continue` cannot occur here since the
    /// grammar entry point is an expression, not a statement.
    pub fn eval(&mut self, source: &str) -> EvalResult<Value> {
        if source.trim().is_empty() {
            return Ok(Value::None);
        }
        let source_rc = Rc::new(source.to_string());
        let expr = self.parse_expr(&source_rc)?;
        self.evaluator.source = source_rc;
        self.evaluator.reset_counters();
        self.run(|ev| ev.eval_expr(&expr))
    }

    /// Parses `source` as a statement list, resets counters, runs it, and
    /// returns the value of a top-level `return` or `Value::None` otherwise.
    /// A top-level `break`/`continue` is a `SyntaxError`.
    pub fn execute(&mut self, source: &str) -> EvalResult<Value> {
        let source_rc = Rc::new(source.to_string());
        let stmts = self.parse_stmts(&source_rc)?;
        self.evaluator.source = source_rc;
        self.evaluator.reset_counters();
        self.run(|ev| match ev.exec_block(&stmts)? {
            Outcome::Return(v) => Ok(v),
            Outcome::Normal => Ok(Value::None),
            Outcome::Break | Outcome::Continue => {
                let span = top_span(&stmts);
                Err(ev.raise_syntax(span, "'break'/'continue' not properly within a loop"))
            }
        })
    }

    /// Parses and runs `source` as statements without resetting counters or
    /// replacing the traceback's source reference (spec.md §6: "intended to
    /// be called inside an already-running host expression"). A top-level
    /// `return` is a syntax error, mirroring `execute`'s ban on top-level
    /// `break`/`continue`.
    ///
    /// `module_name` is accepted for parity with embeddings that tag nested
    /// evaluations by origin; this interpreter has no module registry to
    /// key it into, so it is only used in the frame tag on error.
    pub fn execute_module(&mut self, source: &str, module_name: &str) -> EvalResult<Value> {
        let stmts = parser::parse(source).map_err(|msg| self.syntax_error(source, msg))?;
        self.run(|ev| {
            let result = match ev.exec_block(&stmts)? {
                Outcome::Normal => Ok(Value::None),
                Outcome::Return(_) => {
                    let span = top_span(&stmts);
                    Err(ev.raise_syntax(span, "'return' outside function"))
                }
                Outcome::Break | Outcome::Continue => {
                    let span = top_span(&stmts);
                    Err(ev.raise_syntax(span, "'break'/'continue' not properly within a loop"))
                }
            };
            result.map_err(|e| e.tag_function(module_name))
        })
    }

    fn run<F>(&mut self, body: F) -> EvalResult<Value>
    where
        F: FnOnce(&mut Evaluator) -> EvalResult<Value>,
    {
        match body(&mut self.evaluator) {
            Ok(v) => {
                self.last_traceback = None;
                Ok(v)
            }
            Err(e) => {
                self.last_traceback = Some(e.render_traceback());
                Err(e)
            }
        }
    }

    fn parse_expr(&self, source: &Rc<String>) -> EvalResult<ExprNode> {
        parser::parse_expr(source).map_err(|msg| self.syntax_error(source, msg))
    }

    fn parse_stmts(&self, source: &Rc<String>) -> EvalResult<Vec<StmtNode>> {
        parser::parse(source).map_err(|msg| self.syntax_error(source, msg))
    }

    fn syntax_error(&self, source: &str, msg: String) -> RuntimeError {
        RuntimeError::new(ExcKind::SyntaxError(msg), Span::point(0, 0), source.to_string())
    }
}

/// Best-effort span for a top-level control-flow-outside-function error:
/// the first statement's span, or the origin if the block is empty (can
/// only happen for `Return`/`Break`/`Continue` surfacing from a non-empty
/// block, so this fallback is never actually hit).
fn top_span(stmts: &[StmtNode]) -> Span {
    stmts.first().map(|s| s.span).unwrap_or_else(|| Span::point(0, 0))
}

trait RaiseSyntax {
    fn raise_syntax(&self, span: Span, msg: &str) -> RuntimeError;
}

impl RaiseSyntax for Evaluator {
    fn raise_syntax(&self, span: Span, msg: &str) -> RuntimeError {
        RuntimeError::new(ExcKind::SyntaxError(msg.to_string()), span, (*self.source).clone())
    }
}

/// The default builtin bindings every interpreter starts with: the eight
/// safe-container/type constructors plus `True`/`False`/`None` (spec.md §6:
/// "The default builtin map always includes the safe container
/// constructors").
fn default_builtins(config: &Rc<Config>) -> Builtins {
    let mut b = Builtins::new();
    b.insert("True", Value::Bool(true));
    b.insert("False", Value::Bool(false));
    b.insert("None", Value::None);

    b.insert("int", Value::HostFn(Rc::new(host_int)));
    b.insert("float", Value::HostFn(Rc::new(host_float)));
    b.insert("bool", Value::HostFn(Rc::new(host_bool)));

    let c = config.clone();
    b.insert("str", Value::HostFn(Rc::new(move |args| host_str(&c, args))));
    let c = config.clone();
    b.insert("tuple", Value::HostFn(Rc::new(move |args| host_tuple(&c, args))));
    let c = config.clone();
    b.insert("list", Value::HostFn(Rc::new(move |args| host_list(&c, args))));
    let c = config.clone();
    b.insert("dict", Value::HostFn(Rc::new(move |args| host_dict(&c, args))));
    let c = config.clone();
    b.insert("set", Value::HostFn(Rc::new(move |args| host_set(&c, args))));
    b
}

fn flatten_one(args: &[Value]) -> Result<Vec<Value>, String> {
    if args.len() > 1 {
        return Err("expected at most 1 argument".to_string());
    }
    Ok(args.to_vec())
}

fn host_int(args: &[Value]) -> Result<Value, String> {
    let args = flatten_one(args)?;
    let Some(v) = args.into_iter().next() else { return Ok(Value::Int(0)) };
    match v {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        Value::Float(f) => Ok(Value::Int(f as i64)),
        Value::Str(s) => s.borrow().trim().parse::<i64>().map(Value::Int).map_err(|_| format!("invalid literal for int(): '{}'", s.borrow())),
        other => Err(format!("int() argument must be a string or a number, not '{}'", other.type_name())),
    }
}

fn host_float(args: &[Value]) -> Result<Value, String> {
    let args = flatten_one(args)?;
    let Some(v) = args.into_iter().next() else { return Ok(Value::Float(0.0)) };
    match v {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Bool(b) => Ok(Value::Float(b as i64 as f64)),
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Str(s) => s.borrow().trim().parse::<f64>().map(Value::Float).map_err(|_| format!("could not convert string to float: '{}'", s.borrow())),
        other => Err(format!("float() argument must be a string or a number, not '{}'", other.type_name())),
    }
}

fn host_bool(args: &[Value]) -> Result<Value, String> {
    let args = flatten_one(args)?;
    Ok(Value::Bool(args.first().map(Value::is_truthy).unwrap_or(false)))
}

fn host_str(config: &Rc<Config>, args: &[Value]) -> Result<Value, String> {
    let args = flatten_one(args)?;
    let text = args.first().map(|v| v.to_string()).unwrap_or_default();
    Ok(Value::Str(SafeString::new(config.clone(), text)))
}

fn host_tuple(config: &Rc<Config>, args: &[Value]) -> Result<Value, String> {
    let items = coerce_iterable(config, args)?;
    Ok(Value::Tuple(Rc::new(items)))
}

fn host_list(config: &Rc<Config>, args: &[Value]) -> Result<Value, String> {
    let items = coerce_iterable(config, args)?;
    Ok(Value::Seq(SafeSequence::new(config.clone(), items)))
}

fn host_set(config: &Rc<Config>, args: &[Value]) -> Result<Value, String> {
    let items = coerce_iterable(config, args)?;
    SafeSet::new(config.clone(), items).map(Value::Set).map_err(|e| e.0.to_string())
}

fn host_dict(config: &Rc<Config>, args: &[Value]) -> Result<Value, String> {
    let args = flatten_one(args)?;
    let Some(v) = args.into_iter().next() else {
        return SafeMapping::new(config.clone(), Vec::new()).map(Value::Map).map_err(|e| e.0.to_string());
    };
    let pairs = match v {
        Value::Map(m) => m.borrow(),
        Value::Seq(s) => pairs_from_items(&s.borrow())?,
        Value::Tuple(t) => pairs_from_items(&t)?,
        other => return Err(format!("cannot build dict from '{}'", other.type_name())),
    };
    SafeMapping::new(config.clone(), pairs).map(Value::Map).map_err(|e| e.0.to_string())
}

fn pairs_from_items(items: &[Value]) -> Result<Vec<(Value, Value)>, String> {
    items
        .iter()
        .map(|item| match item {
            Value::Tuple(t) if t.len() == 2 => Ok((t[0].clone(), t[1].clone())),
            Value::Seq(s) if s.len() == 2 => {
                let b = s.borrow();
                Ok((b[0].clone(), b[1].clone()))
            }
            _ => Err("dict() update sequence element must be a pair".to_string()),
        })
        .collect()
}

/// Host-side constructor helper: flattens an already-materialized iterable
/// argument into a `Vec<Value>`. Host functions never touch `max_loops` —
/// that ceiling is only meaningful for script-level iteration — so this
/// just reads off whatever the caller already built.
fn coerce_iterable(config: &Rc<Config>, args: &[Value]) -> Result<Vec<Value>, String> {
    let args = flatten_one(args)?;
    let Some(v) = args.into_iter().next() else { return Ok(Vec::new()) };
    match v {
        Value::Seq(s) => Ok(s.borrow().clone()),
        Value::Tuple(t) => Ok((*t).clone()),
        Value::Set(s) => Ok(s.borrow().clone()),
        Value::Str(s) => Ok(s.borrow().chars().map(|c| Value::Str(SafeString::new(config.clone(), c.to_string()))).collect()),
        Value::Map(m) => Ok(m.borrow().into_iter().map(|(k, _)| k).collect()),
        other => Err(format!("'{}' object is not iterable", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> Interpreter {
        Interpreter::new(Config::default(), Builtins::new())
    }

    #[test]
    fn eval_simple_arithmetic() {
        let mut it = interp();
        assert_eq!(it.eval("1 + 2").unwrap(), Value::Int(3));
    }

    #[test]
    fn eval_empty_source_is_none() {
        let mut it = interp();
        assert_eq!(it.eval("").unwrap(), Value::None);
    }

    #[test]
    fn execute_returns_top_level_return_value() {
        let mut it = interp();
        let src = "def fac(i):\n  if i<1: return 1\n  return i*fac(i-1)\nreturn fac(5)";
        assert_eq!(it.execute(src).unwrap(), Value::Int(120));
    }

    #[test]
    fn locals_persist_across_calls() {
        let mut it = interp();
        it.execute("x = 5").unwrap();
        assert_eq!(it.eval("x + 1").unwrap(), Value::Int(6));
    }

    #[test]
    fn counters_reset_between_eval_calls() {
        let mut it = interp();
        it.eval("1 + 2 + 3").unwrap();
        let first = it.evaluator.stmts_executed();
        assert!(first > 1);
        it.eval("1").unwrap();
        assert_eq!(it.evaluator.stmts_executed(), 1);
    }

    #[test]
    fn after_error_a_trivial_eval_still_succeeds() {
        let mut it = interp();
        assert!(it.eval("1/0").is_err());
        assert!(it.traceback().is_some());
        assert_eq!(it.eval("1").unwrap(), Value::Int(1));
    }

    #[test]
    fn shadowing_a_builtin_is_a_value_error() {
        let mut it = interp();
        let err = it.execute("int = 1").unwrap_err();
        assert_eq!(err.kind.type_name(), "ValueError");
    }

    #[test]
    fn default_constructors_are_present() {
        let mut it = interp();
        assert_eq!(it.eval("list((1,2,3))").unwrap().type_name(), "list");
        assert_eq!(it.eval("str(5)").unwrap().to_string(), "5");
    }
}
