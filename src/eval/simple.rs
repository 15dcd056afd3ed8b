// ABOUTME: Expression-only evaluation (spec.md §4.5): constants, names,
// operators, subscript/slice, attribute access, f-strings, calls.
//
// These are free functions over `&mut Evaluator` rather than methods on it
// so `full.rs`'s single `eval_expr` dispatcher can delegate to them without
// every leaf case being an inherent method — mirrors the module split
// between a "simple" and "full" evaluator in spec.md §2's component table.

use std::rc::Rc;

use crate::ast::*;
use crate::containers::{SafeMapping, SafeSequence, SafeSet, SafeString};
use crate::error::{EvalResult, ExcKind, Postponed};
use crate::eval::full::Evaluator;
use crate::operators;
use crate::value::Value;

pub(super) fn eval_constant(ev: &Evaluator, c: &Constant) -> Value {
    match c {
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Str(s) => Value::Str(SafeString::new(ev.config.clone(), s.clone())),
        Constant::Bool(b) => Value::Bool(*b),
        Constant::None => Value::None,
    }
}

pub(super) fn eval_name(ev: &Evaluator, name: &str, span: Span) -> EvalResult<Value> {
    crate::env::resolve(&ev.locals, &ev.builtins, name).map_err(|e| ev.raise(span, e))
}

pub(super) fn eval_unary(ev: &mut Evaluator, op: UnaryOp, operand: &ExprNode) -> EvalResult<Value> {
    let v = ev.eval_expr(operand)?;
    operators::unary(&ev.config, op, &v).map_err(|e| ev.raise(operand.span, e))
}

pub(super) fn eval_binary(ev: &mut Evaluator, left: &ExprNode, op: BinOp, right: &ExprNode, span: Span) -> EvalResult<Value> {
    let l = ev.eval_expr(left)?;
    let r = ev.eval_expr(right)?;
    operators::binary(&ev.config, op, &l, &r).map_err(|e| ev.raise(span, e))
}

pub(super) fn eval_boolop(ev: &mut Evaluator, op: BoolOp, values: &[ExprNode]) -> EvalResult<Value> {
    let mut last = Value::Bool(op == BoolOp::And);
    for (i, node) in values.iter().enumerate() {
        let v = ev.eval_expr(node)?;
        let truthy = v.is_truthy();
        last = v;
        let short_circuit = match op {
            BoolOp::And => !truthy,
            BoolOp::Or => truthy,
        };
        if short_circuit || i == values.len() - 1 {
            return Ok(last);
        }
    }
    Ok(last)
}

/// Chained comparison (`a < b < c`): each link's right operand is evaluated
/// exactly once and reused as the next link's left operand (spec.md §4.4).
pub(super) fn eval_compare(ev: &mut Evaluator, first: &ExprNode, rest: &[(CmpOp, ExprNode)], span: Span) -> EvalResult<Value> {
    let mut left = ev.eval_expr(first)?;
    for (op, node) in rest {
        let right = ev.eval_expr(node)?;
        let ok = operators::compare_one(*op, &left, &right).map_err(|e| ev.raise(span, e))?;
        if !ok {
            return Ok(Value::Bool(false));
        }
        left = right;
    }
    Ok(Value::Bool(true))
}

pub(super) fn eval_ifexp(ev: &mut Evaluator, test: &ExprNode, body: &ExprNode, orelse: &ExprNode) -> EvalResult<Value> {
    if ev.eval_expr(test)?.is_truthy() {
        ev.eval_expr(body)
    } else {
        ev.eval_expr(orelse)
    }
}

pub(super) fn get_item(ev: &Evaluator, container: &Value, key: &Value, span: Span) -> EvalResult<Value> {
    match (container, key) {
        (Value::Slice(lo, hi, step), _) => {
            let _ = (lo, hi, step);
            Err(ev.raise(span, Postponed(ExcKind::FeatureNotAvailable("slice object is not subscriptable".into()))))
        }
        (_, Value::Slice(lo, hi, step)) => apply_slice(ev, container, lo.as_deref(), hi.as_deref(), step.as_deref(), span),
        (Value::Seq(s), Value::Int(i)) => {
            let idx = normalize_index(*i, s.len()).ok_or_else(|| ev.raise(span, out_of_range()))?;
            Ok(s.borrow()[idx].clone())
        }
        (Value::Tuple(t), Value::Int(i)) => {
            let idx = normalize_index(*i, t.len()).ok_or_else(|| ev.raise(span, out_of_range()))?;
            Ok(t[idx].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.borrow().chars().collect();
            let idx = normalize_index(*i, chars.len()).ok_or_else(|| ev.raise(span, out_of_range()))?;
            Ok(Value::Str(SafeString::new(ev.config.clone(), chars[idx].to_string())))
        }
        (Value::Map(m), key) => m
            .get(key)
            .map_err(|e| ev.raise(span, e))?
            .ok_or_else(|| ev.raise(span, Postponed(ExcKind::ValueError(format!("key not found: {key}"))))),
        _ => Err(ev.raise(span, Postponed(ExcKind::FeatureNotAvailable(format!("'{}' is not subscriptable", container.type_name()))))),
    }
}

fn out_of_range() -> Postponed {
    Postponed(ExcKind::ValueError("index out of range".into()))
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx < 0 || idx as usize >= len {
        None
    } else {
        Some(idx as usize)
    }
}

/// Resolves `start/stop/step` into a Python-style slice range and builds the
/// sliced value. Shared by get, and by no setter (slice assignment is out of
/// this language's grammar — only plain-index subscript assignment exists).
fn apply_slice(ev: &Evaluator, container: &Value, lo: Option<&Value>, hi: Option<&Value>, step: Option<&Value>, span: Span) -> EvalResult<Value> {
    let step = match step {
        Some(Value::Int(s)) => *s,
        None | Some(Value::None) => 1,
        _ => return Err(ev.raise(span, Postponed(ExcKind::ValueError("slice step must be an integer".into())))),
    };
    if step == 0 {
        return Err(ev.raise(span, Postponed(ExcKind::ValueError("slice step cannot be zero".into()))));
    }
    let len = match container {
        Value::Seq(s) => s.len(),
        Value::Tuple(t) => t.len(),
        Value::Str(s) => s.borrow().chars().count(),
        _ => return Err(ev.raise(span, Postponed(ExcKind::FeatureNotAvailable(format!("'{}' is not subscriptable", container.type_name()))))),
    };
    let indices = slice_indices(lo, hi, step, len).map_err(|e| ev.raise(span, e))?;
    match container {
        Value::Seq(s) => {
            let data = s.borrow();
            let out: Vec<Value> = indices.into_iter().map(|i| data[i].clone()).collect();
            Ok(Value::Seq(SafeSequence::new(ev.config.clone(), out)))
        }
        Value::Tuple(t) => {
            let out: Vec<Value> = indices.into_iter().map(|i| t[i].clone()).collect();
            Ok(Value::Tuple(Rc::new(out)))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.borrow().chars().collect();
            let out: String = indices.into_iter().map(|i| chars[i]).collect();
            Ok(Value::Str(SafeString::new(ev.config.clone(), out)))
        }
        _ => unreachable!("checked above"),
    }
}

fn slice_indices(lo: Option<&Value>, hi: Option<&Value>, step: i64, len: usize) -> Result<Vec<usize>, Postponed> {
    let len_i = len as i64;
    let as_bound = |v: Option<&Value>, default: i64| -> Result<i64, Postponed> {
        match v {
            None | Some(Value::None) => Ok(default),
            Some(Value::Int(i)) => Ok(*i),
            _ => Err(Postponed(ExcKind::ValueError("slice indices must be integers".into()))),
        }
    };
    let (default_lo, default_hi) = if step > 0 { (0, len_i) } else { (len_i - 1, -1) };
    let mut start = as_bound(lo, default_lo)?;
    let mut stop = as_bound(hi, default_hi)?;
    if start < 0 {
        start = (start + len_i).max(if step > 0 { 0 } else { -1 });
    }
    if stop < 0 && !(step < 0 && hi.is_none()) {
        stop = (stop + len_i).max(if step > 0 { 0 } else { -1 });
    }
    start = start.clamp(if step > 0 { 0 } else { -1 }, if step > 0 { len_i } else { len_i - 1 });
    stop = stop.clamp(if step > 0 { 0 } else { -1 }, if step > 0 { len_i } else { len_i - 1 });

    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    Ok(out)
}

pub(super) fn eval_subscript(ev: &mut Evaluator, value: &ExprNode, index: &ExprNode, span: Span) -> EvalResult<Value> {
    let container = ev.eval_expr(value)?;
    let key = ev.eval_expr(index)?;
    get_item(ev, &container, &key, span)
}

pub(super) fn eval_slice(ev: &mut Evaluator, lower: &Option<ExprNode>, upper: &Option<ExprNode>, step: &Option<ExprNode>) -> EvalResult<Value> {
    let l = match lower {
        Some(n) => Some(Box::new(ev.eval_expr(n)?)),
        None => None,
    };
    let u = match upper {
        Some(n) => Some(Box::new(ev.eval_expr(n)?)),
        None => None,
    };
    let s = match step {
        Some(n) => Some(Box::new(ev.eval_expr(n)?)),
        None => None,
    };
    Ok(Value::Slice(l, u, s))
}

/// Attribute access: deny-list screen, then mapping-sugar, then host-object
/// read, else `NotDefined` (spec.md §4.5).
pub(super) fn eval_attribute(ev: &mut Evaluator, value: &ExprNode, attr: &str, span: Span) -> EvalResult<Value> {
    if ev.config.is_disallowed_attr(attr) {
        log::warn!("denied access to attribute '{attr}' at line {}", span.line);
        return Err(ev.raise(span, Postponed(ExcKind::FeatureNotAvailable(format!("access to attribute '{attr}' is denied")))));
    }
    let subject = ev.eval_expr(value)?;
    resolve_attribute(ev, subject, attr, span)
}

/// Resolves `attr` on an already-evaluated subject — shared by
/// [`eval_attribute`] and [`eval_call`]'s method-call fast path so the
/// receiver expression is never evaluated twice.
fn resolve_attribute(ev: &Evaluator, subject: Value, attr: &str, span: Span) -> EvalResult<Value> {
    if let Value::Map(m) = &subject {
        if let Ok(Some(v)) = m.get(&Value::Str(SafeString::new(ev.config.clone(), attr.to_string()))) {
            return Ok(v);
        }
    }
    if let Value::HostObject(obj) = &subject {
        if let Some(v) = obj.get_attr(attr) {
            return Ok(v);
        }
    }
    Err(ev.raise(span, Postponed(ExcKind::NotDefined(format!("{}.{attr}", subject.type_name())))))
}

pub(super) fn eval_fstring(ev: &mut Evaluator, parts: &[FStringPart], span: Span) -> EvalResult<Value> {
    let mut out = String::new();
    for part in parts {
        match part {
            FStringPart::Literal(s) => {
                out.push_str(s);
            }
            FStringPart::Field { value, format_spec } => {
                let v = ev.eval_expr(value)?;
                let extra = match format_spec {
                    Some(spec) => crate::fstring::validate_format_spec(spec).map_err(|e| ev.raise(value.span, e))?,
                    None => 0,
                };
                let rendered = render_field(&v, format_spec.as_deref());
                if out.chars().count() + rendered.chars().count() + extra > ev.config.max_const_len {
                    return Err(ev.raise(span, Postponed(ExcKind::Limit(crate::error::LimitKind::IterableTooLong))));
                }
                out.push_str(&rendered);
            }
        }
    }
    if out.chars().count() > ev.config.max_const_len {
        return Err(ev.raise(span, Postponed(ExcKind::Limit(crate::error::LimitKind::IterableTooLong))));
    }
    Ok(Value::Str(SafeString::new(ev.config.clone(), out)))
}

fn render_field(v: &Value, spec: Option<&str>) -> String {
    match spec {
        None | Some("") => v.to_string(),
        Some(spec) => format_with_spec(v, spec),
    }
}

/// Applies the width/precision/type subset of the format mini-language that
/// `validate_format_spec` accepts. Not a complete reimplementation of
/// CPython's formatter — only what the documented field syntax covers.
fn format_with_spec(v: &Value, spec: &str) -> String {
    let caps = match crate::fstring::format_spec_re().captures(spec) {
        Some(c) => c,
        None => return v.to_string(),
    };
    let precision: Option<usize> = caps.name("precision").and_then(|m| m.as_str().parse().ok());
    let width: usize = caps.name("width").and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let ty = caps.name("type").map(|m| m.as_str());
    let align = caps.name("align").map(|m| m.as_str());
    let fill = caps.name("fill").and_then(|m| m.as_str().chars().next()).unwrap_or(' ');

    let base = match (ty, v) {
        (Some("f") | Some("F"), Value::Float(f)) => format!("{:.*}", precision.unwrap_or(6), f),
        (Some("f") | Some("F"), Value::Int(i)) => format!("{:.*}", precision.unwrap_or(6), *i as f64),
        (Some("d"), Value::Int(i)) => i.to_string(),
        (Some("x"), Value::Int(i)) => format!("{i:x}"),
        (Some("X"), Value::Int(i)) => format!("{i:X}"),
        (Some("o"), Value::Int(i)) => format!("{i:o}"),
        (Some("b"), Value::Int(i)) => format!("{i:b}"),
        (Some("%"), Value::Float(f)) => format!("{:.*}%", precision.unwrap_or(6), f * 100.0),
        _ => v.to_string(),
    };
    let len = base.chars().count();
    if len >= width {
        return base;
    }
    let pad = width - len;
    match align {
        Some("<") => format!("{base}{}", fill.to_string().repeat(pad)),
        Some("^") => {
            let left = pad / 2;
            format!("{}{base}{}", fill.to_string().repeat(left), fill.to_string().repeat(pad - left))
        }
        _ => format!("{}{base}", fill.to_string().repeat(pad)),
    }
}

pub(super) fn eval_call(ev: &mut Evaluator, func: &ExprNode, args: &[Arg], span: Span) -> EvalResult<Value> {
    // A `Call` whose callee is an `Attribute` node needs its receiver
    // evaluated exactly once, then routed either to container method
    // dispatch (spec.md §4.3 — safe containers have no bound-method values
    // of their own) or to ordinary attribute resolution before calling.
    if let Expr::Attribute { value, attr } = &*func.kind {
        if ev.config.is_disallowed_attr(attr) {
            log::warn!("denied call to method '{attr}' at line {}", func.span.line);
            return Err(ev.raise(func.span, Postponed(ExcKind::FeatureNotAvailable(format!("access to attribute '{attr}' is denied")))));
        }
        let subject = ev.eval_expr(value)?;
        if crate::eval::methods::is_container(&subject) {
            let call_args = eval_args(ev, args)?;
            return crate::eval::methods::call_method(ev, subject, attr, call_args, span);
        }
        let callee = resolve_attribute(ev, subject, attr, func.span)?;
        let (positional, keyword) = eval_call_args(ev, args)?;
        return ev.call_value(callee, positional, keyword, span);
    }

    let callee = ev.eval_expr(func)?;
    let (positional, keyword) = eval_call_args(ev, args)?;
    ev.call_value(callee, positional, keyword, span)
}

fn eval_call_args(ev: &mut Evaluator, args: &[Arg]) -> EvalResult<(Vec<Value>, Vec<(String, Value)>)> {
    let mut positional = Vec::new();
    let mut keyword = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(e) => positional.push(ev.eval_expr(e)?),
            Arg::Starred(e) => {
                let v = ev.eval_expr(e)?;
                for item in iter_values(ev, &v, e.span)? {
                    positional.push(item);
                }
            }
            Arg::Keyword(kw) => {
                let v = ev.eval_expr(&kw.value)?;
                match &kw.name {
                    Some(name) => keyword.push((name.clone(), v)),
                    None => {
                        if let Value::Map(m) = v {
                            for (k, val) in m.borrow() {
                                if let Value::Str(s) = k {
                                    keyword.push((s.borrow().clone(), val));
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    Ok((positional, keyword))
}

/// Positional-only argument evaluation for container method calls
/// (`xs.append(4)`) — these built-in methods take no keyword arguments.
fn eval_args(ev: &mut Evaluator, args: &[Arg]) -> EvalResult<Vec<Value>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(e) => out.push(ev.eval_expr(e)?),
            Arg::Starred(e) => {
                let v = ev.eval_expr(e)?;
                out.extend(iter_values(ev, &v, e.span)?);
            }
            Arg::Keyword(kw) => {
                return Err(ev.raise(kw.value.span, Postponed(ExcKind::FeatureNotAvailable("container methods do not accept keyword arguments".into()))));
            }
        }
    }
    Ok(out)
}

/// Materializes any iterable value into a `Vec<Value>` for starred-unpacking
/// contexts, counting each step against `max_loops` (spec.md §4.6).
pub(super) fn iter_values(ev: &mut Evaluator, v: &Value, span: Span) -> EvalResult<Vec<Value>> {
    let items: Vec<Value> = match v {
        Value::Seq(s) => s.borrow().clone(),
        Value::Tuple(t) => (**t).clone(),
        Value::Set(s) => s.borrow().clone(),
        Value::Str(s) => s.borrow().chars().map(|c| Value::Str(SafeString::new(ev.config.clone(), c.to_string()))).collect(),
        Value::Map(m) => m.borrow().into_iter().map(|(k, _)| k).collect(),
        _ => return Err(ev.raise(span, Postponed(ExcKind::FeatureNotAvailable(format!("'{}' is not iterable", v.type_name()))))),
    };
    for _ in &items {
        ev.bump_loop(span)?;
    }
    Ok(items)
}

/// Builds a safe wrapper from a plain `Vec<Value>`, used for compound
/// literals (spec.md §4.6). Kept here since `SafeSet`/`SafeMapping`
/// construction can itself raise a postponed error.
pub(super) fn make_set(ev: &Evaluator, items: Vec<Value>, span: Span) -> EvalResult<Value> {
    SafeSet::new(ev.config.clone(), items).map(Value::Set).map_err(|e| ev.raise(span, e))
}

pub(super) fn make_map(ev: &Evaluator, pairs: Vec<(Value, Value)>, span: Span) -> EvalResult<Value> {
    SafeMapping::new(ev.config.clone(), pairs).map(Value::Map).map_err(|e| ev.raise(span, e))
}
