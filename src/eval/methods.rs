// ABOUTME: Instance-method dispatch for the safe containers (spec.md §4.3 —
// append/extend/insert/pop/remove/clear on sequences, add/union/intersection
// etc. on sets, update/get/pop on mappings, center/ljust/replace/join/...
// on strings). `eval_attribute` only resolves *data* attributes (dict-sugar,
// host objects); a `Call` whose callee is an `Attribute` node on a Seq/Set/
// Map/Str routes here instead, since these containers have no bound-method
// values of their own — the method name is matched directly against the
// call site.

use std::rc::Rc;

use crate::ast::Span;
use crate::containers::{SafeMapping, SafeSequence, SafeSet, SafeString};
use crate::error::{EvalResult, ExcKind, Postponed};
use crate::eval::full::Evaluator;
use crate::value::Value;

/// True when `receiver` is one of the safe container kinds this module
/// knows how to dispatch methods on. Used by `eval_call` to decide whether
/// to route here instead of through generic attribute-then-call.
pub(super) fn is_container(receiver: &Value) -> bool {
    matches!(receiver, Value::Seq(_) | Value::Set(_) | Value::Map(_) | Value::Str(_) | Value::Tuple(_))
}

pub(super) fn call_method(ev: &mut Evaluator, receiver: Value, name: &str, args: Vec<Value>, span: Span) -> EvalResult<Value> {
    match receiver {
        Value::Seq(seq) => sequence_method(ev, &seq, name, args, span),
        Value::Tuple(t) => tuple_method(ev, &t, name, args, span),
        Value::Set(set) => set_method(ev, &set, name, args, span),
        Value::Map(map) => mapping_method(ev, &map, name, args, span),
        Value::Str(s) => string_method(ev, &s, name, args, span),
        other => Err(ev.raise(span, Postponed(ExcKind::NotDefined(format!("{}.{name}", other.type_name()))))),
    }
}

fn no_such_method(receiver: &str, name: &str) -> Postponed {
    Postponed(ExcKind::NotDefined(format!("{receiver}.{name}")))
}

fn wrong_args(name: &str) -> Postponed {
    Postponed(ExcKind::ValueError(format!("wrong number or type of arguments for '{name}'")))
}

fn want_int(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        _ => None,
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx < 0 || idx as usize > len {
        None
    } else {
        Some(idx as usize)
    }
}

fn sequence_method(ev: &mut Evaluator, seq: &SafeSequence, name: &str, mut args: Vec<Value>, span: Span) -> EvalResult<Value> {
    match name {
        "append" if args.len() == 1 => {
            seq.append(args.remove(0)).map_err(|e| ev.raise(span, e))?;
            Ok(Value::None)
        }
        "extend" if args.len() == 1 => {
            let items = crate::eval::simple::iter_values(ev, &args[0], span)?;
            seq.extend(items).map_err(|e| ev.raise(span, e))?;
            Ok(Value::None)
        }
        "insert" if args.len() == 2 => {
            let idx = want_int(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let idx = normalize_index(idx, seq.len()).ok_or_else(|| ev.raise(span, Postponed(ExcKind::ValueError("insert index out of range".into()))))?;
            seq.insert(idx, args.remove(1)).map_err(|e| ev.raise(span, e))?;
            Ok(Value::None)
        }
        "pop" if args.is_empty() => seq
            .pop(None)
            .ok_or_else(|| ev.raise(span, Postponed(ExcKind::ValueError("pop from empty list".into())))),
        "pop" if args.len() == 1 => {
            let raw = want_int(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let len = seq.len();
            let idx = if raw < 0 { raw + len as i64 } else { raw };
            if idx < 0 || idx as usize >= len {
                return Err(ev.raise(span, Postponed(ExcKind::ValueError("pop index out of range".into()))));
            }
            Ok(seq.pop(Some(idx as usize)).unwrap_or(Value::None))
        }
        "remove" if args.len() == 1 => {
            if seq.remove_value(&args[0]) {
                Ok(Value::None)
            } else {
                Err(ev.raise(span, Postponed(ExcKind::ValueError("value not found in list".into()))))
            }
        }
        "clear" if args.is_empty() => {
            seq.clear();
            Ok(Value::None)
        }
        "index" if args.len() == 1 => seq
            .borrow()
            .iter()
            .position(|v| *v == args[0])
            .map(|i| Value::Int(i as i64))
            .ok_or_else(|| ev.raise(span, Postponed(ExcKind::ValueError("value not found in list".into())))),
        "count" if args.len() == 1 => Ok(Value::Int(seq.borrow().iter().filter(|v| **v == args[0]).count() as i64)),
        "copy" if args.is_empty() => Ok(Value::Seq(SafeSequence::new(seq.config(), seq.borrow().clone()))),
        _ => Err(ev.raise(span, no_such_method("list", name))),
    }
}

fn tuple_method(ev: &mut Evaluator, t: &Rc<Vec<Value>>, name: &str, args: Vec<Value>, span: Span) -> EvalResult<Value> {
    match name {
        "index" if args.len() == 1 => t
            .iter()
            .position(|v| *v == args[0])
            .map(|i| Value::Int(i as i64))
            .ok_or_else(|| ev.raise(span, Postponed(ExcKind::ValueError("value not found in tuple".into())))),
        "count" if args.len() == 1 => Ok(Value::Int(t.iter().filter(|v| **v == args[0]).count() as i64)),
        _ => Err(ev.raise(span, no_such_method("tuple", name))),
    }
}

fn set_method(ev: &mut Evaluator, set: &SafeSet, name: &str, args: Vec<Value>, span: Span) -> EvalResult<Value> {
    let as_set = |ev: &mut Evaluator, v: &Value, span: Span| -> EvalResult<SafeSet> {
        match v {
            Value::Set(s) => Ok(s.clone()),
            other => {
                let items = crate::eval::simple::iter_values(ev, other, span)?;
                SafeSet::new(set.config(), items).map_err(|e| ev.raise(span, e))
            }
        }
    };
    match name {
        "add" if args.len() == 1 => {
            set.add(args.into_iter().next().unwrap()).map_err(|e| ev.raise(span, e))?;
            Ok(Value::None)
        }
        "remove" if args.len() == 1 => match set.remove(&args[0]).map_err(|e| ev.raise(span, e))? {
            true => Ok(Value::None),
            false => Err(ev.raise(span, Postponed(ExcKind::ValueError("value not found in set".into())))),
        },
        "discard" if args.len() == 1 => {
            set.remove(&args[0]).map_err(|e| ev.raise(span, e))?;
            Ok(Value::None)
        }
        "clear" if args.is_empty() => {
            set.clear();
            Ok(Value::None)
        }
        "union" => {
            let mut others = Vec::new();
            for a in &args {
                others.push(as_set(ev, a, span)?);
            }
            let refs: Vec<&SafeSet> = others.iter().collect();
            set.union(&refs).map(Value::Set).map_err(|e| ev.raise(span, e))
        }
        "intersection" => {
            let mut others = Vec::new();
            for a in &args {
                others.push(as_set(ev, a, span)?);
            }
            let refs: Vec<&SafeSet> = others.iter().collect();
            set.intersection(&refs).map(Value::Set).map_err(|e| ev.raise(span, e))
        }
        "difference" if args.len() == 1 => {
            let other = as_set(ev, &args[0], span)?;
            set.difference(&other).map(Value::Set).map_err(|e| ev.raise(span, e))
        }
        "symmetric_difference" if args.len() == 1 => {
            let other = as_set(ev, &args[0], span)?;
            set.symmetric_difference(&other).map(Value::Set).map_err(|e| ev.raise(span, e))
        }
        "update" if args.len() == 1 => {
            let other = as_set(ev, &args[0], span)?;
            for v in other.borrow().iter() {
                set.add(v.clone()).map_err(|e| ev.raise(span, e))?;
            }
            Ok(Value::None)
        }
        "intersection_update" if args.len() == 1 => {
            let other = as_set(ev, &args[0], span)?;
            let kept = set.intersection(&[&other]).map_err(|e| ev.raise(span, e))?;
            set.clear();
            for v in kept.borrow().iter() {
                set.add(v.clone()).map_err(|e| ev.raise(span, e))?;
            }
            Ok(Value::None)
        }
        "symmetric_difference_update" if args.len() == 1 => {
            let other = as_set(ev, &args[0], span)?;
            let next = set.symmetric_difference(&other).map_err(|e| ev.raise(span, e))?;
            set.clear();
            for v in next.borrow().iter() {
                set.add(v.clone()).map_err(|e| ev.raise(span, e))?;
            }
            Ok(Value::None)
        }
        "copy" if args.is_empty() => SafeSet::new(set.config(), set.borrow().clone()).map(Value::Set).map_err(|e| ev.raise(span, e)),
        _ => Err(ev.raise(span, no_such_method("set", name))),
    }
}

fn mapping_method(ev: &mut Evaluator, map: &SafeMapping, name: &str, mut args: Vec<Value>, span: Span) -> EvalResult<Value> {
    match name {
        "get" if args.len() == 1 => Ok(map.get(&args[0]).map_err(|e| ev.raise(span, e))?.unwrap_or(Value::None)),
        "get" if args.len() == 2 => Ok(map.get(&args[0]).map_err(|e| ev.raise(span, e))?.unwrap_or_else(|| args.remove(1))),
        "pop" if args.len() == 1 => map
            .remove(&args[0])
            .map_err(|e| ev.raise(span, e))?
            .ok_or_else(|| ev.raise(span, Postponed(ExcKind::ValueError("key not found".into())))),
        "pop" if args.len() == 2 => Ok(map.remove(&args[0]).map_err(|e| ev.raise(span, e))?.unwrap_or_else(|| args.remove(1))),
        "setdefault" if args.len() == 2 => {
            if let Some(v) = map.get(&args[0]).map_err(|e| ev.raise(span, e))? {
                return Ok(v);
            }
            let value = args.remove(1);
            let key = args.remove(0);
            map.set(key, value.clone()).map_err(|e| ev.raise(span, e))?;
            Ok(value)
        }
        "update" if args.len() == 1 => {
            let other = match &args[0] {
                Value::Map(m) => m.clone(),
                _ => return Err(ev.raise(span, wrong_args(name))),
            };
            map.update(&other).map_err(|e| ev.raise(span, e))?;
            Ok(Value::None)
        }
        "clear" if args.is_empty() => {
            map.clear();
            Ok(Value::None)
        }
        "keys" if args.is_empty() => Ok(Value::Seq(SafeSequence::new(
            map.config(),
            map.borrow().into_iter().map(|(k, _)| k).collect(),
        ))),
        "values" if args.is_empty() => Ok(Value::Seq(SafeSequence::new(
            map.config(),
            map.borrow().into_iter().map(|(_, v)| v).collect(),
        ))),
        "items" if args.is_empty() => {
            let items = map
                .borrow()
                .into_iter()
                .map(|(k, v)| Value::Tuple(Rc::new(vec![k, v])))
                .collect();
            Ok(Value::Seq(SafeSequence::new(map.config(), items)))
        }
        "copy" if args.is_empty() => SafeMapping::new(map.config(), map.borrow())
            .map(Value::Map)
            .map_err(|e| ev.raise(span, e)),
        _ => Err(ev.raise(span, no_such_method("dict", name))),
    }
}

fn string_method(ev: &mut Evaluator, s: &SafeString, name: &str, args: Vec<Value>, span: Span) -> EvalResult<Value> {
    let cfg = s.config();
    let as_str = |v: &Value| -> Option<String> {
        match v {
            Value::Str(s) => Some(s.borrow().clone()),
            _ => None,
        }
    };
    match name {
        "center" if args.len() == 1 || args.len() == 2 => {
            let width = want_int(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let fill = args.get(1).and_then(as_str).and_then(|s| s.chars().next()).unwrap_or(' ');
            s.center(width.max(0) as usize, fill).map(str_value(&cfg)).map_err(|e| ev.raise(span, e))
        }
        "ljust" if args.len() == 1 || args.len() == 2 => {
            let width = want_int(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let fill = args.get(1).and_then(as_str).and_then(|s| s.chars().next()).unwrap_or(' ');
            s.ljust(width.max(0) as usize, fill).map(str_value(&cfg)).map_err(|e| ev.raise(span, e))
        }
        "rjust" if args.len() == 1 || args.len() == 2 => {
            let width = want_int(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let fill = args.get(1).and_then(as_str).and_then(|s| s.chars().next()).unwrap_or(' ');
            s.rjust(width.max(0) as usize, fill).map(str_value(&cfg)).map_err(|e| ev.raise(span, e))
        }
        "zfill" if args.len() == 1 => {
            let width = want_int(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            s.zfill(width.max(0) as usize).map(str_value(&cfg)).map_err(|e| ev.raise(span, e))
        }
        "expandtabs" if args.len() <= 1 => {
            let tabsize = args.first().and_then(want_int).unwrap_or(8);
            s.expandtabs(tabsize.max(0) as usize).map(str_value(&cfg)).map_err(|e| ev.raise(span, e))
        }
        "replace" if args.len() == 2 || args.len() == 3 => {
            let old = as_str(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let new = as_str(&args[1]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let count = args.get(2).and_then(want_int).map(|n| n.max(0) as usize);
            s.replace(&old, &new, count).map(str_value(&cfg)).map_err(|e| ev.raise(span, e))
        }
        "join" if args.len() == 1 => {
            let items = crate::eval::simple::iter_values(ev, &args[0], span)?;
            s.join(&items).map(str_value(&cfg)).map_err(|e| ev.raise(span, e))
        }
        "translate" if args.len() == 1 => match &args[0] {
            Value::Map(table) => s.translate(table).map(str_value(&cfg)).map_err(|e| ev.raise(span, e)),
            _ => Err(ev.raise(span, wrong_args(name))),
        },
        "encode" | "format" | "format_map" => {
            Err(ev.raise(span, Postponed(ExcKind::FeatureNotAvailable(format!("str.{name} is not available")))))
        }
        "upper" if args.is_empty() => Ok(str_value(&cfg)(s.borrow().to_uppercase())),
        "lower" if args.is_empty() => Ok(str_value(&cfg)(s.borrow().to_lowercase())),
        "strip" if args.is_empty() => Ok(str_value(&cfg)(s.borrow().trim().to_string())),
        "lstrip" if args.is_empty() => Ok(str_value(&cfg)(s.borrow().trim_start().to_string())),
        "rstrip" if args.is_empty() => Ok(str_value(&cfg)(s.borrow().trim_end().to_string())),
        "split" if args.is_empty() => {
            let items = s.borrow().split_whitespace().map(|piece| Value::Str(SafeString::new(cfg.clone(), piece.to_string()))).collect();
            Ok(Value::Seq(SafeSequence::new(cfg, items)))
        }
        "split" if args.len() == 1 => {
            let sep = as_str(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let items = s.borrow().split(sep.as_str()).map(|piece| Value::Str(SafeString::new(cfg.clone(), piece.to_string()))).collect();
            Ok(Value::Seq(SafeSequence::new(cfg, items)))
        }
        "startswith" if args.len() == 1 => {
            let prefix = as_str(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            Ok(Value::Bool(s.borrow().starts_with(prefix.as_str())))
        }
        "endswith" if args.len() == 1 => {
            let suffix = as_str(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            Ok(Value::Bool(s.borrow().ends_with(suffix.as_str())))
        }
        "find" if args.len() == 1 => {
            let needle = as_str(&args[0]).ok_or_else(|| ev.raise(span, wrong_args(name)))?;
            let chars: Vec<char> = s.borrow().chars().collect();
            let hay: String = chars.iter().collect();
            Ok(Value::Int(hay.find(needle.as_str()).map(|byte| hay[..byte].chars().count() as i64).unwrap_or(-1)))
        }
        _ => Err(ev.raise(span, no_such_method("str", name))),
    }
}

fn str_value(cfg: &Rc<crate::config::Config>) -> impl Fn(String) -> Value + '_ {
    move |s| Value::Str(SafeString::new(cfg.clone(), s))
}
