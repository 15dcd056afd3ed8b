// ABOUTME: `match`/`case` pattern matching (spec.md §4.6)
//
// Implements the seven pattern kinds the grammar supports, including the two
// documented deviations from the reference language: guard-failure does not
// roll back bindings (spec.md §9 "Guard-binding order"), and `match_or`
// branches are not required to bind the same names (spec.md §9 "Open
// question — match-or binding coherence").

use std::collections::HashMap;

use crate::ast::{Constant, Pattern, Span};
use crate::containers::{SafeMapping, SafeSequence};
use crate::error::{EvalResult, ExcKind, Postponed};
use crate::eval::full::Evaluator;
use crate::value::Value;

pub(super) fn try_match(ev: &mut Evaluator, pattern: &Pattern, subject: &Value, span: Span) -> EvalResult<Option<HashMap<String, Value>>> {
    let mut bindings = HashMap::new();
    if match_pattern(ev, pattern, subject, &mut bindings, span)? {
        Ok(Some(bindings))
    } else {
        Ok(None)
    }
}

fn bind_name(bindings: &mut HashMap<String, Value>, name: &str, v: Value) -> Result<(), Postponed> {
    if name == "_" {
        return Ok(());
    }
    if bindings.contains_key(name) {
        return Err(Postponed(ExcKind::ValueError(format!("multiple assignments to name '{name}' in pattern"))));
    }
    bindings.insert(name.to_string(), v);
    Ok(())
}

fn match_pattern(ev: &mut Evaluator, pattern: &Pattern, subject: &Value, bindings: &mut HashMap<String, Value>, span: Span) -> EvalResult<bool> {
    match pattern {
        Pattern::MatchValue(expr) => {
            let v = ev.eval_expr(expr)?;
            Ok(v == *subject)
        }
        Pattern::MatchSingleton(c) => Ok(match (c, subject) {
            (Constant::Bool(b), Value::Bool(x)) => b == x,
            (Constant::None, Value::None) => true,
            _ => false,
        }),
        Pattern::MatchSequence(pats) => match_sequence(ev, pats, subject, bindings, span),
        Pattern::MatchStar(name) => {
            if let Some(name) = name {
                bind_name(bindings, name, subject.clone()).map_err(|e| ev.raise(span, e))?;
            }
            Ok(true)
        }
        Pattern::MatchMapping { keys, patterns, rest } => match_mapping(ev, keys, patterns, rest, subject, bindings, span),
        Pattern::MatchAs { pattern, name } => {
            let inner_ok = match pattern {
                Some(p) => match_pattern(ev, p, subject, bindings, span)?,
                None => true,
            };
            if inner_ok {
                if let Some(name) = name {
                    bind_name(bindings, name, subject.clone()).map_err(|e| ev.raise(span, e))?;
                }
            }
            Ok(inner_ok)
        }
        Pattern::MatchOr(alts) => {
            for alt in alts {
                let mut trial = bindings.clone();
                if match_pattern(ev, alt, subject, &mut trial, span)? {
                    *bindings = trial;
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn match_sequence(ev: &mut Evaluator, pats: &[Pattern], subject: &Value, bindings: &mut HashMap<String, Value>, span: Span) -> EvalResult<bool> {
    let items: Vec<Value> = match subject {
        Value::Seq(s) => s.borrow().clone(),
        Value::Tuple(t) => (**t).clone(),
        _ => return Ok(false),
    };

    let star_idx = pats.iter().position(|p| matches!(p, Pattern::MatchStar(_)));
    match star_idx {
        None => {
            if items.len() != pats.len() {
                return Ok(false);
            }
            for (p, v) in pats.iter().zip(items.iter()) {
                if !match_pattern(ev, p, v, bindings, span)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Some(star_at) => {
            let before = &pats[..star_at];
            let after = &pats[star_at + 1..];
            if before.len() + after.len() > items.len() {
                return Ok(false);
            }
            for (p, v) in before.iter().zip(items.iter()) {
                if !match_pattern(ev, p, v, bindings, span)? {
                    return Ok(false);
                }
            }
            let mid_end = items.len() - after.len();
            let mid: Vec<Value> = items[before.len()..mid_end].to_vec();
            if let Pattern::MatchStar(Some(name)) = &pats[star_at] {
                let seq = SafeSequence::new(ev.config.clone(), mid);
                bind_name(bindings, name, Value::Seq(seq)).map_err(|e| ev.raise(span, e))?;
            }
            for (p, v) in after.iter().zip(items[mid_end..].iter()) {
                if !match_pattern(ev, p, v, bindings, span)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn match_mapping(
    ev: &mut Evaluator,
    keys: &[crate::ast::ExprNode],
    patterns: &[Pattern],
    rest: &Option<String>,
    subject: &Value,
    bindings: &mut HashMap<String, Value>,
    span: Span,
) -> EvalResult<bool> {
    let map = match subject {
        Value::Map(m) => m.clone(),
        _ => return Ok(false),
    };
    let mut used_keys = Vec::new();
    for (key_expr, pat) in keys.iter().zip(patterns.iter()) {
        let key = ev.eval_expr(key_expr)?;
        let value = match map.get(&key).map_err(|e| ev.raise(span, e))? {
            Some(v) => v,
            None => return Ok(false),
        };
        if !match_pattern(ev, pat, &value, bindings, span)? {
            return Ok(false);
        }
        used_keys.push(key);
    }
    if let Some(rest_name) = rest {
        let remaining: Vec<(Value, Value)> = map.borrow().into_iter().filter(|(k, _)| !used_keys.contains(k)).collect();
        let m2 = SafeMapping::new(ev.config.clone(), remaining).map_err(|e| ev.raise(span, e))?;
        bind_name(bindings, rest_name, Value::Map(m2)).map_err(|e| ev.raise(span, e))?;
    }
    Ok(true)
}
