// ABOUTME: Arithmetic, comparison, logical, bitwise, and membership operators
//
// Idiom grounded in examples/TrevorS-lisp-llm-sandbox/src/builtins/arithmetic.rs
// and comparison.rs; the magnitude/growth checks follow spec.md §4.4, which
// in turn mirrors the bound formulas in
// examples/original_source/draconic/types.py.

use std::rc::Rc;

use crate::ast::{BinOp, CmpOp, UnaryOp};
use crate::config::Config;
use crate::containers::{approx_len_of, SafeSequence, SafeString};
use crate::error::{ExcKind, LimitKind, Postponed};
use crate::value::Value;

fn number_too_high() -> Postponed {
    Postponed(ExcKind::Limit(LimitKind::NumberTooHigh))
}

fn type_error(op: &str, a: &Value, b: &Value) -> Postponed {
    Postponed(ExcKind::FeatureNotAvailable(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    )))
}

fn check_int_magnitude(config: &Config, n: i64) -> Result<i64, Postponed> {
    let (lo, hi) = config.int_bounds();
    if n < lo || n > hi {
        return Err(number_too_high());
    }
    Ok(n)
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    }
}

fn is_float(v: &Value) -> bool {
    matches!(v, Value::Float(_))
}

pub fn unary(config: &Config, op: UnaryOp, v: &Value) -> Result<Value, Postponed> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) if as_i64(v).is_some() => {
            let negated = as_i64(v).unwrap().checked_neg().ok_or_else(number_too_high)?;
            Ok(Value::Int(check_int_magnitude(config, negated)?))
        }
        (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Pos, v) if as_i64(v).is_some() => Ok(Value::Int(as_i64(v).unwrap())),
        (UnaryOp::Invert, v) if as_i64(v).is_some() => Ok(Value::Int(!as_i64(v).unwrap())),
        _ => Err(Postponed(ExcKind::FeatureNotAvailable(format!(
            "bad operand type for unary operator: '{}'",
            v.type_name()
        )))),
    }
}

fn seq_or_str_binop(
    config: &Config,
    op: BinOp,
    a: &Value,
    b: &Value,
) -> Result<Option<Value>, Postponed> {
    match (op, a, b) {
        (BinOp::Add, Value::Seq(s1), Value::Seq(s2)) => Ok(Some(Value::Seq(s1.concat(s2)?))),
        (BinOp::Add, Value::Tuple(t1), Value::Tuple(t2)) => {
            let total = approx_len_of(a) + approx_len_of(b);
            if total > config.max_const_len {
                return Err(Postponed(ExcKind::Limit(LimitKind::IterableTooLong)));
            }
            let mut combined = (**t1).clone();
            combined.extend(t2.iter().cloned());
            Ok(Some(Value::Tuple(Rc::new(combined))))
        }
        (BinOp::Add, Value::Str(s1), Value::Str(s2)) => {
            let combined_len = s1.borrow().chars().count() + s2.borrow().chars().count();
            if combined_len > config.max_const_len {
                return Err(Postponed(ExcKind::Limit(LimitKind::IterableTooLong)));
            }
            Ok(Some(Value::Str(SafeString::new(
                Rc::new(config.clone()),
                format!("{}{}", s1.borrow(), s2.borrow()),
            ))))
        }
        (BinOp::Mul, Value::Seq(s), other) | (BinOp::Mul, other, Value::Seq(s)) => {
            let n = as_i64(other).ok_or_else(|| type_error("*", a, b))?;
            Ok(Some(Value::Seq(s.repeated(n)?)))
        }
        (BinOp::Mul, Value::Str(s), other) | (BinOp::Mul, other, Value::Str(s)) => {
            let n = as_i64(other).ok_or_else(|| type_error("*", a, b))?;
            let n = n.max(0) as usize;
            let len = s.borrow().chars().count().saturating_mul(n);
            if len > config.max_const_len {
                return Err(Postponed(ExcKind::Limit(LimitKind::IterableTooLong)));
            }
            Ok(Some(Value::Str(SafeString::new(Rc::new(config.clone()), s.borrow().repeat(n)))))
        }
        (BinOp::Mod, Value::Str(s), other) => {
            let values = match other {
                Value::Tuple(t) => (**t).clone(),
                v => vec![v.clone()],
            };
            Ok(Some(Value::Str(SafeString::new(Rc::new(config.clone()), s.percent_format(&values)?))))
        }
        _ => Ok(None),
    }
}

pub fn binary(config: &Config, op: BinOp, a: &Value, b: &Value) -> Result<Value, Postponed> {
    if let Some(v) = seq_or_str_binop(config, op, a, b)? {
        return Ok(v);
    }

    if op == BinOp::Pow {
        let base = as_f64(a).ok_or_else(|| type_error("**", a, b))?;
        let exp = as_f64(b).ok_or_else(|| type_error("**", a, b))?;
        if base.abs() > config.max_power_base as f64 || exp.abs() > config.max_power as f64 {
            return Err(number_too_high());
        }
        if is_float(a) || is_float(b) {
            return Ok(Value::Float(base.powf(exp)));
        }
        let result = (base.powf(exp)).round() as i64;
        return Ok(Value::Int(check_int_magnitude(config, result)?));
    }

    if op == BinOp::LShift {
        let n = as_i64(a).ok_or_else(|| type_error("<<", a, b))?;
        let shift = as_i64(b).ok_or_else(|| type_error("<<", a, b))?;
        if shift < 0 || shift as u32 >= config.max_int_size.saturating_sub(1) {
            return Err(number_too_high());
        }
        let result = n.checked_shl(shift as u32).ok_or_else(number_too_high)?;
        return Ok(Value::Int(check_int_magnitude(config, result)?));
    }

    if is_float(a) || is_float(b) {
        let x = as_f64(a).ok_or_else(|| type_error(op_symbol(op), a, b))?;
        let y = as_f64(b).ok_or_else(|| type_error(op_symbol(op), a, b))?;
        return float_binop(op, x, y);
    }

    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return int_binop(config, op, x, y);
    }

    Err(type_error(op_symbol(op), a, b))
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
        BinOp::LShift => "<<",
        BinOp::RShift => ">>",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::BitAnd => "&",
    }
}

fn float_binop(op: BinOp, x: f64, y: f64) -> Result<Value, Postponed> {
    Ok(Value::Float(match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(Postponed(ExcKind::ValueError("division by zero".into())));
            }
            x / y
        }
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Mod => x.rem_euclid(y),
        _ => return Err(Postponed(ExcKind::FeatureNotAvailable("unsupported float operator".into()))),
    }))
}

fn int_binop(config: &Config, op: BinOp, x: i64, y: i64) -> Result<Value, Postponed> {
    let result = match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Sub => x.checked_sub(y),
        BinOp::Mul => x.checked_mul(y),
        BinOp::Div => {
            if y == 0 {
                return Err(Postponed(ExcKind::ValueError("division by zero".into())));
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(Postponed(ExcKind::ValueError("division by zero".into())));
            }
            if x == i64::MIN && y == -1 {
                return Err(number_too_high());
            }
            Some(x.div_euclid(y))
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(Postponed(ExcKind::ValueError("division by zero".into())));
            }
            if x == i64::MIN && y == -1 {
                return Err(number_too_high());
            }
            Some(x.rem_euclid(y))
        }
        BinOp::RShift => Some(x >> y.clamp(0, 63)),
        BinOp::BitOr => Some(x | y),
        BinOp::BitXor => Some(x ^ y),
        BinOp::BitAnd => Some(x & y),
        BinOp::Pow | BinOp::LShift => unreachable!("handled by caller"),
    };
    let result = result.ok_or_else(number_too_high)?;
    Ok(Value::Int(check_int_magnitude(config, result)?))
}

fn order(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.borrow().partial_cmp(&*y.borrow()),
        (Value::Seq(x), Value::Seq(y)) => x.borrow().iter().partial_cmp_by(y.borrow().iter(), |l, r| order(l, r)),
        (Value::Tuple(x), Value::Tuple(y)) => x.iter().partial_cmp_by(y.iter(), |l, r| order(l, r)),
        _ => {
            let x = as_f64(a)?;
            let y = as_f64(b)?;
            x.partial_cmp(&y)
        }
    }
}

/// Iterator helper: lexicographic comparison using a custom element
/// comparator, since `Value` has no total order.
trait PartialCmpBy: Iterator + Sized {
    fn partial_cmp_by<J: Iterator<Item = Self::Item>>(
        self,
        other: J,
        mut cmp: impl FnMut(&Self::Item, &Self::Item) -> Option<std::cmp::Ordering>,
    ) -> Option<std::cmp::Ordering> {
        let mut a = self;
        let mut b = other;
        loop {
            match (a.next(), b.next()) {
                (None, None) => return Some(std::cmp::Ordering::Equal),
                (None, Some(_)) => return Some(std::cmp::Ordering::Less),
                (Some(_), None) => return Some(std::cmp::Ordering::Greater),
                (Some(x), Some(y)) => match cmp(&x, &y)? {
                    std::cmp::Ordering::Equal => continue,
                    other => return Some(other),
                },
            }
        }
    }
}
impl<T: Iterator> PartialCmpBy for T {}

pub fn compare_one(op: CmpOp, a: &Value, b: &Value) -> Result<bool, Postponed> {
    Ok(match op {
        CmpOp::Eq => a == b,
        CmpOp::NotEq => a != b,
        CmpOp::Lt => order(a, b).ok_or_else(|| type_error("<", a, b))?.is_lt(),
        CmpOp::LtE => order(a, b).ok_or_else(|| type_error("<=", a, b))?.is_le(),
        CmpOp::Gt => order(a, b).ok_or_else(|| type_error(">", a, b))?.is_gt(),
        CmpOp::GtE => order(a, b).ok_or_else(|| type_error(">=", a, b))?.is_ge(),
        CmpOp::In => membership(a, b)?,
        CmpOp::NotIn => !membership(a, b)?,
    })
}

fn membership(item: &Value, container: &Value) -> Result<bool, Postponed> {
    Ok(match container {
        Value::Seq(s) => s.borrow().iter().any(|v| v == item),
        Value::Tuple(t) => t.iter().any(|v| v == item),
        Value::Set(s) => s.contains(item)?,
        Value::Map(m) => m.get(item)?.is_some(),
        Value::Str(s) => match item {
            Value::Str(needle) => s.borrow().contains(needle.borrow().as_str()),
            _ => return Err(type_error("in", item, container)),
        },
        _ => return Err(type_error("in", item, container)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_add_checks_magnitude() {
        let mut c = Config::default();
        c.max_int_size = 8;
        let r = binary(&c, BinOp::Add, &Value::Int(120), &Value::Int(100));
        assert!(matches!(r, Err(Postponed(ExcKind::Limit(LimitKind::NumberTooHigh)))));
    }

    #[test]
    fn power_refuses_large_base() {
        let mut c = Config::default();
        c.max_power_base = 100;
        let r = binary(&c, BinOp::Pow, &Value::Int(101), &Value::Int(2));
        assert!(matches!(r, Err(Postponed(ExcKind::Limit(LimitKind::NumberTooHigh)))));
    }

    #[test]
    fn chained_comparison_links_use_the_same_value() {
        // a < b < c relies on the evaluator reusing `b`; this only checks the
        // per-link operator here.
        assert!(compare_one(CmpOp::Lt, &Value::Int(1), &Value::Int(2)).unwrap());
        assert!(compare_one(CmpOp::Lt, &Value::Int(2), &Value::Int(3)).unwrap());
    }

    #[test]
    fn division_by_zero_is_a_value_error_not_a_panic() {
        let c = Config::default();
        let r = binary(&c, BinOp::Div, &Value::Int(1), &Value::Int(0));
        assert!(matches!(r, Err(Postponed(ExcKind::ValueError(_)))));
    }
}
