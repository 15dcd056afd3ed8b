// ABOUTME: Runtime value representation for the sandboxed interpreter
//
// Grounded in examples/TrevorS-lisp-llm-sandbox/src/value.rs for the tagged-
// enum + Display idiom; containers delegate their bounds checking to
// crate::containers, which mirrors examples/original_source/draconic/types.py.

use std::fmt;
use std::rc::Rc;

use crate::ast::{ParamSpec, StmtNode};
use crate::containers::{SafeMapping, SafeSequence, SafeSet, SafeString};
use crate::env::Env;

/// A user-defined function or lambda (spec.md §3 "Callables").
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Rc<ParamSpec>,
    pub body: FunctionBody,
    /// Shallow snapshot of the name environment at definition time. Later
    /// rebinding in the enclosing scope is not visible here — see spec.md
    /// §9 "Name scopes", preserved verbatim.
    pub closure: Env,
    pub source: Rc<String>,
}

#[derive(Debug)]
pub enum FunctionBody {
    Block(Rc<Vec<StmtNode>>),
    Expr(crate::ast::ExprNode),
}

/// A host-supplied function, exposed to scripts as a builtin. Host
/// callables are never introspectable beyond being called.
pub type HostFn = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

/// An opaque value owned by the host application, reachable from scripts
/// only via attribute/subscript reads (spec.md §3). Scripts can never
/// mutate a host object or call arbitrary methods on it.
pub trait HostObject: fmt::Debug {
    fn type_name(&self) -> &str;
    fn get_attr(&self, name: &str) -> Option<Value>;
}

#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(SafeString),
    /// Immutable, heterogeneous.
    Tuple(Rc<Vec<Value>>),
    Seq(SafeSequence),
    Set(SafeSet),
    Map(SafeMapping),
    None,
    Slice(Option<Box<Value>>, Option<Box<Value>>, Option<Box<Value>>),
    Function(Rc<Function>),
    HostFn(HostFn),
    HostObject(Rc<dyn HostObject>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::Seq(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "dict",
            Value::None => "NoneType",
            Value::Slice(..) => "slice",
            Value::Function(_) => "function",
            Value::HostFn(_) => "builtin_function",
            Value::HostObject(_) => "object",
        }
    }

    /// Python-style truthiness: everything is truthy except `False`, `None`,
    /// `0`, `0.0`, and empty containers/strings.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Seq(s) => s.len() != 0,
            Value::Set(s) => s.len() != 0,
            Value::Map(m) => m.len() != 0,
            Value::None => false,
            Value::Slice(..) | Value::Function(_) | Value::HostFn(_) | Value::HostObject(_) => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::HostFn(_))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({b:?})"),
            Value::Int(i) => write!(f, "Int({i:?})"),
            Value::Float(n) => write!(f, "Float({n:?})"),
            Value::Str(s) => write!(f, "Str({:?})", s.borrow()),
            Value::Tuple(items) => write!(f, "Tuple({items:?})"),
            Value::Seq(s) => write!(f, "Seq({:?})", s.borrow()),
            Value::Set(s) => write!(f, "Set({:?})", s.borrow()),
            Value::Map(m) => write!(f, "Map({:?})", m.borrow()),
            Value::None => write!(f, "None"),
            Value::Slice(a, b, c) => write!(f, "Slice({a:?}, {b:?}, {c:?})"),
            Value::Function(func) => write!(f, "Function({:?})", func.name),
            Value::HostFn(_) => write!(f, "HostFn(..)"),
            Value::HostObject(obj) => write!(f, "HostObject({:?})", obj.type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{}", s.borrow()),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Seq(s) => {
                write!(f, "[")?;
                for (i, item) in s.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Set(s) => {
                if s.len() == 0 {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                for (i, item) in s.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::None => write!(f, "None"),
            Value::Slice(a, b, c) => write!(f, "slice({a:?}, {b:?}, {c:?})"),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::HostFn(_) => write!(f, "<builtin function>"),
            Value::HostObject(obj) => write!(f, "<{} object>", obj.type_name()),
        }
    }
}

/// Structural equality following Python's rules for the subset of types we
/// support: numeric cross-type comparison, sequence/tuple/set/mapping
/// element-wise comparison, identity comparison for callables.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => *a as f64 == *b,
            (Bool(a), Int(b)) | (Int(b), Bool(a)) => (*a as i64) == *b,
            (Str(a), Str(b)) => *a.borrow() == *b.borrow(),
            (Tuple(a), Tuple(b)) => **a == **b,
            (Seq(a), Seq(b)) => *a.borrow() == *b.borrow(),
            (Set(a), Set(b)) => a.eq_set(b),
            (Map(a), Map(b)) => a.eq_map(b),
            (None, None) => true,
            (Function(a), Function(b)) => Rc::ptr_eq(a, b),
            (HostFn(a), HostFn(b)) => Rc::ptr_eq(a, b),
            (HostObject(a), HostObject(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_python_rules() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::None.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }

    #[test]
    fn numeric_cross_type_equality() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn tuple_display_matches_python_repr() {
        let t = Value::Tuple(Rc::new(vec![Value::Int(1)]));
        assert_eq!(format!("{t}"), "(1,)");
    }
}
