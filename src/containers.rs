// ABOUTME: Bounded sequence/set/mapping/string wrappers that refuse growth past max_const_len
//
// Ported method-for-method from examples/original_source/draconic/types.py
// (`safe_list`, `safe_set`, `safe_dict`, `safe_str`, `approx_len_of`). Each
// safe_* factory there becomes a newtype here; config is captured by `Rc`
// instead of by Python closure.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::config::Config;
use crate::error::{ExcKind, Postponed};
use crate::value::Value;

fn iterable_too_long() -> Postponed {
    Postponed(ExcKind::Limit(crate::error::LimitKind::IterableTooLong))
}

fn too_long(_what: &str) -> Postponed {
    iterable_too_long()
}

/// Conservative size estimate of an arbitrary value, used uniformly as the
/// budget against `max_const_len` (spec.md §3 `approx_len`).
///
/// Primitives count as 1, strings count as their character length,
/// containers use their incrementally-maintained cache. A thread-local
/// visited set guards against cycles (`[1].append`-into-itself style
/// self-reference), mirroring the `visited` list in the original's
/// `approx_len_of`.
pub fn approx_len_of(v: &Value) -> usize {
    thread_local! {
        static VISITED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    }

    match v {
        Value::Str(s) => s.borrow().chars().count(),
        Value::Seq(s) => guarded(s.identity(), || s.approx_len()),
        Value::Set(s) => guarded(s.identity(), || s.approx_len()),
        Value::Map(m) => guarded(m.identity(), || m.approx_len()),
        Value::Tuple(items) => items.iter().map(approx_len_of).sum::<usize>() + 1,
        _ => 1,
    }
}

fn guarded(id: usize, f: impl FnOnce() -> usize) -> usize {
    thread_local! {
        static VISITED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    }
    let already = VISITED.with(|v| v.borrow().contains(&id));
    if already {
        return 0;
    }
    VISITED.with(|v| v.borrow_mut().push(id));
    let result = f();
    VISITED.with(|v| {
        v.borrow_mut().pop();
    });
    result
}

fn sum_approx(values: impl IntoIterator<Item = Value>) -> usize {
    values.into_iter().map(|v| approx_len_of(&v)).sum()
}

// ---------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------

struct SeqInner {
    data: Vec<Value>,
    approx_len: Cell<usize>,
    config: Rc<Config>,
}

#[derive(Clone)]
pub struct SafeSequence(Rc<RefCell<SeqInner>>);

impl fmt::Debug for SafeSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SafeSequence({:?})", self.0.borrow().data)
    }
}

impl SafeSequence {
    pub fn new(config: Rc<Config>, data: Vec<Value>) -> Self {
        let approx = data.iter().map(approx_len_of).sum::<usize>() + 1;
        Self(Rc::new(RefCell::new(SeqInner { data, approx_len: Cell::new(approx), config })))
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn len(&self) -> usize {
        self.0.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn approx_len(&self) -> usize {
        self.0.borrow().approx_len.get()
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, Vec<Value>> {
        std::cell::Ref::map(self.0.borrow(), |inner| &inner.data)
    }

    fn check_grow(&self, added: usize) -> Result<(), Postponed> {
        let inner = self.0.borrow();
        if inner.approx_len.get() + added > inner.config.max_const_len {
            return Err(iterable_too_long());
        }
        Ok(())
    }

    pub fn append(&self, value: Value) -> Result<(), Postponed> {
        let added = approx_len_of(&value);
        self.check_grow(added)?;
        let mut inner = self.0.borrow_mut();
        inner.data.push(value);
        inner.approx_len.set(inner.approx_len.get() + added);
        Ok(())
    }

    pub fn extend(&self, items: Vec<Value>) -> Result<(), Postponed> {
        let added = sum_approx(items.iter().cloned());
        self.check_grow(added)?;
        let mut inner = self.0.borrow_mut();
        inner.data.extend(items);
        inner.approx_len.set(inner.approx_len.get() + added);
        Ok(())
    }

    pub fn insert(&self, index: usize, value: Value) -> Result<(), Postponed> {
        let added = approx_len_of(&value);
        self.check_grow(added)?;
        let mut inner = self.0.borrow_mut();
        let index = index.min(inner.data.len());
        inner.data.insert(index, value);
        inner.approx_len.set(inner.approx_len.get() + added);
        Ok(())
    }

    pub fn pop(&self, index: Option<usize>) -> Option<Value> {
        let mut inner = self.0.borrow_mut();
        if inner.data.is_empty() {
            return None;
        }
        let idx = index.unwrap_or(inner.data.len() - 1);
        if idx >= inner.data.len() {
            return None;
        }
        let removed = inner.data.remove(idx);
        let removed_len = approx_len_of(&removed);
        inner.approx_len.set(inner.approx_len.get().saturating_sub(removed_len));
        Some(removed)
    }

    pub fn remove_value(&self, value: &Value) -> bool {
        let mut inner = self.0.borrow_mut();
        if let Some(pos) = inner.data.iter().position(|v| v == value) {
            let removed = inner.data.remove(pos);
            let removed_len = approx_len_of(&removed);
            inner.approx_len.set(inner.approx_len.get().saturating_sub(removed_len));
            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        inner.data.clear();
        inner.approx_len.set(1);
    }

    pub fn set_index(&self, index: usize, value: Value) -> Result<(), Postponed> {
        let mut inner = self.0.borrow_mut();
        if index >= inner.data.len() {
            return Err(Postponed(ExcKind::ValueError("list assignment index out of range".into())));
        }
        let old_len = approx_len_of(&inner.data[index]);
        let new_len = approx_len_of(&value);
        let candidate = inner.approx_len.get().saturating_sub(old_len) + new_len;
        if candidate > inner.config.max_const_len {
            return Err(iterable_too_long());
        }
        inner.data[index] = value;
        inner.approx_len.set(candidate);
        Ok(())
    }

    /// `[x] * n` — builds the new sequence's cached length as `n * approx_len`
    /// without re-walking elements (spec.md §4.3, ported from
    /// `SafeList.__mul__`'s JIRA-54 comment).
    pub fn repeated(&self, n: i64) -> Result<Self, Postponed> {
        let inner = self.0.borrow();
        if n <= 0 {
            return Ok(Self::new(inner.config.clone(), Vec::new()));
        }
        let new_approx = inner.approx_len.get().saturating_mul(n as usize);
        if new_approx > inner.config.max_const_len {
            return Err(iterable_too_long());
        }
        let mut data = Vec::with_capacity(inner.data.len() * n as usize);
        for _ in 0..n {
            data.extend(inner.data.iter().cloned());
        }
        let config = inner.config.clone();
        drop(inner);
        Ok(Self(Rc::new(RefCell::new(SeqInner { data, approx_len: Cell::new(new_approx), config }))))
    }

    pub fn concat(&self, other: &Self) -> Result<Self, Postponed> {
        let a = self.0.borrow();
        let b = other.0.borrow();
        let new_approx = a.approx_len.get() + b.approx_len.get();
        if new_approx > a.config.max_const_len {
            return Err(iterable_too_long());
        }
        let mut data = a.data.clone();
        data.extend(b.data.iter().cloned());
        let config = a.config.clone();
        drop(a);
        drop(b);
        Ok(Self(Rc::new(RefCell::new(SeqInner { data, approx_len: Cell::new(new_approx), config }))))
    }

    pub fn config(&self) -> Rc<Config> {
        self.0.borrow().config.clone()
    }
}

impl PartialEq for SafeSequence {
    fn eq(&self, other: &Self) -> bool {
        *self.borrow() == *other.borrow()
    }
}

// ---------------------------------------------------------------------
// Set — values must be hashable; we key on a canonical HashKey wrapper.
// ---------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Hash)]
enum HashKey {
    Bool(bool),
    Int(i64),
    FloatBits(u64),
    Str(String),
    Tuple(Vec<HashKey>),
    None,
}

fn hash_key(v: &Value) -> Result<HashKey, Postponed> {
    Ok(match v {
        Value::Bool(b) => HashKey::Bool(*b),
        Value::Int(i) => HashKey::Int(*i),
        Value::Float(f) => HashKey::FloatBits(f.to_bits()),
        Value::Str(s) => HashKey::Str(s.borrow().clone()),
        Value::Tuple(items) => {
            let mut keys = Vec::with_capacity(items.len());
            for item in items.iter() {
                keys.push(hash_key(item)?);
            }
            HashKey::Tuple(keys)
        }
        Value::None => HashKey::None,
        _ => return Err(Postponed(ExcKind::ValueError(format!("unhashable type: '{}'", v.type_name())))),
    })
}

struct SetInner {
    keys: IndexSet<HashKey>,
    values: Vec<Value>,
    config: Rc<Config>,
}

#[derive(Clone)]
pub struct SafeSet(Rc<RefCell<SetInner>>);

impl fmt::Debug for SafeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SafeSet({:?})", self.0.borrow().values)
    }
}

impl SafeSet {
    pub fn new(config: Rc<Config>, values: Vec<Value>) -> Result<Self, Postponed> {
        let set = Self(Rc::new(RefCell::new(SetInner { keys: IndexSet::new(), values: Vec::new(), config })));
        for v in values {
            set.add(v)?;
        }
        Ok(set)
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn len(&self) -> usize {
        self.0.borrow().values.len()
    }

    pub fn approx_len(&self) -> usize {
        self.0.borrow().values.iter().map(approx_len_of).sum::<usize>() + 1
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, Vec<Value>> {
        std::cell::Ref::map(self.0.borrow(), |inner| &inner.values)
    }

    pub fn contains(&self, v: &Value) -> Result<bool, Postponed> {
        let key = hash_key(v)?;
        Ok(self.0.borrow().keys.contains(&key))
    }

    pub fn add(&self, v: Value) -> Result<(), Postponed> {
        let key = hash_key(&v)?;
        let added = approx_len_of(&v);
        {
            let inner = self.0.borrow();
            if inner.keys.contains(&key) {
                return Ok(());
            }
            if self.approx_len() + added > inner.config.max_const_len {
                return Err(iterable_too_long());
            }
        }
        let mut inner = self.0.borrow_mut();
        inner.keys.insert(key);
        inner.values.push(v);
        Ok(())
    }

    pub fn remove(&self, v: &Value) -> Result<bool, Postponed> {
        let key = hash_key(v)?;
        let mut inner = self.0.borrow_mut();
        if inner.keys.shift_remove(&key) {
            if let Some(pos) = inner.values.iter().position(|item| item == v) {
                inner.values.remove(pos);
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        inner.keys.clear();
        inner.values.clear();
    }

    pub fn config(&self) -> Rc<Config> {
        self.0.borrow().config.clone()
    }

    pub fn union(&self, others: &[&SafeSet]) -> Result<Self, Postponed> {
        let total: usize = others.iter().map(|o| o.approx_len()).sum::<usize>() + self.approx_len();
        if total > self.config().max_const_len {
            return Err(iterable_too_long());
        }
        let mut out = self.borrow().clone();
        for o in others {
            out.extend(o.borrow().iter().cloned());
        }
        Self::new(self.config(), out)
    }

    pub fn intersection(&self, others: &[&SafeSet]) -> Result<Self, Postponed> {
        if others.iter().any(|o| o.approx_len() > self.config().max_const_len) {
            return Err(iterable_too_long());
        }
        let mut out: Vec<Value> = Vec::new();
        for v in self.borrow().iter() {
            let mut in_all = true;
            for o in others {
                if !o.contains(v)? {
                    in_all = false;
                    break;
                }
            }
            if in_all {
                out.push(v.clone());
            }
        }
        Self::new(self.config(), out)
    }

    pub fn symmetric_difference(&self, other: &SafeSet) -> Result<Self, Postponed> {
        let total = self.approx_len() + other.approx_len();
        if total > self.config().max_const_len {
            return Err(iterable_too_long());
        }
        let mut out: Vec<Value> = Vec::new();
        for v in self.borrow().iter() {
            if !other.contains(v)? {
                out.push(v.clone());
            }
        }
        for v in other.borrow().iter() {
            if !self.contains(v)? {
                out.push(v.clone());
            }
        }
        Self::new(self.config(), out)
    }

    /// Difference is never checked: it cannot grow the set.
    pub fn difference(&self, other: &SafeSet) -> Result<Self, Postponed> {
        let mut out = Vec::new();
        for v in self.borrow().iter() {
            if !other.contains(v)? {
                out.push(v.clone());
            }
        }
        Self::new(self.config(), out)
    }

    pub fn eq_set(&self, other: &SafeSet) -> bool {
        let a = self.0.borrow();
        let b = other.0.borrow();
        a.keys == b.keys
    }
}

// ---------------------------------------------------------------------
// Mapping — insertion-ordered, string or hashable-scalar keys.
// ---------------------------------------------------------------------

struct MapInner {
    map: IndexMap<HashKey, (Value, Value)>,
    approx_len: Cell<usize>,
    config: Rc<Config>,
}

#[derive(Clone)]
pub struct SafeMapping(Rc<RefCell<MapInner>>);

impl fmt::Debug for SafeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SafeMapping({:?})", self.0.borrow().map.values().collect::<Vec<_>>())
    }
}

impl SafeMapping {
    pub fn new(config: Rc<Config>, pairs: Vec<(Value, Value)>) -> Result<Self, Postponed> {
        let map = Self(Rc::new(RefCell::new(MapInner { map: IndexMap::new(), approx_len: Cell::new(1), config })));
        for (k, v) in pairs {
            map.set(k, v)?;
        }
        Ok(map)
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn len(&self) -> usize {
        self.0.borrow().map.len()
    }

    pub fn approx_len(&self) -> usize {
        self.0.borrow().approx_len.get()
    }

    pub fn borrow(&self) -> Vec<(Value, Value)> {
        self.0.borrow().map.values().cloned().collect()
    }

    pub fn config(&self) -> Rc<Config> {
        self.0.borrow().config.clone()
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, Postponed> {
        let k = hash_key(key)?;
        Ok(self.0.borrow().map.get(&k).map(|(_, v)| v.clone()))
    }

    pub fn set(&self, key: Value, value: Value) -> Result<(), Postponed> {
        let k = hash_key(&key)?;
        let added = approx_len_of(&key) + approx_len_of(&value);
        let mut inner = self.0.borrow_mut();
        let existing_len = inner.map.get(&k).map(|(ek, ev)| approx_len_of(ek) + approx_len_of(ev)).unwrap_or(0);
        let candidate = inner.approx_len.get() + added - existing_len;
        if candidate > inner.config.max_const_len {
            return Err(iterable_too_long());
        }
        inner.map.insert(k, (key, value));
        inner.approx_len.set(candidate);
        Ok(())
    }

    pub fn remove(&self, key: &Value) -> Result<Option<Value>, Postponed> {
        let k = hash_key(key)?;
        let mut inner = self.0.borrow_mut();
        if let Some((ek, ev)) = inner.map.shift_remove(&k) {
            let removed_len = approx_len_of(&ek) + approx_len_of(&ev);
            inner.approx_len.set(inner.approx_len.get().saturating_sub(removed_len));
            Ok(Some(ev))
        } else {
            Ok(None)
        }
    }

    pub fn update(&self, other: &SafeMapping) -> Result<(), Postponed> {
        let other_len = other.approx_len();
        {
            let inner = self.0.borrow();
            if inner.approx_len.get() + other_len > inner.config.max_const_len {
                return Err(iterable_too_long());
            }
        }
        for (k, v) in other.borrow() {
            self.set(k, v)?;
        }
        Ok(())
    }

    pub fn union(&self, other: &SafeMapping) -> Result<Self, Postponed> {
        let config = self.0.borrow().config.clone();
        let merged = Self::new(config, self.borrow())?;
        merged.update(other)?;
        Ok(merged)
    }

    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        inner.map.clear();
        inner.approx_len.set(1);
    }

    pub fn eq_map(&self, other: &SafeMapping) -> bool {
        let a = self.0.borrow();
        let b = other.0.borrow();
        if a.map.len() != b.map.len() {
            return false;
        }
        a.map.iter().all(|(k, (_, v))| b.map.get(k).map(|(_, ov)| ov == v).unwrap_or(false))
    }
}

// ---------------------------------------------------------------------
// String
// ---------------------------------------------------------------------

struct StrInner {
    data: String,
    config: Rc<Config>,
}

#[derive(Clone)]
pub struct SafeString(Rc<RefCell<StrInner>>);

impl fmt::Debug for SafeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.borrow().data)
    }
}

impl SafeString {
    pub fn new(config: Rc<Config>, data: String) -> Self {
        Self(Rc::new(RefCell::new(StrInner { data, config })))
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, String> {
        std::cell::Ref::map(self.0.borrow(), |inner| &inner.data)
    }

    pub fn config(&self) -> Rc<Config> {
        self.0.borrow().config.clone()
    }

    fn check_width(&self, width: usize) -> Result<(), Postponed> {
        if width > self.config().max_const_len {
            return Err(too_long("str"));
        }
        Ok(())
    }

    pub fn center(&self, width: usize, fill: char) -> Result<String, Postponed> {
        self.check_width(width)?;
        Ok(pad(&self.borrow(), width, fill, Pad::Center))
    }

    pub fn ljust(&self, width: usize, fill: char) -> Result<String, Postponed> {
        self.check_width(width)?;
        Ok(pad(&self.borrow(), width, fill, Pad::Left))
    }

    pub fn rjust(&self, width: usize, fill: char) -> Result<String, Postponed> {
        self.check_width(width)?;
        Ok(pad(&self.borrow(), width, fill, Pad::Right))
    }

    pub fn zfill(&self, width: usize) -> Result<String, Postponed> {
        self.check_width(width)?;
        let s = self.borrow();
        if s.len() >= width {
            return Ok(s.clone());
        }
        let (sign, rest) = match s.strip_prefix(['+', '-']) {
            Some(rest) => (&s[..1], rest),
            None => ("", s.as_str()),
        };
        Ok(format!("{sign}{}{rest}", "0".repeat(width - s.len())))
    }

    pub fn expandtabs(&self, tabsize: usize) -> Result<String, Postponed> {
        let s = self.borrow();
        let tab_count = s.matches('\t').count();
        if tab_count.saturating_mul(tabsize) > self.config().max_const_len {
            return Err(too_long("str"));
        }
        Ok(s.replace('\t', &" ".repeat(tabsize)))
    }

    pub fn replace(&self, old: &str, new: &str, count: Option<usize>) -> Result<String, Postponed> {
        let s = self.borrow();
        let n = count.unwrap_or_else(|| s.matches(old).count());
        let delta = (new.len() as i64 - old.len() as i64) * n as i64;
        let new_len_bound = s.len() as i64 + delta;
        if new_len_bound > self.config().max_const_len as i64 {
            return Err(too_long("str"));
        }
        Ok(match count {
            Some(n) => s.replacen(old, new, n),
            None => s.replace(old, new),
        })
    }

    /// `sep.join(items)`. Pre-consumes `items` so the length can be checked
    /// before any allocation (spec.md §4.3).
    pub fn join(&self, items: &[Value]) -> Result<String, Postponed> {
        let sep = self.borrow();
        let total_items_len: usize = sum_approx(items.iter().cloned());
        let budget = items.len().saturating_mul(sep.len()) + total_items_len;
        if budget > self.config().max_const_len {
            return Err(too_long("str"));
        }
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Str(s) => parts.push(s.borrow().clone()),
                other => return Err(Postponed(ExcKind::ValueError(format!("sequence item: expected str, got {}", other.type_name())))),
            }
        }
        Ok(parts.join(&sep))
    }

    pub fn translate(&self, table: &SafeMapping) -> Result<String, Postponed> {
        let s = self.borrow();
        let bound = table.approx_len().saturating_mul(s.chars().count());
        if bound > self.config().max_const_len {
            return Err(too_long("str"));
        }
        let mut out = String::with_capacity(s.len());
        'outer: for ch in s.chars() {
            for (k, v) in table.borrow() {
                let matches = match &k {
                    Value::Int(code) => char::from_u32(*code as u32) == Some(ch),
                    Value::Str(k) => k.borrow().chars().next() == Some(ch) && k.borrow().chars().count() == 1,
                    _ => false,
                };
                if matches {
                    if !v.is_none() {
                        out.push_str(&v.to_string());
                    }
                    continue 'outer;
                }
            }
            out.push(ch);
        }
        Ok(out)
    }

    /// Validates and applies `self % values` (spec.md §4.3's printf-style
    /// operator). `values` is either a single value or a tuple.
    pub fn percent_format(&self, values: &[Value]) -> Result<String, Postponed> {
        let template = self.borrow().clone();
        let re = crate::fstring::printf_template_re();
        let mut new_len_bound = template.len() as i64;
        let mut idx = 0usize;
        for caps in re.captures_iter(&template) {
            if let Some(w) = caps.name("width") {
                if w.as_str() == "*" {
                    return Err(Postponed(ExcKind::FeatureNotAvailable(
                        "Star width in printf-style formatting not allowed".into(),
                    )));
                }
                new_len_bound += w.as_str().parse::<i64>().unwrap_or(0);
            }
            if let Some(p) = caps.name("precision") {
                if p.as_str() == "*" {
                    return Err(Postponed(ExcKind::FeatureNotAvailable(
                        "Star precision in printf-style formatting not allowed".into(),
                    )));
                }
                new_len_bound += p.as_str().parse::<i64>().unwrap_or(0);
            }
            if caps.name("type").map(|m| m.as_str()) != Some("%") {
                let val = values.get(idx).cloned().unwrap_or(Value::None);
                new_len_bound += approx_len_of(&val) as i64;
                idx += 1;
            }
            if new_len_bound > self.config().max_const_len as i64 {
                return Err(too_long("str"));
            }
        }
        Ok(printf_apply(&template, values))
    }
}

impl PartialEq for SafeString {
    fn eq(&self, other: &Self) -> bool {
        *self.borrow() == *other.borrow()
    }
}

enum Pad {
    Left,
    Right,
    Center,
}

fn pad(s: &str, width: usize, fill: char, mode: Pad) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let total = width - len;
    match mode {
        Pad::Left => format!("{s}{}", fill.to_string().repeat(total)),
        Pad::Right => format!("{}{s}", fill.to_string().repeat(total)),
        Pad::Center => {
            let left = total / 2;
            let right = total - left;
            format!("{}{s}{}", fill.to_string().repeat(left), fill.to_string().repeat(right))
        }
    }
}

/// Minimal printf-style substitution for the subset validated by
/// `percent_format`'s regex walk (`%s`, `%d`, `%f`, `%%`).
fn printf_apply(template: &str, values: &[Value]) -> String {
    let mut out = String::new();
    let mut idx = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                out.push('%');
                chars.next();
            }
            _ => {
                let mut spec = String::new();
                while let Some(&n) = chars.peek() {
                    spec.push(n);
                    chars.next();
                    if n.is_alphabetic() {
                        break;
                    }
                }
                let val = values.get(idx).cloned().unwrap_or(Value::None);
                idx += 1;
                out.push_str(&val.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max_const_len: usize) -> Rc<Config> {
        let mut c = Config::default();
        c.max_const_len = max_const_len;
        Rc::new(c)
    }

    #[test]
    fn sequence_append_respects_bound() {
        let seq = SafeSequence::new(cfg(2), vec![Value::Int(1)]);
        assert!(seq.append(Value::Int(2)).is_ok());
        assert!(seq.append(Value::Int(3)).is_err());
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn sequence_repeated_does_not_walk_elements() {
        let seq = SafeSequence::new(cfg(200_000), vec![Value::Int(1)]);
        let big = seq.repeated(50_000).unwrap();
        assert_eq!(big.len(), 50_000);
        assert_eq!(big.approx_len(), 50_000);
    }

    #[test]
    fn sequence_repeated_over_bound_raises() {
        let seq = SafeSequence::new(cfg(200_000), vec![Value::Str(SafeString::new(cfg(200_000), "text".into()))]);
        assert!(seq.repeated(50_000).is_err());
    }

    #[test]
    fn set_difference_is_unchecked() {
        let c = cfg(1);
        let a = SafeSet::new(c.clone(), vec![Value::Int(1), Value::Int(2)]).unwrap();
        let b = SafeSet::new(c, vec![Value::Int(2)]).unwrap();
        let d = a.difference(&b).unwrap();
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn mapping_setitem_checks_growth() {
        let map = SafeMapping::new(cfg(3), vec![]).unwrap();
        assert!(map.set(Value::Int(1), Value::Int(1)).is_ok());
        assert!(map.set(Value::Int(2), Value::Int(2)).is_ok());
        assert!(map.set(Value::Int(3), Value::Int(3)).is_err());
    }

    #[test]
    fn string_replace_checks_bound() {
        let s = SafeString::new(cfg(10), "aaa".into());
        assert!(s.replace("a", "bb", None).is_err());
        assert!(s.replace("a", "b", None).is_ok());
    }

    #[test]
    fn string_join_checks_bound() {
        let c = cfg(10);
        let sep = SafeString::new(c.clone(), ",".into());
        let items = vec![
            Value::Str(SafeString::new(c.clone(), "ab".into())),
            Value::Str(SafeString::new(c.clone(), "cd".into())),
            Value::Str(SafeString::new(c, "ef".into())),
        ];
        assert!(sep.join(&items).is_err());
    }
}
