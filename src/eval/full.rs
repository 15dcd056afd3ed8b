// ABOUTME: Statement execution, assignment, control flow, functions, match,
// try/except (spec.md §4.6) — owns the `Evaluator` struct and `eval_expr`
// dispatcher that `simple.rs` and `pattern.rs` call back into.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::*;
use crate::config::Config;
use crate::containers::{approx_len_of, SafeMapping, SafeSequence, SafeString};
use crate::env::{Builtins, Env};
use crate::error::{EvalResult, ExcKind, LimitKind, Postponed, RuntimeError};
use crate::eval::{pattern, simple, Outcome};
use crate::value::{Function, FunctionBody, Value};

/// Owns all per-run mutable state: the environment, the three resource
/// counters, and the function-call stack's bookkeeping (spec.md §3
/// "Counters", §5).
pub struct Evaluator {
    pub config: Rc<Config>,
    pub builtins: Builtins,
    pub locals: Env,
    pub source: Rc<String>,
    stmts_executed: u64,
    loops_executed: u64,
    call_depth: u32,
    current_function: Option<String>,
}

impl Evaluator {
    pub fn new(config: Rc<Config>, builtins: Builtins, source: Rc<String>) -> Self {
        Self {
            config,
            builtins,
            locals: Env::new(),
            source,
            stmts_executed: 0,
            loops_executed: 0,
            call_depth: 0,
            current_function: None,
        }
    }

    pub fn reset_counters(&mut self) {
        self.stmts_executed = 0;
        self.loops_executed = 0;
        self.call_depth = 0;
    }

    pub fn stmts_executed(&self) -> u64 {
        self.stmts_executed
    }

    pub fn loops_executed(&self) -> u64 {
        self.loops_executed
    }

    pub(super) fn raise(&self, span: Span, e: Postponed) -> RuntimeError {
        log::debug!("postponed error captured at line {}: {}", span.line, e.0.type_name());
        e.at(span, &self.source)
    }

    pub(super) fn bump_stmt(&mut self, span: Span) -> EvalResult<()> {
        self.stmts_executed += 1;
        if self.stmts_executed > self.config.max_statements {
            log::warn!("statement ceiling breached at line {}", span.line);
            return Err(self.raise(span, Postponed(ExcKind::Limit(LimitKind::TooManyStatements))));
        }
        Ok(())
    }

    /// `max_loops` covers `for`/`while` iterations, comprehension generator
    /// steps, and starred-unpacking steps alike (spec.md §4.1). There is no
    /// dedicated taxonomy member for this ceiling; a breach is reported as
    /// `TooManyStatements`, the same execution-count limit kind used for the
    /// node-visit counter.
    pub(super) fn bump_loop(&mut self, span: Span) -> EvalResult<()> {
        self.loops_executed += 1;
        if self.loops_executed > self.config.max_loops {
            log::warn!("loop ceiling breached at line {}", span.line);
            return Err(self.raise(span, Postponed(ExcKind::Limit(LimitKind::TooManyStatements))));
        }
        Ok(())
    }

    // ---- expressions ----

    pub fn eval_expr(&mut self, node: &ExprNode) -> EvalResult<Value> {
        self.bump_stmt(node.span)?;
        let span = node.span;
        match node.kind.as_ref() {
            Expr::Constant(c) => Ok(simple::eval_constant(self, c)),
            Expr::Name(name) => simple::eval_name(self, name, span),
            Expr::UnaryOp(op, operand) => simple::eval_unary(self, *op, operand),
            Expr::BinOp(l, op, r) => simple::eval_binary(self, l, *op, r, span),
            Expr::BoolOp(op, values) => simple::eval_boolop(self, *op, values),
            Expr::Compare(first, rest) => simple::eval_compare(self, first, rest, span),
            Expr::IfExp { test, body, orelse } => simple::eval_ifexp(self, test, body, orelse),
            Expr::Subscript { value, index } => simple::eval_subscript(self, value, index, span),
            Expr::Slice { lower, upper, step } => simple::eval_slice(self, lower, upper, step),
            Expr::Attribute { value, attr } => simple::eval_attribute(self, value, attr, span),
            Expr::FString(parts) => simple::eval_fstring(self, parts, span),
            Expr::Call { func, args } => simple::eval_call(self, func, args, span),
            Expr::Tuple(items) => {
                let values = self.eval_starrable_items(items)?;
                let total = approx_len_of(&Value::Tuple(Rc::new(values.clone())));
                if total > self.config.max_const_len {
                    return Err(self.raise(span, Postponed(ExcKind::Limit(LimitKind::IterableTooLong))));
                }
                Ok(Value::Tuple(Rc::new(values)))
            }
            Expr::List(items) => {
                let values = self.eval_starrable_items(items)?;
                Ok(Value::Seq(SafeSequence::new(self.config.clone(), values)))
            }
            Expr::Set(items) => {
                let values = self.eval_starrable_items(items)?;
                simple::make_set(self, values, span)
            }
            Expr::Dict(items) => {
                let pairs = self.eval_dict_items(items)?;
                simple::make_map(self, pairs, span)
            }
            Expr::Lambda { params, body } => Ok(Value::Function(Rc::new(Function {
                name: "<lambda>".to_string(),
                params: params.clone(),
                body: FunctionBody::Expr(body.clone()),
                closure: self.locals.clone(),
                source: self.source.clone(),
            }))),
            Expr::ListComp { elt, generators } => self.eval_list_comp(elt, generators, span),
            Expr::SetComp { elt, generators } => self.eval_set_comp(elt, generators, span),
            Expr::DictComp { key, value, generators } => self.eval_dict_comp(key, value, generators, span),
            Expr::GeneratorExp { elt, generators } => self.eval_list_comp(elt, generators, span),
            Expr::NamedExpr { target, value } => {
                let v = self.eval_expr(value)?;
                crate::env::bind(&mut self.locals, &self.builtins, target, v.clone()).map_err(|e| self.raise(span, e))?;
                Ok(v)
            }
        }
    }

    fn eval_starrable_items(&mut self, items: &[ExprOrStarred]) -> EvalResult<Vec<Value>> {
        let mut out = Vec::new();
        let mut running_len = 1usize;
        for item in items {
            let span = item.span();
            match item {
                ExprOrStarred::Expr(e) => {
                    let v = self.eval_expr(e)?;
                    running_len += approx_len_of(&v);
                    out.push(v);
                }
                ExprOrStarred::Starred(e) => {
                    let v = self.eval_expr(e)?;
                    for v in simple::iter_values(self, &v, e.span)? {
                        running_len += approx_len_of(&v);
                        out.push(v);
                    }
                }
            }
            if running_len > self.config.max_const_len {
                return Err(self.raise(span, Postponed(ExcKind::Limit(LimitKind::IterableTooLong))));
            }
        }
        Ok(out)
    }

    fn eval_dict_items(&mut self, items: &[DictItem]) -> EvalResult<Vec<(Value, Value)>> {
        let mut out = Vec::new();
        for item in items {
            match item {
                DictItem::KeyValue(k, v) => out.push((self.eval_expr(k)?, self.eval_expr(v)?)),
                DictItem::Spread(e) => {
                    let v = self.eval_expr(e)?;
                    if let Value::Map(m) = v {
                        out.extend(m.borrow());
                    } else {
                        return Err(self.raise(e.span, Postponed(ExcKind::ValueError("argument must be a mapping".into()))));
                    }
                }
            }
        }
        Ok(out)
    }

    // ---- comprehensions ----
    //
    // A shadowed-name resolver intercepts the generator targets during
    // evaluation; it is removed in a `finally` so the outer scope is
    // undisturbed even if the body raises (spec.md §4.6 "Comprehensions").

    fn eval_list_comp(&mut self, elt: &ExprNode, gens: &[Comprehension], span: Span) -> EvalResult<Value> {
        let out = Rc::new(RefCell::new(Vec::new()));
        let running_len = Rc::new(std::cell::Cell::new(1usize));
        let max_const_len = self.config.max_const_len;
        let result = self.run_comprehension(gens, 0, &mut |ev| {
            let v = ev.eval_expr(elt)?;
            running_len.set(running_len.get() + approx_len_of(&v));
            out.borrow_mut().push(v);
            if running_len.get() > max_const_len {
                return Err(ev.raise(span, Postponed(ExcKind::Limit(LimitKind::IterableTooLong))));
            }
            Ok(())
        });
        result?;
        let values = Rc::try_unwrap(out).map(RefCell::into_inner).unwrap_or_default();
        Ok(Value::Seq(SafeSequence::new(self.config.clone(), values)))
    }

    fn eval_set_comp(&mut self, elt: &ExprNode, gens: &[Comprehension], span: Span) -> EvalResult<Value> {
        let out = Rc::new(RefCell::new(Vec::new()));
        self.run_comprehension(gens, 0, &mut |ev| {
            let v = ev.eval_expr(elt)?;
            out.borrow_mut().push(v);
            Ok(())
        })?;
        let values = Rc::try_unwrap(out).map(RefCell::into_inner).unwrap_or_default();
        simple::make_set(self, values, span)
    }

    fn eval_dict_comp(&mut self, key: &ExprNode, value: &ExprNode, gens: &[Comprehension], span: Span) -> EvalResult<Value> {
        let out = Rc::new(RefCell::new(Vec::new()));
        self.run_comprehension(gens, 0, &mut |ev| {
            let k = ev.eval_expr(key)?;
            let v = ev.eval_expr(value)?;
            out.borrow_mut().push((k, v));
            Ok(())
        })?;
        let pairs = Rc::try_unwrap(out).map(RefCell::into_inner).unwrap_or_default();
        simple::make_map(self, pairs, span)
    }

    /// Recurses over nested `for` clauses by generator index, running
    /// `emit` once per fully-bound combination. The iteration target is
    /// bound into locals for the duration of each step and removed
    /// afterward, regardless of error (spec.md §4.6).
    fn run_comprehension(&mut self, gens: &[Comprehension], idx: usize, emit: &mut dyn FnMut(&mut Self) -> EvalResult<()>) -> EvalResult<()> {
        let Some(gen) = gens.get(idx) else {
            return emit(self);
        };
        let iterable = self.eval_expr(&gen.iter)?;
        let items = simple::iter_values(self, &iterable, gen.iter.span)?;
        let target = ast_to_assign_target(&gen.target);
        let shadowed_names = target_names(&target);
        let saved: Vec<(String, Option<Value>)> = shadowed_names.iter().map(|n| (n.clone(), self.locals.get(n).cloned())).collect();

        let mut result = Ok(());
        for item in items {
            if let Err(e) = self.assign_target(&target, item, gen.target.span) {
                result = Err(e);
                break;
            }
            let mut passed = true;
            for cond in &gen.ifs {
                if !self.eval_expr(cond)?.is_truthy() {
                    passed = false;
                    break;
                }
            }
            if passed {
                if let Err(e) = self.run_comprehension(gens, idx + 1, emit) {
                    result = Err(e);
                    break;
                }
            }
        }

        for (name, prev) in saved {
            match prev {
                Some(v) => {
                    self.locals.insert(name, v);
                }
                None => {
                    self.locals.remove(&name);
                }
            }
        }
        result
    }

    // ---- statements ----

    pub fn exec_block(&mut self, stmts: &[StmtNode]) -> EvalResult<Outcome> {
        for stmt in stmts {
            let outcome = self.exec_stmt(stmt)?;
            if !outcome.is_normal() {
                return Ok(outcome);
            }
        }
        Ok(Outcome::Normal)
    }

    pub fn exec_stmt(&mut self, stmt: &StmtNode) -> EvalResult<Outcome> {
        self.bump_stmt(stmt.span)?;
        let span = stmt.span;
        match stmt.kind.as_ref() {
            Stmt::Expr(e) => {
                self.eval_expr(e)?;
                Ok(Outcome::Normal)
            }
            Stmt::Pass => Ok(Outcome::Normal),
            Stmt::Break => Ok(Outcome::Break),
            Stmt::Continue => Ok(Outcome::Continue),
            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::None,
                };
                Ok(Outcome::Return(v))
            }
            Stmt::Assign { targets, value } => {
                let v = self.eval_expr(value)?;
                for target in targets {
                    self.assign_target(target, v.clone(), span)?;
                }
                Ok(Outcome::Normal)
            }
            Stmt::AugAssign { target, op, value } => {
                let current = self.read_target(target, span)?;
                let rhs = self.eval_expr(value)?;
                let combined = crate::operators::binary(&self.config, *op, &current, &rhs).map_err(|e| self.raise(span, e))?;
                self.assign_target(target, combined, span)?;
                Ok(Outcome::Normal)
            }
            Stmt::FunctionDef { name, params, body } => {
                let func = Value::Function(Rc::new(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: FunctionBody::Block(body.clone()),
                    closure: self.locals.clone(),
                    source: self.source.clone(),
                }));
                crate::env::bind(&mut self.locals, &self.builtins, name, func).map_err(|e| self.raise(span, e))?;
                Ok(Outcome::Normal)
            }
            Stmt::If { test, body, orelse } => {
                if self.eval_expr(test)?.is_truthy() {
                    self.exec_block(body)
                } else {
                    self.exec_block(orelse)
                }
            }
            Stmt::While { test, body, orelse } => self.exec_while(test, body, orelse),
            Stmt::For { target, iter, body, orelse } => self.exec_for(target, iter, body, orelse, span),
            Stmt::Match { subject, cases } => self.exec_match(subject, cases, span),
            Stmt::Try { body, handlers, orelse, finally } => self.exec_try(body, handlers, orelse, finally),
        }
    }

    fn exec_while(&mut self, test: &ExprNode, body: &[StmtNode], orelse: &[StmtNode]) -> EvalResult<Outcome> {
        let mut broke = false;
        while self.eval_expr(test)?.is_truthy() {
            self.bump_loop(test.span)?;
            match self.exec_block(body)? {
                Outcome::Break => {
                    broke = true;
                    break;
                }
                Outcome::Continue | Outcome::Normal => {}
                ret @ Outcome::Return(_) => return Ok(ret),
            }
        }
        if !broke {
            return self.exec_block(orelse);
        }
        Ok(Outcome::Normal)
    }

    fn exec_for(&mut self, target: &AssignTarget, iter: &ExprNode, body: &[StmtNode], orelse: &[StmtNode], span: Span) -> EvalResult<Outcome> {
        let iterable = self.eval_expr(iter)?;
        let items = simple::iter_values(self, &iterable, iter.span)?;
        let mut broke = false;
        for item in items {
            self.assign_target(target, item, span)?;
            match self.exec_block(body)? {
                Outcome::Break => {
                    broke = true;
                    break;
                }
                Outcome::Continue | Outcome::Normal => {}
                ret @ Outcome::Return(_) => return Ok(ret),
            }
        }
        if !broke {
            return self.exec_block(orelse);
        }
        Ok(Outcome::Normal)
    }

    fn exec_match(&mut self, subject: &ExprNode, cases: &[MatchCase], span: Span) -> EvalResult<Outcome> {
        let value = self.eval_expr(subject)?;
        for case in cases {
            let Some(bindings) = pattern::try_match(self, &case.pattern, &value, span)? else {
                continue;
            };
            // Bindings merge into locals before the guard runs and persist
            // even if the guard fails (spec.md §9 "Guard-binding order").
            for (name, v) in bindings {
                self.locals.insert(name, v);
            }
            if let Some(guard) = &case.guard {
                if !self.eval_expr(guard)?.is_truthy() {
                    continue;
                }
            }
            return self.exec_block(&case.body);
        }
        Ok(Outcome::Normal)
    }

    fn exec_try(&mut self, body: &[StmtNode], handlers: &[ExceptHandler], orelse: &[StmtNode], finally: &[StmtNode]) -> EvalResult<Outcome> {
        let body_result = self.exec_block(body);

        let after_handlers = match body_result {
            Ok(outcome) => {
                if outcome.is_normal() {
                    self.exec_block(orelse)
                } else {
                    Ok(outcome)
                }
            }
            Err(err) if err.is_limit() => Err(err),
            Err(err) => self.run_handlers(handlers, err),
        };

        let finally_result = self.exec_block(finally);
        match finally_result {
            Ok(Outcome::Normal) => after_handlers,
            other => other,
        }
    }

    fn run_handlers(&mut self, handlers: &[ExceptHandler], err: RuntimeError) -> EvalResult<Outcome> {
        let type_name = err.kind.type_name();
        for handler in handlers {
            let matches = match &handler.type_names {
                None => true,
                Some(names) => names.iter().any(|n| n == type_name),
            };
            if matches {
                return self.exec_block(&handler.body);
            }
        }
        Err(err)
    }

    // ---- assignment ----

    fn read_target(&mut self, target: &AssignTarget, span: Span) -> EvalResult<Value> {
        match target {
            AssignTarget::Name(name) => simple::eval_name(self, name, span),
            AssignTarget::Subscript { value, index } => {
                let container = self.eval_expr(value)?;
                let key = self.eval_expr(index)?;
                simple::get_item(self, &container, &key, span)
            }
            AssignTarget::Attribute { .. } => Err(self.raise(span, Postponed(ExcKind::FeatureNotAvailable("assignment to attributes is not allowed".into())))),
            AssignTarget::Tuple(_) => Err(self.raise(span, Postponed(ExcKind::ValueError("cannot use tuple as augmented-assignment target".into())))),
        }
    }

    pub(super) fn assign_target(&mut self, target: &AssignTarget, value: Value, span: Span) -> EvalResult<()> {
        match target {
            AssignTarget::Name(name) => crate::env::bind(&mut self.locals, &self.builtins, name, value).map_err(|e| self.raise(span, e)),
            AssignTarget::Subscript { value: container_expr, index } => {
                let container = self.eval_expr(container_expr)?;
                let key = self.eval_expr(index)?;
                self.set_item(&container, key, value, span)
            }
            AssignTarget::Attribute { .. } => Err(self.raise(span, Postponed(ExcKind::FeatureNotAvailable("assignment to attributes is not allowed".into())))),
            AssignTarget::Tuple(items) => self.assign_tuple(items, value, span),
        }
    }

    fn set_item(&mut self, container: &Value, key: Value, value: Value, span: Span) -> EvalResult<()> {
        match container {
            Value::Seq(s) => {
                let idx = match key {
                    Value::Int(i) if i >= 0 => i as usize,
                    Value::Int(i) => (i + s.len() as i64).max(0) as usize,
                    _ => return Err(self.raise(span, Postponed(ExcKind::ValueError("list index must be an integer".into())))),
                };
                s.set_index(idx, value).map_err(|e| self.raise(span, e))
            }
            Value::Map(m) => m.set(key, value).map_err(|e| self.raise(span, e)),
            _ => Err(self.raise(span, Postponed(ExcKind::FeatureNotAvailable(format!("'{}' does not support item assignment", container.type_name()))))),
        }
    }

    /// Tuple/list-target unpacking, including at most one starred target
    /// (spec.md §4.6 "Assignments").
    fn assign_tuple(&mut self, targets: &[AssignTargetOrStarred], value: Value, span: Span) -> EvalResult<()> {
        let items = simple::iter_values(self, &value, span)?;
        let star_positions: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter_map(|(i, t)| matches!(t, AssignTargetOrStarred::Starred(_)).then_some(i))
            .collect();
        if star_positions.len() > 1 {
            return Err(self.raise(span, Postponed(ExcKind::SyntaxError("multiple starred expressions in assignment".into()))));
        }

        match star_positions.first() {
            None => {
                if items.len() != targets.len() {
                    return Err(self.raise(
                        span,
                        Postponed(ExcKind::ValueError(format!("expected {} values to unpack, got {}", targets.len(), items.len()))),
                    ));
                }
                for (t, v) in targets.iter().zip(items.into_iter()) {
                    let AssignTargetOrStarred::Target(t) = t else { unreachable!() };
                    self.assign_target(t, v, span)?;
                }
                Ok(())
            }
            Some(&star_at) => {
                let before = star_at;
                let after = targets.len() - star_at - 1;
                if before + after > items.len() {
                    return Err(self.raise(
                        span,
                        Postponed(ExcKind::ValueError(format!("expected at least {} values to unpack, got {}", before + after, items.len()))),
                    ));
                }
                for (t, v) in targets[..before].iter().zip(items[..before].iter()) {
                    let AssignTargetOrStarred::Target(t) = t else { unreachable!() };
                    self.assign_target(t, v.clone(), span)?;
                }
                let mid_end = items.len() - after;
                let mid = items[before..mid_end].to_vec();
                if let AssignTargetOrStarred::Starred(t) = &targets[star_at] {
                    self.assign_target(t, Value::Seq(SafeSequence::new(self.config.clone(), mid)), span)?;
                }
                for (t, v) in targets[star_at + 1..].iter().zip(items[mid_end..].iter()) {
                    let AssignTargetOrStarred::Target(t) = t else { unreachable!() };
                    self.assign_target(t, v.clone(), span)?;
                }
                Ok(())
            }
        }
    }

    // ---- calls ----

    pub(super) fn call_value(&mut self, callee: Value, args: Vec<Value>, kwargs: Vec<(String, Value)>, span: Span) -> EvalResult<Value> {
        match callee {
            Value::Function(func) => self.call_function(func, args, kwargs, span),
            Value::HostFn(f) => {
                if !kwargs.is_empty() {
                    return Err(self.raise(span, Postponed(ExcKind::FeatureNotAvailable("host functions do not accept keyword arguments".into()))));
                }
                f(&args).map_err(|msg| self.raise(span, Postponed(ExcKind::Annotated(msg))))
            }
            other => Err(self.raise(span, Postponed(ExcKind::FeatureNotAvailable(format!("'{}' object is not callable", other.type_name()))))),
        }
    }

    fn call_function(&mut self, func: Rc<Function>, args: Vec<Value>, kwargs: Vec<(String, Value)>, span: Span) -> EvalResult<Value> {
        self.call_depth += 1;
        log::trace!("entering call to {} (depth {})", func.name, self.call_depth);
        if self.call_depth > self.config.max_recursion_depth {
            self.call_depth -= 1;
            return Err(self.raise(span, Postponed(ExcKind::Limit(LimitKind::TooMuchRecursion))));
        }

        let saved_locals = std::mem::replace(&mut self.locals, func.closure.clone());
        let saved_fn = self.current_function.take();
        self.current_function = Some(func.name.clone());

        let outcome = self.bind_params(&func.params, args, kwargs, span).and_then(|()| match &func.body {
            FunctionBody::Block(stmts) => match self.exec_block(stmts) {
                Ok(Outcome::Return(v)) => Ok(v),
                Ok(Outcome::Normal) => Ok(Value::None),
                Ok(Outcome::Break) | Ok(Outcome::Continue) => {
                    Err(self.raise(span, Postponed(ExcKind::SyntaxError("'break'/'continue' not properly within a loop".into()))))
                }
                Err(e) => Err(e),
            },
            FunctionBody::Expr(e) => self.eval_expr(e),
        });

        let outcome = outcome.map_err(|e| e.tag_function(&func.name).push_frame(span));

        self.locals = saved_locals;
        self.current_function = saved_fn;
        self.call_depth -= 1;
        log::trace!("leaving call to {}", func.name);
        outcome
    }

    /// Binds `args`/`kwargs` into `self.locals` (already swapped to the
    /// callee's closure snapshot) per the five parameter kinds, in order
    /// (spec.md §4.6 step 3). Defaults are expression nodes re-evaluated on
    /// every call, against the in-progress locals — so a later default may
    /// see an earlier parameter's bound value, but never the caller's scope.
    fn bind_params(&mut self, params: &ParamSpec, args: Vec<Value>, mut kwargs: Vec<(String, Value)>, span: Span) -> EvalResult<()> {
        let mut pos = 0usize;

        for param in &params.positional_only {
            let value = if pos < args.len() {
                let v = args[pos].clone();
                pos += 1;
                v
            } else if let Some(default) = &param.default {
                self.eval_expr(default)?
            } else {
                return Err(self.raise(span, Postponed(ExcKind::ValueError(format!("missing required positional argument: '{}'", param.name)))));
            };
            self.locals.insert(param.name.clone(), value);
        }

        for param in &params.positional_or_keyword {
            let from_pos = pos < args.len();
            let from_kw = take_kw(&mut kwargs, &param.name);
            if from_pos && from_kw.is_some() {
                return Err(self.raise(span, Postponed(ExcKind::ValueError(format!("multiple values for argument '{}'", param.name)))));
            }
            let value = if from_pos {
                let v = args[pos].clone();
                pos += 1;
                v
            } else if let Some(v) = from_kw {
                v
            } else if let Some(default) = &param.default {
                self.eval_expr(default)?
            } else {
                return Err(self.raise(span, Postponed(ExcKind::ValueError(format!("missing required argument: '{}'", param.name)))));
            };
            self.locals.insert(param.name.clone(), value);
        }

        if let Some(vararg_name) = &params.vararg {
            let rest: Vec<Value> = args[pos.min(args.len())..].to_vec();
            let tup = Value::Tuple(Rc::new(rest));
            if approx_len_of(&tup) > self.config.max_const_len {
                return Err(self.raise(span, Postponed(ExcKind::Limit(LimitKind::IterableTooLong))));
            }
            self.locals.insert(vararg_name.clone(), tup);
        } else if pos < args.len() {
            return Err(self.raise(span, Postponed(ExcKind::ValueError(format!("too many positional arguments: expected {}, got {}", pos, args.len())))));
        }

        for param in &params.keyword_only {
            let value = if let Some(v) = take_kw(&mut kwargs, &param.name) {
                v
            } else if let Some(default) = &param.default {
                self.eval_expr(default)?
            } else {
                return Err(self.raise(span, Postponed(ExcKind::ValueError(format!("missing required keyword-only argument: '{}'", param.name)))));
            };
            self.locals.insert(param.name.clone(), value);
        }

        if let Some(kwarg_name) = &params.kwarg {
            let pairs: Vec<(Value, Value)> = kwargs
                .drain(..)
                .map(|(k, v)| (Value::Str(SafeString::new(self.config.clone(), k)), v))
                .collect();
            let map = SafeMapping::new(self.config.clone(), pairs).map_err(|e| self.raise(span, e))?;
            self.locals.insert(kwarg_name.clone(), Value::Map(map));
        } else if let Some((name, _)) = kwargs.first() {
            return Err(self.raise(span, Postponed(ExcKind::ValueError(format!("unexpected keyword argument: '{name}'")))));
        }

        Ok(())
    }
}

fn take_kw(kwargs: &mut Vec<(String, Value)>, name: &str) -> Option<Value> {
    let idx = kwargs.iter().position(|(n, _)| n == name)?;
    Some(kwargs.remove(idx).1)
}

/// Converts a `for`-loop or comprehension target expression (parsed as a
/// plain expression, since the grammar allows bare `a, b` without
/// parentheses) into an [`AssignTarget`].
fn ast_to_assign_target(e: &ExprNode) -> AssignTarget {
    match e.kind.as_ref() {
        Expr::Name(n) => AssignTarget::Name(n.clone()),
        Expr::Tuple(items) | Expr::List(items) => AssignTarget::Tuple(
            items
                .iter()
                .map(|i| match i {
                    ExprOrStarred::Expr(e) => AssignTargetOrStarred::Target(ast_to_assign_target(e)),
                    ExprOrStarred::Starred(e) => AssignTargetOrStarred::Starred(ast_to_assign_target(e)),
                })
                .collect(),
        ),
        Expr::Subscript { value, index } => AssignTarget::Subscript { value: value.clone(), index: index.clone() },
        _ => AssignTarget::Name("_".to_string()),
    }
}

fn target_names(target: &AssignTarget) -> Vec<String> {
    match target {
        AssignTarget::Name(n) => vec![n.clone()],
        AssignTarget::Tuple(items) => items
            .iter()
            .flat_map(|i| match i {
                AssignTargetOrStarred::Target(t) | AssignTargetOrStarred::Starred(t) => target_names(t),
            })
            .collect(),
        _ => Vec::new(),
    }
}

trait SpanOf {
    fn span(&self) -> Span;
}

impl SpanOf for ExprOrStarred {
    fn span(&self) -> Span {
        match self {
            ExprOrStarred::Expr(e) | ExprOrStarred::Starred(e) => e.span,
        }
    }
}
