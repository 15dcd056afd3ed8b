// ABOUTME: Recursive-descent parser producing the evaluator's AST
//
// This module is a minimal reference implementation of the host-language
// parser that spec.md §2 treats as an external collaborator — real
// deployments are expected to bring their own (or reuse an existing Python
// grammar crate) and hand the evaluator an `ast::StmtNode` tree directly.
// It exists here only so `Interpreter::eval`/`execute`/`execute_module` have
// something to parse source strings with, and so the test suite can express
// scenarios as source text rather than hand-built trees. Grounded in the
// general shape of examples/TrevorS-lisp-llm-sandbox/src/parser.rs (a
// hand-written recursive-descent parser over its own token stream) though
// that parser is nom-based and this one consumes `lexer::Token`s directly.

use std::rc::Rc;

use crate::ast::*;
use crate::lexer::{Lexer, Tok, Token};

pub fn parse(source: &str) -> Result<Vec<StmtNode>, String> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut p = Parser { tokens, pos: 0 };
    p.skip_newlines();
    let mut stmts = Vec::new();
    while !p.at(&Tok::Eof) {
        stmts.push(p.statement()?);
        p.skip_newlines();
    }
    Ok(stmts)
}

/// Parses a single expression (used for e.g. REPL `eval`-only input).
pub fn parse_expr(source: &str) -> Result<ExprNode, String> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut p = Parser { tokens, pos: 0 };
    let e = p.expr()?;
    Ok(e)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, tok: &Tok) -> bool {
        &self.cur().tok == tok
    }

    fn advance(&mut self) -> Token {
        let t = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Tok) -> Result<Token, String> {
        if self.at(tok) {
            Ok(self.advance())
        } else {
            Err(format!("expected {tok:?}, found {:?} at line {}", self.cur().tok, self.cur().span.line))
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(&Tok::Newline) {
            self.advance();
        }
    }

    fn name(&mut self) -> Result<String, String> {
        match self.advance().tok {
            Tok::Name(n) => Ok(n),
            other => Err(format!("expected identifier, found {other:?}")),
        }
    }

    // ---- statements ----

    fn block(&mut self) -> Result<Vec<StmtNode>, String> {
        self.expect(&Tok::Colon)?;
        if self.at(&Tok::Newline) {
            self.skip_newlines();
            self.expect(&Tok::Indent)?;
            let mut stmts = Vec::new();
            self.skip_newlines();
            while !self.at(&Tok::Dedent) {
                stmts.push(self.statement()?);
                self.skip_newlines();
            }
            self.expect(&Tok::Dedent)?;
            Ok(stmts)
        } else {
            // single-line suite: `if x: pass`
            let s = self.simple_statement()?;
            Ok(vec![s])
        }
    }

    fn statement(&mut self) -> Result<StmtNode, String> {
        match &self.cur().tok {
            Tok::If => self.if_stmt(),
            Tok::While => self.while_stmt(),
            Tok::For => self.for_stmt(),
            Tok::Def => self.def_stmt(),
            Tok::Try => self.try_stmt(),
            Tok::Match => self.match_stmt(),
            _ => self.simple_statement(),
        }
    }

    fn simple_statement(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        let stmt = match &self.cur().tok {
            Tok::Pass => {
                self.advance();
                Stmt::Pass
            }
            Tok::Break => {
                self.advance();
                Stmt::Break
            }
            Tok::Continue => {
                self.advance();
                Stmt::Continue
            }
            Tok::Return => {
                self.advance();
                if self.at(&Tok::Newline) || self.at(&Tok::Eof) {
                    Stmt::Return(None)
                } else {
                    Stmt::Return(Some(self.expr()?))
                }
            }
            _ => return self.expr_or_assign_statement(),
        };
        if self.at(&Tok::Newline) {
            self.advance();
        }
        Ok(Node::new(span, stmt))
    }

    fn expr_or_assign_statement(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        let first = self.expr()?;

        let aug = match &self.cur().tok {
            Tok::PlusEq => Some(BinOp::Add),
            Tok::MinusEq => Some(BinOp::Sub),
            Tok::StarEq => Some(BinOp::Mul),
            Tok::SlashEq => Some(BinOp::Div),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let value = self.expr()?;
            let target = expr_to_assign_target(&first)?;
            self.finish_line()?;
            return Ok(Node::new(span, Stmt::AugAssign { target, op, value }));
        }

        if self.at(&Tok::Assign) {
            let mut targets = vec![expr_to_assign_target(&first)?];
            let mut value = first;
            while self.at(&Tok::Assign) {
                self.advance();
                value = self.expr()?;
                if self.at(&Tok::Assign) {
                    targets.push(expr_to_assign_target(&value)?);
                }
            }
            self.finish_line()?;
            return Ok(Node::new(span, Stmt::Assign { targets, value }));
        }

        self.finish_line()?;
        Ok(Node::new(span, Stmt::Expr(first)))
    }

    fn finish_line(&mut self) -> Result<(), String> {
        if self.at(&Tok::Newline) {
            self.advance();
        } else if !self.at(&Tok::Eof) && !self.at(&Tok::Dedent) {
            return Err(format!("expected end of line, found {:?}", self.cur().tok));
        }
        Ok(())
    }

    fn if_stmt(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        self.expect(&Tok::If)?;
        let test = self.expr()?;
        let body = self.block()?;
        let orelse = self.else_or_elif()?;
        Ok(Node::new(span, Stmt::If { test, body, orelse }))
    }

    fn else_or_elif(&mut self) -> Result<Vec<StmtNode>, String> {
        self.skip_newlines();
        if self.at(&Tok::Elif) {
            let span = self.cur().span;
            self.advance();
            let test = self.expr()?;
            let body = self.block()?;
            let orelse = self.else_or_elif()?;
            Ok(vec![Node::new(span, Stmt::If { test, body, orelse })])
        } else if self.at(&Tok::Else) {
            self.advance();
            self.block()
        } else {
            Ok(Vec::new())
        }
    }

    fn while_stmt(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        self.expect(&Tok::While)?;
        let test = self.expr()?;
        let body = self.block()?;
        self.skip_newlines();
        let orelse = if self.at(&Tok::Else) {
            self.advance();
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Node::new(span, Stmt::While { test, body, orelse }))
    }

    fn for_stmt(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        self.expect(&Tok::For)?;
        let target_expr = self.target_list()?;
        let target = expr_to_assign_target(&target_expr)?;
        self.expect(&Tok::In)?;
        let iter = self.expr()?;
        let body = self.block()?;
        self.skip_newlines();
        let orelse = if self.at(&Tok::Else) {
            self.advance();
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Node::new(span, Stmt::For { target, iter, body, orelse }))
    }

    /// A bare comma-separated target list, e.g. `for a, b in ...`, parsed as
    /// a tuple expression without requiring parentheses.
    fn target_list(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let first = self.or_test()?;
        if self.at(&Tok::Comma) {
            let mut items = vec![ExprOrStarred::Expr(first)];
            while self.at(&Tok::Comma) {
                self.advance();
                if self.at(&Tok::In) {
                    break;
                }
                items.push(ExprOrStarred::Expr(self.or_test()?));
            }
            Ok(Node::new(span, Expr::Tuple(items)))
        } else {
            Ok(first)
        }
    }

    fn def_stmt(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        self.expect(&Tok::Def)?;
        let name = self.name()?;
        self.expect(&Tok::LParen)?;
        let params = self.param_spec()?;
        self.expect(&Tok::RParen)?;
        if self.at(&Tok::Arrow) {
            self.advance();
            self.atom()?; // return annotation, parsed and discarded
        }
        let body = self.block()?;
        Ok(Node::new(span, Stmt::FunctionDef { name, params: Rc::new(params), body: Rc::new(body) }))
    }

    fn param_spec(&mut self) -> Result<ParamSpec, String> {
        let mut spec = ParamSpec::default();
        let mut seen_star = false;
        while !self.at(&Tok::RParen) {
            if self.at(&Tok::DoubleStar) {
                self.advance();
                spec.kwarg = Some(self.name()?);
            } else if self.at(&Tok::Star) {
                self.advance();
                if matches!(self.cur().tok, Tok::Name(_)) {
                    spec.vararg = Some(self.name()?);
                }
                seen_star = true;
            } else {
                let pname = self.name()?;
                let default = if self.at(&Tok::Assign) {
                    self.advance();
                    Some(self.expr()?)
                } else {
                    None
                };
                let param = Param { name: pname, default };
                if seen_star {
                    spec.keyword_only.push(param);
                } else {
                    spec.positional_or_keyword.push(param);
                }
            }
            if self.at(&Tok::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(spec)
    }

    fn try_stmt(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        self.expect(&Tok::Try)?;
        let body = self.block()?;
        self.skip_newlines();
        let mut handlers = Vec::new();
        while self.at(&Tok::Except) {
            self.advance();
            let type_names = if self.at(&Tok::Colon) {
                None
            } else if self.at(&Tok::LParen) {
                self.advance();
                let mut names = Vec::new();
                loop {
                    names.push(self.string_literal()?);
                    if self.at(&Tok::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&Tok::RParen)?;
                Some(names)
            } else {
                Some(vec![self.string_literal()?])
            };
            let handler_body = self.block()?;
            handlers.push(ExceptHandler { type_names, body: handler_body });
            self.skip_newlines();
        }
        let orelse = if self.at(&Tok::Else) {
            self.advance();
            let b = self.block()?;
            self.skip_newlines();
            b
        } else {
            Vec::new()
        };
        let finally = if self.at(&Tok::Finally) {
            self.advance();
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Node::new(span, Stmt::Try { body, handlers, orelse, finally }))
    }

    fn string_literal(&mut self) -> Result<String, String> {
        match self.advance().tok {
            Tok::Str(s) => Ok(s),
            other => Err(format!("expected string literal, found {other:?}")),
        }
    }

    fn match_stmt(&mut self) -> Result<StmtNode, String> {
        let span = self.cur().span;
        self.expect(&Tok::Match)?;
        let subject = self.expr()?;
        self.expect(&Tok::Colon)?;
        self.skip_newlines();
        self.expect(&Tok::Indent)?;
        self.skip_newlines();
        let mut cases = Vec::new();
        while self.at(&Tok::Case) {
            self.advance();
            let pattern = self.pattern()?;
            let guard = if self.at(&Tok::If) {
                self.advance();
                Some(self.expr()?)
            } else {
                None
            };
            let body = self.block()?;
            cases.push(MatchCase { pattern, guard, body });
            self.skip_newlines();
        }
        self.expect(&Tok::Dedent)?;
        Ok(Node::new(span, Stmt::Match { subject, cases }))
    }

    fn pattern(&mut self) -> Result<Pattern, String> {
        let first = self.pattern_atom()?;
        if self.at(&Tok::Pipe) {
            let mut alts = vec![first];
            while self.at(&Tok::Pipe) {
                self.advance();
                alts.push(self.pattern_atom()?);
            }
            return Ok(Pattern::MatchOr(alts));
        }
        Ok(first)
    }

    fn pattern_atom(&mut self) -> Result<Pattern, String> {
        match &self.cur().tok {
            Tok::Name(n) if n == "_" => {
                self.advance();
                Ok(Pattern::MatchAs { pattern: None, name: None })
            }
            Tok::Name(_) => {
                let name = self.name()?;
                Ok(Pattern::MatchAs { pattern: None, name: Some(name) })
            }
            Tok::Star => {
                self.advance();
                if let Tok::Name(n) = &self.cur().tok {
                    if n == "_" {
                        self.advance();
                        return Ok(Pattern::MatchStar(None));
                    }
                }
                Ok(Pattern::MatchStar(Some(self.name()?)))
            }
            Tok::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.at(&Tok::RBracket) {
                    items.push(self.pattern()?);
                    if self.at(&Tok::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&Tok::RBracket)?;
                Ok(Pattern::MatchSequence(items))
            }
            Tok::LBrace => {
                self.advance();
                let mut keys = Vec::new();
                let mut patterns = Vec::new();
                let mut rest = None;
                while !self.at(&Tok::RBrace) {
                    if self.at(&Tok::DoubleStar) {
                        self.advance();
                        rest = Some(self.name()?);
                    } else {
                        let key = self.or_test()?;
                        self.expect(&Tok::Colon)?;
                        let pat = self.pattern()?;
                        keys.push(key);
                        patterns.push(pat);
                    }
                    if self.at(&Tok::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&Tok::RBrace)?;
                Ok(Pattern::MatchMapping { keys, patterns, rest })
            }
            Tok::True | Tok::False | Tok::None => {
                let c = self.constant_tok()?;
                Ok(Pattern::MatchSingleton(c))
            }
            _ => {
                let e = self.or_test()?;
                Ok(Pattern::MatchValue(e))
            }
        }
    }

    fn constant_tok(&mut self) -> Result<Constant, String> {
        match self.advance().tok {
            Tok::True => Ok(Constant::Bool(true)),
            Tok::False => Ok(Constant::Bool(false)),
            Tok::None => Ok(Constant::None),
            Tok::Int(i) => Ok(Constant::Int(i)),
            Tok::Float(f) => Ok(Constant::Float(f)),
            Tok::Str(s) => Ok(Constant::Str(s)),
            other => Err(format!("expected constant, found {other:?}")),
        }
    }

    // ---- expressions ----

    fn expr(&mut self) -> Result<ExprNode, String> {
        self.named_expr()
    }

    fn named_expr(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        if let Tok::Name(n) = self.cur().tok.clone() {
            if matches!(self.tokens.get(self.pos + 1).map(|t| &t.tok), Some(Tok::Walrus)) {
                self.advance();
                self.advance();
                let value = self.expr()?;
                return Ok(Node::new(span, Expr::NamedExpr { target: n, value }));
            }
        }
        self.ternary()
    }

    fn ternary(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        if self.at(&Tok::Lambda) {
            return self.lambda();
        }
        let body = self.or_test()?;
        if self.at(&Tok::If) {
            self.advance();
            let test = self.or_test()?;
            self.expect(&Tok::Else)?;
            let orelse = self.expr()?;
            return Ok(Node::new(span, Expr::IfExp { test, body, orelse }));
        }
        Ok(body)
    }

    fn lambda(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        self.expect(&Tok::Lambda)?;
        let mut spec = ParamSpec::default();
        while !self.at(&Tok::Colon) {
            let pname = self.name()?;
            let default = if self.at(&Tok::Assign) {
                self.advance();
                Some(self.expr()?)
            } else {
                None
            };
            spec.positional_or_keyword.push(Param { name: pname, default });
            if self.at(&Tok::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&Tok::Colon)?;
        let body = self.expr()?;
        Ok(Node::new(span, Expr::Lambda { params: Rc::new(spec), body }))
    }

    fn or_test(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let mut first = self.and_test()?;
        if self.at(&Tok::Or) {
            let mut parts = vec![first];
            while self.at(&Tok::Or) {
                self.advance();
                parts.push(self.and_test()?);
            }
            first = Node::new(span, Expr::BoolOp(BoolOp::Or, parts));
        }
        Ok(first)
    }

    fn and_test(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let mut first = self.not_test()?;
        if self.at(&Tok::And) {
            let mut parts = vec![first];
            while self.at(&Tok::And) {
                self.advance();
                parts.push(self.not_test()?);
            }
            first = Node::new(span, Expr::BoolOp(BoolOp::And, parts));
        }
        Ok(first)
    }

    fn not_test(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        if self.at(&Tok::Not) {
            self.advance();
            let operand = self.not_test()?;
            return Ok(Node::new(span, Expr::UnaryOp(UnaryOp::Not, operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let first = self.bitor()?;
        let mut rest = Vec::new();
        loop {
            let op = match &self.cur().tok {
                Tok::Eq => CmpOp::Eq,
                Tok::NotEq => CmpOp::NotEq,
                Tok::Lt => CmpOp::Lt,
                Tok::LtE => CmpOp::LtE,
                Tok::Gt => CmpOp::Gt,
                Tok::GtE => CmpOp::GtE,
                Tok::In => CmpOp::In,
                Tok::Not if matches!(self.tokens.get(self.pos + 1).map(|t| &t.tok), Some(Tok::In)) => {
                    self.advance();
                    self.advance();
                    rest.push((CmpOp::NotIn, self.bitor()?));
                    continue;
                }
                _ => break,
            };
            self.advance();
            rest.push((op, self.bitor()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Node::new(span, Expr::Compare(first, rest)))
        }
    }

    fn bitor(&mut self) -> Result<ExprNode, String> {
        self.binop_level(&[(Tok::Pipe, BinOp::BitOr)], Self::bitxor)
    }
    fn bitxor(&mut self) -> Result<ExprNode, String> {
        self.binop_level(&[(Tok::Caret, BinOp::BitXor)], Self::bitand)
    }
    fn bitand(&mut self) -> Result<ExprNode, String> {
        self.binop_level(&[(Tok::Amp, BinOp::BitAnd)], Self::shift)
    }
    fn shift(&mut self) -> Result<ExprNode, String> {
        self.binop_level(&[(Tok::LShift, BinOp::LShift), (Tok::RShift, BinOp::RShift)], Self::arith)
    }
    fn arith(&mut self) -> Result<ExprNode, String> {
        self.binop_level(&[(Tok::Plus, BinOp::Add), (Tok::Minus, BinOp::Sub)], Self::term)
    }
    fn term(&mut self) -> Result<ExprNode, String> {
        self.binop_level(
            &[(Tok::Star, BinOp::Mul), (Tok::Slash, BinOp::Div), (Tok::DoubleSlash, BinOp::FloorDiv), (Tok::Percent, BinOp::Mod)],
            Self::factor,
        )
    }

    fn binop_level(&mut self, ops: &[(Tok, BinOp)], next: fn(&mut Self) -> Result<ExprNode, String>) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let mut left = next(self)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.at(tok) {
                    self.advance();
                    let right = next(self)?;
                    left = Node::new(span, Expr::BinOp(left, *op, right));
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let op = match &self.cur().tok {
            Tok::Minus => Some(UnaryOp::Neg),
            Tok::Plus => Some(UnaryOp::Pos),
            Tok::Tilde => Some(UnaryOp::Invert),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.factor()?;
            return Ok(Node::new(span, Expr::UnaryOp(op, operand)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let base = self.postfix()?;
        if self.at(&Tok::DoubleStar) {
            self.advance();
            let exp = self.factor()?;
            return Ok(Node::new(span, Expr::BinOp(base, BinOp::Pow, exp)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        let mut e = self.atom()?;
        loop {
            match &self.cur().tok {
                Tok::Dot => {
                    self.advance();
                    let attr = self.name()?;
                    e = Node::new(span, Expr::Attribute { value: e, attr });
                }
                Tok::LParen => {
                    self.advance();
                    let args = self.call_args()?;
                    self.expect(&Tok::RParen)?;
                    e = Node::new(span, Expr::Call { func: e, args });
                }
                Tok::LBracket => {
                    self.advance();
                    e = self.subscript(e, span)?;
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn call_args(&mut self) -> Result<Vec<Arg>, String> {
        let mut args = Vec::new();
        while !self.at(&Tok::RParen) {
            if self.at(&Tok::Star) {
                self.advance();
                args.push(Arg::Starred(self.expr()?));
            } else if self.at(&Tok::DoubleStar) {
                self.advance();
                args.push(Arg::Keyword(Keyword { name: None, value: self.expr()? }));
            } else if let Tok::Name(n) = self.cur().tok.clone() {
                if matches!(self.tokens.get(self.pos + 1).map(|t| &t.tok), Some(Tok::Assign)) {
                    self.advance();
                    self.advance();
                    args.push(Arg::Keyword(Keyword { name: Some(n), value: self.expr()? }));
                } else {
                    args.push(Arg::Positional(self.expr()?));
                }
            } else {
                args.push(Arg::Positional(self.expr()?));
            }
            if self.at(&Tok::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn subscript(&mut self, value: ExprNode, span: Span) -> Result<ExprNode, String> {
        let lower = if self.at(&Tok::Colon) { None } else { Some(self.expr()?) };
        if self.at(&Tok::Colon) {
            self.advance();
            let upper = if self.at(&Tok::Colon) || self.at(&Tok::RBracket) { None } else { Some(self.expr()?) };
            let step = if self.at(&Tok::Colon) {
                self.advance();
                if self.at(&Tok::RBracket) { None } else { Some(self.expr()?) }
            } else {
                None
            };
            self.expect(&Tok::RBracket)?;
            let slice = Node::new(span, Expr::Slice { lower, upper, step });
            return Ok(Node::new(span, Expr::Subscript { value, index: slice }));
        }
        self.expect(&Tok::RBracket)?;
        Ok(Node::new(span, Expr::Subscript { value, index: lower.expect("non-slice subscript has an index") }))
    }

    fn atom(&mut self) -> Result<ExprNode, String> {
        let span = self.cur().span;
        match self.cur().tok.clone() {
            Tok::Int(i) => {
                self.advance();
                Ok(Node::new(span, Expr::Constant(Constant::Int(i))))
            }
            Tok::Float(f) => {
                self.advance();
                Ok(Node::new(span, Expr::Constant(Constant::Float(f))))
            }
            Tok::Str(s) => {
                self.advance();
                let mut combined = s;
                while let Tok::Str(more) = self.cur().tok.clone() {
                    self.advance();
                    combined.push_str(&more);
                }
                Ok(Node::new(span, Expr::Constant(Constant::Str(combined))))
            }
            Tok::FStr(s) => {
                self.advance();
                Ok(Node::new(span, Expr::FString(parse_fstring_parts(&s)?)))
            }
            Tok::True => {
                self.advance();
                Ok(Node::new(span, Expr::Constant(Constant::Bool(true))))
            }
            Tok::False => {
                self.advance();
                Ok(Node::new(span, Expr::Constant(Constant::Bool(false))))
            }
            Tok::None => {
                self.advance();
                Ok(Node::new(span, Expr::Constant(Constant::None)))
            }
            Tok::Name(n) => {
                self.advance();
                Ok(Node::new(span, Expr::Name(n)))
            }
            Tok::LParen => {
                self.advance();
                if self.at(&Tok::RParen) {
                    self.advance();
                    return Ok(Node::new(span, Expr::Tuple(Vec::new())));
                }
                let first = self.expr()?;
                if matches!(self.cur().tok, Tok::Name(ref n) if n == "for") {
                    let generators = self.comprehension_clauses()?;
                    self.expect(&Tok::RParen)?;
                    return Ok(Node::new(span, Expr::GeneratorExp { elt: first, generators }));
                }
                if self.at(&Tok::Comma) {
                    let mut items = vec![ExprOrStarred::Expr(first)];
                    while self.at(&Tok::Comma) {
                        self.advance();
                        if self.at(&Tok::RParen) {
                            break;
                        }
                        items.push(self.starrable_item()?);
                    }
                    self.expect(&Tok::RParen)?;
                    return Ok(Node::new(span, Expr::Tuple(items)));
                }
                self.expect(&Tok::RParen)?;
                Ok(first)
            }
            Tok::LBracket => {
                self.advance();
                if self.at(&Tok::RBracket) {
                    self.advance();
                    return Ok(Node::new(span, Expr::List(Vec::new())));
                }
                let first_item = self.starrable_item()?;
                if matches!(self.cur().tok, Tok::Name(ref n) if n == "for") {
                    let elt = match first_item {
                        ExprOrStarred::Expr(e) => e,
                        ExprOrStarred::Starred(e) => e,
                    };
                    let generators = self.comprehension_clauses()?;
                    self.expect(&Tok::RBracket)?;
                    return Ok(Node::new(span, Expr::ListComp { elt, generators }));
                }
                let mut items = vec![first_item];
                while self.at(&Tok::Comma) {
                    self.advance();
                    if self.at(&Tok::RBracket) {
                        break;
                    }
                    items.push(self.starrable_item()?);
                }
                self.expect(&Tok::RBracket)?;
                Ok(Node::new(span, Expr::List(items)))
            }
            Tok::LBrace => {
                self.advance();
                if self.at(&Tok::RBrace) {
                    self.advance();
                    return Ok(Node::new(span, Expr::Dict(Vec::new())));
                }
                if self.at(&Tok::DoubleStar) {
                    self.advance();
                    let spread = self.bitor()?;
                    let mut items = vec![DictItem::Spread(spread)];
                    while self.at(&Tok::Comma) {
                        self.advance();
                        if self.at(&Tok::RBrace) {
                            break;
                        }
                        items.push(self.dict_item()?);
                    }
                    self.expect(&Tok::RBrace)?;
                    return Ok(Node::new(span, Expr::Dict(items)));
                }
                let first_key = self.expr()?;
                if self.at(&Tok::Colon) {
                    self.advance();
                    let first_val = self.expr()?;
                    if matches!(self.cur().tok, Tok::Name(ref n) if n == "for") {
                        let generators = self.comprehension_clauses()?;
                        self.expect(&Tok::RBrace)?;
                        return Ok(Node::new(span, Expr::DictComp { key: first_key, value: first_val, generators }));
                    }
                    let mut items = vec![DictItem::KeyValue(first_key, first_val)];
                    while self.at(&Tok::Comma) {
                        self.advance();
                        if self.at(&Tok::RBrace) {
                            break;
                        }
                        items.push(self.dict_item()?);
                    }
                    self.expect(&Tok::RBrace)?;
                    Ok(Node::new(span, Expr::Dict(items)))
                } else {
                    // set literal / set comprehension
                    if matches!(self.cur().tok, Tok::Name(ref n) if n == "for") {
                        let generators = self.comprehension_clauses()?;
                        self.expect(&Tok::RBrace)?;
                        return Ok(Node::new(span, Expr::SetComp { elt: first_key, generators }));
                    }
                    let mut items = vec![ExprOrStarred::Expr(first_key)];
                    while self.at(&Tok::Comma) {
                        self.advance();
                        if self.at(&Tok::RBrace) {
                            break;
                        }
                        items.push(self.starrable_item()?);
                    }
                    self.expect(&Tok::RBrace)?;
                    Ok(Node::new(span, Expr::Set(items)))
                }
            }
            other => Err(format!("unexpected token {other:?} at line {}", span.line)),
        }
    }

    fn starrable_item(&mut self) -> Result<ExprOrStarred, String> {
        if self.at(&Tok::Star) {
            self.advance();
            Ok(ExprOrStarred::Starred(self.or_test()?))
        } else {
            Ok(ExprOrStarred::Expr(self.expr()?))
        }
    }

    fn dict_item(&mut self) -> Result<DictItem, String> {
        if self.at(&Tok::DoubleStar) {
            self.advance();
            return Ok(DictItem::Spread(self.bitor()?));
        }
        let key = self.expr()?;
        self.expect(&Tok::Colon)?;
        let value = self.expr()?;
        Ok(DictItem::KeyValue(key, value))
    }

    /// One or more `for ... in ... [if ...]` clauses, used by every
    /// comprehension kind.
    fn comprehension_clauses(&mut self) -> Result<Vec<Comprehension>, String> {
        let mut gens = Vec::new();
        while matches!(self.cur().tok, Tok::Name(ref n) if n == "for") {
            self.advance();
            let target_expr = self.target_list()?;
            self.expect(&Tok::In)?;
            let iter = self.or_test()?;
            let mut ifs = Vec::new();
            while self.at(&Tok::If) {
                self.advance();
                ifs.push(self.or_test()?);
            }
            gens.push(Comprehension { target: target_expr, iter, ifs });
        }
        Ok(gens)
    }
}

fn expr_to_assign_target(e: &ExprNode) -> Result<AssignTarget, String> {
    match e.kind.as_ref() {
        Expr::Name(n) => Ok(AssignTarget::Name(n.clone())),
        Expr::Subscript { value, index } => Ok(AssignTarget::Subscript { value: value.clone(), index: index.clone() }),
        Expr::Attribute { value, attr } => Ok(AssignTarget::Attribute { value: value.clone(), attr: attr.clone() }),
        Expr::Tuple(items) | Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(match item {
                    ExprOrStarred::Expr(e) => AssignTargetOrStarred::Target(expr_to_assign_target(e)?),
                    ExprOrStarred::Starred(e) => AssignTargetOrStarred::Starred(expr_to_assign_target(e)?),
                });
            }
            Ok(AssignTarget::Tuple(out))
        }
        _ => Err("invalid assignment target".to_string()),
    }
}

/// Splits an f-string body into literal/field parts and parses each
/// `{expr[:spec]}` field as a full sub-expression (spec.md §4.5).
fn parse_fstring_parts(body: &str) -> Result<Vec<FStringPart>, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }
                let mut depth = 1;
                let mut field = String::new();
                i += 1;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '{' => {
                            depth += 1;
                            field.push('{');
                        }
                        '}' => {
                            depth -= 1;
                            if depth > 0 {
                                field.push('}');
                            }
                        }
                        c => field.push(c),
                    }
                    i += 1;
                }
                let (expr_src, spec) = split_format_spec(&field);
                let value = parse_expr(&expr_src)?;
                parts.push(FStringPart::Field { value, format_spec: spec });
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        parts.push(FStringPart::Literal(literal));
    }
    Ok(parts)
}

/// Splits `expr:spec` on the first top-level colon (one not nested inside
/// brackets), matching CPython's f-string field grammar closely enough for
/// the subset of format specs spec.md §4.5 validates.
fn split_format_spec(field: &str) -> (String, Option<String>) {
    let mut depth = 0i32;
    for (i, c) in field.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ':' if depth == 0 => return (field[..i].to_string(), Some(field[i + 1..].to_string())),
            _ => {}
        }
    }
    (field.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arithmetic_precedence() {
        let expr = parse_expr("1 + 2 * 3").unwrap();
        match expr.kind.as_ref() {
            Expr::BinOp(_, BinOp::Add, rhs) => match rhs.kind.as_ref() {
                Expr::BinOp(_, BinOp::Mul, _) => {}
                other => panic!("expected nested mul, got {other:?}"),
            },
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_else_and_loop() {
        let src = "if x > 0:\n    y = 1\nelse:\n    y = 2\nfor i in range(3):\n    pass\n";
        let stmts = parse(src).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0].kind.as_ref(), Stmt::If { .. }));
        assert!(matches!(stmts[1].kind.as_ref(), Stmt::For { .. }));
    }

    #[test]
    fn parses_function_def_and_call() {
        let src = "def add(a, b=1):\n    return a + b\nadd(2, b=3)\n";
        let stmts = parse(src).unwrap();
        assert!(matches!(stmts[0].kind.as_ref(), Stmt::FunctionDef { .. }));
        assert!(matches!(stmts[1].kind.as_ref(), Stmt::Expr(_)));
    }

    #[test]
    fn parses_list_comprehension() {
        let expr = parse_expr("[x * 2 for x in range(5) if x > 1]").unwrap();
        assert!(matches!(expr.kind.as_ref(), Expr::ListComp { .. }));
    }

    #[test]
    fn parses_fstring_with_format_spec() {
        let expr = parse_expr("f\"{x:>10.2f} done\"").unwrap();
        match expr.kind.as_ref() {
            Expr::FString(parts) => {
                assert!(matches!(&parts[0], FStringPart::Field { format_spec: Some(s), .. } if s == ">10.2f"));
            }
            other => panic!("expected fstring, got {other:?}"),
        }
    }

    #[test]
    fn parses_match_statement_with_star_pattern() {
        let src = "match xs:\n    case [first, *rest]:\n        pass\n    case _:\n        pass\n";
        let stmts = parse(src).unwrap();
        match stmts[0].kind.as_ref() {
            Stmt::Match { cases, .. } => {
                assert_eq!(cases.len(), 2);
                assert!(matches!(&cases[0].pattern, Pattern::MatchSequence(_)));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn parses_try_except_finally() {
        let src = "try:\n    risky()\nexcept \"ZeroDivisionError\":\n    pass\nfinally:\n    cleanup()\n";
        let stmts = parse(src).unwrap();
        assert!(matches!(stmts[0].kind.as_ref(), Stmt::Try { .. }));
    }

    #[test]
    fn parses_walrus_in_while_condition() {
        let src = "while (n := n - 1) > 0:\n    pass\n";
        let stmts = parse(src).unwrap();
        assert!(matches!(stmts[0].kind.as_ref(), Stmt::While { .. }));
    }
}
