// ABOUTME: Syntax tree node types consumed by the evaluator

use std::rc::Rc;

/// A position in the source text, used for error reporting and traceback
/// rendering. Columns and lines are both 0-indexed here; display code adds
/// 1 where a human-facing line/col convention is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn point(line: u32, col: u32) -> Self {
        Self { line, col, end_line: line, end_col: col + 1 }
    }
}

/// A node carrying its source span alongside its payload. Every AST node
/// the evaluator dispatches on is wrapped in this so postponed errors can be
/// reattached to the right location (spec.md §4.2, §9 "Postponed errors").
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub span: Span,
    pub kind: Rc<T>,
}

impl<T> Node<T> {
    pub fn new(span: Span, kind: T) -> Self {
        Self { span, kind: Rc::new(kind) }
    }
}

pub type ExprNode = Node<Expr>;
pub type StmtNode = Node<Stmt>;

#[derive(Debug, Clone)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Invert,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// One `for ... in ...` clause of a comprehension, with its zero or more
/// `if` guards.
#[derive(Debug, Clone)]
pub struct Comprehension {
    pub target: ExprNode,
    pub iter: ExprNode,
    pub ifs: Vec<ExprNode>,
}

#[derive(Debug, Clone)]
pub enum ExprOrStarred {
    Expr(ExprNode),
    Starred(ExprNode),
}

#[derive(Debug, Clone)]
pub enum DictItem {
    KeyValue(ExprNode, ExprNode),
    /// `**other`
    Spread(ExprNode),
}

#[derive(Debug, Clone)]
pub struct Keyword {
    pub name: Option<String>,
    pub value: ExprNode,
}

#[derive(Debug, Clone)]
pub enum Arg {
    Positional(ExprNode),
    Starred(ExprNode),
    Keyword(Keyword),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Constant(Constant),
    Name(String),
    Tuple(Vec<ExprOrStarred>),
    List(Vec<ExprOrStarred>),
    Set(Vec<ExprOrStarred>),
    Dict(Vec<DictItem>),
    UnaryOp(UnaryOp, ExprNode),
    BinOp(ExprNode, BinOp, ExprNode),
    BoolOp(BoolOp, Vec<ExprNode>),
    /// Chained comparison: `a OP b OP c ...`
    Compare(ExprNode, Vec<(CmpOp, ExprNode)>),
    IfExp { test: ExprNode, body: ExprNode, orelse: ExprNode },
    Call { func: ExprNode, args: Vec<Arg> },
    Attribute { value: ExprNode, attr: String },
    Subscript { value: ExprNode, index: ExprNode },
    Slice { lower: Option<ExprNode>, upper: Option<ExprNode>, step: Option<ExprNode> },
    Lambda { params: Rc<ParamSpec>, body: ExprNode },
    ListComp { elt: ExprNode, generators: Vec<Comprehension> },
    SetComp { elt: ExprNode, generators: Vec<Comprehension> },
    DictComp { key: ExprNode, value: ExprNode, generators: Vec<Comprehension> },
    GeneratorExp { elt: ExprNode, generators: Vec<Comprehension> },
    FString(Vec<FStringPart>),
    /// `target := value`
    NamedExpr { target: String, value: ExprNode },
}

#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(String),
    Field { value: ExprNode, format_spec: Option<String> },
}

/// A single assignment target: a plain name, a subscript, or a (possibly
/// nested, possibly starred) tuple/list of targets.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Subscript { value: ExprNode, index: ExprNode },
    Attribute { value: ExprNode, attr: String },
    Tuple(Vec<AssignTargetOrStarred>),
}

#[derive(Debug, Clone)]
pub enum AssignTargetOrStarred {
    Target(AssignTarget),
    Starred(AssignTarget),
}

/// One parameter of a user function, following spec.md §3's five kinds.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<ExprNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    pub positional_only: Vec<Param>,
    pub positional_or_keyword: Vec<Param>,
    pub vararg: Option<String>,
    pub keyword_only: Vec<Param>,
    pub kwarg: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    MatchValue(ExprNode),
    MatchSingleton(Constant),
    MatchSequence(Vec<Pattern>),
    /// unconditional collector: `*name` or `*_`
    MatchStar(Option<String>),
    MatchMapping { keys: Vec<ExprNode>, patterns: Vec<Pattern>, rest: Option<String> },
    MatchAs { pattern: Option<Box<Pattern>>, name: Option<String> },
    MatchOr(Vec<Pattern>),
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<ExprNode>,
    pub body: Vec<StmtNode>,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    /// `None` is a bare `except:`. `Some(names)` matches any of the listed
    /// exception type names (spec.md §4.6's "string literal or tuple of
    /// string literals").
    pub type_names: Option<Vec<String>>,
    pub body: Vec<StmtNode>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(ExprNode),
    Assign { targets: Vec<AssignTarget>, value: ExprNode },
    AugAssign { target: AssignTarget, op: BinOp, value: ExprNode },
    FunctionDef { name: String, params: Rc<ParamSpec>, body: Rc<Vec<StmtNode>> },
    Return(Option<ExprNode>),
    If { test: ExprNode, body: Vec<StmtNode>, orelse: Vec<StmtNode> },
    For { target: AssignTarget, iter: ExprNode, body: Vec<StmtNode>, orelse: Vec<StmtNode> },
    While { test: ExprNode, body: Vec<StmtNode>, orelse: Vec<StmtNode> },
    Break,
    Continue,
    Pass,
    Match { subject: ExprNode, cases: Vec<MatchCase> },
    Try { body: Vec<StmtNode>, handlers: Vec<ExceptHandler>, orelse: Vec<StmtNode>, finally: Vec<StmtNode> },
}
