/// Byte offset span in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }
}

// ── Top-level ──────────────────────────────────────────────

/// A parsed script unit: the statements of a `%%[ ... ]%%` block, a single
/// expression statement from a `%%= ... =%%` block, or bare statements.
#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── Statements ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Stmt {
    VarDecl(VarDecl),
    Assign(Assign),
    If(IfStmt),
    For(ForStmt),
    Expr(ExprStmt),
}

/// `VAR @a, @b, ...`. Each declared name is bound to null.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub names: Vec<Ident>,
    pub span: Span,
}

/// `SET @name = expr`.
#[derive(Debug, Clone)]
pub struct Assign {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

/// A full conditional: the `IF` arm, any number of `ELSEIF` arms in source
/// order, and an optional trailing `ELSE`.
#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub elseifs: Vec<ElseIf>,
    pub else_body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `FOR @v = init (TO|DOWNTO) limit DO body NEXT @v`.
///
/// `next_var` is kept separately so the parser can report a mismatched
/// `NEXT` variable with its own span.
#[derive(Debug, Clone)]
pub struct ForStmt {
    pub var: Ident,
    pub init: Expr,
    pub direction: Direction,
    pub limit: Expr,
    pub body: Vec<Stmt>,
    pub next_var: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

// ── Expressions ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    VarRef(Ident),
    Group(GroupExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Rel(RelExpr),
    Logical(LogicalExpr),
    Call(CallExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(l) => l.span(),
            Expr::VarRef(i) => i.span,
            Expr::Group(g) => g.span,
            Expr::Unary(u) => u.span,
            Expr::Binary(b) => b.span,
            Expr::Rel(r) => r.span,
            Expr::Logical(l) => l.span,
            Expr::Call(c) => c.span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64, Span),
    Str(String, Span),
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Int(_, s) | Literal::Str(_, s) => *s,
        }
    }
}

/// A parenthesized expression. Kept as its own node so the code generators
/// can reproduce source parenthesization instead of re-deriving it.
#[derive(Debug, Clone)]
pub struct GroupExpr {
    pub inner: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: BinOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RelExpr {
    pub op: RelOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LogicalExpr {
    pub op: LogicalOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub span: Span,
}

/// A builtin invocation, `name(arg, ...)`. Names resolve against the
/// function registry at run time, never at parse time.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

// ── Operators ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

// ── Diagnostic ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}
