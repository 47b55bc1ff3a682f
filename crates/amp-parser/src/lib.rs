use amp_ast::{
    Assign, BinOp, BinaryExpr, CallExpr, Diagnostic, Direction, ElseIf, Expr, ExprStmt, ForStmt,
    GroupExpr, Ident, IfStmt, Literal, LogicalExpr, LogicalOp, Program, RelExpr, RelOp, Span,
    Stmt, UnaryExpr, UnaryOp, VarDecl,
};
use amp_lexer::{Lexer, Token, TokenKind};

#[derive(Debug)]
pub struct ParseResult {
    /// Absent whenever a fatal diagnostic was recorded. Skipped-character
    /// diagnostics are reported but still yield a program.
    pub program: Option<Program>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a script in any of its three entry forms: a `%%[ ... ]%%`
/// statement block, a `%%= ... =%%` inline expression, or bare statements.
///
/// An illegal character is the one recoverable failure: the scanner skips
/// it, a diagnostic records it, and the rest of the unit still parses.
/// Every other diagnostic is fatal and no partial tree is returned.
pub fn parse(source: &str) -> ParseResult {
    let raw = Lexer::tokenize(source);
    let mut diagnostics = Vec::new();
    let mut recovered = 0;
    let mut tokens = Vec::new();
    for tok in raw {
        match &tok.kind {
            TokenKind::IllegalChar(ch) => {
                diagnostics.push(Diagnostic {
                    message: format!("illegal character '{ch}'"),
                    span: tok.span,
                });
                recovered += 1;
            }
            TokenKind::Error(message) => {
                diagnostics.push(Diagnostic {
                    message: message.clone(),
                    span: tok.span,
                });
            }
            TokenKind::BlockComment(_) => {}
            _ => tokens.push(tok),
        }
    }

    if tokens.iter().all(|t| matches!(t.kind, TokenKind::Eof)) {
        if diagnostics.len() == recovered {
            diagnostics.push(Diagnostic {
                message: "empty input".to_string(),
                span: Span::dummy(),
            });
        }
        return ParseResult {
            program: None,
            diagnostics,
        };
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics,
    };
    let program = parser.parse_program();
    let diagnostics = parser.diagnostics;
    // The parser only appends, so any diagnostic beyond the recovered
    // ones is fatal.
    let program = if diagnostics.len() == recovered {
        Some(program)
    } else {
        None
    };
    ParseResult {
        program,
        diagnostics,
    }
}

// Infix operators fold into three distinct node kinds.
enum InfixOp {
    Bin(BinOp),
    Rel(RelOp),
    Logical(LogicalOp),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    // ── Token access ──────────────────────────────────────────────

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if !matches!(tok.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.advance())
        } else {
            self.error(format!("expected {kind:?}, found {:?}", self.peek()));
            None
        }
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.tokens[0].span
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        self.diagnostics.push(Diagnostic {
            message: message.into(),
            span,
        });
    }

    /// Skip ahead to the next statement keyword so one bad statement
    /// doesn't swallow the rest of the script.
    fn synchronize(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Eof
                | TokenKind::Set
                | TokenKind::If
                | TokenKind::For
                | TokenKind::Var
                | TokenKind::Elseif
                | TokenKind::Else
                | TokenKind::Endif
                | TokenKind::Next
                | TokenKind::BlockClose => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Entry forms ───────────────────────────────────────────────

    fn parse_program(&mut self) -> Program {
        let stmts = match self.peek() {
            TokenKind::BlockOpen => {
                self.advance();
                let stmts = self.parse_stmt_list();
                self.expect(&TokenKind::BlockClose);
                stmts
            }
            TokenKind::ExprOpen => {
                self.advance();
                let expr = self.parse_expr(0);
                self.expect(&TokenKind::ExprClose);
                match expr {
                    Some(expr) => {
                        let span = expr.span();
                        vec![Stmt::Expr(ExprStmt { expr, span })]
                    }
                    None => Vec::new(),
                }
            }
            _ => self.parse_stmt_list(),
        };
        if !self.at(&TokenKind::Eof) {
            self.error(format!("expected end of input, found {:?}", self.peek()));
        }
        Program { stmts }
    }

    // ── Statements ────────────────────────────────────────────────

    fn parse_stmt_list(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at_stmt_list_end() {
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        if stmts.is_empty() {
            self.error("expected at least one statement");
        }
        stmts
    }

    fn at_stmt_list_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::BlockClose
                | TokenKind::Elseif
                | TokenKind::Else
                | TokenKind::Endif
                | TokenKind::Next
                | TokenKind::Eof
        )
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.peek() {
            TokenKind::Var => self.parse_var_decl().map(Stmt::VarDecl),
            TokenKind::Set => self.parse_assign().map(Stmt::Assign),
            TokenKind::If => self.parse_if().map(Stmt::If),
            TokenKind::For => self.parse_for().map(Stmt::For),
            _ => {
                let expr = self.parse_expr(0)?;
                let span = expr.span();
                Some(Stmt::Expr(ExprStmt { expr, span }))
            }
        }
    }

    fn parse_var_decl(&mut self) -> Option<VarDecl> {
        let kw = self.advance(); // VAR
        let mut names = vec![self.parse_var_name()?];
        while self.at(&TokenKind::Comma) {
            self.advance();
            names.push(self.parse_var_name()?);
        }
        let end = names.last().map(|n| n.span.end).unwrap_or(kw.span.end);
        Some(VarDecl {
            names,
            span: Span::new(kw.span.start, end),
        })
    }

    fn parse_assign(&mut self) -> Option<Assign> {
        let kw = self.advance(); // SET
        let name = self.parse_var_name()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expr(0)?;
        let span = Span::new(kw.span.start, value.span().end);
        Some(Assign { name, value, span })
    }

    fn parse_if(&mut self) -> Option<IfStmt> {
        let kw = self.advance(); // IF
        let cond = self.parse_expr(0)?;
        self.expect(&TokenKind::Then)?;
        let then_body = self.parse_stmt_list();

        let mut elseifs = Vec::new();
        while self.at(&TokenKind::Elseif) {
            let elseif_kw = self.advance();
            let cond = self.parse_expr(0)?;
            self.expect(&TokenKind::Then)?;
            let body = self.parse_stmt_list();
            let span = Span::new(elseif_kw.span.start, self.prev_span().end);
            elseifs.push(ElseIf { cond, body, span });
        }

        let else_body = if self.at(&TokenKind::Else) {
            self.advance();
            Some(self.parse_stmt_list())
        } else {
            None
        };

        let end = self.expect(&TokenKind::Endif)?;
        Some(IfStmt {
            cond,
            then_body,
            elseifs,
            else_body,
            span: Span::new(kw.span.start, end.span.end),
        })
    }

    fn parse_for(&mut self) -> Option<ForStmt> {
        let kw = self.advance(); // FOR
        let var = self.parse_var_name()?;
        self.expect(&TokenKind::Eq)?;
        let init = self.parse_expr(0)?;

        let direction = match self.peek() {
            TokenKind::To => {
                self.advance();
                Direction::Up
            }
            TokenKind::Downto => {
                self.advance();
                Direction::Down
            }
            other => {
                self.error(format!("expected TO or DOWNTO, found {other:?}"));
                return None;
            }
        };

        let limit = self.parse_expr(0)?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_stmt_list();
        self.expect(&TokenKind::Next)?;
        let next_var = self.parse_var_name()?;
        if next_var.name != var.name {
            self.error(format!(
                "NEXT variable '@{}' does not match loop variable '@{}'",
                next_var.name, var.name
            ));
        }

        let span = Span::new(kw.span.start, next_var.span.end);
        Some(ForStmt {
            var,
            init,
            direction,
            limit,
            body,
            next_var,
            span,
        })
    }

    fn parse_var_name(&mut self) -> Option<Ident> {
        let at = self.expect(&TokenKind::At)?;
        match self.peek().clone() {
            TokenKind::Name(name) => {
                let tok = self.advance();
                Some(Ident {
                    name,
                    span: Span::new(at.span.start, tok.span.end),
                })
            }
            other => {
                self.error(format!("expected variable name after '@', found {other:?}"));
                None
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────

    fn parse_expr(&mut self, min_bp: u8) -> Option<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let (op_bp, op) = match self.peek() {
                TokenKind::Or => (2, InfixOp::Logical(LogicalOp::Or)),
                TokenKind::And => (4, InfixOp::Logical(LogicalOp::And)),
                TokenKind::EqEq => (6, InfixOp::Rel(RelOp::Eq)),
                TokenKind::BangEq => (6, InfixOp::Rel(RelOp::Ne)),
                TokenKind::Lt => (6, InfixOp::Rel(RelOp::Lt)),
                TokenKind::LtEq => (6, InfixOp::Rel(RelOp::Le)),
                TokenKind::Gt => (6, InfixOp::Rel(RelOp::Gt)),
                TokenKind::GtEq => (6, InfixOp::Rel(RelOp::Ge)),
                TokenKind::Plus => (8, InfixOp::Bin(BinOp::Add)),
                TokenKind::Minus => (8, InfixOp::Bin(BinOp::Sub)),
                TokenKind::Star => (10, InfixOp::Bin(BinOp::Mul)),
                TokenKind::Slash => (10, InfixOp::Bin(BinOp::Div)),
                _ => break,
            };
            if op_bp < min_bp {
                break;
            }
            // Comparisons are non-associative: `a < b < c` has no parse.
            if matches!(op, InfixOp::Rel(_)) && matches!(lhs, Expr::Rel(_)) {
                self.error("comparison operators cannot be chained");
                return None;
            }
            self.advance();
            let rhs = self.parse_expr(op_bp + 1)?;
            let span = Span::new(lhs.span().start, rhs.span().end);
            lhs = match op {
                InfixOp::Logical(op) => Expr::Logical(LogicalExpr {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    span,
                }),
                InfixOp::Rel(op) => Expr::Rel(RelExpr {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    span,
                }),
                InfixOp::Bin(op) => Expr::Binary(BinaryExpr {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    span,
                }),
            };
        }

        Some(lhs)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        match self.peek() {
            TokenKind::Minus => {
                let tok = self.advance();
                let operand = self.parse_expr(12)?;
                let span = Span::new(tok.span.start, operand.span().end);
                Some(Expr::Unary(UnaryExpr {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                    span,
                }))
            }
            TokenKind::Not => {
                let tok = self.advance();
                let operand = self.parse_expr(14)?;
                let span = Span::new(tok.span.start, operand.span().end);
                Some(Expr::Unary(UnaryExpr {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    span,
                }))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.peek().clone() {
            TokenKind::Number(value) => {
                let tok = self.advance();
                Some(Expr::Literal(Literal::Int(value, tok.span)))
            }
            TokenKind::Str(value) => {
                let tok = self.advance();
                Some(Expr::Literal(Literal::Str(value, tok.span)))
            }
            TokenKind::At => {
                let ident = self.parse_var_name()?;
                Some(Expr::VarRef(ident))
            }
            TokenKind::Name(name) => {
                let tok = self.advance();
                if !self.at(&TokenKind::LParen) {
                    self.error(format!("expected '(' after function name '{name}'"));
                    return None;
                }
                self.advance(); // (
                let mut args = Vec::new();
                if !self.at(&TokenKind::RParen) {
                    args.push(self.parse_expr(0)?);
                    while self.at(&TokenKind::Comma) {
                        self.advance();
                        args.push(self.parse_expr(0)?);
                    }
                }
                let close = self.expect(&TokenKind::RParen)?;
                let span = Span::new(tok.span.start, close.span.end);
                Some(Expr::Call(CallExpr {
                    name: Ident {
                        name,
                        span: tok.span,
                    },
                    args,
                    span,
                }))
            }
            TokenKind::LParen => {
                let open = self.advance();
                let inner = self.parse_expr(0)?;
                let close = self.expect(&TokenKind::RParen)?;
                let span = Span::new(open.span.start, close.span.end);
                Some(Expr::Group(GroupExpr {
                    inner: Box::new(inner),
                    span,
                }))
            }
            other => {
                self.error(format!("expected expression, found {other:?}"));
                None
            }
        }
    }
}
