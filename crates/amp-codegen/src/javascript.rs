use amp_ast::{BinOp, Direction, Expr, Literal, LogicalOp, Program, RelOp, Stmt, UnaryOp};

use crate::{prec, rename};

/// Emit a JavaScript rendition of the program. Mirrors the Python
/// emitter statement for statement; only the surface syntax differs.
pub fn generate(program: &Program) -> String {
    let mut emitter = JsEmitter { out: String::new() };
    emitter.program(program);
    emitter.out
}

struct JsEmitter {
    out: String,
}

impl JsEmitter {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn program(&mut self, program: &Program) {
        self.line(0, "const ampfunctions = require(\"ampfunctions\");");
        self.line(0, "");
        for stmt in &program.stmts {
            self.stmt(stmt, 0);
        }
    }

    fn block(&mut self, stmts: &[Stmt], depth: usize) {
        for stmt in stmts {
            self.stmt(stmt, depth);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, depth: usize) {
        match stmt {
            Stmt::VarDecl(decl) => {
                for name in &decl.names {
                    self.line(depth, &format!("var {} = null;", rename(&name.name)));
                }
            }
            Stmt::Assign(assign) => {
                let value = self.expr(&assign.value);
                self.line(
                    depth,
                    &format!("{} = {};", rename(&assign.name.name), value),
                );
            }
            Stmt::If(s) => {
                let cond = self.expr(&s.cond);
                self.line(depth, &format!("if ({cond}) {{"));
                self.block(&s.then_body, depth + 1);
                for elseif in &s.elseifs {
                    let cond = self.expr(&elseif.cond);
                    self.line(depth, &format!("}} else if ({cond}) {{"));
                    self.block(&elseif.body, depth + 1);
                }
                if let Some(body) = &s.else_body {
                    self.line(depth, "} else {");
                    self.block(body, depth + 1);
                }
                self.line(depth, "}");
            }
            // Same lowering as the Python emitter: the limit is re-read
            // by the `while` test and the counter is cleared afterwards.
            Stmt::For(s) => {
                let var = rename(&s.var.name);
                let init = self.expr(&s.init);
                let limit = self.expr(&s.limit);
                let (cmp, step) = match s.direction {
                    Direction::Up => ("<", "+="),
                    Direction::Down => (">", "-="),
                };
                self.line(depth, &format!("var {var} = {init};"));
                self.line(depth, &format!("while ({var} {cmp} {limit}) {{"));
                self.block(&s.body, depth + 1);
                self.line(depth + 1, &format!("{var} {step} 1;"));
                self.line(depth, "}");
                self.line(depth, &format!("{var} = undefined;"));
            }
            Stmt::Expr(s) => {
                let expr = self.expr(&s.expr);
                self.line(depth, &format!("{expr};"));
            }
        }
    }

    fn sub(&self, e: &Expr, min: u8) -> String {
        let text = self.expr(e);
        if prec(e) < min {
            format!("({text})")
        } else {
            text
        }
    }

    fn expr(&self, e: &Expr) -> String {
        match e {
            Expr::Literal(Literal::Int(n, _)) => n.to_string(),
            Expr::Literal(Literal::Str(s, _)) => quote(s),
            Expr::VarRef(ident) => rename(&ident.name),
            Expr::Group(g) => format!("({})", self.expr(&g.inner)),
            Expr::Unary(u) => match u.op {
                UnaryOp::Not => format!("!{}", self.sub(&u.operand, 6)),
                // Parenthesize a nested negation so `--` never appears.
                UnaryOp::Neg => {
                    if matches!(&*u.operand, Expr::Unary(inner) if inner.op == UnaryOp::Neg) {
                        format!("-({})", self.expr(&u.operand))
                    } else {
                        format!("-{}", self.sub(&u.operand, 6))
                    }
                }
            },
            Expr::Binary(b) => {
                let p = prec(e);
                let op = match b.op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                };
                format!("{} {op} {}", self.sub(&b.lhs, p), self.sub(&b.rhs, p + 1))
            }
            Expr::Rel(r) => {
                let op = match r.op {
                    RelOp::Eq => "===",
                    RelOp::Ne => "!==",
                    RelOp::Lt => "<",
                    RelOp::Le => "<=",
                    RelOp::Gt => ">",
                    RelOp::Ge => ">=",
                };
                format!("{} {op} {}", self.sub(&r.lhs, 3), self.sub(&r.rhs, 4))
            }
            Expr::Logical(l) => {
                let p = prec(e);
                let op = match l.op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                format!("{} {op} {}", self.sub(&l.lhs, p), self.sub(&l.rhs, p + 1))
            }
            Expr::Call(c) => {
                let args: Vec<String> = c.args.iter().map(|a| self.expr(a)).collect();
                format!("ampfunctions[\"{}\"]({})", c.name.name, args.join(", "))
            }
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
