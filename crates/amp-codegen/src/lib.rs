use amp_ast::{BinOp, Expr, LogicalOp};

pub mod javascript;
pub mod python;

// Script variables share one flat namespace; the prefix keeps emitted
// names clear of target-language keywords.
pub(crate) fn rename(name: &str) -> String {
    format!("amp_{name}")
}

// Both emitters parenthesize off the same precedence table, so the two
// outputs stay structurally in step.
pub(crate) fn prec(e: &Expr) -> u8 {
    match e {
        Expr::Logical(l) => match l.op {
            LogicalOp::Or => 1,
            LogicalOp::And => 2,
        },
        Expr::Rel(_) => 3,
        Expr::Binary(b) => match b.op {
            BinOp::Add | BinOp::Sub => 4,
            BinOp::Mul | BinOp::Div => 5,
        },
        Expr::Unary(_) => 6,
        Expr::Literal(_) | Expr::VarRef(_) | Expr::Group(_) | Expr::Call(_) => 7,
    }
}
