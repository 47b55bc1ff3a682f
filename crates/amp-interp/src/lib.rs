use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use amp_ast::{
    BinOp, BinaryExpr, CallExpr, Direction, Expr, ForStmt, Ident, IfStmt, Literal, LogicalOp,
    Program, RelOp, Span, Stmt, UnaryOp,
};
use amp_stdlib::{FunctionRegistry, Value};

// ── Errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    UndefinedVariable { name: String, span: Span },
    UndefinedFunction { name: String, span: Span },
    TypeMismatch { message: String, span: Span },
    DivisionByZero { span: Span },
    Overflow { span: Span },
    Builtin { message: String, span: Span },
}

impl RuntimeError {
    pub fn span(&self) -> Span {
        match self {
            RuntimeError::UndefinedVariable { span, .. }
            | RuntimeError::UndefinedFunction { span, .. }
            | RuntimeError::TypeMismatch { span, .. }
            | RuntimeError::DivisionByZero { span }
            | RuntimeError::Overflow { span }
            | RuntimeError::Builtin { span, .. } => *span,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UndefinedVariable { name, .. } => {
                write!(f, "undefined variable '@{name}'")
            }
            RuntimeError::UndefinedFunction { name, .. } => {
                write!(f, "undefined function '{name}'")
            }
            RuntimeError::TypeMismatch { message, .. } => write!(f, "{message}"),
            RuntimeError::DivisionByZero { .. } => write!(f, "division by zero"),
            RuntimeError::Overflow { .. } => write!(f, "integer overflow"),
            RuntimeError::Builtin { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

// ── Interpreter ───────────────────────────────────────────────────

/// Walks a parsed program against a flat variable environment.
///
/// In echo mode a bare expression statement prints its value unless it
/// evaluates to `NULL`. The runner and the REPL turn this on; embedding
/// callers usually leave it off and inspect variables afterwards.
pub struct Interpreter<R: FunctionRegistry> {
    env: HashMap<String, Value>,
    registry: R,
    echo: bool,
}

impl<R: FunctionRegistry> Interpreter<R> {
    pub fn new(registry: R) -> Self {
        Self {
            env: HashMap::new(),
            registry,
            echo: false,
        }
    }

    pub fn with_echo(registry: R) -> Self {
        Self {
            env: HashMap::new(),
            registry,
            echo: true,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.env.get(name)
    }

    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        for stmt in &program.stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    // ── Statements ────────────────────────────────────────────────

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match stmt {
            Stmt::VarDecl(decl) => {
                // Redeclaring resets to NULL.
                for name in &decl.names {
                    self.env.insert(name.name.clone(), Value::Null);
                }
                Ok(())
            }
            Stmt::Assign(assign) => {
                if !self.env.contains_key(&assign.name.name) {
                    return Err(RuntimeError::UndefinedVariable {
                        name: assign.name.name.clone(),
                        span: assign.name.span,
                    });
                }
                let value = self.eval(&assign.value)?;
                self.env.insert(assign.name.name.clone(), value);
                Ok(())
            }
            Stmt::If(s) => self.exec_if(s),
            Stmt::For(s) => self.exec_for(s),
            Stmt::Expr(s) => {
                let value = self.eval(&s.expr)?;
                if self.echo && value != Value::Null {
                    println!("{value}");
                }
                Ok(())
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_if(&mut self, s: &IfStmt) -> Result<(), RuntimeError> {
        if self.eval(&s.cond)?.is_truthy() {
            return self.exec_block(&s.then_body);
        }
        for elseif in &s.elseifs {
            if self.eval(&elseif.cond)?.is_truthy() {
                return self.exec_block(&elseif.body);
            }
        }
        if let Some(body) = &s.else_body {
            return self.exec_block(body);
        }
        Ok(())
    }

    /// The limit is re-evaluated before every iteration, the loop runs
    /// while the counter is strictly before it, and the counter is
    /// dropped from the environment when the loop finishes.
    fn exec_for(&mut self, s: &ForStmt) -> Result<(), RuntimeError> {
        let init = self.eval(&s.init)?;
        self.env.insert(s.var.name.clone(), init);
        loop {
            let cur = self.lookup(&s.var)?;
            let limit = self.eval(&s.limit)?;
            let keep_going = match s.direction {
                Direction::Up => value_cmp(&cur, &limit, s.span)? == Ordering::Less,
                Direction::Down => value_cmp(&cur, &limit, s.span)? == Ordering::Greater,
            };
            if !keep_going {
                break;
            }
            self.exec_block(&s.body)?;
            // The body may have reassigned the counter.
            let cur = self.lookup(&s.var)?;
            let next = match s.direction {
                Direction::Up => apply_binop(BinOp::Add, cur, Value::Int(1), s.span)?,
                Direction::Down => apply_binop(BinOp::Sub, cur, Value::Int(1), s.span)?,
            };
            self.env.insert(s.var.name.clone(), next);
        }
        self.env.remove(&s.var.name);
        Ok(())
    }

    // ── Expressions ───────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(Literal::Int(n, _)) => Ok(Value::Int(*n)),
            Expr::Literal(Literal::Str(s, _)) => Ok(Value::Str(s.clone())),
            Expr::VarRef(ident) => self.lookup(ident),
            Expr::Group(g) => self.eval(&g.inner),
            Expr::Unary(u) => {
                let operand = self.eval(&u.operand)?;
                match u.op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                    UnaryOp::Neg => match operand {
                        Value::Int(n) => n
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or(RuntimeError::Overflow { span: u.span }),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(RuntimeError::TypeMismatch {
                            message: format!("cannot negate {}", other.type_name()),
                            span: u.span,
                        }),
                    },
                }
            }
            Expr::Binary(b) => self.eval_binary(b),
            Expr::Rel(r) => {
                let lhs = self.eval(&r.lhs)?;
                let rhs = self.eval(&r.rhs)?;
                let result = match r.op {
                    RelOp::Eq => value_eq(&lhs, &rhs),
                    RelOp::Ne => !value_eq(&lhs, &rhs),
                    RelOp::Lt => value_cmp(&lhs, &rhs, r.span)? == Ordering::Less,
                    RelOp::Le => value_cmp(&lhs, &rhs, r.span)? != Ordering::Greater,
                    RelOp::Gt => value_cmp(&lhs, &rhs, r.span)? == Ordering::Greater,
                    RelOp::Ge => value_cmp(&lhs, &rhs, r.span)? != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            // Both sides always evaluate; AND and OR do not short-circuit.
            Expr::Logical(l) => {
                let lhs = self.eval(&l.lhs)?.is_truthy();
                let rhs = self.eval(&l.rhs)?.is_truthy();
                let result = match l.op {
                    LogicalOp::And => lhs && rhs,
                    LogicalOp::Or => lhs || rhs,
                };
                Ok(Value::Bool(result))
            }
            Expr::Call(c) => self.eval_call(c),
        }
    }

    fn eval_binary(&mut self, b: &BinaryExpr) -> Result<Value, RuntimeError> {
        let lhs = self.eval(&b.lhs)?;
        let rhs = self.eval(&b.rhs)?;
        apply_binop(b.op, lhs, rhs, b.span)
    }

    fn eval_call(&mut self, c: &CallExpr) -> Result<Value, RuntimeError> {
        if !self.registry.has(&c.name.name) {
            return Err(RuntimeError::UndefinedFunction {
                name: c.name.name.clone(),
                span: c.span,
            });
        }
        let mut args = Vec::with_capacity(c.args.len());
        for arg in &c.args {
            args.push(self.eval(arg)?);
        }
        self.registry
            .call(&c.name.name, args)
            .map_err(|e| RuntimeError::Builtin {
                message: e.to_string(),
                span: c.span,
            })
    }

    fn lookup(&self, ident: &Ident) -> Result<Value, RuntimeError> {
        self.env
            .get(&ident.name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: ident.name.clone(),
                span: ident.span,
            })
    }
}

// ── Value operations ──────────────────────────────────────────────

fn apply_binop(op: BinOp, lhs: Value, rhs: Value, span: Span) -> Result<Value, RuntimeError> {
    match op {
        // Division always produces a float, even for exact quotients.
        BinOp::Div => {
            let a = as_number(&lhs, span)?;
            let b = as_number(&rhs, span)?;
            if b == 0.0 {
                Err(RuntimeError::DivisionByZero { span })
            } else {
                Ok(Value::Float(a / b))
            }
        }
        BinOp::Add => match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or(RuntimeError::Overflow { span }),
            _ => Ok(Value::Float(as_number(&lhs, span)? + as_number(&rhs, span)?)),
        },
        BinOp::Sub => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or(RuntimeError::Overflow { span }),
            _ => Ok(Value::Float(as_number(&lhs, span)? - as_number(&rhs, span)?)),
        },
        BinOp::Mul => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or(RuntimeError::Overflow { span }),
            _ => Ok(Value::Float(as_number(&lhs, span)? * as_number(&rhs, span)?)),
        },
    }
}

fn as_number(v: &Value, span: Span) -> Result<f64, RuntimeError> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(RuntimeError::TypeMismatch {
            message: format!("expected a number, got {}", other.type_name()),
            span,
        }),
    }
}

/// Equality never fails: values of different shapes are simply unequal,
/// except that ints and floats compare numerically.
fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        _ => false,
    }
}

/// Ordering is defined for number pairs and string pairs only.
fn value_cmp(a: &Value, b: &Value, span: Span) -> Result<Ordering, RuntimeError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Ok(as_number(a, span)?.total_cmp(&as_number(b, span)?))
        }
        _ => Err(RuntimeError::TypeMismatch {
            message: format!("cannot order {} and {}", a.type_name(), b.type_name()),
            span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_stdlib::Builtins;

    fn run_src(src: &str) -> Result<Interpreter<Builtins>, RuntimeError> {
        let result = amp_parser::parse(src);
        let program = result
            .program
            .unwrap_or_else(|| panic!("parse failure in test: {:?}", result.diagnostics));
        let mut interp = Interpreter::new(Builtins::new());
        interp.run(&program)?;
        Ok(interp)
    }

    fn run_ok(src: &str) -> Interpreter<Builtins> {
        match run_src(src) {
            Ok(interp) => interp,
            Err(e) => panic!("unexpected runtime error: {e}"),
        }
    }

    fn run_err(src: &str) -> RuntimeError {
        match run_src(src) {
            Ok(_) => panic!("expected a runtime error"),
            Err(e) => e,
        }
    }

    fn value_of(interp: &Interpreter<Builtins>, name: &str) -> Value {
        interp
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("variable @{name} not set"))
    }

    #[test]
    fn var_starts_null() {
        let interp = run_ok("VAR @a");
        assert_eq!(value_of(&interp, "a"), Value::Null);
    }

    #[test]
    fn redeclare_resets_to_null() {
        let interp = run_ok("%%[ VAR @a SET @a = 5 VAR @a ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Null);
    }

    #[test]
    fn set_evaluates_expression() {
        let interp = run_ok("%%[ VAR @a SET @a = 40 + 2 ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Int(42));
    }

    #[test]
    fn assignment_requires_declaration() {
        let err = run_err("SET @a = 1");
        assert!(matches!(err, RuntimeError::UndefinedVariable { name, .. } if name == "a"));
    }

    #[test]
    fn reading_undeclared_variable_fails() {
        let err = run_err("%%[ VAR @a SET @a = @missing ]%%");
        assert!(matches!(err, RuntimeError::UndefinedVariable { name, .. } if name == "missing"));
    }

    #[test]
    fn integer_arithmetic_stays_exact() {
        let interp = run_ok("%%[ VAR @a SET @a = 2 + 3 * 4 ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Int(14));
    }

    #[test]
    fn division_always_floats() {
        let interp = run_ok("%%[ VAR @q SET @q = 10 / 2 ]%%");
        assert_eq!(value_of(&interp, "q"), Value::Float(5.0));
    }

    #[test]
    fn division_by_zero() {
        let err = run_err("%%[ VAR @a SET @a = 1 / 0 ]%%");
        assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
    }

    #[test]
    fn addition_overflow_is_reported() {
        let err = run_err("%%[ VAR @a SET @a = 9223372036854775807 + 1 ]%%");
        assert!(matches!(err, RuntimeError::Overflow { .. }));
    }

    #[test]
    fn plus_concatenates_strings() {
        let interp = run_ok("%%[ VAR @a SET @a = \"ab\" + \"cd\" ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Str("abcd".into()));
    }

    #[test]
    fn plus_rejects_string_and_number() {
        let err = run_err("%%[ VAR @a SET @a = 1 + \"x\" ]%%");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn comparisons_yield_bools() {
        let interp = run_ok("%%[ VAR @a, @b SET @a = 1 < 2 SET @b = 2 <= 1 ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Bool(true));
        assert_eq!(value_of(&interp, "b"), Value::Bool(false));
    }

    #[test]
    fn equality_promotes_numbers_only() {
        let interp =
            run_ok("%%[ VAR @num, @shape SET @num = 1 == 10 / 10 SET @shape = \"1\" == 1 ]%%");
        assert_eq!(value_of(&interp, "num"), Value::Bool(true));
        assert_eq!(value_of(&interp, "shape"), Value::Bool(false));
    }

    #[test]
    fn ordering_mismatch_is_an_error() {
        let err = run_err("%%[ VAR @a SET @a = \"a\" < 1 ]%%");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn strings_order_lexicographically() {
        let interp = run_ok("%%[ VAR @a SET @a = \"apple\" < \"banana\" ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Bool(true));
    }

    #[test]
    fn logical_ops_do_not_short_circuit() {
        let err = run_err("%%[ VAR @a SET @a = 0 AND 1 / 0 ]%%");
        assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
    }

    #[test]
    fn logical_results() {
        let interp = run_ok("%%[ VAR @a, @b SET @a = 1 AND \"\" SET @b = 0 OR \"x\" ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Bool(false));
        assert_eq!(value_of(&interp, "b"), Value::Bool(true));
    }

    #[test]
    fn not_returns_bool() {
        let interp = run_ok("%%[ VAR @a SET @a = NOT 0 ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Bool(true));
    }

    #[test]
    fn negate_non_number_fails() {
        let err = run_err("%%[ VAR @a SET @a = -\"x\" ]%%");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn if_takes_first_true_branch() {
        let interp = run_ok(
            "%%[ VAR @n, @grade SET @n = 85 \
             IF @n >= 90 THEN SET @grade = \"A\" \
             ELSEIF @n >= 80 THEN SET @grade = \"B\" \
             ELSEIF @n >= 70 THEN SET @grade = \"C\" \
             ELSE SET @grade = \"F\" ENDIF ]%%",
        );
        assert_eq!(value_of(&interp, "grade"), Value::Str("B".into()));
    }

    #[test]
    fn if_falls_through_to_else() {
        let interp =
            run_ok("%%[ VAR @n, @r SET @n = 0 IF @n THEN SET @r = 1 ELSE SET @r = 2 ENDIF ]%%");
        assert_eq!(value_of(&interp, "r"), Value::Int(2));
    }

    #[test]
    fn string_truthiness_in_conditions() {
        let interp = run_ok("%%[ VAR @r SET @r = 0 IF \"yes\" THEN SET @r = 1 ENDIF ]%%");
        assert_eq!(value_of(&interp, "r"), Value::Int(1));
    }

    #[test]
    fn if_rebinds_after_comparison() {
        let interp = run_ok(
            "%%[ VAR @a, @b SET @a = 1 SET @b = 2 IF @a < @b THEN SET @a = 3 ENDIF ]%%",
        );
        assert_eq!(value_of(&interp, "a"), Value::Int(3));
    }

    #[test]
    fn loop_accumulates_while_below_limit() {
        let interp =
            run_ok("%%[ VAR @a SET @a = 0 FOR @i = 1 TO 3 DO SET @a = @a + @i NEXT @i ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Int(3));
    }

    #[test]
    fn for_up_excludes_limit() {
        let interp =
            run_ok("%%[ VAR @sum SET @sum = 0 FOR @i = 1 TO 5 DO SET @sum = @sum + @i NEXT @i ]%%");
        assert_eq!(value_of(&interp, "sum"), Value::Int(10));
    }

    #[test]
    fn for_down_excludes_limit() {
        let interp = run_ok(
            "%%[ VAR @sum SET @sum = 0 FOR @i = 5 DOWNTO 1 DO SET @sum = @sum + @i NEXT @i ]%%",
        );
        assert_eq!(value_of(&interp, "sum"), Value::Int(14));
    }

    #[test]
    fn for_runs_zero_times_at_limit() {
        let interp =
            run_ok("%%[ VAR @hit SET @hit = 0 FOR @i = 5 TO 5 DO SET @hit = 1 NEXT @i ]%%");
        assert_eq!(value_of(&interp, "hit"), Value::Int(0));
    }

    #[test]
    fn loop_variable_dropped_after_loop() {
        let err = run_err(
            "%%[ VAR @x SET @x = 0 FOR @i = 0 TO 3 DO SET @x = @x + 1 NEXT @i SET @x = @i ]%%",
        );
        assert!(matches!(err, RuntimeError::UndefinedVariable { name, .. } if name == "i"));
    }

    #[test]
    fn limit_reevaluates_each_iteration() {
        let interp = run_ok(
            "%%[ VAR @n, @count SET @n = 5 SET @count = 0 \
             FOR @i = 0 TO @n DO SET @n = @n - 1 SET @count = @count + 1 NEXT @i ]%%",
        );
        assert_eq!(value_of(&interp, "count"), Value::Int(3));
    }

    #[test]
    fn body_may_reassign_the_counter() {
        let interp = run_ok(
            "%%[ VAR @count SET @count = 0 \
             FOR @i = 0 TO 10 DO SET @count = @count + 1 SET @i = @i + 4 NEXT @i ]%%",
        );
        assert_eq!(value_of(&interp, "count"), Value::Int(2));
    }

    #[test]
    fn builtin_calls_from_scripts() {
        let interp = run_ok("%%[ VAR @a SET @a = Concat(\"n=\", 2 + 1) ]%%");
        assert_eq!(value_of(&interp, "a"), Value::Str("n=3".into()));
    }

    #[test]
    fn unknown_function_is_reported_at_the_call() {
        let err = run_err("%%[ VAR @a SET @a = Nope(1) ]%%");
        assert!(matches!(err, RuntimeError::UndefinedFunction { name, .. } if name == "Nope"));
    }

    #[test]
    fn builtin_failures_carry_their_message() {
        let err = run_err("%%[ VAR @a SET @a = Length(1) ]%%");
        match err {
            RuntimeError::Builtin { message, .. } => assert!(message.contains("Length")),
            other => panic!("expected builtin error, got {other:?}"),
        }
    }

    #[test]
    fn raise_error_stops_the_run() {
        let err = run_err("%%[ VAR @a SET @a = 1 RaiseError(\"boom\") SET @a = 2 ]%%");
        match err {
            RuntimeError::Builtin { message, .. } => assert_eq!(message, "boom"),
            other => panic!("expected builtin error, got {other:?}"),
        }
    }

    #[test]
    fn error_messages_read_plainly() {
        let err = run_err("SET @a = 1");
        assert_eq!(err.to_string(), "undefined variable '@a'");
    }
}
