use std::fmt;

// ── Runtime values ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{n}"),
            // Whole floats keep their decimal point so division results
            // stay visibly distinct from integers.
            Value::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

// ── Function call errors ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FuncError {
    Unknown(String),
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    Type {
        name: String,
        message: String,
    },
    Raised(String),
}

impl fmt::Display for FuncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncError::Unknown(name) => write!(f, "unknown function '{name}'"),
            FuncError::Arity {
                name,
                expected,
                got,
            } => write!(f, "{name} expects {expected} argument(s), got {got}"),
            FuncError::Type { name, message } => write!(f, "{name}: {message}"),
            FuncError::Raised(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FuncError {}

// ── Registry ──────────────────────────────────────────────────────

/// Resolves call names at run time. The interpreter checks `has` before
/// dispatching so an unknown name is reported against the call site.
pub trait FunctionRegistry {
    fn has(&self, name: &str) -> bool;
    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, FuncError>;
}

/// The built-in function set. Output goes straight to stdout.
pub struct Builtins;

impl Builtins {
    pub const NAMES: &'static [&'static str] = &[
        "Output",
        "OutputLine",
        "V",
        "Write",
        "Concat",
        "Length",
        "Lowercase",
        "Uppercase",
        "ProperCase",
        "Trim",
        "Substring",
        "IndexOf",
        "Replace",
        "Char",
        "String",
        "Empty",
        "IsNull",
        "IsNullDefault",
        "IIf",
        "Add",
        "Subtract",
        "Multiply",
        "Divide",
        "Mod",
        "RaiseError",
    ];

    pub fn new() -> Self {
        Builtins
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry for Builtins {
    fn has(&self, name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, FuncError> {
        match name {
            "Output" | "OutputLine" | "V" => {
                let [v] = take_args(name, "1", args)?;
                println!("{v}");
                Ok(Value::Null)
            }
            "Write" => {
                let [v] = take_args(name, "1", args)?;
                print!("{v}");
                Ok(Value::Null)
            }
            "Concat" => {
                let mut out = String::new();
                for arg in &args {
                    out.push_str(&arg.to_string());
                }
                Ok(Value::Str(out))
            }
            "Length" => {
                let [v] = take_args(name, "1", args)?;
                let s = want_str(name, &v)?;
                Ok(Value::Int(s.chars().count() as i64))
            }
            "Lowercase" => {
                let [v] = take_args(name, "1", args)?;
                Ok(Value::Str(want_str(name, &v)?.to_lowercase()))
            }
            "Uppercase" => {
                let [v] = take_args(name, "1", args)?;
                Ok(Value::Str(want_str(name, &v)?.to_uppercase()))
            }
            "ProperCase" => {
                let [v] = take_args(name, "1", args)?;
                Ok(Value::Str(proper_case(&want_str(name, &v)?)))
            }
            "Trim" => {
                let [v] = take_args(name, "1", args)?;
                Ok(Value::Str(want_str(name, &v)?.trim().to_string()))
            }
            "Substring" => {
                let [text, pos, len] = take_args(name, "3", args)?;
                let text = want_str(name, &text)?;
                let pos = want_int(name, &pos)?;
                let len = want_int(name, &len)?;
                if pos < 0 || len < 0 {
                    return Err(type_err(name, "position and length must be non-negative"));
                }
                let out: String = text
                    .chars()
                    .skip(pos as usize)
                    .take(len as usize)
                    .collect();
                Ok(Value::Str(out))
            }
            "IndexOf" => {
                let [haystack, needle] = take_args(name, "2", args)?;
                let haystack = want_str(name, &haystack)?;
                let needle = want_str(name, &needle)?;
                let index = haystack
                    .find(&needle)
                    .map(|byte| haystack[..byte].chars().count() as i64)
                    .unwrap_or(-1);
                Ok(Value::Int(index))
            }
            "Replace" => {
                let [text, from, to] = take_args(name, "3", args)?;
                let text = want_str(name, &text)?;
                let from = want_str(name, &from)?;
                let to = want_str(name, &to)?;
                Ok(Value::Str(text.replace(&from, &to)))
            }
            "Char" => {
                if args.len() != 1 && args.len() != 2 {
                    return Err(arity(name, "1 or 2", args.len()));
                }
                let code = want_int(name, &args[0])?;
                let count = match args.get(1) {
                    Some(v) => want_int(name, v)?,
                    None => 1,
                };
                if count < 0 {
                    return Err(type_err(name, "repeat count must be non-negative"));
                }
                let ch = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| type_err(name, format!("invalid character code {code}")))?;
                Ok(Value::Str(ch.to_string().repeat(count as usize)))
            }
            "String" => {
                let [v] = take_args(name, "1", args)?;
                Ok(Value::Str(v.to_string()))
            }
            "Empty" => {
                let [v] = take_args(name, "1", args)?;
                Ok(Value::Bool(want_str(name, &v)?.is_empty()))
            }
            "IsNull" => {
                let [v] = take_args(name, "1", args)?;
                Ok(Value::Bool(v == Value::Null))
            }
            "IsNullDefault" => {
                let [v, default] = take_args(name, "2", args)?;
                if v == Value::Null {
                    Ok(default)
                } else {
                    Ok(v)
                }
            }
            "IIf" => {
                let [cond, if_true, if_false] = take_args(name, "3", args)?;
                if cond.is_truthy() {
                    Ok(if_true)
                } else {
                    Ok(if_false)
                }
            }
            "Add" => {
                let [a, b] = take_args(name, "2", args)?;
                if let (Value::Str(a), Value::Str(b)) = (&a, &b) {
                    return Ok(Value::Str(format!("{a}{b}")));
                }
                match numeric_pair(name, &a, &b)? {
                    NumPair::Int(a, b) => a
                        .checked_add(b)
                        .map(Value::Int)
                        .ok_or_else(|| type_err(name, "integer overflow")),
                    NumPair::Float(a, b) => Ok(Value::Float(a + b)),
                }
            }
            "Subtract" => {
                let [a, b] = take_args(name, "2", args)?;
                match numeric_pair(name, &a, &b)? {
                    NumPair::Int(a, b) => a
                        .checked_sub(b)
                        .map(Value::Int)
                        .ok_or_else(|| type_err(name, "integer overflow")),
                    NumPair::Float(a, b) => Ok(Value::Float(a - b)),
                }
            }
            "Multiply" => {
                let [a, b] = take_args(name, "2", args)?;
                match numeric_pair(name, &a, &b)? {
                    NumPair::Int(a, b) => a
                        .checked_mul(b)
                        .map(Value::Int)
                        .ok_or_else(|| type_err(name, "integer overflow")),
                    NumPair::Float(a, b) => Ok(Value::Float(a * b)),
                }
            }
            "Divide" => {
                let [a, b] = take_args(name, "2", args)?;
                let a = want_number(name, &a)?;
                let b = want_number(name, &b)?;
                if b == 0.0 {
                    return Err(type_err(name, "division by zero"));
                }
                Ok(Value::Float(a / b))
            }
            "Mod" => {
                let [a, b] = take_args(name, "2", args)?;
                match numeric_pair(name, &a, &b)? {
                    NumPair::Int(a, b) => {
                        if b == 0 {
                            return Err(type_err(name, "division by zero"));
                        }
                        let r = a
                            .checked_rem(b)
                            .ok_or_else(|| type_err(name, "integer overflow"))?;
                        // The remainder takes the divisor's sign.
                        let r = if r != 0 && (r < 0) != (b < 0) { r + b } else { r };
                        Ok(Value::Int(r))
                    }
                    NumPair::Float(a, b) => {
                        if b == 0.0 {
                            return Err(type_err(name, "division by zero"));
                        }
                        let r = a % b;
                        let r = if r != 0.0 && (r < 0.0) != (b < 0.0) {
                            r + b
                        } else {
                            r
                        };
                        Ok(Value::Float(r))
                    }
                }
            }
            "RaiseError" => {
                let [msg] = take_args(name, "1", args)?;
                Err(FuncError::Raised(msg.to_string()))
            }
            _ => Err(FuncError::Unknown(name.to_string())),
        }
    }
}

// ── Argument helpers ──────────────────────────────────────────────

fn arity(name: &str, expected: &str, got: usize) -> FuncError {
    FuncError::Arity {
        name: name.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn type_err(name: &str, message: impl Into<String>) -> FuncError {
    FuncError::Type {
        name: name.to_string(),
        message: message.into(),
    }
}

fn take_args<const N: usize>(
    name: &str,
    expected: &str,
    args: Vec<Value>,
) -> Result<[Value; N], FuncError> {
    let got = args.len();
    args.try_into().map_err(|_| arity(name, expected, got))
}

fn want_str(name: &str, v: &Value) -> Result<String, FuncError> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        other => Err(type_err(
            name,
            format!("expected a string, got {}", other.type_name()),
        )),
    }
}

fn want_int(name: &str, v: &Value) -> Result<i64, FuncError> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(type_err(
            name,
            format!("expected an integer, got {}", other.type_name()),
        )),
    }
}

fn want_number(name: &str, v: &Value) -> Result<f64, FuncError> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(type_err(
            name,
            format!("expected a number, got {}", other.type_name()),
        )),
    }
}

enum NumPair {
    Int(i64, i64),
    Float(f64, f64),
}

// Two ints stay exact; any float promotes both sides.
fn numeric_pair(name: &str, a: &Value, b: &Value) -> Result<NumPair, FuncError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(NumPair::Int(*a, *b)),
        _ => Ok(NumPair::Float(
            want_number(name, a)?,
            want_number(name, b)?,
        )),
    }
}

fn proper_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, FuncError> {
        Builtins::new().call(name, args)
    }

    #[test]
    fn display_formats() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }

    #[test]
    fn concat_joins_display_forms() {
        let result = call(
            "Concat",
            vec![
                Value::Str("n=".into()),
                Value::Int(3),
                Value::Str(", ".into()),
                Value::Null,
            ],
        );
        assert_eq!(result, Ok(Value::Str("n=3, NULL".into())));
        assert_eq!(call("Concat", vec![]), Ok(Value::Str(String::new())));
    }

    #[test]
    fn length_counts_chars() {
        assert_eq!(
            call("Length", vec![Value::Str("héllo".into())]),
            Ok(Value::Int(5))
        );
    }

    #[test]
    fn length_rejects_non_strings() {
        assert!(matches!(
            call("Length", vec![Value::Int(9)]),
            Err(FuncError::Type { .. })
        ));
    }

    #[test]
    fn proper_case_titles_words() {
        assert_eq!(
            call("ProperCase", vec![Value::Str("hELLo wORLD".into())]),
            Ok(Value::Str("Hello World".into()))
        );
        assert_eq!(
            call("ProperCase", vec![Value::Str("o'neil".into())]),
            Ok(Value::Str("O'Neil".into()))
        );
    }

    #[test]
    fn substring_is_char_based() {
        assert_eq!(
            call(
                "Substring",
                vec![Value::Str("héllo".into()), Value::Int(1), Value::Int(3)]
            ),
            Ok(Value::Str("éll".into()))
        );
    }

    #[test]
    fn substring_rejects_negative() {
        assert!(matches!(
            call(
                "Substring",
                vec![Value::Str("abc".into()), Value::Int(-1), Value::Int(2)]
            ),
            Err(FuncError::Type { .. })
        ));
    }

    #[test]
    fn index_of_returns_char_index() {
        assert_eq!(
            call(
                "IndexOf",
                vec![Value::Str("héllo".into()), Value::Str("llo".into())]
            ),
            Ok(Value::Int(2))
        );
        assert_eq!(
            call(
                "IndexOf",
                vec![Value::Str("abc".into()), Value::Str("z".into())]
            ),
            Ok(Value::Int(-1))
        );
    }

    #[test]
    fn char_repeats() {
        assert_eq!(
            call("Char", vec![Value::Int(65), Value::Int(3)]),
            Ok(Value::Str("AAA".into()))
        );
        assert_eq!(call("Char", vec![Value::Int(65)]), Ok(Value::Str("A".into())));
    }

    #[test]
    fn char_rejects_bad_code() {
        assert!(matches!(
            call("Char", vec![Value::Int(0x110000)]),
            Err(FuncError::Type { .. })
        ));
    }

    #[test]
    fn divide_always_floats() {
        assert_eq!(
            call("Divide", vec![Value::Int(10), Value::Int(2)]),
            Ok(Value::Float(5.0))
        );
    }

    #[test]
    fn divide_by_zero() {
        let err = call("Divide", vec![Value::Int(1), Value::Int(0)]).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn mod_stays_integer() {
        assert_eq!(
            call("Mod", vec![Value::Int(7), Value::Int(3)]),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn mod_sign_follows_the_divisor() {
        assert_eq!(
            call("Mod", vec![Value::Int(-7), Value::Int(3)]),
            Ok(Value::Int(2))
        );
        assert_eq!(
            call("Mod", vec![Value::Int(7), Value::Int(-3)]),
            Ok(Value::Int(-2))
        );
        assert_eq!(
            call("Mod", vec![Value::Float(-7.5), Value::Int(2)]),
            Ok(Value::Float(0.5))
        );
    }

    #[test]
    fn mod_overflow_is_reported() {
        assert!(matches!(
            call("Mod", vec![Value::Int(i64::MIN), Value::Int(-1)]),
            Err(FuncError::Type { .. })
        ));
    }

    #[test]
    fn add_concatenates_strings() {
        assert_eq!(
            call(
                "Add",
                vec![Value::Str("ab".into()), Value::Str("cd".into())]
            ),
            Ok(Value::Str("abcd".into()))
        );
    }

    #[test]
    fn add_promotes_mixed_numbers() {
        assert_eq!(
            call("Add", vec![Value::Int(1), Value::Float(0.5)]),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            call("Add", vec![Value::Int(1), Value::Int(2)]),
            Ok(Value::Int(3))
        );
    }

    #[test]
    fn iif_picks_branch() {
        assert_eq!(
            call(
                "IIf",
                vec![Value::Bool(true), Value::Int(1), Value::Int(2)]
            ),
            Ok(Value::Int(1))
        );
        assert_eq!(
            call("IIf", vec![Value::Int(0), Value::Int(1), Value::Int(2)]),
            Ok(Value::Int(2))
        );
    }

    #[test]
    fn is_null_and_default() {
        assert_eq!(call("IsNull", vec![Value::Null]), Ok(Value::Bool(true)));
        assert_eq!(call("IsNull", vec![Value::Int(0)]), Ok(Value::Bool(false)));
        assert_eq!(
            call(
                "IsNullDefault",
                vec![Value::Null, Value::Str("fallback".into())]
            ),
            Ok(Value::Str("fallback".into()))
        );
        assert_eq!(
            call("IsNullDefault", vec![Value::Int(7), Value::Int(0)]),
            Ok(Value::Int(7))
        );
    }

    #[test]
    fn arity_error_message() {
        let err = call("Length", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "Length expects 1 argument(s), got 0");
    }

    #[test]
    fn unknown_function() {
        let err = call("Nope", vec![]).unwrap_err();
        assert_eq!(err, FuncError::Unknown("Nope".into()));
    }

    #[test]
    fn raise_error_surfaces_message() {
        let err = call("RaiseError", vec![Value::Str("boom".into())]).unwrap_err();
        assert_eq!(err, FuncError::Raised("boom".into()));
    }

    #[test]
    fn names_cover_dispatch() {
        let mut builtins = Builtins::new();
        for name in Builtins::NAMES {
            assert!(builtins.has(name));
            // Every listed name dispatches to something other than Unknown.
            let result = builtins.call(name, vec![]);
            assert!(
                !matches!(result, Err(FuncError::Unknown(_))),
                "{name} is listed but not dispatched"
            );
        }
    }
}
