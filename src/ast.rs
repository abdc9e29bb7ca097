//! Core value model for the interpreter.
//!
//! [`Value`] is the tagged union shared by the reader, expander, and
//! evaluator: primitive atoms, interned symbols, heterogeneous lists,
//! closures capturing their defining environment, host-native callables, and
//! the `None` sentinel returned by statements with no useful value. The
//! module also implements the printer (`Display`), structural equality
//! (`PartialEq`, used by `equal?`), identity comparison (used by `eq?`), and
//! ergonomic helpers such as [`val`], [`sym`], and [`nil`] for building
//! values in code and tests.
//!
//! The empty list and `None` are distinct: the former is a data value (and
//! truthy), the latter marks "no useful result". Only `#f` is falsey.

use crate::Error;
use crate::builtins::Arity;
use crate::evaluator::Env;
use crate::symbol::Symbol;
use std::fmt;
use std::rc::Rc;

/// Native callable signature: evaluated arguments in, value or error out.
pub type NativeFn = fn(&[Value]) -> Result<Value, Error>;

/// Core value type in the interpreter
#[derive(Clone)]
pub enum Value {
    /// Booleans; `#f` is the only falsey value
    Bool(bool),
    /// Signed integers
    Int(i64),
    /// IEEE-754 doubles
    Float(f64),
    /// UTF-8 strings
    Str(String),
    /// Interned symbols; equality is identity
    Symbol(Symbol),
    /// Ordered sequences; the empty list doubles as Scheme's `()`
    List(Vec<Value>),
    /// User closures: parameter form, body, captured environment
    Closure(Rc<Closure>),
    /// Host-native callables with a display name and declared arity
    Native(NativeProcedure),
    /// Result of `define`, `set!`, and the empty `begin`
    None,
}

/// Parameter form of a closure.
///
/// `(lambda args body)` collects every argument into one list bound to
/// `args`; `(lambda (a b) body)` requires an exact argument count.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Variadic(Symbol),
    Fixed(Vec<Symbol>),
}

impl Params {
    /// Derive the parameter form from a lambda's parameter expression.
    pub(crate) fn from_form(form: &Value) -> Result<Self, Error> {
        match form {
            Value::Symbol(name) => Ok(Params::Variadic(*name)),
            Value::List(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Symbol(name) => names.push(*name),
                        other => {
                            return Err(Error::Syntax(format!(
                                "lambda parameters must be symbols, got {other}"
                            )));
                        }
                    }
                }
                Ok(Params::Fixed(names))
            }
            other => Err(Error::Syntax(format!(
                "lambda parameters must be a symbol or a list of symbols, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Params::Variadic(name) => write!(f, "{}", name.name()),
            Params::Fixed(names) => {
                write!(f, "(")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", name.name())?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A user-defined procedure: canonicalized body plus captured environment.
#[derive(Debug, Clone)]
pub struct Closure {
    pub params: Params,
    pub body: Value,
    pub env: Env,
}

/// A host-native procedure. Arity is validated at application time.
#[derive(Clone)]
pub struct NativeProcedure {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

impl fmt::Debug for NativeProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeProcedure({}, {:?})", self.name, self.arity)
    }
}

impl Value {
    /// Truthiness: only `#f` is false. `None`, `0`, `""`, and `()` are true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Check if a value is the empty list
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(items) if items.is_empty())
    }

    /// Identity comparison, the `eq?` builtin.
    ///
    /// Atoms compare structurally; closures and natives by identity. Lists
    /// carry no stable identity in this representation, so only two empty
    /// lists are `eq?`.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a.is_empty() && b.is_empty(),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            _ => self == other,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str(\"{s}\")"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "List(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                write!(f, ")")
            }
            Value::Closure(c) => write!(f, "Closure(params={}, body={:?})", c.params, c.body),
            Value::Native(n) => write!(f, "Native({})", n.name),
            Value::None => write!(f, "None"),
        }
    }
}

/// The printer: `#t`/`#f`, bare symbol names, `(e1 e2 ...)` for lists,
/// `#<NativeProcedure:NAME>` for natives, `(lambda p body)` for closures,
/// and the empty string for `None`. Strings are quoted without re-escaping.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Symbol(s) => write!(f, "{}", s.name()),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Closure(c) => write!(f, "(lambda {} {})", c.params, c.body),
            Value::Native(n) => write!(f, "#<NativeProcedure:{}>", n.name),
            Value::None => Ok(()),
        }
    }
}

/// Deep structural equality, the `equal?` builtin. Closures compare by
/// identity, natives by name; `Int` and `Float` are distinct tags (use the
/// numeric `=` builtin for tolerant cross-type comparison).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::None, Value::None) => true,
            _ => false,
        }
    }
}

// From trait implementations for Value - enables .into() conversion

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Int(n as i64)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64); // no casting in practice
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

/// Helper function for creating symbol values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym(name: &str) -> Value {
    Value::Symbol(crate::symbol::intern(name))
}

/// Helper function for creating Values from any convertible type
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::List(vec![])
}
