//! Built-in native procedures.
//!
//! Builtins are plain function pointers over evaluated argument slices,
//! registered in a single static table with their declared [`Arity`]. The
//! table is seeded into the base frame of every new interpreter; user code
//! reaches builtins through ordinary symbol lookup, so they can be shadowed,
//! stored in variables, and passed to higher-order functions.
//!
//! Arithmetic is a variadic left-fold over two-argument kernels: if both
//! operands are `Int` the result is `Int` (truncating division, Int-only
//! modulus), otherwise both coerce to `Float`. Integer overflow is detected
//! and reported rather than wrapped.

use crate::Error;
use crate::ast::{NativeProcedure, Value};
use crate::evaluator::apply_procedure;
use crate::symbol::{Symbol, intern};
use rustc_hash::FxHashMap;

/// Numeric equality tolerance used by the `=` builtin. Inherited behavior:
/// operands compare as floats within this absolute difference.
pub const NUMERIC_EQ_TOLERANCE: f64 = 1e-13;

/// Expected number of arguments for a native procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// At least this many arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check if the given number of arguments is valid
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        let valid = match self {
            Arity::Exact(expected) => got == *expected,
            Arity::AtLeast(min) => got >= *min,
            Arity::Range(min, max) => got >= *min && got <= *max,
            Arity::Any => true,
        };
        if valid {
            Ok(())
        } else {
            Err(Error::arity(self.minimum(), got))
        }
    }

    fn minimum(&self) -> usize {
        match self {
            Arity::Exact(n) | Arity::AtLeast(n) | Arity::Range(n, _) => *n,
            Arity::Any => 0,
        }
    }
}

//
// Numeric tower
//

/// A number pulled out of a `Value`: the two-tag tower shared by all
/// arithmetic kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

impl From<Num> for Value {
    fn from(num: Num) -> Self {
        match num {
            Num::Int(n) => Value::Int(n),
            Num::Float(x) => Value::Float(x),
        }
    }
}

fn as_num(value: &Value) -> Result<Num, Error> {
    match value {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Float(x) => Ok(Num::Float(*x)),
        other => Err(Error::Type(format!("expected a number, got {other}"))),
    }
}

fn as_int(value: &Value, who: &str) -> Result<i64, Error> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(Error::Type(format!(
            "{who} expects integer arguments, got {other}"
        ))),
    }
}

fn as_list<'a>(value: &'a Value, who: &str) -> Result<&'a [Value], Error> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(Error::Type(format!("{who} expects a list, got {other}"))),
    }
}

// Two-argument kernels. Int/Int stays Int with overflow checking; any Float
// operand promotes both sides.

fn kernel_add(a: Num, b: Num) -> Result<Num, Error> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => a
            .checked_add(b)
            .map(Num::Int)
            .ok_or_else(|| Error::Type("integer overflow in addition".to_owned())),
        _ => Ok(Num::Float(a.as_f64() + b.as_f64())),
    }
}

fn kernel_sub(a: Num, b: Num) -> Result<Num, Error> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => a
            .checked_sub(b)
            .map(Num::Int)
            .ok_or_else(|| Error::Type("integer overflow in subtraction".to_owned())),
        _ => Ok(Num::Float(a.as_f64() - b.as_f64())),
    }
}

fn kernel_mul(a: Num, b: Num) -> Result<Num, Error> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => a
            .checked_mul(b)
            .map(Num::Int)
            .ok_or_else(|| Error::Type("integer overflow in multiplication".to_owned())),
        _ => Ok(Num::Float(a.as_f64() * b.as_f64())),
    }
}

fn kernel_div(a: Num, b: Num) -> Result<Num, Error> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => {
            if b == 0 {
                return Err(Error::Type("division by zero".to_owned()));
            }
            a.checked_div(b)
                .map(Num::Int)
                .ok_or_else(|| Error::Type("integer overflow in division".to_owned()))
        }
        _ => Ok(Num::Float(a.as_f64() / b.as_f64())),
    }
}

/// Modulus is defined for Int/Int only.
fn kernel_mod(a: Num, b: Num) -> Result<Num, Error> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => {
            if b == 0 {
                return Err(Error::Type("modulus by zero".to_owned()));
            }
            a.checked_rem(b)
                .map(Num::Int)
                .ok_or_else(|| Error::Type("integer overflow in modulus".to_owned()))
        }
        _ => Err(Error::Type(
            "% requires integer operands on both sides".to_owned(),
        )),
    }
}

fn fold_numeric(
    args: &[Value],
    kernel: fn(Num, Num) -> Result<Num, Error>,
) -> Result<Value, Error> {
    let mut acc = as_num(&args[0])?;
    for arg in &args[1..] {
        acc = kernel(acc, as_num(arg)?)?;
    }
    Ok(acc.into())
}

//
// Arithmetic
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    if args.is_empty() {
        return Ok(Value::Int(0));
    }
    fold_numeric(args, kernel_add)
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let [single] = args else {
        return fold_numeric(args, kernel_sub);
    };
    // unary minus is negation
    match as_num(single)? {
        Num::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::Type("integer overflow in negation".to_owned())),
        Num::Float(x) => Ok(Value::Float(-x)),
    }
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    fold_numeric(args, kernel_mul)
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    fold_numeric(args, kernel_div)
}

fn builtin_mod(args: &[Value]) -> Result<Value, Error> {
    fold_numeric(args, kernel_mod)
}

//
// Comparisons (binary, numeric)
//

/// Numeric equality compares as floats with absolute tolerance
/// [`NUMERIC_EQ_TOLERANCE`].
fn builtin_num_eq(args: &[Value]) -> Result<Value, Error> {
    let a = as_num(&args[0])?.as_f64();
    let b = as_num(&args[1])?.as_f64();
    Ok(Value::Bool((a - b).abs() < NUMERIC_EQ_TOLERANCE))
}

macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let a = as_num(&args[0])?.as_f64();
            let b = as_num(&args[1])?.as_f64();
            Ok(Value::Bool(a $op b))
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_ge, >=);

//
// Predicates
//

fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_identical(&args[1])))
}

fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0] == args[1]))
}

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!args[0].is_truthy()))
}

macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            Ok(Value::Bool(matches!(&args[0], $pattern)))
        }
    };
}

type_predicate!(builtin_boolean_p, Value::Bool(_));
type_predicate!(builtin_num_p, Value::Int(_) | Value::Float(_));
type_predicate!(builtin_string_p, Value::Str(_));
type_predicate!(builtin_symbol_p, Value::Symbol(_));
type_predicate!(builtin_list_p, Value::List(_));

fn builtin_null_p(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_nil()))
}

//
// List operations
//

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

fn builtin_length(args: &[Value]) -> Result<Value, Error> {
    let items = as_list(&args[0], "length")?;
    Ok(Value::Int(items.len() as i64))
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    let items = as_list(&args[0], "car")?;
    match items.first() {
        Some(first) => Ok(first.clone()),
        None => Err(Error::Type("car of empty list".to_owned())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    let items = as_list(&args[0], "cdr")?;
    match items.split_first() {
        Some((_, rest)) => Ok(Value::List(rest.to_vec())),
        None => Err(Error::Type("cdr of empty list".to_owned())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    let tail = as_list(&args[1], "cons")?;
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(args[0].clone());
    items.extend_from_slice(tail);
    Ok(Value::List(items))
}

fn builtin_append(args: &[Value]) -> Result<Value, Error> {
    let left = as_list(&args[0], "append")?;
    let right = as_list(&args[1], "append")?;
    let mut items = Vec::with_capacity(left.len() + right.len());
    items.extend_from_slice(left);
    items.extend_from_slice(right);
    Ok(Value::List(items))
}

fn builtin_reverse(args: &[Value]) -> Result<Value, Error> {
    let items = as_list(&args[0], "reverse")?;
    Ok(Value::List(items.iter().rev().cloned().collect()))
}

fn builtin_list_ref(args: &[Value]) -> Result<Value, Error> {
    let items = as_list(&args[0], "list-ref")?;
    let index = as_int(&args[1], "list-ref")?;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or_else(|| {
            Error::Type(format!(
                "list-ref index {index} out of bounds for list of length {}",
                items.len()
            ))
        })
}

fn builtin_map(args: &[Value]) -> Result<Value, Error> {
    let items = as_list(&args[1], "map")?;
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(apply_procedure(&args[0], vec![item.clone()])?);
    }
    Ok(Value::List(mapped))
}

fn builtin_apply(args: &[Value]) -> Result<Value, Error> {
    let call_args = as_list(&args[1], "apply")?;
    apply_procedure(&args[0], call_args.to_vec())
}

/// `(range stop)`, `(range start stop)`, `(range start stop step)`;
/// integer arguments, zero step rejected, direction taken from the step's
/// sign as in Python.
fn builtin_range(args: &[Value]) -> Result<Value, Error> {
    let (start, stop, step) = match args {
        [stop] => (0, as_int(stop, "range")?, 1),
        [start, stop] => (as_int(start, "range")?, as_int(stop, "range")?, 1),
        [start, stop, step] => (
            as_int(start, "range")?,
            as_int(stop, "range")?,
            as_int(step, "range")?,
        ),
        _ => return Err(Error::arity(1, args.len())),
    };
    if step == 0 {
        return Err(Error::Type("range step must not be zero".to_owned()));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        current += step;
    }
    Ok(Value::List(items))
}

//
// Strings and symbols
//

fn builtin_symbol_to_string(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Symbol(s) => Ok(Value::Str(s.name().to_owned())),
        other => Err(Error::Type(format!(
            "symbol->string expects a symbol, got {other}"
        ))),
    }
}

fn builtin_string_append(args: &[Value]) -> Result<Value, Error> {
    let mut result = String::new();
    for arg in args {
        match arg {
            Value::Str(s) => result.push_str(s),
            other => {
                return Err(Error::Type(format!(
                    "string-append expects strings, got {other}"
                )));
            }
        }
    }
    Ok(Value::Str(result))
}

fn builtin_string_length(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(Error::Type(format!(
            "string-length expects a string, got {other}"
        ))),
    }
}

//
// Misc
//

/// `(assert pred)` or `(assert pred "message")`
fn builtin_assert(args: &[Value]) -> Result<Value, Error> {
    if args[0].is_truthy() {
        return Ok(Value::None);
    }
    let message = match args.get(1) {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => format!("{other}"),
        None => "assertion failed".to_owned(),
    };
    Err(Error::Assertion(message))
}

fn builtin_null(_args: &[Value]) -> Result<Value, Error> {
    Ok(Value::None)
}

fn builtin_max(args: &[Value]) -> Result<Value, Error> {
    fold_numeric(args, |a, b| match (a, b) {
        (Num::Int(a), Num::Int(b)) => Ok(Num::Int(a.max(b))),
        _ => Ok(Num::Float(a.as_f64().max(b.as_f64()))),
    })
}

fn builtin_min(args: &[Value]) -> Result<Value, Error> {
    fold_numeric(args, |a, b| match (a, b) {
        (Num::Int(a), Num::Int(b)) => Ok(Num::Int(a.min(b))),
        _ => Ok(Num::Float(a.as_f64().min(b.as_f64()))),
    })
}

fn builtin_abs(args: &[Value]) -> Result<Value, Error> {
    match as_num(&args[0])? {
        Num::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| Error::Type("integer overflow in abs".to_owned())),
        Num::Float(x) => Ok(Value::Float(x.abs())),
    }
}

fn builtin_display(args: &[Value]) -> Result<Value, Error> {
    // bare strings display without quotes
    match &args[0] {
        Value::Str(s) => print!("{s}"),
        other => print!("{other}"),
    }
    Ok(Value::None)
}

fn builtin_newline(_args: &[Value]) -> Result<Value, Error> {
    println!();
    Ok(Value::None)
}

//
// Registry
//

/// The builtin registry: every native procedure seeded into the base frame.
static BUILTINS: &[NativeProcedure] = &[
    // arithmetic
    NativeProcedure { name: "+", arity: Arity::AtLeast(0), func: builtin_add },
    NativeProcedure { name: "-", arity: Arity::AtLeast(1), func: builtin_sub },
    NativeProcedure { name: "*", arity: Arity::AtLeast(1), func: builtin_mul },
    NativeProcedure { name: "/", arity: Arity::AtLeast(2), func: builtin_div },
    NativeProcedure { name: "%", arity: Arity::Exact(2), func: builtin_mod },
    // comparisons
    NativeProcedure { name: "=", arity: Arity::Exact(2), func: builtin_num_eq },
    NativeProcedure { name: "<", arity: Arity::Exact(2), func: builtin_lt },
    NativeProcedure { name: "<=", arity: Arity::Exact(2), func: builtin_le },
    NativeProcedure { name: ">", arity: Arity::Exact(2), func: builtin_gt },
    NativeProcedure { name: ">=", arity: Arity::Exact(2), func: builtin_ge },
    // predicates
    NativeProcedure { name: "eq?", arity: Arity::Exact(2), func: builtin_eq },
    NativeProcedure { name: "equal?", arity: Arity::Exact(2), func: builtin_equal },
    NativeProcedure { name: "boolean?", arity: Arity::Exact(1), func: builtin_boolean_p },
    NativeProcedure { name: "num?", arity: Arity::Exact(1), func: builtin_num_p },
    NativeProcedure { name: "string?", arity: Arity::Exact(1), func: builtin_string_p },
    NativeProcedure { name: "symbol?", arity: Arity::Exact(1), func: builtin_symbol_p },
    NativeProcedure { name: "list?", arity: Arity::Exact(1), func: builtin_list_p },
    NativeProcedure { name: "null?", arity: Arity::Exact(1), func: builtin_null_p },
    NativeProcedure { name: "not", arity: Arity::Exact(1), func: builtin_not },
    // lists
    NativeProcedure { name: "list", arity: Arity::Any, func: builtin_list },
    NativeProcedure { name: "length", arity: Arity::Exact(1), func: builtin_length },
    NativeProcedure { name: "car", arity: Arity::Exact(1), func: builtin_car },
    NativeProcedure { name: "cdr", arity: Arity::Exact(1), func: builtin_cdr },
    NativeProcedure { name: "cons", arity: Arity::Exact(2), func: builtin_cons },
    NativeProcedure { name: "append", arity: Arity::Exact(2), func: builtin_append },
    NativeProcedure { name: "reverse", arity: Arity::Exact(1), func: builtin_reverse },
    NativeProcedure { name: "list-ref", arity: Arity::Exact(2), func: builtin_list_ref },
    NativeProcedure { name: "map", arity: Arity::Exact(2), func: builtin_map },
    NativeProcedure { name: "apply", arity: Arity::Exact(2), func: builtin_apply },
    NativeProcedure { name: "range", arity: Arity::Range(1, 3), func: builtin_range },
    // strings and symbols
    NativeProcedure { name: "symbol->string", arity: Arity::Exact(1), func: builtin_symbol_to_string },
    NativeProcedure { name: "string-append", arity: Arity::Any, func: builtin_string_append },
    NativeProcedure { name: "string-length", arity: Arity::Exact(1), func: builtin_string_length },
    // misc
    NativeProcedure { name: "assert", arity: Arity::Range(1, 2), func: builtin_assert },
    NativeProcedure { name: "null", arity: Arity::Exact(0), func: builtin_null },
    NativeProcedure { name: "max", arity: Arity::AtLeast(1), func: builtin_max },
    NativeProcedure { name: "min", arity: Arity::AtLeast(1), func: builtin_min },
    NativeProcedure { name: "abs", arity: Arity::Exact(1), func: builtin_abs },
    NativeProcedure { name: "display", arity: Arity::Exact(1), func: builtin_display },
    NativeProcedure { name: "newline", arity: Arity::Exact(0), func: builtin_newline },
];

/// Base bindings for a fresh interpreter environment.
pub(crate) fn base_bindings() -> FxHashMap<Symbol, Value> {
    BUILTINS
        .iter()
        .map(|native| (intern(native.name), Value::Native(native.clone())))
        .collect()
}
