//! Environment chain and the tail-call trampoline.
//!
//! [`Env`] is a chain of mutable frames. Lookups walk outward; `define`
//! writes into the innermost frame unconditionally; `set!` writes into the
//! nearest frame that already binds the symbol. Frames are shared by
//! reference, so a closure and the top level observe each other's mutations
//! of a common frame.
//!
//! [`eval`] maintains a mutable `(expr, env)` pair and loops: `if` branches,
//! `begin` tails, and closure applications replace the pair instead of
//! recursing, which keeps tail-calling user code in constant host-stack
//! space. Only subexpressions whose value is needed immediately (conditions,
//! arguments, `define`/`set!` values, non-tail `begin` forms) recurse.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Closure, Params, Value};
use crate::symbol::{Symbol, reserved};

struct Frame {
    bindings: FxHashMap<Symbol, Value>,
    outer: Option<Env>,
}

/// A lexical environment: a shared handle to the innermost frame.
#[derive(Clone)]
pub struct Env {
    head: Rc<RefCell<Frame>>,
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // frames reference each other cyclically through closures, so only
        // the innermost frame's size is printed
        write!(f, "Env(<{} bindings>)", self.head.borrow().bindings.len())
    }
}

impl PartialEq for Env {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.head, &other.head)
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

impl Env {
    /// A fresh environment with a single empty frame and no outer chain.
    pub fn new() -> Self {
        Env {
            head: Rc::new(RefCell::new(Frame {
                bindings: FxHashMap::default(),
                outer: None,
            })),
        }
    }

    /// A new innermost frame holding `bindings`, chained onto `outer`.
    pub fn extend(bindings: FxHashMap<Symbol, Value>, outer: &Env) -> Self {
        Env {
            head: Rc::new(RefCell::new(Frame {
                bindings,
                outer: Some(outer.clone()),
            })),
        }
    }

    /// The frame created for a closure invocation: parameters bound to
    /// arguments, chained onto the closure's captured environment.
    pub(crate) fn from_params_and_args(
        params: &Params,
        args: Vec<Value>,
        outer: &Env,
    ) -> Result<Self, Error> {
        let mut bindings = FxHashMap::default();
        match params {
            Params::Variadic(name) => {
                bindings.insert(*name, Value::List(args));
            }
            Params::Fixed(names) => {
                if names.len() != args.len() {
                    return Err(Error::arity(names.len(), args.len()));
                }
                for (name, arg) in names.iter().zip(args) {
                    bindings.insert(*name, arg);
                }
            }
        }
        Ok(Env::extend(bindings, outer))
    }

    /// Look a symbol up, walking outward through the chain.
    pub fn get(&self, name: &Symbol) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let frame = current.head.borrow();
                if let Some(value) = frame.bindings.get(name) {
                    return Some(value.clone());
                }
                frame.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return None,
            }
        }
    }

    /// Bind a symbol in the innermost frame, shadowing any outer binding.
    /// This is `define`.
    pub fn put(&self, name: Symbol, value: Value) {
        self.head.borrow_mut().bindings.insert(name, value);
    }

    /// The nearest frame (starting here, walking outward) that binds `name`.
    pub fn find_containing(&self, name: &Symbol) -> Option<Env> {
        let mut current = self.clone();
        loop {
            let next = {
                let frame = current.head.borrow();
                if frame.bindings.contains_key(name) {
                    return Some(current.clone());
                }
                frame.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return None,
            }
        }
    }

    /// Overwrite the binding in its containing frame. This is `set!`; it
    /// fails if no frame binds the symbol.
    pub fn assign(&self, name: Symbol, value: Value) -> Result<(), Error> {
        match self.find_containing(&name) {
            Some(containing) => {
                containing.head.borrow_mut().bindings.insert(name, value);
                Ok(())
            }
            None => Err(Error::UnboundSymbol(name.to_string())),
        }
    }
}

/// Evaluate a canonicalized expression in an environment.
///
/// Expressions are expected to have passed through the expander; raw special
/// forms with uncanonical shapes (a two-armed `if`, an unexpanded
/// `define-macro`) are rejected rather than silently interpreted.
pub fn eval(expr: &Value, env: &Env) -> Result<Value, Error> {
    let r = reserved();
    let mut expr = expr.clone();
    let mut env = env.clone();

    loop {
        match expr {
            Value::Symbol(name) => {
                return env
                    .get(&name)
                    .ok_or_else(|| Error::UnboundSymbol(name.to_string()));
            }
            Value::List(elements) => {
                if elements.is_empty() {
                    return Err(Error::Type("cannot evaluate the empty list".to_owned()));
                }

                if let Some(Value::Symbol(head)) = elements.first() {
                    let head = *head;

                    if head == r.quote {
                        let [_, datum] = elements.as_slice() else {
                            return Err(Error::Syntax(format!(
                                "quote takes one operand: {}",
                                Value::List(elements.clone())
                            )));
                        };
                        return Ok(datum.clone());
                    }

                    if head == r.if_ {
                        let [_, test, consequent, alternative] = elements.as_slice() else {
                            return Err(Error::Syntax(format!(
                                "if takes a test and two branches: {}",
                                Value::List(elements.clone())
                            )));
                        };
                        expr = if eval(test, &env)?.is_truthy() {
                            consequent.clone()
                        } else {
                            alternative.clone()
                        };
                        continue;
                    }

                    if head == r.define {
                        let [_, Value::Symbol(name), value_expr] = elements.as_slice() else {
                            return Err(Error::Syntax(format!(
                                "define takes a symbol and a value: {}",
                                Value::List(elements.clone())
                            )));
                        };
                        let value = eval(value_expr, &env)?;
                        env.put(*name, value);
                        return Ok(Value::None);
                    }

                    if head == r.set {
                        let [_, Value::Symbol(name), value_expr] = elements.as_slice() else {
                            return Err(Error::Syntax(format!(
                                "set! takes a symbol and a value: {}",
                                Value::List(elements.clone())
                            )));
                        };
                        let value = eval(value_expr, &env)?;
                        env.assign(*name, value)?;
                        return Ok(Value::None);
                    }

                    if head == r.lambda {
                        let [_, params_form, body] = elements.as_slice() else {
                            return Err(Error::Syntax(format!(
                                "lambda takes parameters and one body form: {}",
                                Value::List(elements.clone())
                            )));
                        };
                        let params = Params::from_form(params_form)?;
                        return Ok(Value::Closure(Rc::new(Closure {
                            params,
                            body: body.clone(),
                            env: env.clone(),
                        })));
                    }

                    if head == r.begin {
                        if elements.len() == 1 {
                            return Ok(Value::None);
                        }
                        let last = elements.len() - 1;
                        for element in &elements[1..last] {
                            eval(element, &env)?;
                        }
                        expr = elements[last].clone();
                        continue;
                    }

                    if head == r.define_macro {
                        return Err(Error::Syntax(format!(
                            "define-macro must be expanded before evaluation: {}",
                            Value::List(elements.clone())
                        )));
                    }
                }

                // Application: evaluate the head, then the arguments, left
                // to right, all in the current environment.
                let callee = eval(&elements[0], &env)?;
                let mut args = Vec::with_capacity(elements.len() - 1);
                for arg_expr in &elements[1..] {
                    args.push(eval(arg_expr, &env)?);
                }

                match callee {
                    Value::Closure(closure) => {
                        // The tail call: replace (expr, env) and loop.
                        env = Env::from_params_and_args(&closure.params, args, &closure.env)
                            .map_err(|err| {
                                err.with_expression(Value::List(elements.clone()).to_string())
                            })?;
                        expr = closure.body.clone();
                    }
                    Value::Native(native) => {
                        native.arity.validate(args.len()).map_err(|err| {
                            err.with_expression(Value::List(elements.clone()).to_string())
                        })?;
                        return (native.func)(&args);
                    }
                    other => {
                        return Err(Error::Type(format!(
                            "cannot apply non-callable value {other}: {}",
                            Value::List(elements.clone())
                        )));
                    }
                }
            }
            other => return Ok(other),
        }
    }
}

/// Apply a callable outside tail position.
///
/// Used wherever a call cannot be trampolined: macro application during
/// expansion, and the `map`/`apply` builtins.
pub fn apply_procedure(callable: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match callable {
        Value::Closure(closure) => {
            let env = Env::from_params_and_args(&closure.params, args, &closure.env)?;
            eval(&closure.body, &env)
        }
        Value::Native(native) => {
            native.arity.validate(args.len())?;
            (native.func)(&args)
        }
        other => Err(Error::Type(format!(
            "cannot apply non-callable value: {other}"
        ))),
    }
}
