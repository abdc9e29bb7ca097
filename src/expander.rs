//! Expander: rewrites raw S-expressions into canonical forms.
//!
//! The expander walks each top-level expression once, validating special-form
//! shapes, completing two-armed `if`s, rewriting function-style `define`s
//! into `lambda`s, wrapping multi-form lambda bodies in `begin`, desugaring
//! quasiquotation into `cons`/`append`/`quote` calls, and applying user
//! macros to fixpoint. Special forms are recognized by reserved symbol
//! *identity*, never by spelling.
//!
//! `define-macro` is the one form the expander evaluates eagerly: the macro
//! value is expanded, handed to the evaluator, and the resulting closure is
//! installed into the [`MacroTable`]. This is why hosts must expand and
//! evaluate each top-level form before reading the next - a macro defined by
//! one form may be used by the form after it.

use log::debug;
use rustc_hash::FxHashMap;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Closure, Value};
use crate::evaluator::{self, Env};
use crate::symbol::{Symbol, reserved};

/// Macros installed by top-level `define-macro`, keyed by name.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: FxHashMap<Symbol, Rc<Closure>>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable {
            macros: FxHashMap::default(),
        }
    }

    pub fn get(&self, name: &Symbol) -> Option<&Rc<Closure>> {
        self.macros.get(name)
    }

    pub fn insert(&mut self, name: Symbol, closure: Rc<Closure>) {
        debug!("installing macro {name}");
        self.macros.insert(name, closure);
    }

    pub fn contains(&self, name: &Symbol) -> bool {
        self.macros.contains_key(name)
    }
}

/// Expand one expression into canonical form.
///
/// `top_level` gates `define-macro`; it is preserved through `begin` so a
/// top-level `(begin ... (define-macro ...) ...)` stays legal.
pub fn expand(
    expr: &Value,
    env: &Env,
    macros: &mut MacroTable,
    top_level: bool,
) -> Result<Value, Error> {
    let elements = match expr {
        Value::List(elements) if !elements.is_empty() => elements,
        // non-list atoms and the empty list pass through unchanged
        _ => return Ok(expr.clone()),
    };

    let r = reserved();
    if let Some(Value::Symbol(head)) = elements.first() {
        let head = *head;

        if head == r.quote {
            if elements.len() != 2 {
                return Err(Error::Syntax(format!("quote takes one operand: {expr}")));
            }
            return Ok(expr.clone());
        }

        if head == r.if_ {
            if elements.len() != 3 && elements.len() != 4 {
                return Err(Error::Syntax(format!(
                    "if takes a test and one or two branches: {expr}"
                )));
            }
            let mut expanded = vec![elements[0].clone()];
            for element in &elements[1..] {
                expanded.push(expand(element, env, macros, false)?);
            }
            if expanded.len() == 3 {
                // (if t c) -> (if t c None)
                expanded.push(Value::None);
            }
            return Ok(Value::List(expanded));
        }

        if head == r.set {
            if elements.len() != 3 {
                return Err(Error::Syntax(format!(
                    "set! takes a symbol and a value: {expr}"
                )));
            }
            if !matches!(elements[1], Value::Symbol(_)) {
                return Err(Error::Syntax(format!(
                    "set! target must be a symbol: {expr}"
                )));
            }
            return Ok(Value::List(vec![
                elements[0].clone(),
                elements[1].clone(),
                expand(&elements[2], env, macros, false)?,
            ]));
        }

        if head == r.define || head == r.define_macro {
            return expand_define(expr, elements, env, macros, top_level, head == r.define_macro);
        }

        if head == r.begin {
            if elements.len() == 1 {
                return Ok(Value::None);
            }
            let mut expanded = vec![elements[0].clone()];
            for element in &elements[1..] {
                expanded.push(expand(element, env, macros, top_level)?);
            }
            return Ok(Value::List(expanded));
        }

        if head == r.lambda {
            return expand_lambda(expr, elements, env, macros);
        }

        if head == r.quasiquote {
            if elements.len() != 2 {
                return Err(Error::Syntax(format!(
                    "quasiquote takes one operand: {expr}"
                )));
            }
            return expand_quasiquote(&elements[1]);
        }

        if let Some(mac) = macros.get(&head).cloned() {
            // Macros receive the unexpanded tail; the result is re-expanded
            // with the same top-level flag, so macros expanding into other
            // macro calls reach a fixpoint.
            let result =
                evaluator::apply_procedure(&Value::Closure(mac), elements[1..].to_vec())
                    .map_err(|err| err.with_expression(expr.to_string()))?;
            return expand(&result, env, macros, top_level);
        }
    }

    // Ordinary list: expand every element as a nested expression.
    let expanded = elements
        .iter()
        .map(|element| expand(element, env, macros, false))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::List(expanded))
}

/// Expand `define` and `define-macro`, including the function-definition
/// shorthand `(define (f a b) body...)`.
fn expand_define(
    expr: &Value,
    elements: &[Value],
    env: &Env,
    macros: &mut MacroTable,
    top_level: bool,
    is_macro: bool,
) -> Result<Value, Error> {
    let r = reserved();
    if is_macro && !top_level {
        return Err(Error::Syntax(format!(
            "define-macro is only allowed at top level: {expr}"
        )));
    }

    match elements.get(1) {
        // (define (f a b) body...) -> (define f (lambda (a b) body...))
        Some(Value::List(signature)) => {
            let Some((name, params)) = signature.split_first() else {
                return Err(Error::Syntax(format!(
                    "function definition needs a name: {expr}"
                )));
            };
            if elements.len() < 3 {
                return Err(Error::Syntax(format!(
                    "function definition needs a body: {expr}"
                )));
            }
            let mut lambda = vec![Value::Symbol(r.lambda), Value::List(params.to_vec())];
            lambda.extend(elements[2..].iter().cloned());
            let rewritten = Value::List(vec![
                elements[0].clone(),
                name.clone(),
                Value::List(lambda),
            ]);
            expand(&rewritten, env, macros, top_level)
        }
        Some(Value::Symbol(name)) => {
            if elements.len() != 3 {
                return Err(Error::Syntax(format!(
                    "define takes a symbol and a value: {expr}"
                )));
            }
            let value = expand(&elements[2], env, macros, false)?;
            if is_macro {
                // Macro-time evaluation: the expander leans on the evaluator
                // here, so each top-level form must be fully processed before
                // the next one is expanded.
                match evaluator::eval(&value, env)? {
                    Value::Closure(closure) => {
                        macros.insert(*name, closure);
                        Ok(Value::None)
                    }
                    other => Err(Error::Type(format!(
                        "define-macro value must be a closure, got {other}: {expr}"
                    ))),
                }
            } else {
                Ok(Value::List(vec![
                    elements[0].clone(),
                    Value::Symbol(*name),
                    value,
                ]))
            }
        }
        _ => Err(Error::Syntax(format!(
            "define needs a symbol or function form: {expr}"
        ))),
    }
}

/// Expand `lambda`: validate the parameter form and canonicalize the body to
/// a single expression (wrapping multiple forms in `begin`).
fn expand_lambda(
    expr: &Value,
    elements: &[Value],
    env: &Env,
    macros: &mut MacroTable,
) -> Result<Value, Error> {
    let r = reserved();
    if elements.len() < 3 {
        return Err(Error::Syntax(format!(
            "lambda takes parameters and at least one body form: {expr}"
        )));
    }

    match &elements[1] {
        Value::Symbol(_) => {}
        Value::List(params) => {
            for param in params {
                if !matches!(param, Value::Symbol(_)) {
                    return Err(Error::Syntax(format!(
                        "lambda parameters must be symbols: {expr}"
                    )));
                }
            }
        }
        _ => {
            return Err(Error::Syntax(format!(
                "lambda parameters must be a symbol or a list of symbols: {expr}"
            )));
        }
    }

    let body = if elements.len() == 3 {
        expand(&elements[2], env, macros, false)?
    } else {
        let mut body = vec![Value::Symbol(r.begin)];
        body.extend(elements[2..].iter().cloned());
        expand(&Value::List(body), env, macros, false)?
    };

    Ok(Value::List(vec![
        elements[0].clone(),
        elements[1].clone(),
        body,
    ]))
}

/// Desugar one quasiquoted template into `cons`/`append`/`quote` calls.
///
/// Unquoted expressions are returned as-is (they evaluate at runtime);
/// splicing is only legal for a list element, never for the template head.
pub(crate) fn expand_quasiquote(expr: &Value) -> Result<Value, Error> {
    let r = reserved();
    let elements = match expr {
        Value::List(elements) => elements,
        _ => {
            return Ok(Value::List(vec![
                Value::Symbol(r.quote),
                expr.clone(),
            ]));
        }
    };
    let Some((head, tail)) = elements.split_first() else {
        // the empty list quotes like any other non-template
        return Ok(Value::List(vec![Value::Symbol(r.quote), expr.clone()]));
    };

    if let Value::Symbol(marker) = head {
        if *marker == r.unquote_splicing {
            return Err(Error::Syntax(format!(
                "cannot splice here: {expr}"
            )));
        }
        if *marker == r.unquote {
            if elements.len() != 2 {
                return Err(Error::Syntax(format!("unquote takes one operand: {expr}")));
            }
            return Ok(tail[0].clone());
        }
    }

    if let Value::List(inner) = head {
        if inner.len() == 2 {
            if let Some(Value::Symbol(marker)) = inner.first() {
                if *marker == r.unquote_splicing {
                    return Ok(Value::List(vec![
                        Value::Symbol(r.append),
                        inner[1].clone(),
                        expand_quasiquote(&Value::List(tail.to_vec()))?,
                    ]));
                }
            }
        }
    }

    Ok(Value::List(vec![
        Value::Symbol(r.cons),
        expand_quasiquote(head)?,
        expand_quasiquote(&Value::List(tail.to_vec()))?,
    ]))
}
