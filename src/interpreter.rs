//! The embedding surface: construct an interpreter, feed it sources.
//!
//! An [`Interpreter`] owns one global environment chain and one macro table.
//! Construction seeds the base frame with the builtin registry, layers any
//! host extension mappings (innermost last), and evaluates the bundled
//! `init.ss` prelude, so derived forms such as `let` and `cond` are
//! available from the first user expression.
//!
//! Each top-level form is read, expanded, and evaluated before the next one
//! is read. This ordering is load-bearing: `define-macro` installs macros
//! during expansion by invoking the evaluator, and the following form may
//! already use them.

use log::debug;
use rustc_hash::FxHashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::Error;
use crate::ast::Value;
use crate::builtins;
use crate::evaluator::{self, Env};
use crate::expander::{self, MacroTable};
use crate::reader::Reader;
use crate::symbol::{Symbol, reserved};

/// A symbol-table producer: takes the interpreter under construction and
/// returns bindings to layer onto the environment as a new innermost frame.
pub type Extension = fn(&mut Interpreter) -> FxHashMap<Symbol, Value>;

/// The bundled standard prelude, evaluated at construction time.
const PRELUDE: &str = include_str!("../init.ss");

pub struct Interpreter {
    global: Env,
    macros: MacroTable,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_extensions(&[])
    }

    /// Build an interpreter, layering each extension's bindings over the
    /// builtins in order (innermost last), then load the bundled prelude.
    pub fn with_extensions(extensions: &[Extension]) -> Self {
        let global = Env::new();
        for (name, value) in builtins::base_bindings() {
            global.put(name, value);
        }

        let mut interp = Interpreter {
            global,
            macros: MacroTable::new(),
        };

        for extension in extensions {
            let bindings = extension(&mut interp);
            debug!("layering extension frame with {} bindings", bindings.len());
            interp.global = Env::extend(bindings, &interp.global);
        }

        if let Err(err) = interp.evaluate_str(PRELUDE) {
            // the prelude is compiled into the binary; failing to load it is
            // a packaging bug, not a user error
            panic!("bundled init.ss failed to evaluate: {err}");
        }
        debug!("loaded bundled prelude");

        interp
    }

    /// The global environment. Extensions and tests may bind through it.
    pub fn global_env(&self) -> &Env {
        &self.global
    }

    /// Read, expand, and evaluate every expression from `input`.
    ///
    /// Returns the last value on success (`None` for an empty stream); stops
    /// at the first error and returns it.
    pub fn evaluate<R: BufRead>(&mut self, input: R) -> Result<Option<Value>, Error> {
        let mut reader = Reader::new(input);
        let mut last = None;
        while let Some(value) = self.read_expand_eval(&mut reader)? {
            last = Some(value);
        }
        Ok(last)
    }

    /// Convenience wrapper over [`Interpreter::evaluate`] for string sources.
    pub fn evaluate_str(&mut self, source: &str) -> Result<Option<Value>, Error> {
        self.evaluate(source.as_bytes())
    }

    /// Evaluate an init script from the filesystem (e.g. `.init.ss`).
    pub fn load_init_file(&mut self, path: &Path) -> Result<Option<Value>, Error> {
        let file = std::fs::File::open(path)
            .map_err(|err| Error::Io(format!("cannot open {}: {err}", path.display())))?;
        debug!("evaluating init file {}", path.display());
        self.evaluate(std::io::BufReader::new(file))
    }

    /// Read-eval-print loop: prints each non-`None` value, prints errors and
    /// keeps going, stops at end of input.
    pub fn repl<R: BufRead, W: Write>(
        &mut self,
        input: R,
        output: &mut W,
        prompt: Option<&str>,
        banner: Option<&str>,
    ) -> std::io::Result<()> {
        let prompt = prompt.unwrap_or("> ");
        if let Some(banner) = banner {
            writeln!(output, "{banner}")?;
        }

        let mut reader = Reader::new(input);
        loop {
            if reader.at_line_start() {
                write!(output, "{prompt}")?;
                output.flush()?;
            }
            match self.read_expand_eval(&mut reader) {
                Ok(None) => return Ok(()),
                Ok(Some(value)) => {
                    if !matches!(value, Value::None) {
                        writeln!(output, "{value}")?;
                    }
                }
                Err(err) => {
                    writeln!(output, "{err}")?;
                    // the rest of the offending line is suspect
                    reader.discard_line();
                }
            }
        }
    }

    /// Pump one expression through the pipeline. `Ok(None)` at end of input.
    fn read_expand_eval<R: BufRead>(
        &mut self,
        reader: &mut Reader<R>,
    ) -> Result<Option<Value>, Error> {
        let expr = reader.read()?;
        if matches!(&expr, Value::Symbol(s) if *s == reserved().eof) {
            return Ok(None);
        }
        let expanded = expander::expand(&expr, &self.global, &mut self.macros, true)?;
        Ok(Some(evaluator::eval(&expanded, &self.global)?))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use crate::symbol::intern;

    /// Expected outcome when evaluating a source to exhaustion.
    #[derive(Debug)]
    enum Outcome {
        Last(Value),
        SpecificError(&'static str),
    }
    use Outcome::*;

    fn success<T: Into<Value>>(value: T) -> Outcome {
        Last(value.into())
    }

    /// Each case runs in a fresh interpreter; all forms in the source share
    /// that interpreter's state.
    fn run_cases(cases: Vec<(&str, Outcome)>) {
        for (i, (source, expected)) in cases.iter().enumerate() {
            let test_id = format!("case #{}", i + 1);
            let mut interp = Interpreter::new();
            match (interp.evaluate_str(source), expected) {
                (Ok(actual), Last(expected_val)) => {
                    assert_eq!(
                        actual.as_ref(),
                        Some(expected_val),
                        "{test_id}: value mismatch for {source:?}"
                    );
                }
                (Err(err), SpecificError(text)) => {
                    let message = format!("{err}");
                    assert!(
                        message.contains(text),
                        "{test_id}: error {message:?} should contain {text:?}"
                    );
                }
                (Ok(actual), SpecificError(text)) => {
                    panic!("{test_id}: expected error containing '{text}', got {actual:?}")
                }
                (Err(err), Last(expected_val)) => {
                    panic!("{test_id}: expected {expected_val:?}, got error {err}")
                }
            }
        }
    }

    #[test]
    fn test_end_to_end_scenarios() {
        run_cases(vec![
            // variadic fold arithmetic
            ("(+ 1 2 3 4)", success(10)),
            // recursion through the shared top frame
            (
                "(define (fact n) (if (< n 2) 1 (* n (fact (- n 1)))))
                 (fact 10)",
                success(3628800),
            ),
            // deep tail recursion runs in bounded stack
            (
                "(define (loop n) (if (= n 0) 'done (loop (- n 1))))
                 (loop 100000)",
                success(sym("done")),
            ),
            // user macros see unexpanded operands
            (
                "(define-macro my-if (lambda (t c a) (list 'if t c a)))
                 (my-if #t 1 2)",
                success(1),
            ),
            // quasiquote with unquote and splicing
            (
                "`(a ,(+ 1 2) ,@(list 'b 'c) d)",
                success(vec![sym("a"), val(3), sym("b"), sym("c"), sym("d")]),
            ),
            // top-level define rebinds in the shared frame
            (
                "(define x 1) (define (f) x) (define x 2) (f)",
                success(2),
            ),
        ]);
    }

    #[test]
    fn test_truthiness_scenarios() {
        run_cases(vec![
            ("(if 0 'a 'b)", success(sym("a"))),
            ("(if '() 'a 'b)", success(sym("a"))),
            ("(if #f 'a 'b)", success(sym("b"))),
            ("(if (null) 'a 'b)", success(sym("a"))),
        ]);
    }

    #[test]
    fn test_quasiquote_identities() {
        run_cases(vec![
            ("(equal? `(1 2 3) (list 1 2 3))", success(true)),
            ("(equal? `(1 ,(+ 1 1) 3) (list 1 2 3))", success(true)),
            ("(equal? `(1 ,@(list 2 3) 4) (list 1 2 3 4))", success(true)),
            ("`()", success(nil())),
            ("`,(+ 1 2)", success(3)),
        ]);
    }

    #[test]
    fn test_prelude_forms() {
        run_cases(vec![
            ("(let ((x 2) (y 3)) (* x y))", success(6)),
            ("(let* ((x 2) (y (+ x 1))) (* x y))", success(6)),
            (
                "(cond (#f 'first) ((= 1 1) 'second) (else 'third))",
                success(sym("second")),
            ),
            ("(cond (#f 'first) (else 'fallback))", success(sym("fallback"))),
            ("(cond (#f 'only))", Last(Value::None)),
            ("(and #t 1 2)", success(2)),
            ("(and #f (assert #f \"never evaluated\"))", success(false)),
            ("(and)", success(true)),
            ("(or #f 'found)", success(sym("found"))),
            ("(or #f #f)", success(false)),
            ("(or)", success(false)),
            ("(when (= 1 1) 'yes)", success(sym("yes"))),
            ("(when (= 1 2) 'yes)", Last(Value::None)),
            ("(unless (= 1 2) 'no)", success(sym("no"))),
            ("(fold + 0 (list 1 2 3 4))", success(10)),
            ("(fold * 1 (list 1 2 3 4))", success(24)),
            (
                "(filter (lambda (x) (< x 3)) (list 1 2 3 4 1))",
                success([1, 2, 1]),
            ),
            ("(second (list 1 2 3))", success(2)),
            ("(cadr (list 1 2 3))", success(2)),
            ("(caar (list (list 9 8) 7))", success(9)),
        ]);
    }

    #[test]
    fn test_error_envelope_stops_the_stream() {
        let mut interp = Interpreter::new();
        let err = interp
            .evaluate_str("(define x 1) (undefined-function 2) (define x 99)")
            .unwrap_err();
        assert!(matches!(err, Error::UnboundSymbol(_)));
        // evaluation stopped before the third form
        assert_eq!(interp.global_env().get(&intern("x")), Some(val(1)));
    }

    #[test]
    fn test_error_reporting() {
        run_cases(vec![
            ("missing", SpecificError("Symbol not defined: 'missing")),
            ("(set! ghost 1)", SpecificError("Symbol not defined")),
            ("(1 2)", SpecificError("cannot apply non-callable")),
            ("((lambda (x) x) 1 2)", SpecificError("expected 1 arguments, got 2")),
            ("(car 5)", SpecificError("car expects a list")),
            ("(% 1.5 2)", SpecificError("integer operands")),
            ("(assert (= 1 2) \"math broke\")", SpecificError("math broke")),
            ("(define-macro m 42)", SpecificError("must be a closure")),
            ("(quote a b)", SpecificError("quote takes one operand")),
            (")", SpecificError("unexpected ')'")),
        ]);
    }

    #[test]
    fn test_empty_stream_yields_no_value() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.evaluate_str("").unwrap(), None);
        assert_eq!(interp.evaluate_str("; only a comment").unwrap(), None);
    }

    #[test]
    fn test_extensions_layer_innermost_last() {
        fn ext_a(_interp: &mut Interpreter) -> FxHashMap<Symbol, Value> {
            let mut bindings = FxHashMap::default();
            bindings.insert(intern("layered"), val("a"));
            bindings.insert(intern("only-a"), val(1));
            bindings
        }
        fn ext_b(_interp: &mut Interpreter) -> FxHashMap<Symbol, Value> {
            let mut bindings = FxHashMap::default();
            bindings.insert(intern("layered"), val("b"));
            bindings
        }

        let mut interp = Interpreter::with_extensions(&[ext_a, ext_b]);
        // the later extension is innermost and wins
        assert_eq!(interp.evaluate_str("layered").unwrap(), Some(val("b")));
        assert_eq!(interp.evaluate_str("only-a").unwrap(), Some(val(1)));
        // builtins remain reachable through the chain
        assert_eq!(interp.evaluate_str("(+ 1 2)").unwrap(), Some(val(3)));
    }

    #[test]
    fn test_state_persists_across_evaluate_calls() {
        let mut interp = Interpreter::new();
        interp.evaluate_str("(define counter 10)").unwrap();
        interp.evaluate_str("(set! counter (+ counter 5))").unwrap();
        assert_eq!(interp.evaluate_str("counter").unwrap(), Some(val(15)));

        // macros persist too
        interp
            .evaluate_str("(define-macro twice (lambda (e) (list '+ e e)))")
            .unwrap();
        assert_eq!(interp.evaluate_str("(twice 21)").unwrap(), Some(val(42)));
    }

    #[test]
    fn test_repl_prints_values_and_recovers_from_errors() {
        let mut interp = Interpreter::new();
        let input = "(+ 1 2)\n(undefined)\n(define x 5)\nx\n";
        let mut output = Vec::new();
        interp
            .repl(input.as_bytes(), &mut output, Some("Schemy> "), Some("welcome"))
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("welcome\n"));
        assert!(text.contains("3"));
        assert!(text.contains("Symbol not defined"));
        // define prints nothing, but the final lookup prints 5
        assert!(text.contains("5"));
        assert!(text.contains("Schemy> "));
    }

    #[test]
    fn test_load_init_file_missing_is_io_error() {
        let mut interp = Interpreter::new();
        let err = interp
            .load_init_file(Path::new("/nonexistent/.init.ss"))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
