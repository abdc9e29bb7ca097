//! Tokenizer and S-expression reader.
//!
//! The [`Reader`] streams characters from any `BufRead` source one line at a
//! time and assembles S-expressions token by token:
//!
//! ```text
//! TOKEN  := ',@' | '(' | ')' | '\'' | '`' | ',' | STRING | COMMENT | ATOM
//! STRING := '"' ( '\' ANY | [^"] )* '"'
//! ATOM   := maximal run of chars outside whitespace and ( ) ' " ` , ;
//! ```
//!
//! Comments run to end of line and are discarded. Quote sugar reads one
//! following expression and wraps it in the matching reserved form. End of
//! input yields the reserved `#<eof-object>` symbol so callers can pump
//! `read` to exhaustion without a separate probe.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::value,
};
use std::io::BufRead;

use crate::ast::Value;
use crate::symbol::{intern, reserved};
use crate::{Error, MAX_READ_DEPTH};

/// Characters that terminate an atom (besides whitespace)
const DELIMITERS: &str = "()'\"`,;";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LeftParen,
    RightParen,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    Str(String),
    Atom(String),
    Eof,
}

/// Recognize one token at the start of the input slice.
/// The caller is responsible for stripping leading whitespace and comments.
fn lex_token(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::UnquoteSplicing, tag(",@")),
        value(Token::LeftParen, char('(')),
        value(Token::RightParen, char(')')),
        value(Token::Quote, char('\'')),
        value(Token::Quasiquote, char('`')),
        value(Token::Unquote, char(',')),
        lex_string,
        lex_atom,
    ))
    .parse(input)
}

/// Lex a string literal, unescaping `\\ \" \n \t \r`.
/// Any other `\c` pair is kept verbatim so unknown escapes round-trip.
fn lex_string(input: &str) -> IResult<&str, Token> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = Vec::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                return Ok((char_iter.as_str(), Token::Str(chars.into_iter().collect())));
            }
            Some('\\') => match char_iter.next() {
                Some('n') => chars.push('\n'),
                Some('t') => chars.push('\t'),
                Some('r') => chars.push('\r'),
                Some('\\') => chars.push('\\'),
                Some('"') => chars.push('"'),
                Some(other) => {
                    chars.push('\\');
                    chars.push(other);
                }
                None => {
                    // Backslash at end of line: unterminated
                    return Err(nom::Err::Error(nom::error::Error::new(
                        remaining,
                        nom::error::ErrorKind::Char,
                    )));
                }
            },
            Some(ch) => chars.push(ch),
            None => {
                // Closing quote never found on this line
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
        remaining = char_iter.as_str();
    }
}

fn lex_atom(input: &str) -> IResult<&str, Token> {
    let (remaining, text) =
        take_while1(|c: char| !c.is_whitespace() && !DELIMITERS.contains(c)).parse(input)?;
    Ok((remaining, Token::Atom(text.to_owned())))
}

/// Convert an atom's text into a value: booleans, then integer, then float,
/// falling back to an interned symbol.
pub(crate) fn parse_atom(text: &str) -> Value {
    match text {
        "#t" => Value::Bool(true),
        "#f" => Value::Bool(false),
        _ => {
            if let Ok(n) = text.parse::<i64>() {
                return Value::Int(n);
            }
            if let Ok(x) = text.parse::<f64>() {
                return Value::Float(x);
            }
            Value::Symbol(intern(text))
        }
    }
}

/// Streaming S-expression reader over a buffered input source.
pub struct Reader<R> {
    input: R,
    buffer: String,
}

impl<R: BufRead> Reader<R> {
    pub fn new(input: R) -> Self {
        Reader {
            input,
            buffer: String::new(),
        }
    }

    /// True when no unconsumed input is buffered.
    /// The REPL uses this to decide when to print a fresh prompt.
    pub fn at_line_start(&self) -> bool {
        let rest = self.buffer.trim_start();
        rest.is_empty() || rest.starts_with(';')
    }

    /// Drop the rest of the current line. Used by the REPL after a syntax
    /// error, since the remaining tokens on the line are suspect.
    pub fn discard_line(&mut self) {
        self.buffer.clear();
    }

    /// Pull the next line from the underlying source. False at end of input.
    fn refill(&mut self) -> Result<bool, Error> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|err| Error::Io(err.to_string()))?;
        if read == 0 {
            return Ok(false);
        }
        self.buffer = line;
        Ok(true)
    }

    fn next_token(&mut self) -> Result<Token, Error> {
        loop {
            let rest = self.buffer.trim_start();
            if rest.is_empty() || rest.starts_with(';') {
                self.buffer.clear();
                if !self.refill()? {
                    return Ok(Token::Eof);
                }
                continue;
            }

            let current = rest.to_owned();
            match lex_token(&current) {
                Ok((remaining, token)) => {
                    self.buffer = remaining.to_owned();
                    return Ok(token);
                }
                Err(_) => {
                    // The lexer only rejects trimmed input when a string
                    // literal has no closing quote on its line.
                    self.buffer.clear();
                    return Err(Error::Syntax(format!(
                        "unterminated string literal: {}",
                        current.trim_end()
                    )));
                }
            }
        }
    }

    /// Read one S-expression, or the reserved `#<eof-object>` symbol at end
    /// of input.
    pub fn read(&mut self) -> Result<Value, Error> {
        let token = self.next_token()?;
        self.read_from(token, 0)
    }

    fn read_from(&mut self, token: Token, depth: usize) -> Result<Value, Error> {
        if depth >= MAX_READ_DEPTH {
            return Err(Error::Syntax(format!(
                "expression too deeply nested (max depth: {MAX_READ_DEPTH})"
            )));
        }

        match token {
            Token::Eof => Ok(Value::Symbol(reserved().eof)),
            Token::LeftParen => {
                let mut elements = Vec::new();
                loop {
                    match self.next_token()? {
                        Token::RightParen => return Ok(Value::List(elements)),
                        Token::Eof => {
                            return Err(Error::Syntax(
                                "unexpected end of input inside list".to_owned(),
                            ));
                        }
                        other => elements.push(self.read_from(other, depth + 1)?),
                    }
                }
            }
            Token::RightParen => Err(Error::Syntax("unexpected ')'".to_owned())),
            Token::Quote | Token::Quasiquote | Token::Unquote | Token::UnquoteSplicing => {
                let r = reserved();
                let marker = match token {
                    Token::Quote => r.quote,
                    Token::Quasiquote => r.quasiquote,
                    Token::Unquote => r.unquote,
                    _ => r.unquote_splicing,
                };
                match self.next_token()? {
                    Token::Eof => Err(Error::Syntax(format!(
                        "unexpected end of input after {}",
                        marker.name()
                    ))),
                    next => {
                        let quoted = self.read_from(next, depth + 1)?;
                        Ok(Value::List(vec![Value::Symbol(marker), quoted]))
                    }
                }
            }
            Token::Str(s) => Ok(Value::Str(s)),
            Token::Atom(text) => Ok(parse_atom(&text)),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};

    /// Expected outcome of reading one expression from an input.
    #[derive(Debug)]
    enum ReadTestResult {
        Success(Value),
        SpecificError(&'static str),
    }
    use ReadTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ReadTestResult {
        Success(value.into())
    }

    fn read_one(input: &str) -> Result<Value, Error> {
        Reader::new(input.as_bytes()).read()
    }

    fn run_read_tests(test_cases: Vec<(&str, ReadTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Read test #{}", i + 1);
            match (read_one(input), expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch for {input:?}");
                }
                (Err(err), SpecificError(expected_text)) => {
                    let message = format!("{err}");
                    assert!(
                        message.contains(expected_text),
                        "{test_id}: error {message:?} should contain {expected_text:?}"
                    );
                }
                (Ok(actual), SpecificError(expected_text)) => {
                    panic!(
                        "{test_id}: expected error containing '{expected_text}', got {actual:?}"
                    );
                }
                (Err(err), Success(expected_val)) => {
                    panic!("{test_id}: expected {expected_val:?}, got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_reader_comprehensive() {
        let test_cases = vec![
            // ===== ATOMS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("0", success(0)),
            ("9223372036854775807", success(i64::MAX)),
            ("3.25", success(3.25)),
            ("-0.5", success(-0.5)),
            ("1e3", success(1000.0)),
            ("#t", success(true)),
            ("#f", success(false)),
            ("foo", success(sym("foo"))),
            ("+", success(sym("+"))),
            ("set!", success(sym("set!"))),
            ("list->vector?", success(sym("list->vector?"))),
            // an atom that fits neither number falls back to a symbol
            ("12abc", success(sym("12abc"))),
            ("#true", success(sym("#true"))),
            // ===== STRINGS =====
            ("\"hello\"", success("hello")),
            ("\"hello world\"", success("hello world")),
            ("\"\"", success("")),
            (r#""a\nb""#, success("a\nb")),
            (r#""tab\there""#, success("tab\there")),
            (r#""quote\"inside""#, success("quote\"inside")),
            (r#""back\\slash""#, success("back\\slash")),
            // unknown escapes are kept verbatim
            (r#""we\ird""#, success("we\\ird")),
            (r#""unterminated"#, SpecificError("unterminated string")),
            // ===== LISTS =====
            ("()", success(nil())),
            ("(   )", success(nil())),
            ("(42)", success([42])),
            ("(1 2 3)", success([1, 2, 3])),
            (
                "(1 hello \"world\" #t)",
                success(vec![val(1), sym("hello"), val("world"), val(true)]),
            ),
            ("((1 2) (3 4))", success([[1, 2], [3, 4]])),
            ("(((1)))", success([val([val([val(1)])])])),
            ("( 1   2\t\n3 )", success([1, 2, 3])),
            // ===== QUOTE SUGAR =====
            ("'foo", success(vec![sym("quote"), sym("foo")])),
            ("'(1 2)", success(vec![sym("quote"), val([1, 2])])),
            ("'()", success(vec![sym("quote"), nil()])),
            ("`x", success(vec![sym("quasiquote"), sym("x")])),
            (",x", success(vec![sym("unquote"), sym("x")])),
            (",@xs", success(vec![sym("unquote-splicing"), sym("xs")])),
            (
                "`(a ,b)",
                success(vec![
                    sym("quasiquote"),
                    val(vec![sym("a"), val(vec![sym("unquote"), sym("b")])]),
                ]),
            ),
            ("''x", success(vec![sym("quote"), val(vec![sym("quote"), sym("x")])])),
            // ===== COMMENTS AND WHITESPACE =====
            ("; a comment\n42", success(42)),
            ("42 ; trailing", success(42)),
            ("(1 ; comment splits the list\n 2)", success([1, 2])),
            ("  \t\n  foo", success(sym("foo"))),
            // ===== ERRORS =====
            (")", SpecificError("unexpected ')'")),
            ("(1 2", SpecificError("end of input inside list")),
            ("((1 2)", SpecificError("end of input inside list")),
            ("'", SpecificError("end of input after quote")),
            (",@", SpecificError("end of input after unquote-splicing")),
        ];

        run_read_tests(test_cases);
    }

    #[test]
    fn test_eof_sentinel() {
        let mut reader = Reader::new("".as_bytes());
        assert_eq!(reader.read().unwrap(), Value::Symbol(reserved().eof));

        // exhausting a source keeps returning the sentinel
        let mut reader = Reader::new("1".as_bytes());
        assert_eq!(reader.read().unwrap(), val(1));
        assert_eq!(reader.read().unwrap(), Value::Symbol(reserved().eof));
        assert_eq!(reader.read().unwrap(), Value::Symbol(reserved().eof));
    }

    #[test]
    fn test_multiple_expressions_stream() {
        let mut reader = Reader::new("(+ 1 2) foo \"bar\"".as_bytes());
        assert_eq!(
            reader.read().unwrap(),
            val(vec![sym("+"), val(1), val(2)])
        );
        assert_eq!(reader.read().unwrap(), sym("foo"));
        assert_eq!(reader.read().unwrap(), val("bar"));
        assert_eq!(reader.read().unwrap(), Value::Symbol(reserved().eof));
    }

    #[test]
    fn test_expressions_spanning_lines() {
        let source = "(define (add a b)\n  ; sum of both\n  (+ a b))\n";
        let expr = read_one(source).unwrap();
        assert_eq!(
            expr,
            val(vec![
                sym("define"),
                val(vec![sym("add"), sym("a"), sym("b")]),
                val(vec![sym("+"), sym("a"), sym("b")]),
            ])
        );
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_READ_DEPTH + 1), ")".repeat(MAX_READ_DEPTH + 1));
        let err = read_one(&deep).unwrap_err();
        assert!(format!("{err}").contains("deeply nested"));

        let shallow = format!("{}1{}", "(".repeat(MAX_READ_DEPTH - 1), ")".repeat(MAX_READ_DEPTH - 1));
        assert!(read_one(&shallow).is_ok());
    }

    #[test]
    fn test_read_print_round_trip() {
        // read(print(v)) == v for reader-producible values
        let sources = vec![
            "42", "-7", "2.5", "#t", "#f", "\"hello\"", "foo",
            "(1 2 3)", "((a b) (c d))", "()", "(a \"b\" 3 #t)",
        ];
        for source in sources {
            let first = read_one(source).unwrap();
            let printed = format!("{first}");
            let second = read_one(&printed).unwrap();
            assert_eq!(first, second, "round-trip failed for {source:?}");
        }
    }
}
