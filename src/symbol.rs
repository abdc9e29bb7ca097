//! Process-wide symbol interner.
//!
//! Symbols are cheap `Copy` handles into a global intern table: for any
//! string `s`, `intern(s) == intern(s)`, and equality/hashing are identity.
//! The interner is shared across interpreter instances and is safe against
//! re-entrant interning by macros during evaluation.
//!
//! The special forms recognized by the expander and evaluator are preinterned
//! as the [`Reserved`] set; both stages compare head symbols against these
//! identities, never against spellings.

use internment::Intern;
use std::fmt;
use std::sync::LazyLock;

/// An interned symbol. Equality is identity in the intern table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(Intern<String>);

impl Symbol {
    /// The symbol's printable name.
    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.name())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}", self.name())
    }
}

/// Intern a name, returning its unique symbol. Idempotent.
pub fn intern(name: &str) -> Symbol {
    Symbol(Intern::new(name.to_owned()))
}

/// The preinterned symbols for special forms and reader sentinels.
///
/// `cons` and `append` are reserved because the quasiquote expander emits
/// calls to them; `#<eof-object>` is the reader's end-of-input sentinel.
pub struct Reserved {
    pub if_: Symbol,
    pub quote: Symbol,
    pub define: Symbol,
    pub define_macro: Symbol,
    pub lambda: Symbol,
    pub set: Symbol,
    pub begin: Symbol,
    pub cons: Symbol,
    pub append: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
    pub eof: Symbol,
}

static RESERVED: LazyLock<Reserved> = LazyLock::new(|| Reserved {
    if_: intern("if"),
    quote: intern("quote"),
    define: intern("define"),
    define_macro: intern("define-macro"),
    lambda: intern("lambda"),
    set: intern("set!"),
    begin: intern("begin"),
    cons: intern("cons"),
    append: intern("append"),
    quasiquote: intern("quasiquote"),
    unquote: intern("unquote"),
    unquote_splicing: intern("unquote-splicing"),
    eof: intern("#<eof-object>"),
});

/// Access the reserved symbol set, interning it on first use.
pub fn reserved() -> &'static Reserved {
    &RESERVED
}
