//! # GLR runtime
//!
//! [`Parser`] drives a generalized LR automaton over a token stream: the
//! frontier starts as one spine in state 0, conflict cells fork it,
//! reductions re-deliver the current token, and spines that reach an
//! identical `(state, value)` stack merge. A finalized parser is immutable
//! and may be shared across concurrent parse calls; each call owns its
//! frontier and borrows its environment mutably.

mod driver;
pub(crate) mod dot;
mod recovery;
pub(crate) mod spine;

use std::path::Path;

use crate::error::{BuildError, ParseError};
use crate::grammar::{Grammar, Value};
use crate::sink::OutputSink;
use crate::symbol::{SymbolId, SymbolTable};
use crate::table::{Action, Conflict, ParseTable, StateId, cache};
use crate::token::Token;

/// When to stop accepting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Accept {
    /// Return the first spine that accepts.
    #[default]
    First,
    /// Run to `EOS` and return every accepted value.
    All,
}

/// Per-call parse options.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub accept: Accept,
    /// Accepted derivations, rendered as Graphviz DOT.
    pub parse_tree: OutputSink,
    /// Trace of shifts, reduces, forks and recoveries.
    pub verbose: OutputSink,
    /// Frontier ceiling; exceeding it aborts with an internal-error
    /// diagnostic instead of letting pathological forking run away.
    pub max_spines: usize,
    /// Ceiling on reduction steps for a single token, the analogous guard
    /// against ε-reduction cycles.
    pub max_reductions: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            accept: Accept::default(),
            parse_tree: OutputSink::Off,
            verbose: OutputSink::Off,
            max_spines: 512,
            max_reductions: 100_000,
        }
    }
}

/// Counters for one parse call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub tokens_consumed: usize,
    pub reductions: usize,
    pub forks: usize,
    pub merges: usize,
    pub recoveries: usize,
    pub peak_spines: usize,
}

/// Result of [`Parser::parse_with`]: the accepted values plus counters.
#[derive(Debug)]
pub struct ParseOutput<V> {
    pub values: Vec<V>,
    pub stats: ParseStats,
}

/// A finalized grammar with its parse tables.
pub struct Parser<V, E = ()> {
    grammar: Grammar<V, E>,
    table: ParseTable,
    fingerprint: u64,
}

impl<V: Value, E: 'static> Parser<V, E> {
    pub(crate) fn from_parts(grammar: Grammar<V, E>, table: ParseTable, fingerprint: u64) -> Self {
        Self {
            grammar,
            table,
            fingerprint,
        }
    }

    #[must_use]
    pub fn grammar(&self) -> &Grammar<V, E> {
        &self.grammar
    }

    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        self.grammar.symbols()
    }

    /// Resolve a lexer token type to its terminal id.
    #[must_use]
    pub fn terminal(&self, name: &str) -> Option<SymbolId> {
        self.symbols().terminal(name)
    }

    /// Conflicts that survived precedence resolution; their cells are
    /// retained in full for GLR exploration.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        self.table.conflicts()
    }

    #[must_use]
    pub fn num_states(&self) -> usize {
        self.table.num_states()
    }

    /// Content hash of the grammar and builder options; the table cache
    /// freshness check compares against it.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// All actions in the `(state, terminal)` cell; empty means error.
    #[must_use]
    pub fn action(&self, state: StateId, terminal: SymbolId) -> &[Action] {
        self.table.action(state, terminal)
    }

    /// Successor state for `(state, nonterminal)`.
    #[must_use]
    pub fn goto(&self, state: StateId, nonterminal: SymbolId) -> Option<StateId> {
        self.table.goto(state, nonterminal)
    }

    pub(crate) fn table_ref(&self) -> &ParseTable {
        &self.table
    }

    /// Persist the tables to `path` in the versioned binary cache format.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn write_tables(&self, path: &Path) -> Result<(), BuildError> {
        cache::write(path, self.fingerprint, &self.grammar, &self.table)?;
        Ok(())
    }

    /// The cache record as bytes; rebuilding the same grammar yields
    /// byte-identical output.
    #[must_use]
    pub fn serialized_tables(&self) -> Vec<u8> {
        cache::to_bytes(self.fingerprint, &self.grammar, &self.table)
    }

    /// Parse with `accept: First`, returning the single synthesized value.
    ///
    /// # Errors
    ///
    /// Returns the diagnostics of [`ParseError`]; reducer-raised domain
    /// errors propagate as [`ParseError::Domain`] or, from an error
    /// production's handler, [`ParseError::HandledError`].
    pub fn parse<I>(&self, tokens: I, env: &mut E) -> Result<V, ParseError>
    where
        I: IntoIterator<Item = Token<V>>,
    {
        let output = driver::run(self, tokens, env, &ParseOptions::default())?;
        output
            .values
            .into_iter()
            .next()
            .ok_or_else(|| ParseError::Internal("accepted parse produced no value".to_owned()))
    }

    /// Parse with `accept: All`, returning every accepted value.
    ///
    /// # Errors
    ///
    /// As [`parse`](Self::parse).
    pub fn parse_all<I>(&self, tokens: I, env: &mut E) -> Result<Vec<V>, ParseError>
    where
        I: IntoIterator<Item = Token<V>>,
    {
        let opts = ParseOptions {
            accept: Accept::All,
            ..ParseOptions::default()
        };
        Ok(driver::run(self, tokens, env, &opts)?.values)
    }

    /// Parse with explicit options, returning values and counters.
    ///
    /// # Errors
    ///
    /// As [`parse`](Self::parse); additionally fails with
    /// [`ParseError::Internal`] when a trace or derivation sink cannot be
    /// opened.
    pub fn parse_with<I>(
        &self,
        tokens: I,
        env: &mut E,
        opts: &ParseOptions,
    ) -> Result<ParseOutput<V>, ParseError>
    where
        I: IntoIterator<Item = Token<V>>,
    {
        driver::run(self, tokens, env, opts)
    }
}

impl<V, E> std::fmt::Debug for Parser<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("states", &self.table.num_states())
            .field("conflicts", &self.table.conflicts().len())
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}
