//! # Sitka
//!
//! A parser generator and runtime: grammars are defined programmatically,
//! an LALR(1) (or LR(0)) parse table is constructed at finalization, and a
//! generalized LR automaton drives the parse; ambiguous grammars are
//! handled by forking the parse stack over retained conflict cells.
//!
//! ## Overview
//!
//! - **Grammar definition**: [`GrammarBuilder`] with yacc-style precedence
//!   (`left`/`right`/`nonassoc`), rhs strings (`"e PLS e"`) and EBNF
//!   operators (`*`, `+`, `?`) desugared at definition time
//! - **Table construction**: canonical LR(0) collection, LALR(1) lookahead
//!   propagation, precedence-based conflict resolution with a structured
//!   report of whatever remains
//! - **GLR runtime**: stack-forking pushdown interpreter synthesizing
//!   values through per-production reduction callbacks
//! - **Error recovery**: panic mode through the synthetic `ERROR` terminal
//! - **Table cache**: fingerprinted, versioned binary serialization
//!
//! Lexing is an external collaborator: the runtime consumes a stream of
//! [`Token`]s whose kinds were resolved against the grammar's terminals,
//! terminated by the distinguished `EOS` terminal.
//!
//! ## Quick start
//!
//! A prefix calculator over `i64` values:
//!
//! ```
//! use sitka::{FinalizeOptions, GrammarBuilder, Span, Token};
//!
//! let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
//! builder.start("e")?;
//! builder.production("e", "NUM", |_, mut v, _| Ok(v.take(0)))?;
//! builder.production("e", "PLS e e", |_, mut v, _| Ok(v.take(1) + v.take(2)))?;
//! let parser = builder.finalize(FinalizeOptions::default())?;
//!
//! // "+ 1 2", tokenized by an external lexer.
//! let num = parser.terminal("NUM").unwrap();
//! let pls = parser.terminal("PLS").unwrap();
//! let tokens = vec![
//!     Token::new(pls, None, Span::point(0, 1, 1)),
//!     Token::new(num, Some(1), Span::point(2, 1, 3)),
//!     Token::new(num, Some(2), Span::point(4, 1, 5)),
//! ];
//! assert_eq!(parser.parse(tokens, &mut ())?, 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`grammar`]: productions, reducers, the builder and CFG analysis
//! - [`table`]: LR(0)/LALR(1) construction, conflict report, cache
//! - [`runtime`]: the GLR driver, spines, recovery
//! - [`symbol`]: interned symbols, precedence levels
//! - [`error`]: build and parse diagnostics

pub mod error;
pub mod grammar;
pub mod runtime;
mod sink;
pub mod symbol;
pub mod table;
pub mod token;

pub use error::{BuildError, DomainError, GrammarWarning, ParseError};
pub use grammar::{
    EbnfClause, EbnfClauseKind, EbnfOp, FinalizeOptions, Grammar, GrammarBuilder, Lookahead,
    Production, ProductionId, ReduceContext, Reducer, RhsValues, Value,
};
pub use runtime::{Accept, ParseOptions, ParseOutput, ParseStats, Parser};
pub use sink::OutputSink;
pub use symbol::{Assoc, PrecLevel, SymbolId, SymbolKind, SymbolTable};
pub use table::{Action, Conflict, ParseTable, StateId};
pub use token::{Span, Token};
