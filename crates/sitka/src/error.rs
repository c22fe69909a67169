//! Diagnostics for grammar construction and parsing.

use std::fmt;

use thiserror::Error;

use crate::symbol::SymbolId;
use crate::token::Span;

/// Error type reducers may raise; propagated out of the parse call.
pub type DomainError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a parse call.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A token's kind is not a terminal of this grammar.
    #[error("token kind {kind:?} at {span} is not a terminal of this grammar")]
    BadToken { kind: SymbolId, span: Span },

    /// Every spine died and no recoverable `ERROR` state was found.
    #[error("input is not in the language (at {span})")]
    NotInLanguage { span: Span },

    /// An error production fired and its handler raised a domain error;
    /// `span` is the recovery position.
    #[error("error handler failed at {span}")]
    HandledError {
        #[source]
        source: DomainError,
        span: Span,
    },

    /// A reducer outside an error production raised a domain error.
    #[error("reduction failed at {span}")]
    Domain {
        #[source]
        source: DomainError,
        span: Span,
    },

    /// Invariant violation: spine or reduction ceiling exceeded, or a table
    /// cell referencing an unknown state. Never expected for well-formed
    /// tables.
    #[error("internal parser error: {0}")]
    Internal(String),
}

impl ParseError {
    /// Source position of the failure, when one is known.
    #[must_use]
    pub const fn span(&self) -> Option<Span> {
        match self {
            Self::BadToken { span, .. }
            | Self::NotInLanguage { span }
            | Self::HandledError { span, .. }
            | Self::Domain { span, .. } => Some(*span),
            Self::Internal(_) => None,
        }
    }
}

/// Failure while defining or finalizing a grammar.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no start symbol was declared")]
    MissingStart,

    #[error("nonterminal {0:?} appears on a right-hand side but has no productions")]
    UndefinedNonterminal(String),

    #[error("symbol {0:?} is reserved and may not appear in a right-hand side")]
    ReservedSymbol(String),

    #[error("malformed right-hand side {0:?}")]
    MalformedRhs(String),

    #[error("{0:?} is used both as a terminal and as a nonterminal")]
    KindMismatch(String),

    #[error("terminal {0:?} appears in more than one precedence declaration")]
    DuplicatePrecedence(String),

    #[error("precedence override names unknown terminal {0:?}")]
    UnknownPrecTerminal(String),

    #[error("right-hand side uses an EBNF operator but no ebnf callback is installed")]
    MissingEbnfCallback,

    #[error("table cache i/o failed")]
    Cache(#[from] std::io::Error),
}

/// Non-fatal findings about a finalized grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarWarning {
    /// The nonterminal cannot be reached from the start symbol.
    Unreachable(String),
    /// The nonterminal derives no terminal string.
    Unproductive(String),
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(name) => write!(f, "nonterminal {name:?} is unreachable"),
            Self::Unproductive(name) => write!(f, "nonterminal {name:?} derives no sentence"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_spans() {
        let span = Span::point(3, 1, 4);
        assert_eq!(
            ParseError::NotInLanguage { span }.span(),
            Some(span),
        );
        assert_eq!(ParseError::Internal("boom".into()).span(), None);
    }

    #[test]
    fn handled_error_keeps_source() {
        #[derive(Debug, Error)]
        #[error("after plus")]
        struct AfterPls;

        let err = ParseError::HandledError {
            source: Box::new(AfterPls),
            span: Span::point(0, 1, 1),
        };
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "after plus");
    }

    #[test]
    fn warning_display() {
        let warning = GrammarWarning::Unreachable("orphan".into());
        assert!(warning.to_string().contains("orphan"));
    }
}
