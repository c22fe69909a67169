//! # Grammar definition surface
//!
//! [`GrammarBuilder`] collects terminals, precedence declarations and
//! productions, then [`finalize`](GrammarBuilder::finalize) freezes the
//! grammar and constructs the parse tables.
//!
//! Right-hand sides are written as whitespace-separated symbol names: an
//! uppercase first letter makes a terminal, anything else a nonterminal,
//! and a `*`/`+`/`?` suffix applies an EBNF operator. EBNF operators are
//! desugared at definition time into deterministically named helper
//! nonterminals (`num_plus` for `NUM+`), and the installed [`ebnf`]
//! callback supplies a reducer for each inserted clause so the caller can
//! shape the synthesized value.
//!
//! [`ebnf`]: GrammarBuilder::ebnf

use std::path::PathBuf;
use std::sync::Arc;

use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::{BuildError, DomainError};
use crate::grammar::{
    Grammar, Production, ProductionId, ReduceContext, Reducer, RhsValues, Value, analysis,
};
use crate::runtime::Parser;
use crate::sink::OutputSink;
use crate::symbol::{Assoc, PrecLevel, SymbolId, SymbolKind, SymbolTableBuilder};
use crate::table;

/// Lookahead discipline for table construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lookahead {
    /// LALR(1): lookaheads computed by spontaneous generation and
    /// propagation over the LR(0) automaton.
    #[default]
    Lalr1,
    /// LR(0): reductions fire on every terminal.
    Lr0,
}

/// Options controlling [`GrammarBuilder::finalize`].
#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    /// Human-readable dump of states, actions, gotos and conflicts.
    pub explain: OutputSink,
    pub lookahead: Lookahead,
    /// Whether shift/reduce conflicts are resolved through declared
    /// precedence and associativity.
    pub precedence: bool,
    /// Table cache location. When the file exists and its fingerprint
    /// matches, table construction is skipped entirely; otherwise the
    /// tables are rebuilt and the file is overwritten.
    pub cache: Option<PathBuf>,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            explain: OutputSink::Off,
            lookahead: Lookahead::default(),
            precedence: true,
            cache: None,
        }
    }
}

/// EBNF repetition operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EbnfOp {
    /// `X*`, zero or more.
    Star,
    /// `X+`, one or more.
    Plus,
    /// `X?`, zero or one.
    Opt,
}

impl EbnfOp {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Star => "star",
            Self::Plus => "plus",
            Self::Opt => "opt",
        }
    }
}

/// Which clause of a desugared EBNF operator a reducer is being requested
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbnfClauseKind {
    /// The empty clause (`xs -> ε`); no right-hand-side values.
    Empty,
    /// The single-occurrence clause (`xp -> X`); value 0 is the base.
    Base,
    /// The recursive clause (`xs -> X xs`); value 0 is the base, value 1
    /// the already-synthesized rest of the list.
    Recursive,
}

/// One production inserted by EBNF desugaring, as observed by the
/// [`GrammarBuilder::ebnf`] callback.
#[derive(Debug, Clone, Copy)]
pub struct EbnfClause {
    pub op: EbnfOp,
    pub kind: EbnfClauseKind,
    /// The repeated symbol `X`.
    pub base: SymbolId,
    /// The synthesized list nonterminal.
    pub list: SymbolId,
}

type EbnfCallback<V, E> = Box<dyn Fn(&EbnfClause) -> Reducer<V, E>>;

struct Proto<V, E> {
    lhs: SymbolId,
    rhs: SmallVec<[SymbolId; 4]>,
    prec_override: Option<SymbolId>,
    reducer: Reducer<V, E>,
}

/// Incrementally defines a grammar; see the module docs for the rhs-string
/// syntax.
pub struct GrammarBuilder<V, E = ()> {
    symbols: SymbolTableBuilder,
    protos: Vec<Proto<V, E>>,
    start: Option<SymbolId>,
    next_prec_level: u32,
    array_args: bool,
    ebnf: Option<EbnfCallback<V, E>>,
    synthesized: HashMap<(SymbolId, EbnfOp), SymbolId, ahash::RandomState>,
}

impl<V, E> std::fmt::Debug for GrammarBuilder<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarBuilder").finish_non_exhaustive()
    }
}

impl<V: Value, E: 'static> Default for GrammarBuilder<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Value, E: 'static> GrammarBuilder<V, E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            symbols: SymbolTableBuilder::new(),
            protos: Vec::new(),
            start: None,
            next_prec_level: 1,
            array_args: false,
            ebnf: None,
            synthesized: HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Declare a terminal, optionally with an explicit precedence level.
    ///
    /// Terminals are also discovered implicitly from right-hand sides; an
    /// explicit declaration is only needed ahead of a `clause` precedence
    /// override or to attach a precedence outside the
    /// `left`/`right`/`nonassoc` counters.
    ///
    /// # Errors
    ///
    /// Fails when the name is already interned as a nonterminal, or when
    /// the terminal already carries a precedence.
    pub fn terminal(&mut self, name: &str, prec: Option<PrecLevel>) -> Result<SymbolId, BuildError> {
        let id = self.symbols.intern(name, SymbolKind::Terminal)?;
        if let Some(prec) = prec {
            self.symbols.set_precedence(id, prec)?;
        }
        Ok(id)
    }

    /// Declare the given terminals left-associative at a fresh precedence
    /// level. Later declarations outrank earlier ones.
    ///
    /// # Errors
    ///
    /// Fails on kind mismatch or a repeated precedence declaration.
    pub fn left(&mut self, terminals: &[&str]) -> Result<&mut Self, BuildError> {
        self.declare_precedence(terminals, Assoc::Left)
    }

    /// Declare the given terminals right-associative at a fresh precedence
    /// level.
    ///
    /// # Errors
    ///
    /// Fails on kind mismatch or a repeated precedence declaration.
    pub fn right(&mut self, terminals: &[&str]) -> Result<&mut Self, BuildError> {
        self.declare_precedence(terminals, Assoc::Right)
    }

    /// Declare the given terminals non-associative at a fresh precedence
    /// level.
    ///
    /// # Errors
    ///
    /// Fails on kind mismatch or a repeated precedence declaration.
    pub fn nonassoc(&mut self, terminals: &[&str]) -> Result<&mut Self, BuildError> {
        self.declare_precedence(terminals, Assoc::NonAssoc)
    }

    fn declare_precedence(
        &mut self,
        terminals: &[&str],
        assoc: Assoc,
    ) -> Result<&mut Self, BuildError> {
        let level = self.next_prec_level;
        self.next_prec_level += 1;
        for name in terminals {
            let id = self.symbols.intern(name, SymbolKind::Terminal)?;
            self.symbols.set_precedence(id, PrecLevel { level, assoc })?;
        }
        Ok(self)
    }

    /// Declare the start nonterminal.
    ///
    /// # Errors
    ///
    /// Fails when the name is already interned as a terminal.
    pub fn start(&mut self, name: &str) -> Result<&mut Self, BuildError> {
        let id = self.symbols.intern(name, SymbolKind::Nonterminal)?;
        self.start = Some(id);
        Ok(self)
    }

    /// Enable array-argument mode. Reducers in this implementation always
    /// receive an ordered [`RhsValues`]; the flag is recorded because the
    /// table-cache fingerprint depends on it.
    pub fn array_args(&mut self) -> &mut Self {
        self.array_args = true;
        self
    }

    /// Install the callback that supplies reducers for productions inserted
    /// by EBNF desugaring. Must be installed before the first rhs using
    /// `*`, `+` or `?`.
    pub fn ebnf(&mut self, callback: impl Fn(&EbnfClause) -> Reducer<V, E> + 'static) -> &mut Self {
        self.ebnf = Some(Box::new(callback));
        self
    }

    /// Add a production `lhs -> rhs` with its reduction callback. An empty
    /// rhs string defines an ε-production.
    ///
    /// # Errors
    ///
    /// Fails on malformed rhs strings, reserved symbols, kind mismatches,
    /// or an EBNF operator without an installed [`ebnf`](Self::ebnf)
    /// callback.
    pub fn production(
        &mut self,
        lhs: &str,
        rhs: &str,
        reduce: impl Fn(&mut E, RhsValues<V>, &ReduceContext<'_>) -> Result<V, DomainError>
        + Send
        + Sync
        + 'static,
    ) -> Result<&mut Self, BuildError> {
        self.clause(lhs, rhs, None, reduce)
    }

    /// Add a production with an explicit precedence override: the
    /// production takes the precedence of the named terminal instead of
    /// that of the last terminal in its rhs.
    ///
    /// # Errors
    ///
    /// As [`production`](Self::production); additionally fails when the
    /// override names a terminal that has not been declared yet.
    pub fn clause(
        &mut self,
        lhs: &str,
        rhs: &str,
        prec: Option<&str>,
        reduce: impl Fn(&mut E, RhsValues<V>, &ReduceContext<'_>) -> Result<V, DomainError>
        + Send
        + Sync
        + 'static,
    ) -> Result<&mut Self, BuildError> {
        let lhs = self.symbols.intern(lhs, SymbolKind::Nonterminal)?;
        let rhs = self.parse_rhs(rhs)?;
        let prec_override = match prec {
            Some(name) => {
                let id = self
                    .symbols
                    .get(name)
                    .filter(|&id| self.symbols.is_terminal(id))
                    .ok_or_else(|| BuildError::UnknownPrecTerminal(name.to_owned()))?;
                Some(id)
            }
            None => None,
        };
        self.protos.push(Proto {
            lhs,
            rhs,
            prec_override,
            reducer: Arc::new(reduce),
        });
        Ok(self)
    }

    fn parse_rhs(&mut self, rhs: &str) -> Result<SmallVec<[SymbolId; 4]>, BuildError> {
        let mut out = SmallVec::new();
        for word in rhs.split_whitespace() {
            let (base, op) = match word.as_bytes().last() {
                Some(b'*') => (&word[..word.len() - 1], Some(EbnfOp::Star)),
                Some(b'+') => (&word[..word.len() - 1], Some(EbnfOp::Plus)),
                Some(b'?') => (&word[..word.len() - 1], Some(EbnfOp::Opt)),
                _ => (word, None),
            };
            if base.is_empty() {
                return Err(BuildError::MalformedRhs(rhs.to_owned()));
            }
            if base == "EOS" || base == "$accept" {
                return Err(BuildError::ReservedSymbol(base.to_owned()));
            }
            let kind = if base.chars().next().is_some_and(char::is_uppercase) {
                SymbolKind::Terminal
            } else {
                SymbolKind::Nonterminal
            };
            let id = self.symbols.intern(base, kind)?;
            match op {
                None => out.push(id),
                Some(op) => out.push(self.synthesize(id, op)?),
            }
        }
        Ok(out)
    }

    /// Insert the helper nonterminal and productions for one EBNF operator
    /// occurrence, reusing an earlier synthesis of the same `(base, op)`
    /// pair. The helper's name is a pure function of the base symbol and
    /// operator so cached tables stay valid across rebuilds.
    fn synthesize(&mut self, base: SymbolId, op: EbnfOp) -> Result<SymbolId, BuildError> {
        if let Some(&list) = self.synthesized.get(&(base, op)) {
            return Ok(list);
        }
        let callback = self.ebnf.as_ref().ok_or(BuildError::MissingEbnfCallback)?;

        let name: CompactString =
            format_compact!("{}_{}", self.symbols.name(base).to_lowercase(), op.suffix());
        let list = self.symbols.intern(&name, SymbolKind::Nonterminal)?;

        let clauses: &[(EbnfClauseKind, &[SymbolId])] = match op {
            EbnfOp::Star => &[
                (EbnfClauseKind::Empty, &[]),
                (EbnfClauseKind::Recursive, &[base, list]),
            ],
            EbnfOp::Plus => &[
                (EbnfClauseKind::Base, &[base]),
                (EbnfClauseKind::Recursive, &[base, list]),
            ],
            EbnfOp::Opt => &[
                (EbnfClauseKind::Empty, &[]),
                (EbnfClauseKind::Base, &[base]),
            ],
        };
        for &(kind, rhs) in clauses {
            let clause = EbnfClause {
                op,
                kind,
                base,
                list,
            };
            self.protos.push(Proto {
                lhs: list,
                rhs: SmallVec::from_slice(rhs),
                prec_override: None,
                reducer: callback(&clause),
            });
        }
        self.synthesized.insert((base, op), list);
        Ok(list)
    }

    /// Freeze the grammar, construct (or load) the parse tables and return
    /// the parser.
    ///
    /// # Errors
    ///
    /// Fails when no start symbol was declared, a right-hand side names a
    /// nonterminal with no productions, or writing the table cache fails.
    /// Unresolved conflicts are not errors; they are retained in the table
    /// for GLR and reported via [`Parser::conflicts`].
    pub fn finalize(self, options: FinalizeOptions) -> Result<Parser<V, E>, BuildError> {
        let start = self.start.ok_or(BuildError::MissingStart)?;

        let mut productions: Vec<Production<V, E>> = Vec::with_capacity(self.protos.len() + 1);
        productions.push(Production {
            id: ProductionId::AUGMENTED,
            lhs: SymbolId::AUGMENTED,
            rhs: SmallVec::from_slice(&[start, SymbolId::EOS]),
            prec: None,
            uses_error: false,
            reducer: Arc::new(|_, mut values, _| Ok(values.take(0))),
        });
        for (i, proto) in self.protos.into_iter().enumerate() {
            let prec = match proto.prec_override {
                Some(term) => self.symbols.precedence(term),
                None => proto
                    .rhs
                    .iter()
                    .rev()
                    .find(|&&sym| self.symbols.is_terminal(sym))
                    .and_then(|&term| self.symbols.precedence(term)),
            };
            productions.push(Production {
                id: ProductionId(i as u32 + 1),
                lhs: proto.lhs,
                rhs: proto.rhs,
                prec,
                uses_error: false,
                reducer: proto.reducer,
            });
        }
        for prod in &mut productions {
            prod.uses_error = prod.rhs.contains(&SymbolId::ERROR);
        }

        let symbols = self.symbols.freeze();
        let mut by_lhs: Vec<Vec<ProductionId>> = vec![Vec::new(); symbols.len()];
        for prod in &productions {
            by_lhs[prod.lhs.index()].push(prod.id);
        }

        for prod in &productions {
            for &sym in &prod.rhs {
                if symbols.is_nonterminal(sym) && by_lhs[sym.index()].is_empty() {
                    return Err(BuildError::UndefinedNonterminal(symbols.name(sym).to_owned()));
                }
            }
        }

        let mut grammar = Grammar {
            symbols,
            productions,
            by_lhs,
            start,
            array_args: self.array_args,
            warnings: Vec::new(),
        };
        grammar.warnings = analysis::warnings(&grammar);

        let fingerprint = table::cache::fingerprint(&grammar, &options);

        if let Some(path) = &options.cache
            && let Some(tables) = table::cache::load(path, fingerprint, &grammar)
        {
            return Ok(Parser::from_parts(grammar, tables, fingerprint));
        }

        let analysis = analysis::Analysis::compute(&grammar);
        let automaton = table::automaton::build(&grammar);
        let lookaheads = match options.lookahead {
            Lookahead::Lalr1 => Some(table::lookahead::compute(&automaton, &grammar, &analysis)),
            Lookahead::Lr0 => None,
        };
        let tables = table::build::build_tables(
            &grammar,
            &automaton,
            lookaheads.as_ref(),
            options.precedence,
        );

        if let Some(mut out) = options.explain.writer()? {
            table::explain::render(&mut out, &grammar, &automaton, &tables, lookaheads.as_ref())?;
        }
        if let Some(path) = &options.cache {
            table::cache::write(path, fingerprint, &grammar, &tables)?;
        }

        Ok(Parser::from_parts(grammar, tables, fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep<V: Value, E: 'static>(
    ) -> impl Fn(&mut E, RhsValues<V>, &ReduceContext<'_>) -> Result<V, DomainError> + Send + Sync + 'static
    {
        |_env: &mut E, mut values: RhsValues<V>, _ctx: &ReduceContext<'_>| Ok(values.take(0))
    }

    #[test]
    fn rhs_case_convention_decides_kind() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.start("e").unwrap();
        builder.production("e", "NUM e", keep()).unwrap();
        let num = builder.symbols.get("NUM").unwrap();
        let e = builder.symbols.get("e").unwrap();
        assert!(builder.symbols.is_terminal(num));
        assert!(!builder.symbols.is_terminal(e));
    }

    #[test]
    fn eos_is_reserved_in_rhs() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        let err = builder.production("e", "EOS", keep()).unwrap_err();
        assert!(matches!(err, BuildError::ReservedSymbol(name) if name == "EOS"));
    }

    #[test]
    fn error_terminal_is_allowed_in_rhs() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.production("e", "e PLS ERROR", keep()).unwrap();
        assert_eq!(builder.protos.len(), 1);
        assert!(builder.protos[0].rhs.contains(&SymbolId::ERROR));
    }

    #[test]
    fn ebnf_without_callback_is_rejected() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        let err = builder.production("list", "NUM+", keep()).unwrap_err();
        assert!(matches!(err, BuildError::MissingEbnfCallback));
    }

    #[test]
    fn ebnf_synthesizes_stable_names_once() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.ebnf(|_| Arc::new(|_, mut v, _| Ok(v.take_opt(0).unwrap_or(0))));
        builder.production("list", "NUM+ SEMI NUM+", keep()).unwrap();
        let list = builder.symbols.get("num_plus").expect("synthesized name");
        assert!(!builder.symbols.is_terminal(list));
        // One synthesis for both occurrences: base + recursive clause.
        assert_eq!(builder.protos.len(), 3);
        assert_eq!(builder.protos[0].lhs, list);
        assert_eq!(builder.protos[0].rhs.len(), 1);
        assert_eq!(builder.protos[1].rhs.len(), 2);
    }

    #[test]
    fn precedence_levels_increase_per_declaration() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.left(&["PLS", "SUB"]).unwrap();
        builder.right(&["MUL"]).unwrap();
        let pls = builder.symbols.get("PLS").unwrap();
        let sub = builder.symbols.get("SUB").unwrap();
        let mul = builder.symbols.get("MUL").unwrap();
        let p = builder.symbols.precedence(pls).unwrap();
        let s = builder.symbols.precedence(sub).unwrap();
        let m = builder.symbols.precedence(mul).unwrap();
        assert_eq!(p.level, s.level);
        assert!(m.level > p.level);
        assert_eq!(p.assoc, Assoc::Left);
        assert_eq!(m.assoc, Assoc::Right);
    }

    #[test]
    fn finalize_requires_start() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.production("e", "NUM", keep()).unwrap();
        let err = builder.finalize(FinalizeOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::MissingStart));
    }

    #[test]
    fn finalize_rejects_undefined_nonterminal() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.start("e").unwrap();
        builder.production("e", "missing NUM", keep()).unwrap();
        let err = builder.finalize(FinalizeOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::UndefinedNonterminal(name) if name == "missing"));
    }

    #[test]
    fn production_precedence_defaults_to_last_terminal() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.left(&["PLS"]).unwrap();
        builder.right(&["MUL"]).unwrap();
        builder.start("e").unwrap();
        builder.production("e", "e PLS e MUL e", keep()).unwrap();
        builder.production("e", "NUM", keep()).unwrap();
        let parser = builder.finalize(FinalizeOptions::default()).unwrap();
        let grammar = parser.grammar();
        let with_ops = grammar.production(ProductionId(1));
        assert_eq!(with_ops.prec.unwrap().assoc, Assoc::Right);
        assert!(grammar.production(ProductionId(2)).prec.is_none());
    }

    #[test]
    fn clause_precedence_override_wins() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.left(&["PLS"]).unwrap();
        builder.nonassoc(&["UMINUS"]).unwrap();
        builder.start("e").unwrap();
        builder
            .clause("e", "SUB e PLS", Some("UMINUS"), keep())
            .unwrap();
        builder.production("e", "NUM", keep()).unwrap();
        let parser = builder.finalize(FinalizeOptions::default()).unwrap();
        let prec = parser.grammar().production(ProductionId(1)).prec.unwrap();
        assert_eq!(prec.assoc, Assoc::NonAssoc);
    }

    #[test]
    fn unreachable_nonterminal_warns_but_builds() {
        let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
        builder.start("e").unwrap();
        builder.production("e", "NUM", keep()).unwrap();
        builder.production("orphan", "NUM", keep()).unwrap();
        let parser = builder.finalize(FinalizeOptions::default()).unwrap();
        let warnings = parser.grammar().warnings();
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, crate::error::GrammarWarning::Unreachable(n) if n == "orphan"))
        );
    }
}
