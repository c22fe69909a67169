//! Context-free grammar analysis: nullability, FIRST and FOLLOW sets,
//! reachability and productivity.
//!
//! All sets are computed by fixed-point iteration over the production list
//! until no set changes. FIRST of a terminal is the terminal itself;
//! `follow(start)` contains `EOS` because the augmented production
//! `$accept -> start EOS` participates like any other.

use hashbrown::HashSet;

use crate::error::GrammarWarning;
use crate::grammar::Grammar;
use crate::symbol::SymbolId;

pub(crate) type TermSet = HashSet<SymbolId, ahash::RandomState>;

fn term_set() -> TermSet {
    TermSet::with_hasher(ahash::RandomState::new())
}

/// FIRST/FOLLOW/nullable tables for a finalized grammar, indexed by symbol
/// id.
pub(crate) struct Analysis {
    nullable: Vec<bool>,
    first: Vec<TermSet>,
    follow: Vec<TermSet>,
}

impl Analysis {
    pub(crate) fn compute<V, E>(grammar: &Grammar<V, E>) -> Self {
        let n = grammar.symbols().len();
        let mut nullable = vec![false; n];
        let mut first: Vec<TermSet> = (0..n).map(|_| term_set()).collect();
        for term in grammar.symbols().terminals() {
            first[term.index()].insert(term);
        }

        // Nullability.
        let mut changed = true;
        while changed {
            changed = false;
            for prod in grammar.productions() {
                if !nullable[prod.lhs.index()]
                    && prod.rhs.iter().all(|sym| nullable[sym.index()])
                {
                    nullable[prod.lhs.index()] = true;
                    changed = true;
                }
            }
        }

        // FIRST.
        changed = true;
        while changed {
            changed = false;
            for prod in grammar.productions() {
                let lhs = prod.lhs.index();
                for &sym in &prod.rhs {
                    let additions: Vec<SymbolId> = first[sym.index()]
                        .iter()
                        .copied()
                        .filter(|t| !first[lhs].contains(t))
                        .collect();
                    if !additions.is_empty() {
                        first[lhs].extend(additions);
                        changed = true;
                    }
                    if !nullable[sym.index()] {
                        break;
                    }
                }
            }
        }

        // FOLLOW.
        let mut follow: Vec<TermSet> = (0..n).map(|_| term_set()).collect();
        changed = true;
        while changed {
            changed = false;
            for prod in grammar.productions() {
                for (i, &sym) in prod.rhs.iter().enumerate() {
                    if !grammar.symbols().is_nonterminal(sym) {
                        continue;
                    }
                    let mut suffix_nullable = true;
                    let mut additions: Vec<SymbolId> = Vec::new();
                    for &after in &prod.rhs[i + 1..] {
                        additions.extend(
                            first[after.index()]
                                .iter()
                                .copied()
                                .filter(|t| !follow[sym.index()].contains(t)),
                        );
                        if !nullable[after.index()] {
                            suffix_nullable = false;
                            break;
                        }
                    }
                    if suffix_nullable {
                        additions.extend(
                            follow[prod.lhs.index()]
                                .iter()
                                .copied()
                                .filter(|t| !follow[sym.index()].contains(t)),
                        );
                    }
                    if !additions.is_empty() {
                        follow[sym.index()].extend(additions);
                        changed = true;
                    }
                }
            }
        }

        Self {
            nullable,
            first,
            follow,
        }
    }

    pub(crate) fn nullable(&self, sym: SymbolId) -> bool {
        self.nullable[sym.index()]
    }

    pub(crate) fn first(&self, sym: SymbolId) -> &TermSet {
        &self.first[sym.index()]
    }

    pub(crate) fn follow(&self, sym: SymbolId) -> &TermSet {
        &self.follow[sym.index()]
    }

    /// FIRST of a sentential form followed by an optional extra lookahead
    /// symbol. The extra symbol (which may be the internal propagation
    /// marker) is included only when the whole sequence is nullable.
    pub(crate) fn first_of_seq(&self, seq: &[SymbolId], tail: Option<SymbolId>) -> TermSet {
        let mut out = term_set();
        for &sym in seq {
            if sym == SymbolId::MARKER {
                out.insert(sym);
                return out;
            }
            out.extend(self.first[sym.index()].iter().copied());
            if !self.nullable[sym.index()] {
                return out;
            }
        }
        if let Some(tail) = tail {
            out.insert(tail);
        }
        out
    }
}

/// Nonterminals that cannot be reached from the start symbol or derive no
/// terminal string. Flagged, never fatal.
pub(crate) fn warnings<V, E>(grammar: &Grammar<V, E>) -> Vec<GrammarWarning> {
    let n = grammar.symbols().len();

    // Reachability: breadth-first over production right-hand sides.
    let mut reachable = vec![false; n];
    reachable[SymbolId::AUGMENTED.index()] = true;
    let mut queue = vec![SymbolId::AUGMENTED];
    while let Some(sym) = queue.pop() {
        for &id in grammar.productions_for(sym) {
            for &rhs_sym in &grammar.production(id).rhs {
                if !reachable[rhs_sym.index()] {
                    reachable[rhs_sym.index()] = true;
                    if grammar.symbols().is_nonterminal(rhs_sym) {
                        queue.push(rhs_sym);
                    }
                }
            }
        }
    }

    // Productivity: fixed point over productions.
    let mut productive = vec![false; n];
    for term in grammar.symbols().terminals() {
        productive[term.index()] = true;
    }
    let mut changed = true;
    while changed {
        changed = false;
        for prod in grammar.productions() {
            if !productive[prod.lhs.index()]
                && prod.rhs.iter().all(|sym| productive[sym.index()])
            {
                productive[prod.lhs.index()] = true;
                changed = true;
            }
        }
    }

    let mut out = Vec::new();
    for nt in grammar.symbols().nonterminals() {
        if nt == SymbolId::AUGMENTED {
            continue;
        }
        if !reachable[nt.index()] {
            out.push(GrammarWarning::Unreachable(
                grammar.symbols().name(nt).to_owned(),
            ));
        }
        if !productive[nt.index()] {
            out.push(GrammarWarning::Unproductive(
                grammar.symbols().name(nt).to_owned(),
            ));
        }
    }
    out
}
