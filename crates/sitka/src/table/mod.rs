//! # Parse tables
//!
//! LR(0) automaton construction, LALR(1) lookahead propagation, action and
//! goto table filling with precedence resolution, the human-readable
//! explain dump, and the fingerprinted binary table cache.
//!
//! A table cell holds *every* viable action: a cell with more than one
//! entry is an unresolved conflict, retained so the GLR runtime can fork
//! over each alternative. The error action is an absent cell.

pub mod automaton;
pub mod build;
pub mod cache;
pub mod explain;
pub mod item;
pub mod lookahead;

use std::fmt;

use smallvec::SmallVec;

use crate::grammar::ProductionId;
use crate::symbol::SymbolId;

/// Dense state identity, assigned in discovery order; state 0 holds the
/// closure of the augmented start item.
pub type StateId = u32;

/// One parse action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

impl Action {
    /// Canonical in-cell ordering: shifts, then reduces by production id,
    /// then accept.
    pub(crate) fn sort_key(self) -> (u8, u32) {
        match self {
            Self::Shift(state) => (0, state),
            Self::Reduce(prod) => (1, prod.0),
            Self::Accept => (2, 0),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift(state) => write!(f, "shift {state}"),
            Self::Reduce(prod) => write!(f, "reduce {}", prod.0),
            Self::Accept => write!(f, "accept"),
        }
    }
}

/// The actions of one table cell. More than one entry means the conflict
/// survived resolution and the GLR runtime forks over each.
pub(crate) type ActionSet = SmallVec<[Action; 2]>;

/// An unresolved conflict, reported after finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateId,
    pub terminal: SymbolId,
    /// All actions retained in the cell, in canonical order.
    pub actions: Vec<Action>,
}

impl Conflict {
    /// Whether this is a shift/reduce conflict (as opposed to
    /// reduce/reduce).
    #[must_use]
    pub fn is_shift_reduce(&self) -> bool {
        self.actions
            .iter()
            .any(|action| matches!(action, Action::Shift(_)))
    }
}

/// Finalized action/goto tables. Rows are sorted by symbol id and looked up
/// by binary search, which keeps serialization canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTable {
    /// Per state: `(terminal, actions)` sorted by terminal.
    pub(crate) actions: Vec<Vec<(SymbolId, ActionSet)>>,
    /// Per state: `(nonterminal, target)` sorted by nonterminal.
    pub(crate) gotos: Vec<Vec<(SymbolId, StateId)>>,
    pub(crate) conflicts: Vec<Conflict>,
}

impl ParseTable {
    /// All actions for `(state, terminal)`; empty means error.
    #[must_use]
    pub fn action(&self, state: StateId, terminal: SymbolId) -> &[Action] {
        let row = &self.actions[state as usize];
        match row.binary_search_by_key(&terminal, |&(sym, _)| sym) {
            Ok(idx) => &row[idx].1,
            Err(_) => &[],
        }
    }

    /// Successor state for `(state, nonterminal)`.
    #[must_use]
    pub fn goto(&self, state: StateId, nonterminal: SymbolId) -> Option<StateId> {
        let row = &self.gotos[state as usize];
        row.binary_search_by_key(&nonterminal, |&(sym, _)| sym)
            .ok()
            .map(|idx| row[idx].1)
    }

    #[must_use]
    pub fn num_states(&self) -> usize {
        self.actions.len()
    }

    /// Conflicts that survived precedence resolution.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Recompute the conflict report from the cells; used after loading
    /// cached tables, which persist only the matrices.
    pub(crate) fn rebuild_conflicts(&mut self) {
        self.conflicts.clear();
        for (state, row) in self.actions.iter().enumerate() {
            for (terminal, cell) in row {
                if cell.len() > 1 {
                    self.conflicts.push(Conflict {
                        state: state as StateId,
                        terminal: *terminal,
                        actions: cell.to_vec(),
                    });
                }
            }
        }
    }
}
