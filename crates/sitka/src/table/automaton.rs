//! Canonical LR(0) collection.
//!
//! States are discovered breadth-first from `closure({$accept -> . start
//! EOS})`. Within a state, transition symbols are visited terminals-first
//! in id order, so state numbering is a pure function of the grammar and
//! rebuilding the automaton reproduces identical ids.

use hashbrown::HashMap;

use crate::grammar::Grammar;
use crate::symbol::SymbolId;
use crate::table::StateId;
use crate::table::item::{Item, closure};

#[derive(Debug)]
pub(crate) struct State {
    pub id: StateId,
    /// Kernel items (sorted); the identity of the state.
    pub kernel: Vec<Item>,
    /// Full LR(0) closure (sorted).
    pub items: Vec<Item>,
    /// Outgoing edges, terminals first, each group in symbol-id order.
    pub transitions: Vec<(SymbolId, StateId)>,
}

impl State {
    pub(crate) fn transition(&self, sym: SymbolId) -> Option<StateId> {
        self.transitions
            .iter()
            .find(|&&(s, _)| s == sym)
            .map(|&(_, target)| target)
    }
}

#[derive(Debug)]
pub(crate) struct Automaton {
    pub states: Vec<State>,
}

pub(crate) fn build<V, E>(grammar: &Grammar<V, E>) -> Automaton {
    let mut states: Vec<State> = Vec::new();
    let mut by_kernel: HashMap<Vec<Item>, StateId, ahash::RandomState> =
        HashMap::with_hasher(ahash::RandomState::new());

    let kernel = vec![Item::START];
    let items = closure(grammar, &kernel);
    by_kernel.insert(kernel.clone(), 0);
    states.push(State {
        id: 0,
        kernel,
        items,
        transitions: Vec::new(),
    });

    let mut next = 0;
    while next < states.len() {
        let state_items = states[next].items.clone();

        // Group advanced items by the symbol over which the dot moves.
        let mut groups: HashMap<SymbolId, Vec<Item>, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        for &item in &state_items {
            if let Some(sym) = item.next_symbol(grammar) {
                groups.entry(sym).or_default().push(item.advanced());
            }
        }

        let mut symbols: Vec<SymbolId> = groups.keys().copied().collect();
        symbols.sort_unstable_by_key(|&sym| (grammar.symbols().is_nonterminal(sym), sym));

        let mut transitions = Vec::with_capacity(symbols.len());
        for sym in symbols {
            let mut kernel = groups.remove(&sym).unwrap_or_default();
            kernel.sort_unstable();
            kernel.dedup();

            let target = match by_kernel.get(&kernel) {
                Some(&id) => id,
                None => {
                    let id = states.len() as StateId;
                    let items = closure(grammar, &kernel);
                    by_kernel.insert(kernel.clone(), id);
                    states.push(State {
                        id,
                        kernel,
                        items,
                        transitions: Vec::new(),
                    });
                    id
                }
            };
            transitions.push((sym, target));
        }
        states[next].transitions = transitions;
        next += 1;
    }

    Automaton { states }
}
