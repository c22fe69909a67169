//! LALR(1) lookahead computation.
//!
//! The efficient spontaneous-generation / propagation formulation: for each
//! kernel item, the closure of `{[item, #]}` (with `#` an out-of-band
//! marker) reveals which lookaheads the item generates spontaneously at its
//! goto targets and where the marker survives, the kernel item's own
//! lookaheads must propagate. Propagation then iterates to a fixed point,
//! and a final closure pass extends kernel lookaheads to the completed
//! nonkernel items the table builder cares about.

use hashbrown::HashMap;

use crate::grammar::Grammar;
use crate::grammar::analysis::{Analysis, TermSet};
use crate::symbol::SymbolId;
use crate::table::StateId;
use crate::table::automaton::Automaton;
use crate::table::item::Item;

/// Lookahead sets per `(state, item)`, covering kernel and closure items.
pub(crate) type LookaheadMap = HashMap<(StateId, Item), TermSet, ahash::RandomState>;

pub(crate) fn compute<V, E>(
    automaton: &Automaton,
    grammar: &Grammar<V, E>,
    analysis: &Analysis,
) -> LookaheadMap {
    let mut kernel_las: LookaheadMap = LookaheadMap::with_hasher(ahash::RandomState::new());
    let mut propagates: Vec<((StateId, Item), (StateId, Item))> = Vec::new();

    for state in &automaton.states {
        for &item in &state.kernel {
            kernel_las.entry((state.id, item)).or_default();
        }
    }
    kernel_las
        .get_mut(&(0, Item::START))
        .expect("state 0 kernel")
        .insert(SymbolId::EOS);

    // Phase 1: spontaneous lookaheads and propagation edges, discovered by
    // closing each kernel item under the marker lookahead.
    for state in &automaton.states {
        for &kernel_item in &state.kernel {
            let mut seed = TermSet::default();
            seed.insert(SymbolId::MARKER);
            let closed = closure_with(grammar, analysis, kernel_item, seed);

            for (item, las) in &closed {
                let Some(sym) = item.next_symbol(grammar) else {
                    continue;
                };
                let goto_state = state
                    .transition(sym)
                    .expect("closure symbol without transition");
                let goto_item = item.advanced();
                kernel_las.entry((goto_state, goto_item)).or_default();
                for &la in las {
                    if la == SymbolId::MARKER {
                        propagates.push(((state.id, kernel_item), (goto_state, goto_item)));
                    } else {
                        kernel_las
                            .get_mut(&(goto_state, goto_item))
                            .expect("just inserted")
                            .insert(la);
                    }
                }
            }
        }
    }

    // Phase 2: propagate until stable.
    let mut changed = true;
    while changed {
        changed = false;
        for &(from, to) in &propagates {
            let Some(from_las) = kernel_las.get(&from).cloned() else {
                continue;
            };
            if let Some(to_las) = kernel_las.get_mut(&to) {
                let before = to_las.len();
                to_las.extend(from_las);
                if to_las.len() > before {
                    changed = true;
                }
            }
        }
    }

    // Phase 3: extend kernel lookaheads through the closure so completed
    // nonkernel items carry theirs.
    let mut full: LookaheadMap = LookaheadMap::with_hasher(ahash::RandomState::new());
    for state in &automaton.states {
        for &kernel_item in &state.kernel {
            let seed = kernel_las
                .get(&(state.id, kernel_item))
                .cloned()
                .unwrap_or_default();
            for (item, las) in closure_with(grammar, analysis, kernel_item, seed) {
                full.entry((state.id, item)).or_default().extend(las);
            }
        }
    }
    full
}

/// Close `{[start_item, seed]}` under LR(1) item derivation: an item
/// `[A -> α . B β, a]` contributes `[B -> . γ, b]` for every `b` in
/// `FIRST(β a)`.
fn closure_with<V, E>(
    grammar: &Grammar<V, E>,
    analysis: &Analysis,
    start_item: Item,
    seed: TermSet,
) -> HashMap<Item, TermSet, ahash::RandomState> {
    let mut items: HashMap<Item, TermSet, ahash::RandomState> =
        HashMap::with_hasher(ahash::RandomState::new());
    items.insert(start_item, seed);
    let mut work = vec![start_item];

    while let Some(item) = work.pop() {
        let Some(sym) = item.next_symbol(grammar) else {
            continue;
        };
        if !grammar.symbols().is_nonterminal(sym) {
            continue;
        }
        let beta = item.rest(grammar);
        let las = items.get(&item).expect("worklist item present").clone();
        let mut derived = TermSet::default();
        for &la in &las {
            derived.extend(analysis.first_of_seq(beta, Some(la)));
        }

        for &prod in grammar.productions_for(sym) {
            let new_item = Item::new(prod, 0);
            match items.get_mut(&new_item) {
                Some(existing) => {
                    let before = existing.len();
                    existing.extend(derived.iter().copied());
                    if existing.len() > before {
                        work.push(new_item);
                    }
                }
                None => {
                    items.insert(new_item, derived.clone());
                    work.push(new_item);
                }
            }
        }
    }
    items
}
