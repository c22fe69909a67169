//! Action/goto table construction and precedence resolution.

use smallvec::smallvec;

use crate::grammar::{Grammar, ProductionId};
use crate::symbol::{Assoc, SymbolId};
use crate::table::automaton::Automaton;
use crate::table::item::Item;
use crate::table::lookahead::LookaheadMap;
use crate::table::{Action, ActionSet, Conflict, ParseTable, StateId};

/// Build the action and goto tables.
///
/// With `lookaheads` present the reduce rows are LALR(1); without them
/// (LR(0) mode) every completed item reduces on every terminal. When
/// `precedence_enabled`, shift/reduce cells where the input terminal and
/// every competing production carry precedence are resolved; everything
/// else stays in the cell as a retained conflict.
pub(crate) fn build_tables<V, E>(
    grammar: &Grammar<V, E>,
    automaton: &Automaton,
    lookaheads: Option<&LookaheadMap>,
    precedence_enabled: bool,
) -> ParseTable {
    let accept_item = Item::START.advanced(); // $accept -> start . EOS
    let all_terminals: Vec<SymbolId> = grammar.symbols().terminals().collect();

    let mut actions: Vec<Vec<(SymbolId, ActionSet)>> = Vec::with_capacity(automaton.states.len());
    let mut gotos: Vec<Vec<(SymbolId, StateId)>> = Vec::with_capacity(automaton.states.len());

    for state in &automaton.states {
        let mut action_row: Vec<(SymbolId, ActionSet)> = Vec::new();
        let mut goto_row: Vec<(SymbolId, StateId)> = Vec::new();

        for &(sym, target) in &state.transitions {
            if grammar.symbols().is_terminal(sym) {
                // The only EOS edge comes from the augmented item; reaching
                // it is acceptance, not an ordinary shift.
                let action = if sym == SymbolId::EOS {
                    debug_assert!(state.items.contains(&accept_item));
                    Action::Accept
                } else {
                    Action::Shift(target)
                };
                add_action(&mut action_row, sym, action);
            } else {
                goto_row.push((sym, target));
            }
        }

        for &item in &state.items {
            if !item.is_complete(grammar) || item.production == ProductionId::AUGMENTED {
                continue;
            }
            let reduce = Action::Reduce(item.production);
            match lookaheads {
                Some(map) => {
                    if let Some(las) = map.get(&(state.id, item)) {
                        for &la in las {
                            add_action(&mut action_row, la, reduce);
                        }
                    }
                }
                None => {
                    for &term in &all_terminals {
                        add_action(&mut action_row, term, reduce);
                    }
                }
            }
        }

        if precedence_enabled {
            for (terminal, cell) in &mut action_row {
                resolve_cell(grammar, *terminal, cell);
            }
            action_row.retain(|(_, cell)| !cell.is_empty());
        }
        for (_, cell) in &mut action_row {
            cell.sort_unstable_by_key(|action| action.sort_key());
        }
        action_row.sort_unstable_by_key(|&(sym, _)| sym);
        goto_row.sort_unstable_by_key(|&(sym, _)| sym);

        actions.push(action_row);
        gotos.push(goto_row);
    }

    let mut conflicts: Vec<Conflict> = Vec::new();
    for (state, row) in actions.iter().enumerate() {
        for (terminal, cell) in row {
            if cell.len() > 1 {
                conflicts.push(Conflict {
                    state: state as StateId,
                    terminal: *terminal,
                    actions: cell.to_vec(),
                });
            }
        }
    }

    ParseTable {
        actions,
        gotos,
        conflicts,
    }
}

fn add_action(row: &mut Vec<(SymbolId, ActionSet)>, terminal: SymbolId, action: Action) {
    match row.iter_mut().find(|(sym, _)| *sym == terminal) {
        Some((_, cell)) => {
            if !cell.contains(&action) {
                cell.push(action);
            }
        }
        None => row.push((terminal, smallvec![action])),
    }
}

/// Resolve one shift/reduce cell through precedence and associativity.
///
/// Resolution applies only when the cell holds exactly one shift plus
/// reduces, the input terminal has a declared precedence and every
/// competing production has one. The highest level wins; on a tie the input
/// terminal's associativity decides (`Left` reduces, `Right` shifts,
/// `NonAssoc` empties the cell). Reduce/reduce conflicts are never resolved
/// here: the GLR runtime explores them.
fn resolve_cell<V, E>(grammar: &Grammar<V, E>, terminal: SymbolId, cell: &mut ActionSet) {
    if cell.len() < 2 || cell.contains(&Action::Accept) {
        return;
    }
    let mut shift: Option<Action> = None;
    let mut reduces: Vec<(ProductionId, u32)> = Vec::new();
    for &action in cell.iter() {
        match action {
            Action::Shift(_) => shift = Some(action),
            Action::Reduce(prod) => match grammar.production(prod).prec {
                Some(prec) => reduces.push((prod, prec.level)),
                None => return,
            },
            Action::Accept => unreachable!("accept handled above"),
        }
    }
    let Some(shift) = shift else {
        return;
    };
    let Some(term_prec) = grammar.symbols().precedence(terminal) else {
        return;
    };
    let top_reduce = reduces
        .iter()
        .map(|&(_, level)| level)
        .max()
        .expect("shift/reduce cell has a reduce");

    use std::cmp::Ordering;
    match term_prec.level.cmp(&top_reduce) {
        Ordering::Greater => *cell = smallvec![shift],
        Ordering::Less => keep_top_reduces(cell, &reduces, top_reduce),
        Ordering::Equal => match term_prec.assoc {
            Assoc::Left => keep_top_reduces(cell, &reduces, top_reduce),
            Assoc::Right => *cell = smallvec![shift],
            Assoc::NonAssoc => cell.clear(),
        },
    }
}

fn keep_top_reduces(cell: &mut ActionSet, reduces: &[(ProductionId, u32)], top: u32) {
    cell.clear();
    for &(prod, level) in reduces {
        if level == top {
            cell.push(Action::Reduce(prod));
        }
    }
}
