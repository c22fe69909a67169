//! Human-readable table dump: every state's items, actions, gotos and the
//! surviving conflicts.

use std::io::{self, Write};

use crate::grammar::Grammar;
use crate::table::ParseTable;
use crate::table::automaton::Automaton;
use crate::table::item::Item;
use crate::table::lookahead::LookaheadMap;
use crate::table::Action;

pub(crate) fn render<V, E>(
    out: &mut dyn Write,
    grammar: &Grammar<V, E>,
    automaton: &Automaton,
    table: &ParseTable,
    lookaheads: Option<&LookaheadMap>,
) -> io::Result<()> {
    writeln!(out, "Grammar")?;
    writeln!(out)?;
    for prod in grammar.productions() {
        writeln!(
            out,
            "    {:>3}  {}",
            prod.id.0,
            grammar.display_production(prod.id)
        )?;
    }

    for state in &automaton.states {
        writeln!(out)?;
        writeln!(out, "State {}", state.id)?;
        writeln!(out)?;
        for &item in &state.items {
            let mut line = format!("    {}", display_item(grammar, item));
            if item.is_complete(grammar)
                && let Some(map) = lookaheads
                && let Some(las) = map.get(&(state.id, item))
            {
                let mut names: Vec<&str> =
                    las.iter().map(|&la| grammar.symbols().name(la)).collect();
                names.sort_unstable();
                line.push_str(&format!("   [{}]", names.join(", ")));
            }
            writeln!(out, "{line}")?;
        }

        let action_row = &table.actions[state.id as usize];
        if !action_row.is_empty() {
            writeln!(out)?;
            for (terminal, cell) in action_row {
                let rendered: Vec<String> = cell
                    .iter()
                    .map(|action| display_action(grammar, *action))
                    .collect();
                writeln!(
                    out,
                    "    {:<12} {}",
                    grammar.symbols().name(*terminal),
                    rendered.join("  /  ")
                )?;
            }
        }

        let goto_row = &table.gotos[state.id as usize];
        if !goto_row.is_empty() {
            writeln!(out)?;
            for (nonterminal, target) in goto_row {
                writeln!(
                    out,
                    "    {:<12} goto {}",
                    grammar.symbols().name(*nonterminal),
                    target
                )?;
            }
        }
    }

    writeln!(out)?;
    if table.conflicts.is_empty() {
        writeln!(out, "No unresolved conflicts.")?;
    } else {
        writeln!(out, "Unresolved conflicts")?;
        writeln!(out)?;
        for conflict in &table.conflicts {
            let rendered: Vec<String> = conflict
                .actions
                .iter()
                .map(|action| display_action(grammar, *action))
                .collect();
            writeln!(
                out,
                "    state {}, on {}: {}",
                conflict.state,
                grammar.symbols().name(conflict.terminal),
                rendered.join("  /  ")
            )?;
        }
    }
    out.flush()
}

fn display_item<V, E>(grammar: &Grammar<V, E>, item: Item) -> String {
    let prod = grammar.production(item.production);
    let mut out = String::from(grammar.symbols().name(prod.lhs));
    out.push_str(" ->");
    for (i, &sym) in prod.rhs.iter().enumerate() {
        if i == item.dot as usize {
            out.push_str(" .");
        }
        out.push(' ');
        out.push_str(grammar.symbols().name(sym));
    }
    if item.dot as usize == prod.rhs.len() {
        out.push_str(" .");
    }
    out
}

fn display_action<V, E>(grammar: &Grammar<V, E>, action: Action) -> String {
    match action {
        Action::Shift(state) => format!("shift {state}"),
        Action::Reduce(prod) => format!("reduce ({})", grammar.display_production(prod)),
        Action::Accept => "accept".to_owned(),
    }
}

