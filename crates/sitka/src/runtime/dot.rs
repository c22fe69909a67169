//! Accepted-derivation output in Graphviz DOT form.

use std::io::{self, Write};
use std::sync::Arc;

use compact_str::CompactString;

use crate::grammar::Grammar;
use crate::symbol::SymbolId;

/// One node of a derivation tree: a token leaf (with its rendered value)
/// or a nonterminal with the children its reduction covered.
#[derive(Debug)]
pub(crate) struct DeriveNode {
    pub sym: SymbolId,
    pub text: Option<CompactString>,
    pub children: Vec<Arc<DeriveNode>>,
}

impl DeriveNode {
    pub(crate) fn leaf(sym: SymbolId, text: Option<CompactString>) -> Arc<Self> {
        Arc::new(Self {
            sym,
            text,
            children: Vec::new(),
        })
    }

    pub(crate) fn node(sym: SymbolId, children: Vec<Arc<Self>>) -> Arc<Self> {
        Arc::new(Self {
            sym,
            text: None,
            children,
        })
    }
}

/// Emit one `digraph` per accepted derivation.
pub(crate) fn write_derivations<V, E>(
    out: &mut dyn Write,
    grammar: &Grammar<V, E>,
    roots: &[Arc<DeriveNode>],
) -> io::Result<()> {
    for (i, root) in roots.iter().enumerate() {
        writeln!(out, "digraph derivation_{i} {{")?;
        writeln!(out, "    node [shape=box];")?;
        let mut counter = 0usize;
        write_node(out, grammar, root, &mut counter)?;
        writeln!(out, "}}")?;
    }
    out.flush()
}

fn write_node<V, E>(
    out: &mut dyn Write,
    grammar: &Grammar<V, E>,
    node: &DeriveNode,
    counter: &mut usize,
) -> io::Result<usize> {
    let id = *counter;
    *counter += 1;
    let label = match &node.text {
        Some(text) => format!("{} = {}", grammar.symbols().name(node.sym), text),
        None => grammar.symbols().name(node.sym).to_owned(),
    };
    writeln!(out, "    n{id} [label=\"{}\"];", escape(&label))?;
    for child in &node.children {
        let child_id = write_node(out, grammar, child, counter)?;
        writeln!(out, "    n{id} -> n{child_id};")?;
    }
    Ok(id)
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
