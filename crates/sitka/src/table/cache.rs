//! Fingerprinted binary table cache.
//!
//! The record is versioned and little-endian: magic, format version, the
//! grammar fingerprint, production metadata `(id, lhs, rhs length)`, then
//! the action and goto matrices with full conflict lists. Backward
//! compatibility across format versions is not promised; any mismatch in
//! magic, version, fingerprint or production metadata makes the cache
//! stale and the caller regenerates it.
//!
//! The fingerprint is FNV-1a/64 over the ordered symbol and production
//! names, the precedence declarations and the builder options. It hashes
//! names rather than rhs source strings, so whitespace-only edits to rhs
//! strings do not invalidate a cache, while any reordering that shifts
//! production ids does.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::grammar::builder::{FinalizeOptions, Lookahead};
use crate::grammar::{Grammar, ProductionId};
use crate::symbol::{Assoc, SymbolId};
use crate::table::{Action, ActionSet, ParseTable, StateId};

const MAGIC: [u8; 4] = *b"STKA";
const VERSION: u32 = 1;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

struct Fnv(u64);

impl Fnv {
    const fn new() -> Self {
        Self(FNV_OFFSET)
    }

    fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn str(&mut self, s: &str) {
        self.update(s.as_bytes());
        self.update(&[0]);
    }

    const fn finish(&self) -> u64 {
        self.0
    }
}

/// Stable content hash of a finalized grammar plus the builder options that
/// shape its tables.
pub(crate) fn fingerprint<V, E>(grammar: &Grammar<V, E>, options: &FinalizeOptions) -> u64 {
    let mut hash = Fnv::new();
    hash.update(b"sitka-tables");
    hash.update(&[
        match options.lookahead {
            Lookahead::Lalr1 => 1,
            Lookahead::Lr0 => 0,
        },
        u8::from(options.precedence),
        u8::from(grammar.array_args()),
    ]);
    hash.str(grammar.symbols().name(grammar.start()));

    for sym in grammar.symbols().iter() {
        hash.str(grammar.symbols().name(sym));
        hash.update(&[u8::from(grammar.symbols().is_terminal(sym))]);
        match grammar.symbols().precedence(sym) {
            Some(prec) => {
                hash.update(&[1]);
                hash.update(&prec.level.to_le_bytes());
                hash.update(&[match prec.assoc {
                    Assoc::Left => 0,
                    Assoc::Right => 1,
                    Assoc::NonAssoc => 2,
                }]);
            }
            None => hash.update(&[0]),
        }
    }

    for prod in grammar.productions() {
        hash.str(grammar.symbols().name(prod.lhs));
        for &sym in &prod.rhs {
            hash.str(grammar.symbols().name(sym));
        }
        hash.update(&[0xff]);
    }

    hash.finish()
}

/// Write the whole record to any sink; the file cache and the determinism
/// tests share this layout.
fn write_record<V, E>(
    out: &mut impl Write,
    fingerprint: u64,
    grammar: &Grammar<V, E>,
    table: &ParseTable,
) -> io::Result<()> {
    out.write_all(&MAGIC)?;
    write_u32(out, VERSION)?;
    out.write_all(&fingerprint.to_le_bytes())?;

    write_u32(out, grammar.production_count() as u32)?;
    for prod in grammar.productions() {
        write_u32(out, prod.id.0)?;
        write_u32(out, prod.lhs.0)?;
        write_u32(out, prod.rhs.len() as u32)?;
    }

    write_u32(out, table.actions.len() as u32)?;
    for row in &table.actions {
        write_u32(out, row.len() as u32)?;
        for (terminal, cell) in row {
            write_u32(out, terminal.0)?;
            write_u32(out, cell.len() as u32)?;
            for &action in cell {
                let (tag, arg) = match action {
                    Action::Shift(state) => (0u8, state),
                    Action::Reduce(prod) => (1, prod.0),
                    Action::Accept => (2, 0),
                };
                out.write_all(&[tag])?;
                write_u32(out, arg)?;
            }
        }
    }
    for row in &table.gotos {
        write_u32(out, row.len() as u32)?;
        for &(nonterminal, target) in row {
            write_u32(out, nonterminal.0)?;
            write_u32(out, target)?;
        }
    }
    Ok(())
}

/// Persist the tables at `path`.
pub(crate) fn write<V, E>(
    path: &Path,
    fingerprint: u64,
    grammar: &Grammar<V, E>,
    table: &ParseTable,
) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_record(&mut out, fingerprint, grammar, table)?;
    out.flush()
}

/// Serialize the record to bytes without touching the filesystem.
pub(crate) fn to_bytes<V, E>(
    fingerprint: u64,
    grammar: &Grammar<V, E>,
    table: &ParseTable,
) -> Vec<u8> {
    let mut buf = Vec::new();
    write_record(&mut buf, fingerprint, grammar, table).expect("write to vec");
    buf
}

/// Load the tables from `path` when the file is present and fresh. Any
/// read failure or mismatch yields `None` (the cache is stale, never an
/// error).
pub(crate) fn load<V, E>(
    path: &Path,
    fingerprint: u64,
    grammar: &Grammar<V, E>,
) -> Option<ParseTable> {
    let file = File::open(path).ok()?;
    read_record(&mut BufReader::new(file), fingerprint, grammar).ok()
}

fn read_record<V, E>(
    input: &mut impl Read,
    fingerprint: u64,
    grammar: &Grammar<V, E>,
) -> io::Result<ParseTable> {
    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if magic != MAGIC || read_u32(input)? != VERSION {
        return Err(stale("magic or version"));
    }
    let mut fp = [0u8; 8];
    input.read_exact(&mut fp)?;
    if u64::from_le_bytes(fp) != fingerprint {
        return Err(stale("fingerprint"));
    }

    let n_prods = read_u32(input)? as usize;
    if n_prods != grammar.production_count() {
        return Err(stale("production count"));
    }
    for (idx, prod) in grammar.productions().enumerate() {
        let id = read_u32(input)?;
        let lhs = read_u32(input)?;
        let rhs_len = read_u32(input)? as usize;
        if id as usize != idx
            || ProductionId(id) != prod.id
            || SymbolId(lhs) != prod.lhs
            || rhs_len != prod.rhs.len()
        {
            return Err(stale("production metadata"));
        }
    }

    let n_states = read_u32(input)? as usize;
    let mut actions: Vec<Vec<(SymbolId, ActionSet)>> = Vec::with_capacity(n_states.min(1 << 20));
    for _ in 0..n_states {
        let n_entries = read_u32(input)? as usize;
        let mut row = Vec::with_capacity(n_entries.min(1 << 16));
        for _ in 0..n_entries {
            let terminal = SymbolId(read_u32(input)?);
            let n_actions = read_u32(input)? as usize;
            let mut cell = ActionSet::new();
            for _ in 0..n_actions {
                let mut tag = [0u8; 1];
                input.read_exact(&mut tag)?;
                let arg = read_u32(input)?;
                cell.push(match tag[0] {
                    0 => Action::Shift(arg as StateId),
                    1 => {
                        if arg as usize >= n_prods {
                            return Err(stale("production id out of range"));
                        }
                        Action::Reduce(ProductionId(arg))
                    }
                    2 => Action::Accept,
                    _ => return Err(stale("action tag")),
                });
            }
            row.push((terminal, cell));
        }
        actions.push(row);
    }

    let mut gotos: Vec<Vec<(SymbolId, StateId)>> = Vec::with_capacity(n_states.min(1 << 20));
    for _ in 0..n_states {
        let n_entries = read_u32(input)? as usize;
        let mut row = Vec::with_capacity(n_entries.min(1 << 16));
        for _ in 0..n_entries {
            let nonterminal = SymbolId(read_u32(input)?);
            let target = read_u32(input)? as usize;
            if target >= n_states {
                return Err(stale("goto target out of range"));
            }
            row.push((nonterminal, target as StateId));
        }
        gotos.push(row);
    }

    for row in &actions {
        for (_, cell) in row {
            for action in cell {
                if let Action::Shift(state) = action
                    && *state as usize >= n_states
                {
                    return Err(stale("shift target out of range"));
                }
            }
        }
    }

    let mut table = ParseTable {
        actions,
        gotos,
        conflicts: Vec::new(),
    };
    table.rebuild_conflicts();
    Ok(table)
}

fn stale(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("stale table cache: {what}"),
    )
}

fn write_u32(out: &mut impl Write, value: u32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn read_u32(input: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv_is_stable_and_input_sensitive() {
        let mut a = Fnv::new();
        a.str("NUM");
        let mut b = Fnv::new();
        b.str("NUM");
        assert_eq!(a.finish(), b.finish());

        let mut c = Fnv::new();
        c.str("MUN");
        assert_ne!(a.finish(), c.finish());
    }

    #[test]
    fn separator_prevents_name_gluing() {
        let mut a = Fnv::new();
        a.str("AB");
        a.str("C");
        let mut b = Fnv::new();
        b.str("A");
        b.str("BC");
        assert_ne!(a.finish(), b.finish());
    }
}
