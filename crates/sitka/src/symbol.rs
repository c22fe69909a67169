//! Symbol identities, kinds and precedence.
//!
//! Every grammar symbol is interned once and addressed by a dense
//! [`SymbolId`]. Three symbols exist in every grammar: the `EOS` terminal
//! that ends a token stream, the `ERROR` terminal used by panic-mode
//! recovery, and the augmented start nonterminal `$accept` inserted during
//! finalization.

use lasso::{Key, Rodeo, RodeoReader, Spur};

use crate::error::BuildError;

/// Dense identity of an interned grammar symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    /// The distinguished end-of-stream terminal.
    pub const EOS: Self = Self(0);
    /// The distinguished error-slot terminal.
    pub const ERROR: Self = Self(1);
    /// The augmented start nonterminal (`$accept`).
    pub(crate) const AUGMENTED: Self = Self(2);
    /// Marker used internally by the lookahead computation; never a real
    /// symbol.
    pub(crate) const MARKER: Self = Self(u32::MAX);

    /// Index into dense per-symbol tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a symbol is consumed from the token stream or produced by a
/// reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Terminal,
    Nonterminal,
}

/// Tie-breaker policy within a precedence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assoc {
    Left,
    Right,
    NonAssoc,
}

/// A precedence level with its associativity. Higher `level` binds tighter;
/// levels are allocated by declaration order, later declarations outranking
/// earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrecLevel {
    pub level: u32,
    pub assoc: Assoc,
}

#[derive(Debug, Clone, Copy)]
struct SymbolInfo {
    kind: SymbolKind,
    prec: Option<PrecLevel>,
}

/// Read-only symbol table of a finalized grammar.
#[derive(Debug)]
pub struct SymbolTable {
    names: RodeoReader,
    info: Vec<SymbolInfo>,
}

impl SymbolTable {
    /// Resolve a symbol to its interned name.
    #[must_use]
    pub fn name(&self, id: SymbolId) -> &str {
        self.names.resolve(&spur(id))
    }

    /// Look up a symbol by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        let id = self.names.get(name).map(from_spur)?;
        (id.index() < self.info.len()).then_some(id)
    }

    /// Look up a terminal by name.
    #[must_use]
    pub fn terminal(&self, name: &str) -> Option<SymbolId> {
        self.get(name).filter(|&id| self.is_terminal(id))
    }

    #[must_use]
    pub fn kind(&self, id: SymbolId) -> SymbolKind {
        self.info[id.index()].kind
    }

    #[must_use]
    pub fn is_terminal(&self, id: SymbolId) -> bool {
        id.index() < self.info.len() && matches!(self.info[id.index()].kind, SymbolKind::Terminal)
    }

    #[must_use]
    pub fn is_nonterminal(&self, id: SymbolId) -> bool {
        id.index() < self.info.len()
            && matches!(self.info[id.index()].kind, SymbolKind::Nonterminal)
    }

    /// Declared precedence of a terminal, if any.
    #[must_use]
    pub fn precedence(&self, id: SymbolId) -> Option<PrecLevel> {
        self.info[id.index()].prec
    }

    /// Total number of interned symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.info.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    /// All symbol ids in interning order.
    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (0..self.info.len()).map(|i| SymbolId(i as u32))
    }

    /// All terminal ids in interning order, `EOS` and `ERROR` included.
    pub fn terminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.iter().filter(|&id| self.is_terminal(id))
    }

    /// All nonterminal ids in interning order.
    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.iter().filter(|&id| self.is_nonterminal(id))
    }
}

/// Mutable symbol table used while a grammar is being defined.
pub(crate) struct SymbolTableBuilder {
    names: Rodeo,
    info: Vec<SymbolInfo>,
}

impl SymbolTableBuilder {
    pub(crate) fn new() -> Self {
        let mut table = Self {
            names: Rodeo::default(),
            info: Vec::new(),
        };
        // Interning order fixes the distinguished ids.
        let eos = table
            .intern("EOS", SymbolKind::Terminal)
            .expect("fresh interner");
        debug_assert_eq!(eos, SymbolId::EOS);
        let error = table
            .intern("ERROR", SymbolKind::Terminal)
            .expect("fresh interner");
        debug_assert_eq!(error, SymbolId::ERROR);
        let accept = table
            .intern("$accept", SymbolKind::Nonterminal)
            .expect("fresh interner");
        debug_assert_eq!(accept, SymbolId::AUGMENTED);
        table
    }

    /// Intern `name` as `kind`, returning the existing id when already
    /// interned with the same kind.
    pub(crate) fn intern(&mut self, name: &str, kind: SymbolKind) -> Result<SymbolId, BuildError> {
        if let Some(existing) = self.names.get(name) {
            let id = from_spur(existing);
            if self.info[id.index()].kind != kind {
                return Err(BuildError::KindMismatch(name.to_owned()));
            }
            return Ok(id);
        }
        let id = from_spur(self.names.get_or_intern(name));
        debug_assert_eq!(id.index(), self.info.len());
        self.info.push(SymbolInfo { kind, prec: None });
        Ok(id)
    }

    pub(crate) fn get(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).map(from_spur)
    }

    pub(crate) fn name(&self, id: SymbolId) -> &str {
        self.names.resolve(&spur(id))
    }

    pub(crate) fn is_terminal(&self, id: SymbolId) -> bool {
        matches!(self.info[id.index()].kind, SymbolKind::Terminal)
    }

    pub(crate) fn precedence(&self, id: SymbolId) -> Option<PrecLevel> {
        self.info[id.index()].prec
    }

    /// Attach a precedence level to a terminal. A terminal may appear in at
    /// most one `left`/`right`/`nonassoc` declaration.
    pub(crate) fn set_precedence(
        &mut self,
        id: SymbolId,
        prec: PrecLevel,
    ) -> Result<(), BuildError> {
        let slot = &mut self.info[id.index()];
        if slot.prec.is_some() {
            return Err(BuildError::DuplicatePrecedence(
                self.names.resolve(&spur(id)).to_owned(),
            ));
        }
        slot.prec = Some(prec);
        Ok(())
    }

    /// Freeze into the read-only table shared by the finalized parser.
    pub(crate) fn freeze(self) -> SymbolTable {
        SymbolTable {
            names: self.names.into_reader(),
            info: self.info,
        }
    }
}

fn spur(id: SymbolId) -> Spur {
    Spur::try_from_usize(id.index()).expect("symbol id out of interner range")
}

fn from_spur(spur: Spur) -> SymbolId {
    SymbolId(spur.into_usize() as u32)
}
