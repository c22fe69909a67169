//! # Grammar model
//!
//! Productions with reduction callbacks, and the frozen [`Grammar`] a
//! finalized parser carries.
//!
//! A grammar is mutated only through [`GrammarBuilder`]; finalization
//! assigns dense production ids (production 0 is the augmented
//! `$accept -> start EOS`), resolves default precedence from the last
//! right-hand-side terminal, and freezes the symbol table. A finalized
//! grammar is immutable and may be shared across concurrent parse calls.

pub mod analysis;
pub mod builder;

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{DomainError, GrammarWarning};
use crate::symbol::{PrecLevel, SymbolId, SymbolTable};
use crate::token::Span;

pub use builder::{EbnfClause, EbnfClauseKind, EbnfOp, FinalizeOptions, GrammarBuilder, Lookahead};

/// Bound on semantic values synthesized by reducers. Blanket-implemented;
/// any cloneable, comparable, printable value type qualifies.
pub trait Value: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// Dense identity of a production; 0 is the augmented start production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductionId(pub(crate) u32);

impl ProductionId {
    pub(crate) const AUGMENTED: Self = Self(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reduction callback: maps the right-hand-side values to one synthesized
/// value, inside the caller-supplied environment.
pub type Reducer<V, E> =
    Arc<dyn Fn(&mut E, RhsValues<V>, &ReduceContext<'_>) -> Result<V, DomainError> + Send + Sync>;

/// The ordered right-hand-side values handed to a reducer. Slots for
/// valueless tokens (`EOS`, `ERROR`, punctuation without a payload) are
/// empty.
#[derive(Debug)]
pub struct RhsValues<V> {
    slots: SmallVec<[Option<V>; 4]>,
}

impl<V> RhsValues<V> {
    pub(crate) fn from_slots(slots: SmallVec<[Option<V>; 4]>) -> Self {
        Self { slots }
    }

    /// Number of right-hand-side positions, empty slots included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether position `idx` carries a value.
    #[must_use]
    pub fn has(&self, idx: usize) -> bool {
        self.slots.get(idx).is_some_and(Option::is_some)
    }

    /// Take the value at right-hand-side position `idx` (0-based, counting
    /// every symbol).
    ///
    /// # Panics
    ///
    /// Panics when the position is out of range, carries no value, or was
    /// already taken.
    #[must_use]
    pub fn take(&mut self, idx: usize) -> V {
        self.slots
            .get_mut(idx)
            .unwrap_or_else(|| panic!("no rhs position {idx}"))
            .take()
            .unwrap_or_else(|| panic!("rhs position {idx} has no value"))
    }

    /// Take the value at position `idx`, or `None` for an empty slot.
    pub fn take_opt(&mut self, idx: usize) -> Option<V> {
        self.slots.get_mut(idx).and_then(Option::take)
    }

    /// All remaining values in right-hand-side order.
    #[must_use]
    pub fn into_vec(self) -> Vec<V> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Position metadata for a reduction.
pub struct ReduceContext<'a> {
    pub production: ProductionId,
    pub lhs: SymbolId,
    /// Spans of the right-hand-side slots, in order.
    pub spans: &'a [Span],
    pub(crate) fallback: Span,
}

impl ReduceContext<'_> {
    /// Span covering the whole reduced right-hand side; for an empty
    /// right-hand side, the position of the token under consideration.
    #[must_use]
    pub fn span(&self) -> Span {
        self.spans
            .iter()
            .copied()
            .reduce(Span::cover)
            .unwrap_or(self.fallback)
    }
}

/// A finalized production.
pub struct Production<V, E> {
    pub id: ProductionId,
    pub lhs: SymbolId,
    pub rhs: SmallVec<[SymbolId; 4]>,
    /// Effective precedence: explicit override, or the last rhs terminal's
    /// declared level.
    pub prec: Option<PrecLevel>,
    /// Whether the rhs contains the `ERROR` terminal.
    pub uses_error: bool,
    pub(crate) reducer: Reducer<V, E>,
}

impl<V, E> Production<V, E> {
    /// Position of the `ERROR` slot in the rhs, if any.
    #[must_use]
    pub fn error_slot(&self) -> Option<usize> {
        self.rhs.iter().position(|&sym| sym == SymbolId::ERROR)
    }
}

impl<V, E> fmt::Debug for Production<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Production")
            .field("id", &self.id)
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .field("prec", &self.prec)
            .field("uses_error", &self.uses_error)
            .finish_non_exhaustive()
    }
}

/// A finalized, immutable grammar: interned symbols, productions indexed by
/// id and by left-hand side, the start symbol and definition-time options.
pub struct Grammar<V, E = ()> {
    pub(crate) symbols: SymbolTable,
    pub(crate) productions: Vec<Production<V, E>>,
    /// Production ids grouped by lhs symbol, in definition order.
    pub(crate) by_lhs: Vec<Vec<ProductionId>>,
    pub(crate) start: SymbolId,
    pub(crate) array_args: bool,
    pub(crate) warnings: Vec<GrammarWarning>,
}

impl<V, E> Grammar<V, E> {
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    #[must_use]
    pub fn start(&self) -> SymbolId {
        self.start
    }

    #[must_use]
    pub fn production(&self, id: ProductionId) -> &Production<V, E> {
        &self.productions[id.index()]
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production<V, E>> {
        self.productions.iter()
    }

    #[must_use]
    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    /// Productions whose left-hand side is `lhs`, in definition order.
    #[must_use]
    pub fn productions_for(&self, lhs: SymbolId) -> &[ProductionId] {
        self.by_lhs
            .get(lhs.index())
            .map_or(&[], |ids| ids.as_slice())
    }

    /// Whether reducers were registered under array-argument mode. Both
    /// modes deliver an ordered [`RhsValues`] in this implementation; the
    /// flag is surfaced because the table cache fingerprint includes it.
    #[must_use]
    pub fn array_args(&self) -> bool {
        self.array_args
    }

    /// Reachability/productivity findings from finalization.
    #[must_use]
    pub fn warnings(&self) -> &[GrammarWarning] {
        &self.warnings
    }

    /// Render a production as `lhs -> sym sym ...`.
    #[must_use]
    pub fn display_production(&self, id: ProductionId) -> String {
        let prod = self.production(id);
        let mut out = String::from(self.symbols.name(prod.lhs));
        out.push_str(" ->");
        if prod.rhs.is_empty() {
            out.push_str(" ε");
        }
        for &sym in &prod.rhs {
            out.push(' ');
            out.push_str(self.symbols.name(sym));
        }
        out
    }
}

impl<V, E> fmt::Debug for Grammar<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("start", &self.symbols.name(self.start))
            .field("productions", &self.productions.len())
            .field("symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}
