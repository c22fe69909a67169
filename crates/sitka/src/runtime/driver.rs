//! The GLR main loop: one token at a time over the whole frontier.
//!
//! Reductions never consume input: a reduced spine goes back on the work
//! list and reconsiders the same token, so a conflict cell simply forks
//! the spine once per action and lets each fork run. Shifted spines are
//! merged by structural `(state, value)` equality before the next token.

use std::io::Write;
use std::sync::Arc;

use compact_str::format_compact;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::ParseError;
use crate::grammar::{ProductionId, ReduceContext, RhsValues, Value};
use crate::runtime::dot::{self, DeriveNode};
use crate::runtime::spine::Spine;
use crate::runtime::{Accept, ParseOptions, ParseOutput, ParseStats, Parser};
use crate::symbol::SymbolId;
use crate::table::{Action, StateId};
use crate::token::{Span, Token};

pub(crate) struct Machine<'p, V, E> {
    pub(crate) parser: &'p Parser<V, E>,
    pub(crate) opts: &'p ParseOptions,
    pub(crate) collect_derivs: bool,
    pub(crate) stats: ParseStats,
    pub(crate) trace_out: Option<Box<dyn Write>>,
    pub(crate) accepted: Vec<(V, Option<Arc<DeriveNode>>)>,
}

pub(crate) enum Deliver<V> {
    Alive,
    /// Every spine died on the token; carries the last live spine for
    /// recovery.
    Extinct(Option<Spine<V>>),
}

pub(crate) fn run<V: Value, E: 'static>(
    parser: &Parser<V, E>,
    tokens: impl IntoIterator<Item = Token<V>>,
    env: &mut E,
    opts: &ParseOptions,
) -> Result<ParseOutput<V>, ParseError> {
    let trace_out = opts
        .verbose
        .writer()
        .map_err(|err| ParseError::Internal(format!("cannot open verbose sink: {err}")))?;
    let mut machine = Machine {
        parser,
        opts,
        collect_derivs: opts.parse_tree.is_enabled(),
        stats: ParseStats::default(),
        trace_out,
        accepted: Vec::new(),
    };

    let mut frontier: Vec<Spine<V>> = vec![Spine::root()];
    let mut tokens = tokens.into_iter();
    let mut pending: Option<Token<V>> = None;
    let mut last_span = Span::default();
    // Offset of the token that last triggered recovery; a second extinction
    // at the same position means recovery is not making progress.
    let mut recovered_at: Option<usize> = None;

    loop {
        // The lexer appends EOS; if the iterator runs dry without one, act
        // as if it had been appended at the last seen position.
        let token = match pending.take().or_else(|| tokens.next()) {
            Some(token) => token,
            None => Token::eos(last_span),
        };
        last_span = token.span;
        if !parser.grammar().symbols().is_terminal(token.kind) {
            return Err(ParseError::BadToken {
                kind: token.kind,
                span: token.span,
            });
        }
        let is_eos = token.kind == SymbolId::EOS;
        machine.stats.tokens_consumed += 1;
        machine.trace(|| {
            format!(
                "token {} at {} ({} spine{})",
                parser.grammar().symbols().name(token.kind),
                token.span,
                frontier.len(),
                if frontier.len() == 1 { "" } else { "s" },
            )
        });

        match machine.deliver(&mut frontier, &token, env)? {
            Deliver::Alive => recovered_at = None,
            Deliver::Extinct(last_live) => {
                if recovered_at == Some(token.span.file_offset) {
                    return Err(ParseError::NotInLanguage { span: token.span });
                }
                recovered_at = Some(token.span.file_offset);
                let resumption = machine.recover(last_live, &token, &mut tokens, env)?;
                frontier = vec![resumption.spine];
                pending = resumption.pending;
                continue;
            }
        }
        if matches!(opts.accept, Accept::First) && !machine.accepted.is_empty() {
            break;
        }
        if is_eos {
            break;
        }
    }

    if machine.accepted.is_empty() {
        return Err(ParseError::NotInLanguage { span: last_span });
    }
    if let Some(mut out) = opts
        .parse_tree
        .writer()
        .map_err(|err| ParseError::Internal(format!("cannot open parse-tree sink: {err}")))?
    {
        let roots: Vec<Arc<DeriveNode>> = machine
            .accepted
            .iter()
            .filter_map(|(_, deriv)| deriv.clone())
            .collect();
        dot::write_derivations(&mut out, parser.grammar(), &roots)
            .map_err(|err| ParseError::Internal(format!("cannot write parse tree: {err}")))?;
    }

    let stats = machine.stats;
    let values = machine.accepted.into_iter().map(|(value, _)| value).collect();
    Ok(ParseOutput { values, stats })
}

impl<'p, V: Value, E: 'static> Machine<'p, V, E> {
    /// Process one token over the whole frontier: reduce (forking on
    /// conflict cells) until every surviving spine has shifted, then merge.
    fn deliver(
        &mut self,
        frontier: &mut Vec<Spine<V>>,
        token: &Token<V>,
        env: &mut E,
    ) -> Result<Deliver<V>, ParseError> {
        let parser = self.parser;
        let mut work: Vec<Spine<V>> = std::mem::take(frontier);
        let mut shifted: Vec<Spine<V>> = Vec::new();
        let mut last_live: Option<Spine<V>> = None;
        let mut accepted_here = false;
        let mut steps = 0usize;

        while let Some(spine) = work.pop() {
            steps += 1;
            if steps > self.opts.max_reductions {
                return Err(ParseError::Internal(format!(
                    "reduction ceiling ({}) exceeded at {}",
                    self.opts.max_reductions, token.span
                )));
            }
            let cell = parser.table_ref().action(spine.state(), token.kind);
            if cell.is_empty() {
                self.trace(|| format!("  [state {}] dead", spine.state()));
                last_live = Some(spine);
                continue;
            }
            if cell.len() > 1 {
                self.stats.forks += cell.len() - 1;
                self.trace(|| {
                    format!("  [state {}] conflict: forking {} ways", spine.state(), cell.len())
                });
            }
            for &action in cell {
                match action {
                    Action::Shift(next) => {
                        let deriv = self.collect_derivs.then(|| {
                            DeriveNode::leaf(
                                token.kind,
                                token.value.as_ref().map(|v| format_compact!("{v:?}")),
                            )
                        });
                        self.trace(|| format!("  [state {}] shift -> {next}", spine.state()));
                        shifted.push(spine.push(next, token.value.clone(), token.span, deriv));
                    }
                    Action::Reduce(prod) => {
                        let reduced = self.reduce(&spine, prod, token, env)?;
                        work.push(reduced);
                    }
                    Action::Accept => {
                        let value = spine.top_value().cloned().ok_or_else(|| {
                            ParseError::Internal("accepted spine carries no value".to_owned())
                        })?;
                        self.trace(|| format!("  [state {}] accept", spine.state()));
                        self.accepted.push((value, spine.top_deriv()));
                        accepted_here = true;
                    }
                }
            }
        }

        if shifted.is_empty() && !accepted_here {
            return Ok(Deliver::Extinct(last_live));
        }
        *frontier = self.merge(shifted);
        if frontier.len() > self.opts.max_spines {
            return Err(ParseError::Internal(format!(
                "spine ceiling ({}) exceeded at {}",
                self.opts.max_spines, token.span
            )));
        }
        self.stats.peak_spines = self.stats.peak_spines.max(frontier.len());
        Ok(Deliver::Alive)
    }

    /// Pop the right-hand side, run the reducer, push the goto state.
    /// Available to recovery as well, which fires error productions through
    /// the same path.
    pub(crate) fn reduce(
        &mut self,
        spine: &Spine<V>,
        prod_id: ProductionId,
        token: &Token<V>,
        env: &mut E,
    ) -> Result<Spine<V>, ParseError> {
        let parser = self.parser;
        let prod = parser.grammar().production(prod_id);
        let (base, slots) = spine.pop(prod.rhs.len()).ok_or_else(|| {
            ParseError::Internal(format!(
                "stack underflow reducing production {}",
                prod_id.index()
            ))
        })?;

        let spans: SmallVec<[Span; 4]> = slots.iter().map(|slot| slot.span).collect();
        let mut children = Vec::new();
        let mut values: SmallVec<[Option<V>; 4]> = SmallVec::with_capacity(slots.len());
        for slot in slots {
            if let Some(deriv) = slot.deriv {
                children.push(deriv);
            }
            values.push(slot.value);
        }

        let ctx = ReduceContext {
            production: prod.id,
            lhs: prod.lhs,
            spans: &spans,
            fallback: token.span,
        };
        let value = (prod.reducer)(env, RhsValues::from_slots(values), &ctx).map_err(|source| {
            if prod.uses_error {
                // The handler of an error production signalled a domain
                // error; the recovery position is the error slot.
                let span = prod
                    .error_slot()
                    .and_then(|i| spans.get(i).copied())
                    .unwrap_or_else(|| ctx.span());
                ParseError::HandledError { source, span }
            } else {
                ParseError::Domain {
                    source,
                    span: ctx.span(),
                }
            }
        })?;

        let goto = parser.table_ref().goto(base.state(), prod.lhs).ok_or_else(|| {
            ParseError::Internal(format!(
                "missing goto from state {} on {}",
                base.state(),
                parser.grammar().symbols().name(prod.lhs)
            ))
        })?;
        self.stats.reductions += 1;
        self.trace(|| {
            format!(
                "  [state {}] reduce ({}) ; goto {goto}",
                spine.state(),
                parser.grammar().display_production(prod_id)
            )
        });

        let span = spans.iter().copied().reduce(Span::cover).unwrap_or(token.span);
        let deriv = self
            .collect_derivs
            .then(|| DeriveNode::node(prod.lhs, children));
        Ok(base.push(goto, Some(value), span, deriv))
    }

    /// Merge spines whose `(state, value)` stacks are structurally equal.
    /// With `accept: All` and derivation tracking on, distinct derivations
    /// of the same values are kept apart.
    fn merge(&mut self, shifted: Vec<Spine<V>>) -> Vec<Spine<V>> {
        if shifted.len() <= 1 {
            return shifted;
        }
        let compare_derivs = self.collect_derivs && matches!(self.opts.accept, Accept::All);
        let mut groups: HashMap<SmallVec<[StateId; 16]>, Vec<usize>, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        let mut out: Vec<Spine<V>> = Vec::new();
        for spine in shifted {
            let indices = groups.entry(spine.signature()).or_default();
            if indices
                .iter()
                .any(|&i| out[i].structural_eq(&spine, compare_derivs))
            {
                self.stats.merges += 1;
            } else {
                indices.push(out.len());
                out.push(spine);
            }
        }
        out
    }

    pub(crate) fn trace(&mut self, line: impl FnOnce() -> String) {
        if let Some(out) = &mut self.trace_out {
            let _ = writeln!(out, "{}", line());
        }
    }
}
