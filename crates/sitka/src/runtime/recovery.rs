//! Panic-mode error recovery through the synthetic `ERROR` terminal.
//!
//! When the frontier goes extinct on a token, recovery operates on the last
//! live spine: pop until some state shifts `ERROR`, push the `ERROR`
//! pseudo-token (inheriting the offending token's position), fire an
//! immediately available error-production reduce (whose reducer is the
//! user's error handler) and otherwise discard input until a token is
//! acceptable again. A parse with no reachable `ERROR` state on the popped
//! path is simply not in the language.

use crate::error::ParseError;
use crate::grammar::Value;
use crate::runtime::driver::Machine;
use crate::runtime::dot::DeriveNode;
use crate::runtime::spine::Spine;
use crate::symbol::SymbolId;
use crate::table::Action;
use crate::token::Token;

/// A recovered single-spine frontier plus the next token to deliver.
pub(crate) struct Resumption<V> {
    pub spine: Spine<V>,
    pub pending: Option<Token<V>>,
}

impl<'p, V: Value, E: 'static> Machine<'p, V, E> {
    pub(crate) fn recover(
        &mut self,
        last_live: Option<Spine<V>>,
        offending: &Token<V>,
        tokens: &mut impl Iterator<Item = Token<V>>,
        env: &mut E,
    ) -> Result<Resumption<V>, ParseError> {
        let parser = self.parser;
        let mut spine = last_live.ok_or(ParseError::NotInLanguage {
            span: offending.span,
        })?;

        // Pop until a state shifts ERROR.
        let target = loop {
            let shift = parser
                .table_ref()
                .action(spine.state(), SymbolId::ERROR)
                .iter()
                .find_map(|action| match action {
                    Action::Shift(state) => Some(*state),
                    _ => None,
                });
            match shift {
                Some(state) => break state,
                None => match spine.pop(1) {
                    Some((base, _)) => spine = base,
                    None => {
                        return Err(ParseError::NotInLanguage {
                            span: offending.span,
                        });
                    }
                },
            }
        };

        self.stats.recoveries += 1;
        self.trace(|| {
            format!(
                "  recovery: shifting ERROR at {} -> state {target}",
                offending.span
            )
        });
        let deriv = self
            .collect_derivs
            .then(|| DeriveNode::leaf(SymbolId::ERROR, None));
        spine = spine.push(target, None, offending.span, deriv);

        // An error-production reduce available on the offending token fires
        // at once; its reducer is the error handler and may raise (becoming
        // HandledError inside reduce) or synthesize a repair value.
        let handler = parser
            .table_ref()
            .action(spine.state(), offending.kind)
            .iter()
            .find_map(|action| match action {
                Action::Reduce(prod) if parser.grammar().production(*prod).uses_error => {
                    Some(*prod)
                }
                _ => None,
            });
        if let Some(prod) = handler {
            spine = self.reduce(&spine, prod, offending, env)?;
        }

        // Discard input until a token is acceptable in the current state;
        // exhausting the input first means the parse fails outright.
        let mut candidate = Some(offending.clone());
        loop {
            let token = match candidate.take().or_else(|| tokens.next()) {
                Some(token) => token,
                None => Token::eos(offending.span),
            };
            if !parser.table_ref().action(spine.state(), token.kind).is_empty() {
                return Ok(Resumption {
                    spine,
                    pending: Some(token),
                });
            }
            if token.kind == SymbolId::EOS {
                return Err(ParseError::NotInLanguage { span: token.span });
            }
            self.trace(|| {
                format!(
                    "  recovery: discarding {} at {}",
                    parser.grammar().symbols().name(token.kind),
                    token.span
                )
            });
        }
    }
}
