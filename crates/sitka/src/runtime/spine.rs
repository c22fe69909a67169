//! GLR parse stacks ("spines").
//!
//! A spine is an immutable singly linked list of `(state, value)` frames
//! shared through `Arc`, so forking a spine is a pointer copy and forks
//! share their common prefix. Popping never mutates shared frames; values
//! are cloned out of them.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::runtime::dot::DeriveNode;
use crate::table::StateId;
use crate::token::Span;

#[derive(Debug)]
struct Frame<V> {
    state: StateId,
    value: Option<V>,
    span: Span,
    deriv: Option<Arc<DeriveNode>>,
    prev: Option<Arc<Frame<V>>>,
    depth: u32,
}

/// One live parse stack within the GLR frontier.
#[derive(Debug)]
pub(crate) struct Spine<V> {
    head: Arc<Frame<V>>,
}

impl<V> Clone for Spine<V> {
    fn clone(&self) -> Self {
        Self {
            head: Arc::clone(&self.head),
        }
    }
}

/// One popped stack slot, in right-hand-side order.
pub(crate) struct Slot<V> {
    pub value: Option<V>,
    pub span: Span,
    pub deriv: Option<Arc<DeriveNode>>,
}

impl<V: Clone> Spine<V> {
    /// The initial spine: state 0, no value.
    pub(crate) fn root() -> Self {
        Self {
            head: Arc::new(Frame {
                state: 0,
                value: None,
                span: Span::default(),
                deriv: None,
                prev: None,
                depth: 1,
            }),
        }
    }

    pub(crate) fn state(&self) -> StateId {
        self.head.state
    }

    pub(crate) fn depth(&self) -> u32 {
        self.head.depth
    }

    pub(crate) fn top_value(&self) -> Option<&V> {
        self.head.value.as_ref()
    }

    pub(crate) fn top_deriv(&self) -> Option<Arc<DeriveNode>> {
        self.head.deriv.clone()
    }

    /// Push a frame, leaving `self` untouched (forks share the prefix).
    #[must_use]
    pub(crate) fn push(
        &self,
        state: StateId,
        value: Option<V>,
        span: Span,
        deriv: Option<Arc<DeriveNode>>,
    ) -> Self {
        Self {
            head: Arc::new(Frame {
                state,
                value,
                span,
                deriv,
                depth: self.head.depth + 1,
                prev: Some(Arc::clone(&self.head)),
            }),
        }
    }

    /// Pop `count` frames, returning the remaining spine and the popped
    /// slots in bottom-to-top (right-hand-side) order. `None` on underflow;
    /// the root frame is never popped.
    pub(crate) fn pop(&self, count: usize) -> Option<(Self, SmallVec<[Slot<V>; 4]>)> {
        if count as u32 >= self.head.depth {
            return None;
        }
        let mut slots: SmallVec<[Slot<V>; 4]> = SmallVec::with_capacity(count);
        let mut frame = &self.head;
        for _ in 0..count {
            slots.push(Slot {
                value: frame.value.clone(),
                span: frame.span,
                deriv: frame.deriv.clone(),
            });
            frame = frame.prev.as_ref().expect("depth checked above");
        }
        slots.reverse();
        Some((
            Self {
                head: Arc::clone(frame),
            },
            slots,
        ))
    }

    /// State sequence from bottom to top; spines with equal signatures are
    /// merge candidates.
    pub(crate) fn signature(&self) -> SmallVec<[StateId; 16]> {
        let mut states: SmallVec<[StateId; 16]> = SmallVec::new();
        let mut frame = Some(&self.head);
        while let Some(f) = frame {
            states.push(f.state);
            frame = f.prev.as_ref();
        }
        states.reverse();
        states
    }
}

impl<V: Clone + PartialEq> Spine<V> {
    /// Structural equality of the whole `(state, value)` stack. With
    /// `compare_derivs`, frames must also share their derivation nodes, so
    /// distinct derivations of the same value survive (`accept: All`).
    pub(crate) fn structural_eq(&self, other: &Self, compare_derivs: bool) -> bool {
        let mut a = Some(&self.head);
        let mut b = Some(&other.head);
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(fa), Some(fb)) => {
                    if Arc::ptr_eq(fa, fb) {
                        return true;
                    }
                    if fa.depth != fb.depth || fa.state != fb.state || fa.value != fb.value {
                        return false;
                    }
                    if compare_derivs {
                        let same = match (&fa.deriv, &fb.deriv) {
                            (None, None) => true,
                            (Some(da), Some(db)) => Arc::ptr_eq(da, db),
                            _ => false,
                        };
                        if !same {
                            return false;
                        }
                    }
                    a = fa.prev.as_ref();
                    b = fb.prev.as_ref();
                }
                _ => return false,
            }
        }
    }
}
