use crate::error::RunError;
use crate::function::Function;
use crate::sync::{AtomicBool, AtomicU32, Ordering, SyncUnsafeCell};
use crate::token::{Token, TokenVec};
use crate::types::NodeId;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Fires the attached user function.
    Standard,
    /// Replicates its single input token across every output position.
    Split,
    /// Bundles its input tokens into one token, in slot order.
    Merge,
}

/// Immutable definition of one node, shared between the validated template
/// and every per-run clone.
#[derive(derive_more::Debug)]
pub(crate) struct NodeDef {
    pub(crate) kind: NodeKind,
    #[debug(skip)]
    pub(crate) function: Arc<dyn Function>,
    pub(crate) input_size: u32,
    pub(crate) output_size: u32,
    /// One `(successor, slot)` destination per output position.
    pub(crate) output_map: Box<[(NodeId, u32)]>,
    /// Deduplicated successor ids, in wiring order.
    pub(crate) successors: Box<[NodeId]>,
    pub(crate) is_exit: bool,
}

impl NodeDef {
    /// Produces the node's output tokens from its materialized inputs.
    ///
    /// User panics are contained here and reported as [`RunError::Panic`],
    /// so a misbehaving callable fails its own run without tearing down the
    /// worker that fired it.
    pub(crate) fn execute(&self, node: NodeId, inputs: TokenVec) -> Result<TokenVec, RunError> {
        match self.kind {
            NodeKind::Standard => {
                let outputs = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.function.execute(&inputs)
                }))
                .map_err(|_| RunError::Panic { node })?
                .map_err(|source| RunError::Function { node, source })?;
                if outputs.len() != self.output_size as usize {
                    return Err(RunError::OutputArity {
                        node,
                        expected: self.output_size as usize,
                        got: outputs.len(),
                    });
                }
                Ok(outputs)
            }
            NodeKind::Split => {
                let token = inputs
                    .into_iter()
                    .next()
                    .expect("NodeDef::execute: split fired without its input token");
                // Handle clones: every output position shares the payload.
                Ok(vec![token; self.output_size as usize])
            }
            NodeKind::Merge => Ok(vec![Token::new(inputs)]),
        }
    }
}

/// Per-run mutable firing state of one node.
///
/// Together with the counter+latch protocol this is the whole concurrency
/// surface of a run: input slots are written by exactly one predecessor
/// firing each and drained by the node's own (unique) firing; `arrivals`
/// counts unfulfilled slots down from `input_size`; `fired` admits exactly
/// one claimant per run.
///
/// Aligned to avoid false sharing between neighboring records under
/// concurrent counter traffic.
#[derive(Debug)]
#[repr(align(128))]
pub(crate) struct FiringRecord {
    slots: Box<[SyncUnsafeCell<Option<Token>>]>,
    arrivals: AtomicU32,
    fired: AtomicBool,
}

impl FiringRecord {
    pub(crate) fn new(input_size: u32) -> Self {
        Self {
            slots: (0..input_size).map(|_| SyncUnsafeCell::new(None)).collect(),
            arrivals: AtomicU32::new(input_size),
            fired: AtomicBool::new(false),
        }
    }

    /// Stores a token into one input slot.
    ///
    /// # Safety
    /// At most one thread may write a given slot per run. The wiring rules
    /// guarantee this: each slot has exactly one predecessor, and that
    /// predecessor fires at most once.
    pub(crate) unsafe fn put(&self, slot: u32, token: Token) {
        // SAFETY: exclusive slot access, forwarded from the caller.
        unsafe {
            self.slots[slot as usize].with_mut(|tok| *tok = Some(token));
        }
    }

    /// Records one token arrival.
    ///
    /// Release ordering pairs with the Acquire load in [`Self::try_claim`]:
    /// a claimant observing zero also observes every slot write sequenced
    /// before the matching decrements.
    pub(crate) fn arrive(&self) {
        let prev = self.arrivals.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "FiringRecord::arrive: counter underflow");
    }

    /// Attempts to claim the node for firing.
    ///
    /// Returns `true` exactly once per run, and only after every input slot
    /// has been delivered.
    pub(crate) fn try_claim(&self) -> bool {
        self.arrivals.load(Ordering::Acquire) == 0
            && self
                .fired
                .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
    }

    /// Marks the node fired without consulting the arrival counter.
    ///
    /// Only the entry node is claimed this way: it has no predecessors to
    /// decrement its counter and is ready by fiat once its slots are seeded.
    pub(crate) fn force_claim(&self) {
        self.fired.store(true, Ordering::Relaxed);
    }

    /// Drains the input slots in order.
    ///
    /// # Panics
    /// When a slot is empty, i.e. the caller fired a node it never claimed.
    ///
    /// # Safety
    /// The caller must have claimed the node via [`Self::try_claim`] (or
    /// [`Self::force_claim`] for the seeded entry), which makes it the sole
    /// accessor of the slots for the rest of the run.
    pub(crate) unsafe fn take_inputs(&self) -> TokenVec {
        self.slots
            .iter()
            .map(|cell| {
                // SAFETY: exclusive access established by the claim.
                unsafe { cell.with_mut(|tok| (*tok).take()) }
                    .expect("FiringRecord::take_inputs: missing input token")
            })
            .collect()
    }
}
