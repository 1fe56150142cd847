use crate::error::{GraphError, RunError};
use crate::graph::{Graph, GraphCore};
use crate::node::FiringRecord;
use crate::token::TokenVec;
use crate::types::NodeId;
use std::sync::Arc;

/// Outcome of firing one node.
#[derive(Debug)]
pub enum Firing {
    /// The exit node fired; the run is complete with these output tokens.
    Completed(TokenVec),
    /// Outputs were delivered; these successors became ready and belong to
    /// the caller. Each id is handed out exactly once per run.
    Ready(Vec<NodeId>),
}

/// Per-run live graph: the shared immutable template plus one firing record
/// per node.
///
/// Node ids are stable between the template and the records, so the live
/// graph is just two parallel arrays — static definitions and dynamic firing
/// state. Handlers share nothing mutable with each other or with the
/// template, which is what makes concurrent runs independent.
///
/// The handler is also usable without the executor's worker pool: starting
/// from [`Self::entry`] and repeatedly firing the returned ready nodes
/// executes the run inline on the calling thread.
pub struct GraphHandler {
    core: Arc<GraphCore>,
    records: Box<[FiringRecord]>,
}

impl GraphHandler {
    /// Creates a live clone of a validated graph, seeding the entry node's
    /// input slots with `inputs` in positional order.
    ///
    /// The entry node has no predecessors to decrement its arrival counter;
    /// it is ready by fiat, and its firing latch is set here so the counter
    /// is never consulted for it.
    pub fn new(graph: &Graph, inputs: TokenVec) -> Result<Self, GraphError> {
        let core = Arc::clone(graph.template().ok_or(GraphError::NotValidated)?);
        let entry = &core.nodes[core.entry.index()];
        if inputs.len() != entry.input_size as usize {
            return Err(GraphError::InputArity {
                expected: entry.input_size as usize,
                got: inputs.len(),
            });
        }
        let records: Box<[FiringRecord]> = core
            .nodes
            .iter()
            .map(|def| FiringRecord::new(def.input_size))
            .collect();

        let record = &records[core.entry.index()];
        for (slot, token) in inputs.into_iter().enumerate() {
            // SAFETY: the handler is not shared yet; this is the only access.
            unsafe { record.put(slot as u32, token) };
        }
        record.force_claim();

        Ok(Self { core, records })
    }

    /// The node to fire first.
    pub fn entry(&self) -> NodeId {
        self.core.entry
    }

    /// The node whose firing completes the run.
    pub fn exit(&self) -> NodeId {
        self.core.exit
    }

    /// Fires `node`: drains its input slots, executes it, and either
    /// completes the run (exit node) or delivers the outputs to the
    /// successors' input slots.
    ///
    /// Delivery decrements each successor's arrival counter with Release
    /// ordering; a successor whose counter reads zero (Acquire) and whose
    /// one-shot latch is won here is reported in [`Firing::Ready`]. The
    /// Release/Acquire pair guarantees that whoever fires a ready successor
    /// observes every predecessor's slot write.
    ///
    /// Callers may only fire nodes they own: the entry node right after
    /// construction, and nodes previously returned in [`Firing::Ready`].
    ///
    /// # Panics
    /// When `node` was never made ready (its input slots are not all
    /// delivered), i.e. on a caller protocol violation.
    pub fn fire(&self, node: NodeId) -> Result<Firing, RunError> {
        let def = &self.core.nodes[node.index()];
        let record = &self.records[node.index()];
        // SAFETY: the caller owns this firing (entry seed or a won latch),
        // and the Acquire edge in `try_claim` made every predecessor's slot
        // write visible.
        let inputs = unsafe { record.take_inputs() };
        let outputs = def.execute(node, inputs)?;

        if def.is_exit {
            return Ok(Firing::Completed(outputs));
        }

        for (&(successor, slot), token) in def.output_map.iter().zip(outputs) {
            let target = &self.records[successor.index()];
            // SAFETY: build-time wiring guarantees exactly one predecessor
            // per slot, and the latch guarantees this predecessor fires at
            // most once; no other thread writes this slot in this run.
            unsafe { target.put(slot, token) };
            target.arrive();
        }

        let ready = def
            .successors
            .iter()
            .copied()
            .filter(|successor| self.records[successor.index()].try_claim())
            .collect();
        Ok(Firing::Ready(ready))
    }
}
