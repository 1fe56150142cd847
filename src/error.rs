use crate::function::FunctionError;
use crate::types::NodeId;
use thiserror::Error;

/// Structural error raised synchronously by graph-construction operations
/// and by validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// The graph was already validated and its topology is frozen.
    #[error("graph is validated and can no longer be modified")]
    Frozen,
    /// An instruction handle belongs to a different graph instance.
    #[error("instruction belongs to a different graph")]
    ForeignInstruction,
    /// A node was wired to itself.
    #[error("node {node} cannot be wired to itself")]
    SelfLoop {
        /// The offending node.
        node: NodeId,
    },
    /// A routing entry targets a slot outside the destination's input range.
    #[error("slot {slot} is out of range for node {node} with {input_size} input(s)")]
    SlotOutOfRange {
        /// The destination node.
        node: NodeId,
        /// The requested slot index.
        slot: u32,
        /// The destination's input size.
        input_size: u32,
    },
    /// An input slot already has a predecessor wired to it.
    #[error("slot {slot} of node {node} is already wired")]
    SlotAlreadyWired {
        /// The destination node.
        node: NodeId,
        /// The doubly-wired slot index.
        slot: u32,
    },
    /// `set_output` requires the node's routing map to be empty.
    #[error("output map of node {node} is not empty")]
    OutputMapNotEmpty {
        /// The source node.
        node: NodeId,
    },
    /// `add_output` would exceed the node's output size.
    #[error("output map of node {node} is full")]
    OutputMapFull {
        /// The source node.
        node: NodeId,
    },
    /// `set_output` received a map whose length differs from the node's
    /// output size.
    #[error("output map for node {node} must have {expected} entries, got {got}")]
    OutputMapLength {
        /// The source node.
        node: NodeId,
        /// The node's output size.
        expected: usize,
        /// The provided map length.
        got: usize,
    },
    /// A node was requested with zero ports (merge(0), split(0), or a
    /// standard function producing no output).
    #[error("node must have at least one port")]
    ZeroPorts,
    /// The node's routing map is not complete.
    #[error("node {node} has unrouted outputs")]
    OutputsIncomplete {
        /// The incompletely routed node.
        node: NodeId,
    },
    /// The entry node must not receive data from other nodes.
    #[error("entry node {node} has wired predecessors")]
    EntryHasDependents {
        /// The candidate entry node.
        node: NodeId,
    },
    /// The exit node must not send data to other nodes.
    #[error("exit node {node} has outgoing routings")]
    ExitHasOutputs {
        /// The candidate exit node.
        node: NodeId,
    },
    /// Not every input slot of the node has a predecessor wired to it.
    #[error("node {node} does not receive all of its input tokens")]
    InputsIncomplete {
        /// The incompletely wired node.
        node: NodeId,
    },
    /// Entry and exit nodes must both be designated before validation.
    #[error("entry and exit nodes must be set before validation")]
    EndpointsUnset,
    /// Entry and exit must be distinct nodes.
    #[error("entry and exit must be distinct nodes, both are {node}")]
    EndpointsEqual {
        /// The node designated as both entry and exit.
        node: NodeId,
    },
    /// The graph contains a cycle.
    #[error("graph contains a cycle through node {node}")]
    Cycle {
        /// A node on the detected back edge.
        node: NodeId,
    },
    /// Some nodes are not reachable from the entry node.
    #[error("{missing} node(s) unreachable from the entry node")]
    Unreachable {
        /// Number of nodes the entry-rooted traversal never visited.
        missing: usize,
    },
    /// A fan-out or gather did not match the combined arity of its peers.
    #[error("fan-out expects {expected} token route(s), got {got}")]
    FanoutMismatch {
        /// Routings required for an exact fit.
        expected: usize,
        /// Routings the operation would create.
        got: usize,
    },
    /// `run` received a wrong number of positional input tokens.
    #[error("entry node expects {expected} input token(s), got {got}")]
    InputArity {
        /// The entry node's input size.
        expected: usize,
        /// The number of tokens supplied.
        got: usize,
    },
    /// The graph must be validated before a live clone can be created.
    #[error("graph has not been validated")]
    NotValidated,
}

/// Error resolving a run future.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// A user function returned an error; the run is terminated.
    #[error("user function at node {node} failed")]
    Function {
        /// The node whose function failed.
        node: NodeId,
        /// The user error.
        #[source]
        source: FunctionError,
    },
    /// A user function panicked; the panic is contained to the run.
    #[error("user function at node {node} panicked")]
    Panic {
        /// The node whose function panicked.
        node: NodeId,
    },
    /// A user function returned a token vector of the wrong length.
    #[error("node {node} produced {got} output token(s), expected {expected}")]
    OutputArity {
        /// The misbehaving node.
        node: NodeId,
        /// The node's declared output size.
        expected: usize,
        /// The number of tokens actually returned.
        got: usize,
    },
    /// The executor was shut down while the run was still in flight.
    #[error("executor shut down before the run completed")]
    Shutdown,
}
