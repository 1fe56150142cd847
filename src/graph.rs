use crate::error::GraphError;
use crate::function::{Function, Placeholder};
use crate::node::{NodeDef, NodeKind};
use crate::types::{Bitmask, IndexSet, NodeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Process-unique graph identity; only compared for equality, so plain std
// atomics are fine even under the loom feature.
static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct GraphId(u64);

impl GraphId {
    fn next() -> Self {
        Self(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle tying a node to its owning graph.
///
/// Every builder operation goes through instructions; an instruction from
/// another [`Graph`] instance is rejected by all wiring operations. The
/// handle also carries enough of the node's definition ([`Graph::clone_node`]
/// copies the function reference and dimensions across graphs).
#[derive(Clone, derive_more::Debug)]
pub struct Instruction {
    node: NodeId,
    graph: GraphId,
    kind: NodeKind,
    #[debug(skip)]
    function: Arc<dyn Function>,
    input_size: u32,
    output_size: u32,
}

impl Instruction {
    /// The node's id within its graph.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// Number of input slots of the underlying node.
    pub fn input_size(&self) -> usize {
        self.input_size as usize
    }

    /// Number of output positions of the underlying node.
    pub fn output_size(&self) -> usize {
        self.output_size as usize
    }

    /// Whether `self` and every instruction in `others` share one graph.
    pub fn from_same_graph<'a>(&self, others: impl IntoIterator<Item = &'a Instruction>) -> bool {
        others.into_iter().all(|other| other.graph == self.graph)
    }
}

/// One node under construction.
struct BuilderNode {
    kind: NodeKind,
    function: Arc<dyn Function>,
    input_size: u32,
    output_size: u32,
    /// Ordered routing entries, one per already-routed output position.
    output_map: Vec<(NodeId, u32)>,
    /// Deduplicated successor ids, in wiring order.
    successors: IndexSet<NodeId>,
    /// Bit `i` set when some predecessor is wired to input slot `i`.
    dependents: Bitmask,
    /// Next input slot `send_to`/`gather_from` will fill.
    input_cursor: u32,
    is_exit: bool,
}

impl BuilderNode {
    fn new(kind: NodeKind, function: Arc<dyn Function>, input_size: u32, output_size: u32) -> Self {
        Self {
            kind,
            function,
            input_size,
            output_size,
            output_map: Vec::with_capacity(output_size as usize),
            successors: IndexSet::default(),
            dependents: Bitmask::new(input_size),
            input_cursor: 0,
            is_exit: false,
        }
    }
}

/// Validated, immutable graph structure backing per-run clones.
///
/// Node definitions (functions, routing maps, successor lists) are shared by
/// reference across every live clone; only the firing records are per-run.
#[derive(Debug)]
pub(crate) struct GraphCore {
    pub(crate) nodes: Box<[NodeDef]>,
    pub(crate) entry: NodeId,
    pub(crate) exit: NodeId,
}

/// Dataflow graph under construction.
///
/// A graph is mutable until [`Graph::validate`] succeeds; from then on the
/// topology is frozen and every mutating operation fails with
/// [`GraphError::Frozen`]. The frozen template can back any number of
/// concurrent runs.
pub struct Graph {
    id: GraphId,
    nodes: Vec<BuilderNode>,
    entry: Option<NodeId>,
    exit: Option<NodeId>,
    template: Option<Arc<GraphCore>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            id: GraphId::next(),
            nodes: Vec::new(),
            entry: None,
            exit: None,
            template: None,
        }
    }

    /// Appends a STANDARD node wrapping `function`.
    ///
    /// The node's input and output sizes are the function's declared arity
    /// and output arity. Standard nodes must produce at least one token.
    pub fn add(&mut self, function: impl Function + 'static) -> Result<Instruction, GraphError> {
        self.ensure_mutable()?;
        if function.output_size() == 0 {
            return Err(GraphError::ZeroPorts);
        }
        let input_size = dim(function.arity());
        let output_size = dim(function.output_size());
        Ok(self.push(NodeKind::Standard, Arc::new(function), input_size, output_size))
    }

    /// Appends a MERGE node bundling `input_size` tokens into one.
    pub fn merge(&mut self, input_size: usize) -> Result<Instruction, GraphError> {
        self.ensure_mutable()?;
        if input_size == 0 {
            return Err(GraphError::ZeroPorts);
        }
        Ok(self.push(NodeKind::Merge, Arc::new(Placeholder), dim(input_size), 1))
    }

    /// Appends a SPLIT node replicating one token across `output_size`
    /// positions.
    pub fn split(&mut self, output_size: usize) -> Result<Instruction, GraphError> {
        self.ensure_mutable()?;
        if output_size == 0 {
            return Err(GraphError::ZeroPorts);
        }
        Ok(self.push(NodeKind::Split, Arc::new(Placeholder), 1, dim(output_size)))
    }

    /// Appends a node referencing the same function (and dimensions) as an
    /// existing one, which may belong to a different graph. Wiring state is
    /// fresh.
    pub fn clone_node(&mut self, source: &Instruction) -> Result<Instruction, GraphError> {
        self.ensure_mutable()?;
        Ok(self.push(
            source.kind,
            Arc::clone(&source.function),
            source.input_size,
            source.output_size,
        ))
    }

    /// Replaces the node's (empty) output map with `map`, one
    /// `(destination, slot)` entry per output position.
    pub fn set_output(
        &mut self,
        source: &Instruction,
        map: Vec<(Instruction, usize)>,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(source)?;
        let node = &self.nodes[source.node.index()];
        if !node.output_map.is_empty() {
            return Err(GraphError::OutputMapNotEmpty { node: source.node });
        }
        if map.len() != node.output_size as usize {
            return Err(GraphError::OutputMapLength {
                node: source.node,
                expected: node.output_size as usize,
                got: map.len(),
            });
        }
        for (destination, slot) in &map {
            self.wire(source.node, destination, *slot)?;
        }
        Ok(())
    }

    /// Appends one routing entry to the node's output map.
    pub fn add_output(
        &mut self,
        source: &Instruction,
        destination: &Instruction,
        slot: usize,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(source)?;
        let node = &self.nodes[source.node.index()];
        if node.output_map.len() >= node.output_size as usize {
            return Err(GraphError::OutputMapFull { node: source.node });
        }
        self.wire(source.node, destination, slot)
    }

    /// Routes all of `source`'s unrouted outputs into `destination`'s input
    /// slots, in slot order.
    pub fn send_to(
        &mut self,
        source: &Instruction,
        destination: &Instruction,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(source)?;
        self.ensure_owned(destination)?;
        self.route_all(source, destination)
    }

    /// Fans `source`'s unrouted outputs out across `destinations`, filling
    /// each destination's input slots in order before moving to the next.
    ///
    /// The combined free input arity of the destinations must equal the
    /// number of unrouted outputs.
    pub fn send_to_all(
        &mut self,
        source: &Instruction,
        destinations: &[Instruction],
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(source)?;
        for destination in destinations {
            self.ensure_owned(destination)?;
        }
        let expected = self.unrouted_outputs(source);
        let got: usize = destinations
            .iter()
            .map(|destination| self.free_slots(destination))
            .sum();
        if expected != got {
            return Err(GraphError::FanoutMismatch { expected, got });
        }
        for destination in destinations {
            let count = self.free_slots(destination);
            self.route_n(source, destination, count)?;
        }
        Ok(())
    }

    /// Routes all of `source`'s outputs toward `destination`, walking the
    /// destination's input slots in order. Inverse sugar for [`Self::send_to`].
    pub fn gather_from(
        &mut self,
        destination: &Instruction,
        source: &Instruction,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(destination)?;
        self.ensure_owned(source)?;
        self.route_all(source, destination)
    }

    /// Gathers the outputs of every `sources` node into `destination`, in
    /// source order, walking the destination's input slots in order.
    ///
    /// The combined unrouted output arity of the sources must equal the
    /// destination's free input arity.
    pub fn gather_from_all(
        &mut self,
        destination: &Instruction,
        sources: &[Instruction],
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(destination)?;
        for source in sources {
            self.ensure_owned(source)?;
        }
        let expected = self.free_slots(destination);
        let got: usize = sources.iter().map(|source| self.unrouted_outputs(source)).sum();
        if expected != got {
            return Err(GraphError::FanoutMismatch { expected, got });
        }
        for source in sources {
            self.route_all(source, destination)?;
        }
        Ok(())
    }

    /// Designates the entry node.
    ///
    /// The node must already have a complete output map and no wired
    /// predecessors.
    pub fn mark_as_input(&mut self, instruction: &Instruction) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(instruction)?;
        let node = &self.nodes[instruction.node.index()];
        if node.output_map.len() != node.output_size as usize {
            return Err(GraphError::OutputsIncomplete {
                node: instruction.node,
            });
        }
        if !node.dependents.all_zero() {
            return Err(GraphError::EntryHasDependents {
                node: instruction.node,
            });
        }
        self.entry = Some(instruction.node);
        Ok(())
    }

    /// Designates the exit node.
    ///
    /// The node must have no outgoing routings and every one of its input
    /// slots wired.
    pub fn mark_as_output(&mut self, instruction: &Instruction) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.ensure_owned(instruction)?;
        let node = &self.nodes[instruction.node.index()];
        if !node.output_map.is_empty() {
            return Err(GraphError::ExitHasOutputs {
                node: instruction.node,
            });
        }
        if !node.dependents.all_set() {
            return Err(GraphError::InputsIncomplete {
                node: instruction.node,
            });
        }
        if let Some(previous) = self.exit.replace(instruction.node) {
            self.nodes[previous.index()].is_exit = false;
        }
        self.nodes[instruction.node.index()].is_exit = true;
        Ok(())
    }

    /// Validates the graph structure and freezes the topology.
    ///
    /// Checks that entry and exit are set and distinct, that every node's
    /// wiring is complete (outputs fully routed except at the exit, inputs
    /// fully wired except at the entry), that the graph is acyclic, and that
    /// every node is reachable from the entry. Idempotent: validating an
    /// already-frozen graph is a no-op.
    pub fn validate(&mut self) -> Result<(), GraphError> {
        if self.template.is_some() {
            return Ok(());
        }
        let (Some(entry), Some(exit)) = (self.entry, self.exit) else {
            return Err(GraphError::EndpointsUnset);
        };
        if entry == exit {
            return Err(GraphError::EndpointsEqual { node: entry });
        }

        // Depth-first traversal from the entry with an explicit stack of
        // (node, next successor position). A successor already on the stack
        // is a back edge; any node left unvisited is unreachable.
        let mut visited = vec![false; self.nodes.len()];
        let mut on_stack = vec![false; self.nodes.len()];
        self.check_node(entry, entry, exit)?;
        visited[entry.index()] = true;
        on_stack[entry.index()] = true;
        let mut stack = vec![(entry, 0_usize)];
        while let Some(&mut (node, ref mut cursor)) = stack.last_mut() {
            let successors = &self.nodes[node.index()].successors;
            let Some(&adjacent) = successors.get_index(*cursor) else {
                on_stack[node.index()] = false;
                stack.pop();
                continue;
            };
            *cursor += 1;
            if on_stack[adjacent.index()] {
                return Err(GraphError::Cycle { node: adjacent });
            }
            if !visited[adjacent.index()] {
                self.check_node(adjacent, entry, exit)?;
                visited[adjacent.index()] = true;
                on_stack[adjacent.index()] = true;
                stack.push((adjacent, 0));
            }
        }

        let missing = visited.iter().filter(|&&seen| !seen).count();
        if missing != 0 {
            return Err(GraphError::Unreachable { missing });
        }

        let nodes = self
            .nodes
            .iter()
            .map(|node| NodeDef {
                kind: node.kind,
                function: Arc::clone(&node.function),
                input_size: node.input_size,
                output_size: node.output_size,
                output_map: node.output_map.clone().into_boxed_slice(),
                successors: node.successors.iter().copied().collect(),
                is_exit: node.is_exit,
            })
            .collect();
        self.template = Some(Arc::new(GraphCore { nodes, entry, exit }));
        Ok(())
    }

    /// Whether the graph has been validated (and frozen).
    pub fn is_validated(&self) -> bool {
        self.template.is_some()
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn template(&self) -> Option<&Arc<GraphCore>> {
        self.template.as_ref()
    }

    fn push(
        &mut self,
        kind: NodeKind,
        function: Arc<dyn Function>,
        input_size: u32,
        output_size: u32,
    ) -> Instruction {
        let node = NodeId(dim(self.nodes.len()));
        self.nodes
            .push(BuilderNode::new(kind, Arc::clone(&function), input_size, output_size));
        Instruction {
            node,
            graph: self.id,
            kind,
            function,
            input_size,
            output_size,
        }
    }

    /// Adds one routing entry `source -> (destination, slot)`, maintaining
    /// the successor set and the destination's dependents mask.
    fn wire(
        &mut self,
        source: NodeId,
        destination: &Instruction,
        slot: usize,
    ) -> Result<(), GraphError> {
        self.ensure_owned(destination)?;
        let slot = dim(slot);
        if slot >= destination.input_size {
            return Err(GraphError::SlotOutOfRange {
                node: destination.node,
                slot,
                input_size: destination.input_size,
            });
        }
        if destination.node == source {
            return Err(GraphError::SelfLoop { node: source });
        }
        if !self.nodes[destination.node.index()].dependents.set(slot) {
            return Err(GraphError::SlotAlreadyWired {
                node: destination.node,
                slot,
            });
        }
        let node = &mut self.nodes[source.index()];
        node.successors.insert(destination.node);
        node.output_map.push((destination.node, slot));
        Ok(())
    }

    /// Routes every unrouted output of `source` into `destination`,
    /// consuming the destination's input slots in cursor order.
    fn route_all(
        &mut self,
        source: &Instruction,
        destination: &Instruction,
    ) -> Result<(), GraphError> {
        let count = self.unrouted_outputs(source);
        self.route_n(source, destination, count)
    }

    fn route_n(
        &mut self,
        source: &Instruction,
        destination: &Instruction,
        count: usize,
    ) -> Result<(), GraphError> {
        for _ in 0..count {
            let slot = self.nodes[destination.node.index()].input_cursor;
            self.wire(source.node, destination, slot as usize)?;
            self.nodes[destination.node.index()].input_cursor = slot + 1;
        }
        Ok(())
    }

    fn unrouted_outputs(&self, instruction: &Instruction) -> usize {
        let node = &self.nodes[instruction.node.index()];
        node.output_size as usize - node.output_map.len()
    }

    fn free_slots(&self, instruction: &Instruction) -> usize {
        let node = &self.nodes[instruction.node.index()];
        (node.input_size - node.input_cursor) as usize
    }

    /// Per-node wiring invariants, enforced when the validator first visits
    /// a node.
    fn check_node(&self, node: NodeId, entry: NodeId, exit: NodeId) -> Result<(), GraphError> {
        let data = &self.nodes[node.index()];
        if node == exit {
            if !data.output_map.is_empty() {
                return Err(GraphError::ExitHasOutputs { node });
            }
        } else if data.output_map.len() != data.output_size as usize {
            return Err(GraphError::OutputsIncomplete { node });
        }
        if node == entry {
            if !data.dependents.all_zero() {
                return Err(GraphError::EntryHasDependents { node });
            }
        } else if !data.dependents.all_set() {
            return Err(GraphError::InputsIncomplete { node });
        }
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), GraphError> {
        if self.template.is_some() {
            return Err(GraphError::Frozen);
        }
        Ok(())
    }

    fn ensure_owned(&self, instruction: &Instruction) -> Result<(), GraphError> {
        if instruction.graph != self.id {
            return Err(GraphError::ForeignInstruction);
        }
        Ok(())
    }
}

fn dim(value: usize) -> u32 {
    value.try_into().expect("graph dimension exceeds u32")
}
