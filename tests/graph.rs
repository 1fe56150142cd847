//! Structural tests for graph construction and validation.

use mdf::{FnFunction, Function, Graph, GraphError, Token};

/// Function passing its inputs through; never actually invoked by these
/// tests, only its declared arities matter.
fn passthrough(arity: usize, outputs: usize) -> impl Function + 'static {
    FnFunction::new(arity, outputs, |inputs: &[Token]| Ok(inputs.to_vec()))
}

#[test]
fn zero_port_nodes_are_rejected() {
    let mut graph = Graph::new();
    assert_eq!(graph.merge(0).map(|_| ()), Err(GraphError::ZeroPorts));
    assert_eq!(graph.split(0).map(|_| ()), Err(GraphError::ZeroPorts));
    assert_eq!(
        graph.add(passthrough(1, 0)).map(|_| ()),
        Err(GraphError::ZeroPorts)
    );
}

#[test]
fn single_port_fanout_nodes_are_legal() {
    let mut graph = Graph::new();
    let split = graph.split(1).unwrap();
    let merge = graph.merge(1).unwrap();
    assert_eq!(split.input_size(), 1);
    assert_eq!(split.output_size(), 1);
    assert_eq!(merge.input_size(), 1);
    assert_eq!(merge.output_size(), 1);
}

#[test]
fn self_loops_are_rejected() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    assert!(matches!(
        graph.add_output(&a, &a, 0),
        Err(GraphError::SelfLoop { .. })
    ));
}

#[test]
fn double_wiring_a_slot_is_rejected() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    let c = graph.add(passthrough(1, 1)).unwrap();
    graph.add_output(&a, &b, 0).unwrap();
    assert_eq!(
        graph.add_output(&c, &b, 0),
        Err(GraphError::SlotAlreadyWired { node: b.id(), slot: 0 })
    );
}

#[test]
fn out_of_range_slots_are_rejected() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(2, 1)).unwrap();
    assert!(matches!(
        graph.add_output(&a, &b, 2),
        Err(GraphError::SlotOutOfRange { slot: 2, .. })
    ));
}

#[test]
fn cross_graph_instructions_are_rejected() {
    let mut graph = Graph::new();
    let mut other = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let foreign = other.add(passthrough(1, 1)).unwrap();

    assert!(!a.from_same_graph([&foreign]));
    assert_eq!(
        graph.add_output(&a, &foreign, 0),
        Err(GraphError::ForeignInstruction)
    );
    assert_eq!(
        graph.send_to(&a, &foreign),
        Err(GraphError::ForeignInstruction)
    );
    assert_eq!(
        graph.set_output(&a, vec![(foreign.clone(), 0)]),
        Err(GraphError::ForeignInstruction)
    );
    assert_eq!(
        other.mark_as_input(&a),
        Err(GraphError::ForeignInstruction)
    );
}

#[test]
fn set_output_requires_an_empty_exact_map() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 2)).unwrap();
    let b = graph.add(passthrough(2, 1)).unwrap();

    assert_eq!(
        graph.set_output(&a, vec![(b.clone(), 0)]),
        Err(GraphError::OutputMapLength {
            node: a.id(),
            expected: 2,
            got: 1
        })
    );

    graph
        .set_output(&a, vec![(b.clone(), 0), (b.clone(), 1)])
        .unwrap();
    assert_eq!(
        graph.set_output(&a, vec![(b.clone(), 0), (b.clone(), 1)]),
        Err(GraphError::OutputMapNotEmpty { node: a.id() })
    );
}

#[test]
fn add_output_caps_at_the_output_size() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(2, 1)).unwrap();
    graph.add_output(&a, &b, 0).unwrap();
    assert_eq!(
        graph.add_output(&a, &b, 1),
        Err(GraphError::OutputMapFull { node: a.id() })
    );
}

#[test]
fn entry_requires_a_complete_output_map() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();

    assert_eq!(
        graph.mark_as_input(&a),
        Err(GraphError::OutputsIncomplete { node: a.id() })
    );

    graph.send_to(&a, &b).unwrap();
    graph.mark_as_input(&a).unwrap();
}

#[test]
fn entry_must_have_no_predecessors() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    graph.send_to(&a, &b).unwrap();
    // b is fully routed only after wiring it onward; give it a target.
    let c = graph.add(passthrough(1, 1)).unwrap();
    graph.send_to(&b, &c).unwrap();
    assert_eq!(
        graph.mark_as_input(&b),
        Err(GraphError::EntryHasDependents { node: b.id() })
    );
}

#[test]
fn exit_node_requirements() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();

    // No input token wired yet: not a valid exit.
    assert_eq!(
        graph.mark_as_output(&a),
        Err(GraphError::InputsIncomplete { node: a.id() })
    );

    graph.send_to(&a, &b).unwrap();
    // a now has outgoing routings: still not a valid exit.
    assert_eq!(
        graph.mark_as_output(&a),
        Err(GraphError::ExitHasOutputs { node: a.id() })
    );
    graph.mark_as_output(&b).unwrap();
}

#[test]
fn validation_requires_both_endpoints() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    graph.send_to(&a, &b).unwrap();
    graph.mark_as_input(&a).unwrap();
    assert_eq!(graph.validate(), Err(GraphError::EndpointsUnset));
}

#[test]
fn cycles_are_detected() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.merge(2).unwrap();
    let c = graph.add(passthrough(1, 2)).unwrap();
    let d = graph.add(passthrough(1, 1)).unwrap();

    graph.add_output(&a, &b, 0).unwrap();
    graph.send_to(&b, &c).unwrap();
    // Back edge: c feeds the merge that feeds c.
    graph.add_output(&c, &b, 1).unwrap();
    graph.add_output(&c, &d, 0).unwrap();
    graph.mark_as_input(&a).unwrap();
    graph.mark_as_output(&d).unwrap();

    assert_eq!(graph.validate(), Err(GraphError::Cycle { node: b.id() }));
    assert!(!graph.is_validated());
}

#[test]
fn direct_two_node_cycles_cannot_reach_validation() {
    // Wiring a -> b -> a is accepted edge by edge, but marks the would-be
    // entry as having a predecessor, so the graph is rejected before the
    // cycle check can even run.
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    graph.add_output(&a, &b, 0).unwrap();
    graph.add_output(&b, &a, 0).unwrap();
    assert_eq!(
        graph.mark_as_input(&a),
        Err(GraphError::EntryHasDependents { node: a.id() })
    );
}

#[test]
fn unreachable_nodes_fail_validation() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    graph.send_to(&a, &b).unwrap();
    graph.mark_as_input(&a).unwrap();
    graph.mark_as_output(&b).unwrap();
    let _stranded = graph.add(passthrough(1, 1)).unwrap();

    assert_eq!(graph.validate(), Err(GraphError::Unreachable { missing: 1 }));
}

#[test]
fn incompletely_wired_nodes_fail_validation() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 2)).unwrap();
    let b = graph.merge(2).unwrap();
    let exit = graph.merge(2).unwrap();
    // b's second input slot is never wired; the endpoints themselves are
    // fine, so only the validator can catch the hole.
    graph.add_output(&a, &b, 0).unwrap();
    graph.add_output(&a, &exit, 1).unwrap();
    graph.add_output(&b, &exit, 0).unwrap();
    graph.mark_as_input(&a).unwrap();
    graph.mark_as_output(&exit).unwrap();
    assert_eq!(
        graph.validate(),
        Err(GraphError::InputsIncomplete { node: b.id() })
    );
}

#[test]
fn validation_is_idempotent_and_freezes_the_graph() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    graph.send_to(&a, &b).unwrap();
    graph.mark_as_input(&a).unwrap();
    graph.mark_as_output(&b).unwrap();

    graph.validate().unwrap();
    graph.validate().unwrap();
    assert!(graph.is_validated());

    assert_eq!(
        graph.add(passthrough(1, 1)).map(|_| ()),
        Err(GraphError::Frozen)
    );
    assert_eq!(graph.merge(2).map(|_| ()), Err(GraphError::Frozen));
    assert_eq!(graph.split(2).map(|_| ()), Err(GraphError::Frozen));
    assert_eq!(graph.clone_node(&a).map(|_| ()), Err(GraphError::Frozen));
    assert_eq!(graph.add_output(&a, &b, 0), Err(GraphError::Frozen));
    assert_eq!(graph.send_to(&a, &b), Err(GraphError::Frozen));
    assert_eq!(graph.gather_from(&b, &a), Err(GraphError::Frozen));
    assert_eq!(graph.mark_as_input(&a), Err(GraphError::Frozen));
    assert_eq!(graph.mark_as_output(&b), Err(GraphError::Frozen));
}

#[test]
fn clone_node_copies_the_function_across_graphs() {
    let mut graph = Graph::new();
    let split = graph.split(3).unwrap();

    let mut other = Graph::new();
    let copy = other.clone_node(&split).unwrap();
    assert_eq!(copy.input_size(), 1);
    assert_eq!(copy.output_size(), 3);
    assert!(!copy.from_same_graph([&split]));

    // The copy starts unwired and is usable in its own graph.
    let sink = other.merge(3).unwrap();
    other.send_to(&copy, &sink).unwrap();
    other.mark_as_input(&copy).unwrap();
    other.mark_as_output(&sink).unwrap();
    other.validate().unwrap();
}

#[test]
fn fan_out_checks_the_combined_arity() {
    let mut graph = Graph::new();
    let source = graph.split(3).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    let c = graph.add(passthrough(1, 1)).unwrap();
    assert_eq!(
        graph.send_to_all(&source, &[b.clone(), c.clone()]),
        Err(GraphError::FanoutMismatch {
            expected: 3,
            got: 2
        })
    );

    let d = graph.add(passthrough(1, 1)).unwrap();
    graph
        .send_to_all(&source, &[b.clone(), c.clone(), d.clone()])
        .unwrap();
}

#[test]
fn gather_checks_the_combined_arity() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    let sink = graph.merge(3).unwrap();
    assert_eq!(
        graph.gather_from_all(&sink, &[a.clone(), b.clone()]),
        Err(GraphError::FanoutMismatch {
            expected: 3,
            got: 2
        })
    );

    let c = graph.add(passthrough(1, 1)).unwrap();
    graph
        .gather_from_all(&sink, &[a.clone(), b.clone(), c.clone()])
        .unwrap();
}

#[test]
fn gather_from_walks_the_destination_slots_in_order() {
    let mut graph = Graph::new();
    let a = graph.add(passthrough(1, 1)).unwrap();
    let b = graph.add(passthrough(1, 1)).unwrap();
    let sink = graph.merge(2).unwrap();
    graph.gather_from(&sink, &a).unwrap();
    graph.gather_from(&sink, &b).unwrap();
    // Both slots consumed: a third producer has nowhere to go.
    let c = graph.add(passthrough(1, 1)).unwrap();
    assert!(matches!(
        graph.gather_from(&sink, &c),
        Err(GraphError::SlotOutOfRange { slot: 2, .. })
    ));
}
