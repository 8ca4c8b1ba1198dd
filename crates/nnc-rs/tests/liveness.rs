use nnc_rs::analysis::liveness::LivenessAnalysis;
use nnc_rs::ir::graph::Graph;
use nnc_rs::ir::spec::{DType, NodeAttrs, OpKind, Shape, TensorSpec};

fn f32_spec(dims: &[u64]) -> TensorSpec {
    TensorSpec::new(DType::F32, Shape::of(dims))
}

#[test]
fn chain_intervals_follow_the_schedule() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[4]));
    let relu0 = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[x],
        vec![("a".into(), f32_spec(&[4]))],
    );
    let a = graph.node(relu0).outputs[0];
    let relu1 = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[a],
        vec![("y".into(), f32_spec(&[4]))],
    );
    let y = graph.node(relu1).outputs[0];
    graph.mark_output(y);
    graph.validate().expect("schedule is valid");

    let liveness = LivenessAnalysis::run(&graph);
    let spans: Vec<_> = liveness
        .intervals()
        .iter()
        .map(|li| (graph.value(li.value).name.clone(), li.start, li.end))
        .collect();

    // x defined at 0, read by node 0; a defined by node 0, read by node 1;
    // y defined by node 1 and kept live through the end of the schedule.
    assert_eq!(
        spans,
        vec![
            ("x".to_string(), 0, 2),
            ("a".to_string(), 1, 3),
            ("y".to_string(), 2, 3),
        ]
    );
}

#[test]
fn initializer_values_are_live_from_the_start() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[1, 3, 8, 8]));
    let undef = graph.add_node(
        OpKind::Undefined,
        NodeAttrs::None,
        &[],
        vec![("w".into(), f32_spec(&[4, 3, 3, 3]))],
    );
    let w = graph.node(undef).outputs[0];
    let conv = graph.add_node(
        OpKind::Conv,
        NodeAttrs::Conv(nnc_rs::ir::spec::ConvAttrs {
            kernel_shape: [3, 3].into_iter().collect(),
            strides: [1, 1].into_iter().collect(),
            pads: [1, 1, 1, 1].into_iter().collect(),
        }),
        &[x, w],
        vec![("y".into(), f32_spec(&[1, 4, 8, 8]))],
    );
    let y = graph.node(conv).outputs[0];
    graph.mark_output(y);

    let liveness = LivenessAnalysis::run(&graph);
    let w_interval = liveness.interval_of(w).expect("weight has an interval");
    assert_eq!(w_interval.start, 0);
    // the conv at schedule index 1 reads it
    assert_eq!(w_interval.end, 3);
}

#[test]
fn unused_values_get_a_unit_interval() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[4]));
    let relu = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[x],
        vec![("dead".into(), f32_spec(&[4]))],
    );
    let dead = graph.node(relu).outputs[0];

    let liveness = LivenessAnalysis::run(&graph);
    let interval = liveness.interval_of(dead).expect("output has an interval");
    assert_eq!((interval.start, interval.end), (1, 2));
}

#[test]
fn interval_order_is_deterministic() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[4]));
    let relu = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[x],
        vec![("y".into(), f32_spec(&[4]))],
    );
    graph.mark_output(graph.node(relu).outputs[0]);

    let first = LivenessAnalysis::run(&graph);
    let second = LivenessAnalysis::run(&graph);
    assert_eq!(first.intervals(), second.intervals());
}
