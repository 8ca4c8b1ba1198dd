use nnc_rs::ir::graph::{Graph, NodeId, ValueId};
use nnc_rs::ir::spec::{ConvAttrs, DType, GemmAttrs, NodeAttrs, OpKind, PoolAttrs, Shape, TensorSpec};
use nnc_rs::memory::{try_split_graph, SplitError, SplitPlanner};

fn f32_spec(dims: &[u64]) -> TensorSpec {
    TensorSpec::new(DType::F32, Shape::of(dims))
}

fn initializer(graph: &mut Graph, name: &str, dims: &[u64]) -> ValueId {
    let node = graph.add_node(
        OpKind::Undefined,
        NodeAttrs::None,
        &[],
        vec![(name.to_string(), f32_spec(dims))],
    );
    graph.node(node).outputs[0]
}

fn output_of(graph: &Graph, node: NodeId) -> ValueId {
    graph.node(node).outputs[0]
}

fn conv_graph() -> (Graph, NodeId) {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[1, 3, 32, 32]));
    let w = initializer(&mut graph, "w", &[16, 3, 3, 3]);
    let b = initializer(&mut graph, "b", &[16]);
    let conv = graph.add_node(
        OpKind::Conv,
        NodeAttrs::Conv(ConvAttrs {
            kernel_shape: [3, 3].into_iter().collect(),
            strides: [1, 1].into_iter().collect(),
            pads: [1, 1, 1, 1].into_iter().collect(),
        }),
        &[x, w, b],
        vec![("y".into(), f32_spec(&[1, 16, 32, 32]))],
    );
    graph.mark_output(output_of(&graph, conv));
    (graph, conv)
}

#[test]
fn conv_tile_shapes() {
    let (mut graph, conv) = conv_graph();
    let mut planner = SplitPlanner::build(&graph).expect("rules exist for all nodes");
    let applied = planner
        .split_node_by_size(&mut graph, conv, &[1, 16, 16, 16])
        .expect("conv descriptor exists");
    assert!(applied);

    let descriptor = planner.descriptor(conv).expect("conv descriptor");
    assert_eq!(descriptor.new_out_dims(), &[1, 16, 16, 16]);
    assert_eq!(descriptor.input_tile(0).as_slice(), &[1, 3, 16, 16]);
    assert_eq!(descriptor.input_tile(1).as_slice(), &[16, 3, 3, 3]);
    assert_eq!(descriptor.input_tile(2).as_slice(), &[16]);
    // the tile is written back into the output value
    assert_eq!(
        graph.value(output_of(&graph, conv)).spec.shape.dims(),
        &[1, 16, 16, 16]
    );
}

#[test]
fn gemm_tile_shapes_with_trans_b() {
    let mut graph = Graph::new();
    let a = graph.add_input("a", f32_spec(&[8, 4]));
    let b = initializer(&mut graph, "b", &[6, 4]);
    let c = initializer(&mut graph, "c", &[8, 6]);
    let gemm = graph.add_node(
        OpKind::Gemm,
        NodeAttrs::Gemm(GemmAttrs {
            trans_a: false,
            trans_b: true,
            broadcast: false,
        }),
        &[a, b, c],
        vec![("y".into(), f32_spec(&[8, 6]))],
    );
    graph.mark_output(output_of(&graph, gemm));

    let mut planner = SplitPlanner::build(&graph).expect("rules exist for all nodes");
    planner
        .split_node_by_size(&mut graph, gemm, &[4, 3])
        .expect("gemm descriptor exists");

    let descriptor = planner.descriptor(gemm).expect("gemm descriptor");
    assert_eq!(descriptor.input_tile(0).as_slice(), &[4, 4]);
    assert_eq!(descriptor.input_tile(1).as_slice(), &[3, 4]);
    assert_eq!(descriptor.input_tile(2).as_slice(), &[8, 6]);
}

#[test]
fn max_pool_tile_keeps_the_tiled_channel() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[1, 8, 16, 16]));
    let pool = graph.add_node(
        OpKind::MaxPool,
        NodeAttrs::Pool(PoolAttrs {
            kernel_shape: [2, 2].into_iter().collect(),
            strides: [2, 2].into_iter().collect(),
            pads: [0, 0, 0, 0].into_iter().collect(),
        }),
        &[x],
        vec![("y".into(), f32_spec(&[1, 8, 8, 8]))],
    );
    graph.mark_output(output_of(&graph, pool));

    let mut planner = SplitPlanner::build(&graph).expect("rules exist for all nodes");
    planner
        .split_node_by_size(&mut graph, pool, &[1, 4, 4, 8])
        .expect("pool descriptor exists");

    let descriptor = planner.descriptor(pool).expect("pool descriptor");
    // (4 - 1) * 2 - 0 - 0 + 2 = 8 along the tiled spatial axis
    assert_eq!(descriptor.input_tile(0).as_slice(), &[1, 4, 8, 16]);
}

#[test]
fn factor_split_propagates_through_identity_chain() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[4, 8]));
    let relu0 = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[x],
        vec![("t0".into(), f32_spec(&[4, 8]))],
    );
    let t0 = output_of(&graph, relu0);
    let relu1 = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[t0],
        vec![("t1".into(), f32_spec(&[4, 8]))],
    );
    let t1 = output_of(&graph, relu1);
    graph.mark_output(t1);

    let status = try_split_graph(&mut graph, 0, 2).expect("all kinds have rules");
    assert!(status);
    assert_eq!(graph.value(t1).spec.shape.dims(), &[2, 8]);
    assert_eq!(graph.value(t0).spec.shape.dims(), &[2, 8]);
    // graph inputs are not produced by a node and stay untouched
    assert_eq!(graph.value(x).spec.shape.dims(), &[4, 8]);
}

#[test]
fn rank_change_rejects_and_leaves_prior_tiles() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[2, 8]));
    let relu0 = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[x],
        vec![("t0".into(), f32_spec(&[2, 8]))],
    );
    let t0 = output_of(&graph, relu0);
    let reshape = graph.add_node(
        OpKind::Reshape,
        NodeAttrs::None,
        &[t0],
        vec![("flat".into(), f32_spec(&[16]))],
    );
    let flat = output_of(&graph, reshape);
    let relu1 = graph.add_node(
        OpKind::Relu,
        NodeAttrs::None,
        &[flat],
        vec![("y".into(), f32_spec(&[16]))],
    );
    let y = output_of(&graph, relu1);
    graph.mark_output(y);

    let status = try_split_graph(&mut graph, 0, 2).expect("all kinds have rules");
    assert!(!status, "rank-1 tile cannot apply to the rank-2 producer");
    // best-effort: the downstream tiles stay applied
    assert_eq!(graph.value(y).spec.shape.dims(), &[8]);
    assert_eq!(graph.value(flat).spec.shape.dims(), &[8]);
    assert_eq!(graph.value(t0).spec.shape.dims(), &[2, 8]);
}

#[test]
fn unsupported_kind_refuses_to_build() {
    let mut graph = Graph::new();
    let x = graph.add_input("x", f32_spec(&[4, 4]));
    let flatten = graph.add_node(
        OpKind::Flatten,
        NodeAttrs::None,
        &[x],
        vec![("y".into(), f32_spec(&[16]))],
    );
    graph.mark_output(output_of(&graph, flatten));

    let err = SplitPlanner::build(&graph).expect_err("flatten has no tiling rule");
    assert_eq!(err, SplitError::UnsupportedKind(OpKind::Flatten));
}

#[test]
fn oversized_tile_is_rejected() {
    let (mut graph, conv) = conv_graph();
    let mut planner = SplitPlanner::build(&graph).expect("rules exist for all nodes");
    let applied = planner
        .split_node_by_size(&mut graph, conv, &[2, 16, 32, 32])
        .expect("conv descriptor exists");
    assert!(!applied, "tiles may not exceed the original output");
}
