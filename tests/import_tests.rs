use ndarray::{ArrayD, IxDyn};

use graph_import::import::{DeformConv2dImport, ImportContext};
use graph_import::{
    AttributeValue, DataFormat, DataType, Error, ForeignNode, GraphConstants, ImportOptions,
    ImportRegistry, ImportTransform, OpType, OptimizePreference, ShapeRegistry, TensorDescriptor,
};

fn nchw(shape: &[i64]) -> TensorDescriptor {
    TensorDescriptor::new(shape.to_vec(), DataType::Float, DataFormat::ChannelFirst)
}

// Foreign DeformConv2D node with inputs (data, offset, mask, weight[, bias]).
fn deform_node(with_bias: bool) -> ForeignNode {
    let mut node = ForeignNode::new("dcn0", "DeformConv2D");
    node.inputs = vec![
        "data".to_string(),
        "offset".to_string(),
        "mask".to_string(),
        "weight".to_string(),
    ];
    if with_bias {
        node.inputs.push("bias".to_string());
    }
    node.outputs = vec!["dcn0_out".to_string()];
    node
}

// Constants for an 8-out, 4-in, 3x3 weight shared by `weight_links` edges.
fn constants(weight_links: usize) -> GraphConstants {
    let mut constants = GraphConstants::new();
    constants.insert_descriptor("data", nchw(&[1, 4, 16, 16]));
    constants.insert_descriptor("offset", nchw(&[1, 18, 16, 16]));
    constants.insert_descriptor("mask", nchw(&[1, 9, 16, 16]));
    constants.insert_constant(
        "weight",
        nchw(&[8, 4, 3, 3]),
        ArrayD::from_elem(IxDyn(&[8, 4, 3, 3]), 0.5),
        weight_links,
    );
    constants
}

fn options(optimize: OptimizePreference) -> ImportOptions {
    ImportOptions { optimize }
}

fn transform(
    node: &ForeignNode,
    constants: &GraphConstants,
    optimize: OptimizePreference,
) -> graph_import::Result<Vec<graph_import::OperatorDescriptor>> {
    let options = options(optimize);
    let ctx = ImportContext {
        constants,
        options: &options,
    };
    DeformConv2dImport.transform(node, &ctx)
}

#[test]
fn uniquely_consumed_weight_is_folded_under_smallest() {
    let ops = transform(&deform_node(false), &constants(1), OptimizePreference::Smallest).unwrap();
    assert_eq!(ops.len(), 1);
    let op = &ops[0];
    assert_eq!(op.op_type, OpType::DeformConv2d);
    assert_eq!(op.name, "dcn0");
    assert_eq!(op.inputs, vec!["data", "offset", "mask"]);
    let weight = op.weight.as_ref().unwrap();
    assert_eq!(weight.len(), 8 * 4 * 3 * 3);
    assert!(weight.iter().all(|&v| v == 0.5));
    // Absent bias is synthesized as zeros on the folded path.
    let bias = op.bias.as_ref().unwrap();
    assert_eq!(bias.len(), 8);
    assert!(bias.iter().all(|&v| v == 0.0));
}

#[test]
fn shared_weight_passes_through_under_smallest() {
    let ops = transform(&deform_node(false), &constants(2), OptimizePreference::Smallest).unwrap();
    let op = &ops[0];
    assert_eq!(op.inputs, vec!["data", "offset", "mask", "weight"]);
    assert!(op.weight.is_none());
    // No zero bias is synthesized on the pass-through path.
    assert!(op.bias.is_none());
}

#[test]
fn balanced_folds_up_to_four_consumers() {
    let folded = transform(&deform_node(false), &constants(4), OptimizePreference::Balanced).unwrap();
    assert!(folded[0].weight.is_some());

    let kept = transform(&deform_node(false), &constants(5), OptimizePreference::Balanced).unwrap();
    assert!(kept[0].weight.is_none());
    assert_eq!(kept[0].inputs.len(), 4);
}

#[test]
fn fastest_folds_widely_shared_weights() {
    let ops = transform(&deform_node(false), &constants(50), OptimizePreference::Fastest).unwrap();
    assert!(ops[0].weight.is_some());
}

#[test]
fn constant_bias_of_matching_length_is_folded() {
    let mut constants = constants(1);
    constants.insert_constant(
        "bias",
        nchw(&[8]),
        ArrayD::from_elem(IxDyn(&[8]), 1.25),
        1,
    );
    let ops = transform(&deform_node(true), &constants, OptimizePreference::Smallest).unwrap();
    let bias = ops[0].bias.as_ref().unwrap();
    assert_eq!(bias.len(), 8);
    assert!(bias.iter().all(|&v| v == 1.25));
}

#[test]
fn bias_of_wrong_length_is_invalid_never_truncated() {
    let mut constants = constants(1);
    constants.insert_constant("bias", nchw(&[4]), ArrayD::from_elem(IxDyn(&[4]), 1.0), 1);
    let err =
        transform(&deform_node(true), &constants, OptimizePreference::Smallest).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature(_)));
}

#[test]
fn non_constant_bias_is_unsupported() {
    let mut constants = constants(1);
    constants.insert_descriptor("bias", nchw(&[8]));
    let err =
        transform(&deform_node(true), &constants, OptimizePreference::Smallest).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature(_)));
}

#[test]
fn weight_shape_must_be_statically_known() {
    let mut node = deform_node(false);
    node.inputs[3] = "unknown_weight".to_string();
    let err = transform(&node, &constants(1), OptimizePreference::Smallest).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature(_)));
}

#[test]
fn too_few_inputs_is_an_arity_mismatch() {
    let mut node = deform_node(false);
    node.inputs.truncate(3);
    let err = transform(&node, &constants(1), OptimizePreference::Smallest).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch(_)));
}

#[test]
fn geometry_attributes_decode_with_defaults_and_shorthand() {
    let mut node = deform_node(false);
    // Single-element shorthand: axis 0 takes the value, axis 1 keeps its
    // schema default of 1.
    node.attributes
        .insert("stride".to_string(), AttributeValue::Ints(vec![2]));
    node.attributes
        .insert("dilation".to_string(), AttributeValue::Ints(vec![2, 3]));
    node.attributes
        .insert("groups".to_string(), AttributeValue::Int(2));
    let ops = transform(&node, &constants(1), OptimizePreference::Smallest).unwrap();
    let params = &ops[0].params;
    assert_eq!(params.stride_y, 2);
    assert_eq!(params.stride_x, 1);
    assert_eq!(params.dilate_y, 2);
    assert_eq!(params.dilate_x, 3);
    assert_eq!(params.groups, 2);
    assert_eq!(params.deform_groups, 1);
    // Padding default is symmetric (1, 1), stored per side.
    assert_eq!(params.pads.as_deref(), Some(&[1, 1, 1, 1][..]));
    // input_count restores the full channel count from the per-group
    // weight extent.
    assert_eq!(params.input_count, 8);
    assert_eq!(params.output_count, 8);
}

#[test]
fn wrong_attribute_kind_is_a_schema_violation() {
    let mut node = deform_node(false);
    node.attributes
        .insert("padding".to_string(), AttributeValue::String("same".into()));
    let err = transform(&node, &constants(1), OptimizePreference::Smallest).unwrap_err();
    assert!(matches!(err, Error::SchemaViolation(_)));
}

#[test]
fn rank_three_weight_imports_with_unit_kernel_width() {
    let mut constants = GraphConstants::new();
    constants.insert_constant(
        "weight",
        nchw(&[8, 4, 3]),
        ArrayD::from_elem(IxDyn(&[8, 4, 3]), 0.5),
        1,
    );
    let ops = transform(&deform_node(false), &constants, OptimizePreference::Smallest).unwrap();
    assert_eq!(ops[0].params.kernel_x, 1);
    assert_eq!(ops[0].params.kernel_y, 3);
}

#[test]
fn unknown_foreign_operator_fails_the_import() {
    let registry = ImportRegistry::with_builtin_transforms();
    let node = ForeignNode::new("mystery", "FancyOp");
    let err = registry
        .import_graph(&[node], &constants(1), &options(OptimizePreference::Balanced))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownOperator(_)));
}

#[test]
fn failing_node_is_skipped_and_import_continues() {
    let registry = ImportRegistry::with_builtin_transforms();
    let mut bad = deform_node(true);
    bad.name = "bad".to_string();
    let mut constants = constants(1);
    constants.insert_constant("bias", nchw(&[4]), ArrayD::from_elem(IxDyn(&[4]), 1.0), 1);
    let good = deform_node(false);

    let graph = registry
        .import_graph(
            &[bad, good],
            &constants,
            &options(OptimizePreference::Smallest),
        )
        .unwrap();
    // One descriptor survives; the bias input of the bad node never gets
    // truncated into it.
    assert_eq!(graph.operators.len(), 1);
    assert_eq!(graph.operators[0].name, "dcn0");
}

#[test]
fn import_then_propagate_round_trip() {
    let registry = ImportRegistry::with_builtin_transforms();
    let graph_constants = constants(1);
    let mut graph = registry
        .import_graph(
            &[deform_node(false)],
            &graph_constants,
            &options(OptimizePreference::Smallest),
        )
        .unwrap();

    // Runtime-fed edges became graph inputs; the folded weight did not.
    assert!(graph.inputs.contains(&"data".to_string()));
    assert!(!graph.inputs.contains(&"weight".to_string()));

    graph.validate().unwrap();
    let shapes = ShapeRegistry::with_builtin_computers();
    graph.propagate_shapes(&shapes).unwrap();

    // Default padding (1,1) with a 3x3 kernel and stride 1 preserves the
    // spatial extents.
    let out = &graph.tensors["dcn0_out"];
    assert_eq!(out.shape, vec![1, 8, 16, 16]);
    assert_eq!(out.format, DataFormat::ChannelFirst);

    assert!(graph.estimated_flops(&shapes).unwrap() > 0.0);
}

#[test]
fn import_options_deserialize_from_config() {
    let options: ImportOptions = serde_json::from_str(r#"{"optimize":"fastest"}"#).unwrap();
    assert_eq!(options.optimize, OptimizePreference::Fastest);

    let defaulted: ImportOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(defaulted.optimize, OptimizePreference::Balanced);
}
