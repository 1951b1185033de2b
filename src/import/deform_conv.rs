//! Import of foreign `DeformConv2D` nodes.
//!
//! The foreign node carries 4 or 5 ordered inputs (data, offset, mask,
//! weight and optionally bias) plus geometry attributes. The transform
//! produces one canonical descriptor, folding the weight and bias into it
//! when the materialization policy allows, and otherwise keeping them as
//! graph edges.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::import::attributes::Attributes;
use crate::import::foreign::ForeignNode;
use crate::import::registry::{ImportContext, ImportTransform};
use crate::model::{CommonParams, OperatorDescriptor, OpType, PadMode};

/// Set once the shared-weight warning has been emitted, process-wide.
static SHARED_WEIGHT_WARNED: AtomicBool = AtomicBool::new(false);

/// Returns true exactly once per process; callers emit the warning on true.
fn note_shared_weight() -> bool {
    SHARED_WEIGHT_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
}

#[derive(Debug, Clone, Copy)]
pub struct DeformConv2dImport;

impl ImportTransform for DeformConv2dImport {
    fn transform(
        &self,
        node: &ForeignNode,
        ctx: &ImportContext<'_>,
    ) -> Result<Vec<OperatorDescriptor>> {
        if node.inputs.len() != 4 && node.inputs.len() != 5 {
            return Err(Error::ArityMismatch(format!(
                "DeformConv2D expects 4 or 5 inputs (data, offset, mask, weight[, bias]), got {}",
                node.inputs.len()
            )));
        }
        let data = &node.inputs[0];
        let offset = &node.inputs[1];
        let mask = &node.inputs[2];
        let weight = &node.inputs[3];
        let bias = node.inputs.get(4);

        let weight_info = ctx.constants.descriptor(weight).ok_or_else(|| {
            Error::UnsupportedFeature(format!(
                "weight shape of '{}' must be statically known at import time",
                node.name
            ))
        })?;
        if weight_info.rank() < 3 {
            return Err(Error::ShapeIncompatibility(format!(
                "weight of '{}' must be at least 3-D, got rank {}",
                node.name,
                weight_info.rank()
            )));
        }
        let out_channels = weight_info.shape[0];
        let in_per_group = weight_info.shape[1];
        let kernel_h = weight_info.shape[2];
        // Degenerate 1-D kernels import with a unit kernel width.
        let kernel_w = if weight_info.rank() >= 4 {
            weight_info.shape[3]
        } else {
            1
        };

        let attrs = Attributes::new(node);
        let (dilation_h, dilation_w) = attrs.int_pair("dilation", (1, 1))?;
        let (stride_h, stride_w) = attrs.int_pair("stride", (1, 1))?;
        let (pad_y, pad_x) = attrs.int_pair("padding", (1, 1))?;
        let groups = attrs.int("groups", 1)?;
        let deform_groups = attrs.int("deform_groups", 1)?;

        let params = CommonParams {
            kernel_x: kernel_w,
            kernel_y: kernel_h,
            stride_x: stride_w,
            stride_y: stride_h,
            dilate_x: dilation_w,
            dilate_y: dilation_h,
            pad_mode: PadMode::Explicit,
            pads: Some(vec![pad_y, pad_x, pad_y, pad_x]),
            pad: Some((pad_x, pad_y)),
            groups,
            deform_groups,
            input_count: in_per_group * groups,
            output_count: out_channels,
            relu: false,
            relu6: false,
        };

        let fold_limit = ctx.options.optimize.fold_limit();
        let link_count = ctx.constants.link_count(weight);
        let weight_values = if link_count <= fold_limit {
            ctx.constants.values(weight)
        } else {
            None
        };

        let mut op = OperatorDescriptor::new(node.name.clone(), OpType::DeformConv2d);
        op.params = params;
        op.outputs = node.outputs.clone();

        if let Some(values) = weight_values {
            if link_count > 1 && note_shared_weight() {
                log::warn!(
                    "deformable convolution folds a shared weight; the model size may grow"
                );
            }

            let weight_size = (out_channels * in_per_group * kernel_h * kernel_w) as usize;
            if values.len() != weight_size {
                return Err(Error::ShapeIncompatibility(format!(
                    "weight of '{}' has {} values, its shape implies {}",
                    node.name,
                    values.len(),
                    weight_size
                )));
            }
            // Deep copy: the descriptor owns its blobs outright, the
            // foreign storage may be torn down after import.
            op.weight = Some(values.iter().copied().collect());
            op.bias = Some(match bias {
                Some(bias_edge) => {
                    let bias_values = ctx.constants.values(bias_edge).ok_or_else(|| {
                        Error::UnsupportedFeature(format!(
                            "bias of '{}' must be a compile-time constant",
                            node.name
                        ))
                    })?;
                    if bias_values.len() != out_channels as usize {
                        return Err(Error::UnsupportedFeature(format!(
                            "bias of '{}' has {} values but the operator has {} output \
                             channels; bias broadcast is not supported",
                            node.name,
                            bias_values.len(),
                            out_channels
                        )));
                    }
                    bias_values.iter().copied().collect()
                }
                None => vec![0.0; out_channels as usize],
            });
            op.inputs = vec![data.clone(), offset.clone(), mask.clone()];
        } else {
            // Weight stays a runtime edge; no zero bias is synthesized on
            // this path.
            op.inputs = vec![data.clone(), offset.clone(), mask.clone(), weight.clone()];
            if let Some(bias_edge) = bias {
                op.inputs.push(bias_edge.clone());
            }
        }

        Ok(vec![op])
    }
}
