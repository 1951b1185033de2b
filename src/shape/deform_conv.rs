//! Shape and cost inference for 2-D deformable convolution.
//!
//! Inputs are (data, offset, mask): the offset field carries two scalar
//! offsets per sampling location, so its channel extent must be exactly
//! twice the mask's. Output geometry follows the padding-mode conventions
//! of ordinary convolution.

use crate::error::{Error, Result};
use crate::model::{DataFormat, OperatorDescriptor, PadMode, TensorDescriptor};
use crate::shape::registry::{ShapeComputer, FLOPS_M};

#[derive(Debug, Clone, Copy)]
pub struct DeformConv2dShape;

impl DeformConv2dShape {
    fn output_extent(
        &self,
        op: &OperatorDescriptor,
        input_extent: i64,
        effective_kernel: i64,
        stride: i64,
        pad_before: Option<i64>,
        pad_after: Option<i64>,
        pad_symmetric: Option<i64>,
    ) -> Result<i64> {
        let params = &op.params;
        match params.pad_mode {
            PadMode::Same => Ok((input_extent as f32 / stride as f32).ceil() as i64),
            PadMode::Valid => {
                Ok(((input_extent - effective_kernel + 1) as f32 / stride as f32).ceil() as i64)
            }
            PadMode::Explicit => {
                if let (Some(before), Some(after)) = (pad_before, pad_after) {
                    let padded = input_extent + before + after;
                    // Clamped to 0 when the padded input is smaller than the
                    // effective kernel.
                    if padded < effective_kernel {
                        Ok(0)
                    } else {
                        Ok((padded - effective_kernel) / stride + 1)
                    }
                } else if let Some(sym) = pad_symmetric {
                    // Symmetric-scalar fallback is intentionally unclamped;
                    // see the note on `pads` vs `pad` in CommonParams.
                    let padded = input_extent + sym * 2;
                    Ok((padded - effective_kernel) / stride + 1)
                } else {
                    Err(Error::InvalidOperator(
                        "explicit padding requires pad amounts or symmetric pad scalars"
                            .to_string(),
                    ))
                }
            }
        }
    }
}

impl ShapeComputer for DeformConv2dShape {
    fn compute_shape(
        &self,
        op: &OperatorDescriptor,
        inputs: &[&TensorDescriptor],
        outputs: &mut [TensorDescriptor],
    ) -> Result<()> {
        if inputs.len() != 3 {
            return Err(Error::ArityMismatch(format!(
                "DeformConv2d expects 3 inputs (data, offset, mask), got {}",
                inputs.len()
            )));
        }
        if outputs.len() != 1 {
            return Err(Error::ArityMismatch(format!(
                "DeformConv2d expects 1 output, got {}",
                outputs.len()
            )));
        }

        op.params.validate()?;

        let data = inputs[0];
        let offset = inputs[1];
        let mask = inputs[2];

        // Deformable convolution is undefined for rank <= 1 inputs.
        if data.rank() <= 1 {
            return Err(Error::ShapeIncompatibility(format!(
                "DeformConv2d data input must have at least 2 dimensions, got {}",
                data.rank()
            )));
        }
        if offset.rank() != 4 || mask.rank() != 4 {
            return Err(Error::ShapeIncompatibility(format!(
                "DeformConv2d offset and mask must be 4-D, got ranks {} and {}",
                offset.rank(),
                mask.rank()
            )));
        }
        if data.shape[0] != offset.shape[0] || data.shape[0] != mask.shape[0] {
            return Err(Error::ShapeIncompatibility(format!(
                "batch extents disagree: data {}, offset {}, mask {}",
                data.shape[0], offset.shape[0], mask.shape[0]
            )));
        }
        // Two scalar offsets per sampling location.
        if offset.shape[1] != 2 * mask.shape[1] {
            return Err(Error::ShapeIncompatibility(format!(
                "offset channel extent {} must be twice the mask channel extent {}",
                offset.shape[1], mask.shape[1]
            )));
        }
        if offset.shape[2] != mask.shape[2] || offset.shape[3] != mask.shape[3] {
            return Err(Error::ShapeIncompatibility(format!(
                "offset spatial extents {:?} disagree with mask {:?}",
                &offset.shape[2..4],
                &mask.shape[2..4]
            )));
        }

        let params = &op.params;
        let output_count = params.output_count;

        // A channel extent the caller already assigned to the output is an
        // expectation to check against, never to overwrite.
        let channel_index = match data.format {
            DataFormat::ChannelLast => 3,
            DataFormat::ChannelFirst | DataFormat::Other => 1,
        };
        if let Some(&preset) = outputs[0].shape.get(channel_index) {
            if preset != 0 && preset != output_count {
                return Err(Error::ShapeIncompatibility(format!(
                    "output channel extent already set to {}, operator declares {}",
                    preset, output_count
                )));
            }
        }

        // Effective kernel footprint accounts for dilation.
        let effective_kw = params.dilate_x * (params.kernel_x - 1) + 1;
        let effective_kh = params.dilate_y * (params.kernel_y - 1) + 1;

        let (pad_top, pad_left, pad_bottom, pad_right) = match &params.pads {
            Some(pads) if pads.len() >= 4 => {
                (Some(pads[0]), Some(pads[1]), Some(pads[2]), Some(pads[3]))
            }
            Some(pads) => {
                return Err(Error::InvalidOperator(format!(
                    "explicit pad list must have 4 entries, got {}",
                    pads.len()
                )))
            }
            None => (None, None, None, None),
        };
        let (pad_x, pad_y) = match params.pad {
            Some((x, y)) => (Some(x), Some(y)),
            None => (None, None),
        };

        let output_width = self.output_extent(
            op,
            data.width(),
            effective_kw,
            params.stride_x,
            pad_left,
            pad_right,
            pad_x,
        )?;
        let output_height = self.output_extent(
            op,
            data.height(),
            effective_kh,
            params.stride_y,
            pad_top,
            pad_bottom,
            pad_y,
        )?;

        // Output rank, batch extent and layout tag come from the data
        // input; channel and spatial positions depend on its layout.
        let mut shape = data.shape.clone();
        match data.format {
            DataFormat::ChannelLast if shape.len() >= 4 => {
                shape[3] = output_count;
                shape[1] = output_height;
                shape[2] = output_width;
            }
            _ if shape.len() >= 4 => {
                shape[1] = output_count;
                shape[2] = output_height;
                shape[3] = output_width;
            }
            _ => {
                shape[1] = output_count;
            }
        }

        outputs[0] = TensorDescriptor::new(shape, data.data_type, data.format);
        Ok(())
    }

    fn compute_flops(
        &self,
        op: &OperatorDescriptor,
        inputs: &[&TensorDescriptor],
        outputs: &[&TensorDescriptor],
    ) -> f32 {
        let params = &op.params;
        let kw = params.kernel_x;
        let kh = params.kernel_y;
        let in_channels = inputs[0].channel();
        let out_channels = outputs[0].channel();
        let output_size = outputs[0].width() * outputs[0].height() * outputs[0].batch();

        // Self-consistency correction: a declared input count that
        // disagrees with the observed channel extent implies the declared
        // value is per-group.
        let mut groups = params.groups;
        if params.input_count != in_channels && params.input_count > 0 {
            groups = in_channels / params.input_count;
        }
        let groups = groups.max(1);

        (output_size * params.deform_groups * kw * kh * (in_channels * out_channels / groups))
            as f32
            / FLOPS_M
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommonParams, DataType, OpType};

    fn descriptor(pad_mode: PadMode, pads: Option<Vec<i64>>, pad: Option<(i64, i64)>) -> OperatorDescriptor {
        let mut op = OperatorDescriptor::new("dcn", OpType::DeformConv2d);
        op.params = CommonParams {
            kernel_x: 3,
            kernel_y: 3,
            pad_mode,
            pads,
            pad,
            input_count: 4,
            output_count: 8,
            ..CommonParams::default()
        };
        op.inputs = vec!["data".into(), "offset".into(), "mask".into()];
        op.outputs = vec!["out".into()];
        op
    }

    fn nchw(shape: Vec<i64>) -> TensorDescriptor {
        TensorDescriptor::new(shape, DataType::Float, DataFormat::ChannelFirst)
    }

    #[test]
    fn same_mode_ignores_kernel_size() {
        let mut op = descriptor(PadMode::Same, None, None);
        op.params.stride_x = 2;
        op.params.stride_y = 2;
        let data = nchw(vec![1, 4, 7, 7]);
        let offset = nchw(vec![1, 18, 4, 4]);
        let mask = nchw(vec![1, 9, 4, 4]);
        let mut outputs = vec![nchw(vec![])];
        op.params.validate().unwrap();
        DeformConv2dShape
            .compute_shape(&op, &[&data, &offset, &mask], &mut outputs)
            .unwrap();
        assert_eq!(outputs[0].shape, vec![1, 8, 4, 4]);
    }

    #[test]
    fn explicit_four_pad_list_clamps_at_zero() {
        let op = descriptor(PadMode::Explicit, Some(vec![0, 0, 0, 0]), None);
        let data = nchw(vec![1, 4, 1, 1]);
        let offset = nchw(vec![1, 18, 1, 1]);
        let mask = nchw(vec![1, 9, 1, 1]);
        let mut outputs = vec![nchw(vec![])];
        DeformConv2dShape
            .compute_shape(&op, &[&data, &offset, &mask], &mut outputs)
            .unwrap();
        assert_eq!(outputs[0].shape, vec![1, 8, 0, 0]);
    }

    #[test]
    fn flops_applies_group_correction() {
        let mut op = descriptor(PadMode::Explicit, Some(vec![1, 1, 1, 1]), None);
        // Declared per-group input count of 4 against 8 observed channels
        // implies 2 groups.
        op.params.input_count = 4;
        let data = nchw(vec![1, 8, 16, 16]);
        let out = nchw(vec![1, 8, 16, 16]);
        let flops = DeformConv2dShape.compute_flops(&op, &[&data], &[&out]);
        let expected = (16 * 16 * 1 * 1 * 3 * 3 * (8 * 8 / 2)) as f32 / FLOPS_M;
        assert_eq!(flops, expected);
    }
}
