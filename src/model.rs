use strum_macros::Display;

use crate::error::{Error, Result};

/// Element types carried by tensor descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Float,
    Float16,
    Int8,
    Int32,
    Int64,
    Uint8,
    Bool,
}

impl DataType {
    /// Check if the data type is a floating point type
    pub fn is_floating_point(&self) -> bool {
        matches!(self, DataType::Float | DataType::Float16)
    }

    /// Check if the data type is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int32 | DataType::Int64 | DataType::Uint8
        )
    }

    /// Size of one element in bytes
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Float | DataType::Int32 => 4,
            DataType::Float16 => 2,
            DataType::Int64 => 8,
            DataType::Int8 | DataType::Uint8 | DataType::Bool => 1,
        }
    }
}

/// Memory layout tag for tensors.
///
/// Decides which dimension index holds the channel axis: `ChannelFirst`
/// is NCHW, `ChannelLast` is NHWC. `Other` covers layouts where the
/// channel position follows the channel-first convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DataFormat {
    ChannelFirst,
    ChannelLast,
    Other,
}

/// Shape, element type and layout of one tensor.
///
/// This is the unit consumed and produced by shape inference. Dimensions
/// of 0 are permitted before inference runs; the dimension count is fixed
/// once inference succeeds for the producing node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    pub shape: Vec<i64>,
    pub data_type: DataType,
    pub format: DataFormat,
}

impl TensorDescriptor {
    pub fn new(shape: Vec<i64>, data_type: DataType, format: DataFormat) -> Self {
        Self {
            shape,
            data_type,
            format,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn elem_count(&self) -> i64 {
        self.shape.iter().product()
    }

    pub fn batch(&self) -> i64 {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Index of the channel dimension for a 4-D tensor under this layout.
    fn channel_index(&self) -> usize {
        match self.format {
            DataFormat::ChannelLast => 3,
            DataFormat::ChannelFirst | DataFormat::Other => 1,
        }
    }

    fn height_index(&self) -> usize {
        match self.format {
            DataFormat::ChannelLast => 1,
            DataFormat::ChannelFirst | DataFormat::Other => 2,
        }
    }

    fn width_index(&self) -> usize {
        match self.format {
            DataFormat::ChannelLast => 2,
            DataFormat::ChannelFirst | DataFormat::Other => 3,
        }
    }

    pub fn channel(&self) -> i64 {
        self.shape.get(self.channel_index()).copied().unwrap_or(0)
    }

    pub fn height(&self) -> i64 {
        self.shape.get(self.height_index()).copied().unwrap_or(0)
    }

    pub fn width(&self) -> i64 {
        self.shape.get(self.width_index()).copied().unwrap_or(0)
    }
}

/// Symbolic padding conventions.
///
/// `Same` and `Valid` follow the TensorFlow conventions; `Explicit` means
/// the padding amounts come from the operator's own parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PadMode {
    Same,
    Valid,
    Explicit,
}

/// Geometry and channel parameters shared by convolution-family operators.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonParams {
    pub kernel_x: i64,
    pub kernel_y: i64,
    pub stride_x: i64,
    pub stride_y: i64,
    pub dilate_x: i64,
    pub dilate_y: i64,
    pub pad_mode: PadMode,
    /// Explicit per-side padding amounts: [top, left, bottom, right].
    pub pads: Option<Vec<i64>>,
    /// Symmetric padding amounts (pad_x, pad_y), the fallback when `pads`
    /// is absent.
    pub pad: Option<(i64, i64)>,
    pub groups: i64,
    pub deform_groups: i64,
    pub input_count: i64,
    pub output_count: i64,
    pub relu: bool,
    pub relu6: bool,
}

impl Default for CommonParams {
    fn default() -> Self {
        Self {
            kernel_x: 1,
            kernel_y: 1,
            stride_x: 1,
            stride_y: 1,
            dilate_x: 1,
            dilate_y: 1,
            pad_mode: PadMode::Explicit,
            pads: None,
            pad: Some((0, 0)),
            groups: 1,
            deform_groups: 1,
            input_count: 0,
            output_count: 0,
            relu: false,
            relu6: false,
        }
    }
}

impl CommonParams {
    /// Explicit padding requires at least one of the two pad encodings.
    pub fn validate(&self) -> Result<()> {
        if self.pad_mode == PadMode::Explicit && self.pads.is_none() && self.pad.is_none() {
            return Err(Error::InvalidOperator(
                "explicit padding requires pad amounts or symmetric pad scalars".to_string(),
            ));
        }
        Ok(())
    }
}

/// Canonical operator type tags.
///
/// This is a closed set: adding an operator means registering a new shape
/// computer for a new tag, never editing a central conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OpType {
    Convolution,
    DeformConv2d,
    Pooling,
    Relu,
    Constant,
}

/// Canonical representation of one graph node.
///
/// Created once by an import transform (or a graph builder) and immutable
/// afterwards; only the output tensors' descriptors change, written by the
/// matching shape computer during propagation. Constant blobs are owned
/// exclusively by the descriptor that embeds them — deep-copied at import
/// time, never aliased back to the foreign graph's storage.
#[derive(Debug, Clone)]
pub struct OperatorDescriptor {
    pub name: String,
    pub op_type: OpType,
    pub params: CommonParams,
    /// Folded weight values, length out_count * in_per_group * kh * kw.
    pub weight: Option<Vec<f32>>,
    /// Folded bias values, length out_count.
    pub bias: Option<Vec<f32>>,
    /// Ordered input slot bindings (edge names).
    pub inputs: Vec<String>,
    /// Ordered output slot bindings (edge names).
    pub outputs: Vec<String>,
}

impl OperatorDescriptor {
    pub fn new(name: impl Into<String>, op_type: OpType) -> Self {
        Self {
            name: name.into(),
            op_type,
            params: CommonParams::default(),
            weight: None,
            bias: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_aware_accessors() {
        let nchw = TensorDescriptor::new(
            vec![2, 16, 32, 64],
            DataType::Float,
            DataFormat::ChannelFirst,
        );
        assert_eq!(nchw.batch(), 2);
        assert_eq!(nchw.channel(), 16);
        assert_eq!(nchw.height(), 32);
        assert_eq!(nchw.width(), 64);

        let nhwc = TensorDescriptor::new(
            vec![2, 32, 64, 16],
            DataType::Float,
            DataFormat::ChannelLast,
        );
        assert_eq!(nhwc.batch(), 2);
        assert_eq!(nhwc.channel(), 16);
        assert_eq!(nhwc.height(), 32);
        assert_eq!(nhwc.width(), 64);
    }

    #[test]
    fn explicit_padding_needs_amounts() {
        let mut params = CommonParams::default();
        params.pad = None;
        assert!(params.validate().is_err());

        params.pads = Some(vec![1, 1, 1, 1]);
        assert!(params.validate().is_ok());
    }
}
