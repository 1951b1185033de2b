pub mod deform_conv;
pub mod registry;

pub use deform_conv::DeformConv2dShape;
pub use registry::{ShapeComputer, ShapeRegistry, FLOPS_M};
