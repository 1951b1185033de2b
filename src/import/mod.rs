pub mod attributes;
pub mod deform_conv;
pub mod foreign;
pub mod registry;

pub use attributes::Attributes;
pub use deform_conv::DeformConv2dImport;
pub use foreign::{AttributeValue, ConstantResolver, ForeignNode, GraphConstants};
pub use registry::{ImportContext, ImportRegistry, ImportTransform};
