pub mod config;
pub mod error;
pub mod graph;
pub mod import;
pub mod model;
pub mod shape;

// Re-export commonly used types
pub use config::{ImportOptions, OptimizePreference};
pub use error::{Error, Result};
pub use graph::OperatorGraph;
pub use import::{
    AttributeValue, ConstantResolver, ForeignNode, GraphConstants, ImportRegistry, ImportTransform,
};
pub use model::{
    CommonParams, DataFormat, DataType, OperatorDescriptor, OpType, PadMode, TensorDescriptor,
};
pub use shape::{ShapeComputer, ShapeRegistry};
