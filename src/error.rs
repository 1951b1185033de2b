use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Attribute schema violation: {0}")]
    SchemaViolation(String),

    #[error("Wrong number of inputs/outputs: {0}")]
    ArityMismatch(String),

    #[error("Incompatible shapes: {0}")]
    ShapeIncompatibility(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),
}
