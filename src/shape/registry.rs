use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::model::{OperatorDescriptor, OpType, TensorDescriptor};

/// Normalization constant applied to cost estimates (MFLOPs).
pub const FLOPS_M: f32 = 1_000_000.0;

/// Per-operator-type shape inference capability.
///
/// Implementations validate arity and cross-input shape relationships,
/// branch on the padding-mode/layout enumerations, and write exactly one
/// set of output descriptors. They never execute a numeric kernel.
pub trait ShapeComputer: Send + Sync + Debug {
    /// Populate `outputs` from the operator's parameters and its resolved
    /// input descriptors. Every failure leaves the outputs untouched.
    fn compute_shape(
        &self,
        op: &OperatorDescriptor,
        inputs: &[&TensorDescriptor],
        outputs: &mut [TensorDescriptor],
    ) -> Result<()>;

    /// Estimated cost of running the operator, in MFLOPs. Free ops keep
    /// the default.
    fn compute_flops(
        &self,
        _op: &OperatorDescriptor,
        _inputs: &[&TensorDescriptor],
        _outputs: &[&TensorDescriptor],
    ) -> f32 {
        0.0
    }
}

/// Registry mapping canonical operator type tags to shape computers.
///
/// At most one computer per type; duplicates are rejected at registration
/// time, never silently overwritten. Built once at startup and read-only
/// afterwards, so concurrent lookups are safe.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    computers: HashMap<OpType, Box<dyn ShapeComputer>>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self {
            computers: HashMap::new(),
        }
    }

    /// Register a computer for an operator type.
    pub fn register(&mut self, op_type: OpType, computer: Box<dyn ShapeComputer>) -> Result<()> {
        if self.computers.contains_key(&op_type) {
            return Err(Error::InvalidOperator(format!(
                "shape computer for {} is already registered",
                op_type
            )));
        }
        self.computers.insert(op_type, computer);
        Ok(())
    }

    /// Look up the computer for an operator type. Absence during shape
    /// propagation is a hard error: the graph cannot run.
    pub fn lookup(&self, op_type: OpType) -> Result<&dyn ShapeComputer> {
        self.computers
            .get(&op_type)
            .map(|c| c.as_ref())
            .ok_or_else(|| {
                Error::UnknownOperator(format!("no shape computer registered for {}", op_type))
            })
    }

    /// Registry with all built-in computers. Duplicate registration here
    /// is a programming error and aborts at startup.
    pub fn with_builtin_computers() -> Self {
        use crate::shape::deform_conv::DeformConv2dShape;

        let mut registry = Self::new();
        registry
            .register(OpType::DeformConv2d, Box::new(DeformConv2dShape))
            .expect("duplicate builtin shape computer");
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        use crate::shape::deform_conv::DeformConv2dShape;

        let mut registry = ShapeRegistry::new();
        registry
            .register(OpType::DeformConv2d, Box::new(DeformConv2dShape))
            .unwrap();
        let err = registry
            .register(OpType::DeformConv2d, Box::new(DeformConv2dShape))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperator(_)));
    }

    #[test]
    fn lookup_of_unregistered_type_fails() {
        let registry = ShapeRegistry::new();
        let err = registry.lookup(OpType::Pooling).unwrap_err();
        assert!(matches!(err, Error::UnknownOperator(_)));
    }
}
