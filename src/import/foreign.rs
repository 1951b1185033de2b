use std::collections::HashMap;

use ndarray::ArrayD;

use crate::model::TensorDescriptor;

/// Typed attribute value on a foreign node.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

/// One node of the foreign graph being imported.
///
/// Transient: exists only while the import runs. Attribute keys appear at
/// most once per node; attributes are order-independent.
#[derive(Debug, Clone)]
pub struct ForeignNode {
    pub name: String,
    pub op_type: String,
    /// Ordered input edge references.
    pub inputs: Vec<String>,
    /// Ordered output edge names.
    pub outputs: Vec<String>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl ForeignNode {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: HashMap::new(),
        }
    }
}

/// Access to the constant-resolution subsystem for foreign edges.
///
/// Implemented by the host loader; answers the three questions import
/// transforms ask about an input reference.
pub trait ConstantResolver {
    /// Statically-known descriptor of the edge, if any.
    fn descriptor(&self, name: &str) -> Option<&TensorDescriptor>;

    /// Readable values of the edge when it is a compile-time constant the
    /// subsystem can safely materialize.
    fn values(&self, name: &str) -> Option<&ArrayD<f32>>;

    /// Number of distinct graph edges consuming this reference.
    fn link_count(&self, name: &str) -> usize;
}

/// Map-backed [`ConstantResolver`], the form hosts and tests use when the
/// foreign loader has already materialized its constants in memory.
#[derive(Debug, Default)]
pub struct GraphConstants {
    descriptors: HashMap<String, TensorDescriptor>,
    values: HashMap<String, ArrayD<f32>>,
    links: HashMap<String, usize>,
}

impl GraphConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a constant edge with its values and consumer count.
    pub fn insert_constant(
        &mut self,
        name: impl Into<String>,
        descriptor: TensorDescriptor,
        values: ArrayD<f32>,
        link_count: usize,
    ) {
        let name = name.into();
        self.descriptors.insert(name.clone(), descriptor);
        self.values.insert(name.clone(), values);
        self.links.insert(name, link_count);
    }

    /// Record a non-constant edge whose descriptor is still known.
    pub fn insert_descriptor(&mut self, name: impl Into<String>, descriptor: TensorDescriptor) {
        self.descriptors.insert(name.into(), descriptor);
    }
}

impl ConstantResolver for GraphConstants {
    fn descriptor(&self, name: &str) -> Option<&TensorDescriptor> {
        self.descriptors.get(name)
    }

    fn values(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.values.get(name)
    }

    fn link_count(&self, name: &str) -> usize {
        self.links.get(name).copied().unwrap_or(1)
    }
}
