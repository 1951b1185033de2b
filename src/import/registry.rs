use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::graph::OperatorGraph;
use crate::import::foreign::{ConstantResolver, ForeignNode};
use crate::model::OperatorDescriptor;

/// Everything a transform may consult besides the node itself.
pub struct ImportContext<'a> {
    pub constants: &'a dyn ConstantResolver,
    pub options: &'a ImportOptions,
}

/// Per-foreign-operator import capability.
///
/// Given one foreign node, produce the canonical operator descriptors that
/// replace it and rewire the surrounding edges through the descriptors'
/// input/output bindings.
pub trait ImportTransform: Send + Sync + Debug {
    fn transform(
        &self,
        node: &ForeignNode,
        ctx: &ImportContext<'_>,
    ) -> Result<Vec<OperatorDescriptor>>;
}

/// Registry mapping foreign operator names to import transforms.
///
/// Mirrors the shape registry: one transform per name, duplicates rejected
/// at registration, read-only after construction.
#[derive(Debug, Default)]
pub struct ImportRegistry {
    transforms: HashMap<String, Box<dyn ImportTransform>>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, transform: Box<dyn ImportTransform>) -> Result<()> {
        if self.transforms.contains_key(name) {
            return Err(Error::InvalidOperator(format!(
                "import transform for '{}' is already registered",
                name
            )));
        }
        self.transforms.insert(name.to_string(), transform);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn ImportTransform> {
        self.transforms.get(name).map(|t| t.as_ref())
    }

    pub fn with_builtin_transforms() -> Self {
        use crate::import::deform_conv::DeformConv2dImport;

        let mut registry = Self::new();
        registry
            .register("DeformConv2D", Box::new(DeformConv2dImport))
            .expect("duplicate builtin import transform");
        registry
    }

    /// Translate a sequence of foreign nodes into an operator graph.
    ///
    /// A foreign operator with no registered transform fails the whole
    /// import. A node whose transform fails is reported and skipped; the
    /// rest of the import continues.
    pub fn import_graph(
        &self,
        nodes: &[ForeignNode],
        constants: &dyn ConstantResolver,
        options: &ImportOptions,
    ) -> Result<OperatorGraph> {
        let ctx = ImportContext { constants, options };
        let mut graph = OperatorGraph::new();

        for node in nodes {
            let transform = self.lookup(&node.op_type).ok_or_else(|| {
                Error::UnknownOperator(format!(
                    "no import transform registered for foreign operator '{}'",
                    node.op_type
                ))
            })?;
            match transform.transform(node, &ctx) {
                Ok(descriptors) => {
                    log::debug!(
                        "imported '{}' ({}) as {} canonical operator(s)",
                        node.name,
                        node.op_type,
                        descriptors.len()
                    );
                    graph.operators.extend(descriptors);
                }
                Err(err) => {
                    log::warn!("skipping node '{}' ({}): {}", node.name, node.op_type, err);
                }
            }
        }

        self.resolve_graph_edges(&mut graph, constants);
        Ok(graph)
    }

    /// Seed tensor descriptors for unproduced edges and classify the ones
    /// without constant values as graph-level inputs.
    fn resolve_graph_edges(&self, graph: &mut OperatorGraph, constants: &dyn ConstantResolver) {
        let produced: HashSet<&String> = graph
            .operators
            .iter()
            .flat_map(|op| op.outputs.iter())
            .collect();
        let mut seen = HashSet::new();
        let mut inputs = Vec::new();
        let mut tensors = Vec::new();
        for op in &graph.operators {
            for edge in &op.inputs {
                if produced.contains(edge) || !seen.insert(edge.clone()) {
                    continue;
                }
                if let Some(descriptor) = constants.descriptor(edge) {
                    tensors.push((edge.clone(), descriptor.clone()));
                }
                if constants.values(edge).is_none() {
                    inputs.push(edge.clone());
                }
            }
        }
        graph.tensors.extend(tensors);
        graph.inputs.extend(inputs);
    }
}
