use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{Error, Result};
use crate::model::{DataFormat, DataType, OperatorDescriptor, TensorDescriptor};
use crate::shape::ShapeRegistry;

/// A graph of canonical operator descriptors.
///
/// The graph owns every descriptor: operators, their embedded constant
/// blobs, and the tensor descriptors keyed by edge name. Edges are tensor
/// names; each operator input must resolve to another operator's output, a
/// graph-level input, or a known constant.
#[derive(Debug, Default)]
pub struct OperatorGraph {
    pub operators: Vec<OperatorDescriptor>,
    /// Graph-level input edge names (runtime-fed, not constants).
    pub inputs: Vec<String>,
    /// Known tensor descriptors: graph inputs, constants, and everything
    /// shape propagation has written.
    pub tensors: HashMap<String, TensorDescriptor>,
}

impl OperatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map from edge name to the index of the operator producing it.
    fn producer_map(&self) -> Result<HashMap<&str, usize>> {
        let mut producers = HashMap::new();
        for (idx, op) in self.operators.iter().enumerate() {
            for output in &op.outputs {
                if producers.insert(output.as_str(), idx).is_some() {
                    return Err(Error::InvalidGraph(format!(
                        "edge '{}' has more than one producer",
                        output
                    )));
                }
            }
        }
        Ok(producers)
    }

    /// Check referential integrity: no dangling input references and no
    /// cycles among operators.
    pub fn validate(&self) -> Result<()> {
        let producers = self.producer_map()?;
        for op in &self.operators {
            for input in &op.inputs {
                let resolved = producers.contains_key(input.as_str())
                    || self.tensors.contains_key(input)
                    || self.inputs.iter().any(|i| i == input);
                if !resolved {
                    return Err(Error::InvalidGraph(format!(
                        "operator '{}' reads dangling edge '{}'",
                        op.name, input
                    )));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Operator indices in dependency order.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let producers = self.producer_map()?;
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let indices: Vec<NodeIndex> = (0..self.operators.len())
            .map(|idx| graph.add_node(idx))
            .collect();
        for (consumer, op) in self.operators.iter().enumerate() {
            for input in &op.inputs {
                if let Some(&producer) = producers.get(input.as_str()) {
                    graph.add_edge(indices[producer], indices[consumer], ());
                }
            }
        }
        let order = toposort(&graph, None).map_err(|cycle| {
            let name = &self.operators[graph[cycle.node_id()]].name;
            Error::InvalidGraph(format!("graph contains a cycle through '{}'", name))
        })?;
        Ok(order.into_iter().map(|n| graph[n]).collect())
    }

    /// Run shape propagation over the whole graph.
    ///
    /// Walks operators in dependency order, resolves each operator's input
    /// descriptors, and invokes the registered shape computer to write the
    /// output descriptors. A missing computer or any shape failure aborts
    /// the propagation; no partially-computed descriptor is retained.
    pub fn propagate_shapes(&mut self, registry: &ShapeRegistry) -> Result<()> {
        let order = self.topological_order()?;
        for idx in order {
            let op = &self.operators[idx];
            let resolved: Vec<TensorDescriptor> = op
                .inputs
                .iter()
                .map(|edge| {
                    self.tensors.get(edge).cloned().ok_or_else(|| {
                        Error::InvalidGraph(format!(
                            "no descriptor available for edge '{}' read by '{}'",
                            edge, op.name
                        ))
                    })
                })
                .collect::<Result<_>>()?;
            let inputs: Vec<&TensorDescriptor> = resolved.iter().collect();

            let computer = registry.lookup(op.op_type)?;
            // Pre-declared descriptors act as expectations for the
            // computer to check, not values to keep.
            let mut outputs: Vec<TensorDescriptor> = op
                .outputs
                .iter()
                .map(|edge| {
                    self.tensors.get(edge).cloned().unwrap_or_else(|| {
                        TensorDescriptor::new(Vec::new(), DataType::Float, DataFormat::Other)
                    })
                })
                .collect();
            computer.compute_shape(op, &inputs, &mut outputs)?;
            log::debug!(
                "shape propagation: '{}' ({}) -> {:?}",
                op.name,
                op.op_type,
                outputs.iter().map(|o| &o.shape).collect::<Vec<_>>()
            );

            for (edge, descriptor) in op.outputs.iter().zip(outputs) {
                self.tensors.insert(edge.clone(), descriptor);
            }
        }
        Ok(())
    }

    /// Total estimated cost of the graph in MFLOPs. Requires shape
    /// propagation to have run.
    pub fn estimated_flops(&self, registry: &ShapeRegistry) -> Result<f32> {
        let mut total = 0.0;
        for op in &self.operators {
            let resolved: Vec<&TensorDescriptor> = op
                .inputs
                .iter()
                .filter_map(|edge| self.tensors.get(edge))
                .collect();
            let outputs: Vec<&TensorDescriptor> = op
                .outputs
                .iter()
                .filter_map(|edge| self.tensors.get(edge))
                .collect();
            total += registry.lookup(op.op_type)?.compute_flops(op, &resolved, &outputs);
        }
        Ok(total)
    }
}
