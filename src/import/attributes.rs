//! Schema-driven decoding of foreign attribute lists.
//!
//! Each getter names the expected value kind and the declared default for
//! an omitted key. Unknown keys on the node are ignored, keeping the decode
//! forward-compatible; a present key of the wrong kind is a schema
//! violation that aborts the enclosing transform.

use crate::error::{Error, Result};
use crate::import::foreign::{AttributeValue, ForeignNode};

/// Typed view over one foreign node's attribute bag.
pub struct Attributes<'a> {
    node: &'a ForeignNode,
}

impl<'a> Attributes<'a> {
    pub fn new(node: &'a ForeignNode) -> Self {
        Self { node }
    }

    pub fn int(&self, key: &str, default: i64) -> Result<i64> {
        match self.node.attributes.get(key) {
            None => Ok(default),
            Some(AttributeValue::Int(v)) => Ok(*v),
            Some(other) => Err(self.kind_mismatch(key, "int", other)),
        }
    }

    pub fn float(&self, key: &str, default: f64) -> Result<f64> {
        match self.node.attributes.get(key) {
            None => Ok(default),
            Some(AttributeValue::Float(v)) => Ok(*v),
            Some(other) => Err(self.kind_mismatch(key, "float", other)),
        }
    }

    pub fn string(&self, key: &str, default: &str) -> Result<String> {
        match self.node.attributes.get(key) {
            None => Ok(default.to_string()),
            Some(AttributeValue::String(v)) => Ok(v.clone()),
            Some(other) => Err(self.kind_mismatch(key, "string", other)),
        }
    }

    pub fn ints(&self, key: &str, default: &[i64]) -> Result<Vec<i64>> {
        match self.node.attributes.get(key) {
            None => Ok(default.to_vec()),
            Some(AttributeValue::Ints(v)) => Ok(v.clone()),
            Some(other) => Err(self.kind_mismatch(key, "int list", other)),
        }
    }

    /// Decode a 2-element geometric attribute (stride, dilation, padding).
    ///
    /// A single-element list is shorthand for "set axis 0, leave axis 1 at
    /// its default".
    pub fn int_pair(&self, key: &str, default: (i64, i64)) -> Result<(i64, i64)> {
        match self.node.attributes.get(key) {
            None => Ok(default),
            Some(AttributeValue::Ints(list)) => match list.as_slice() {
                [] => Err(Error::SchemaViolation(format!(
                    "attribute '{}' on node '{}' must not be an empty list",
                    key, self.node.name
                ))),
                [first] => Ok((*first, default.1)),
                [first, second, ..] => Ok((*first, *second)),
            },
            Some(other) => Err(self.kind_mismatch(key, "int list", other)),
        }
    }

    fn kind_mismatch(&self, key: &str, expected: &str, got: &AttributeValue) -> Error {
        let got = match got {
            AttributeValue::Int(_) => "int",
            AttributeValue::Float(_) => "float",
            AttributeValue::String(_) => "string",
            AttributeValue::Ints(_) => "int list",
            AttributeValue::Floats(_) => "float list",
        };
        Error::SchemaViolation(format!(
            "attribute '{}' on node '{}' must be a {}, got a {}",
            key, self.node.name, expected, got
        ))
    }
}
