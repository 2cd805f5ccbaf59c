//! The workflow graph working copy
//!
//! Nodes are kept in document order so that graphs serialize back in the
//! same shape the template author wrote them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{GraphError, PathError};
use crate::path::KeyPath;

/// An API-format workflow: node id → `{ class_type, inputs, ... }`
///
/// Construction validates that every node is an object with a string
/// `class_type` and an `inputs` object. Extra node keys such as `_meta` are
/// preserved untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: Map<String, Value>,
}

/// Read-only view of one node
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    id: &'a str,
    class_type: &'a str,
    inputs: &'a Map<String, Value>,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> &'a str {
        self.id
    }

    pub fn class_type(&self) -> &'a str {
        self.class_type
    }

    pub fn inputs(&self) -> &'a Map<String, Value> {
        self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&'a Value> {
        self.inputs.get(name)
    }
}

/// Mutable view of one node
#[derive(Debug)]
pub struct NodeMut<'a> {
    id: &'a str,
    node: &'a mut Map<String, Value>,
}

impl<'a> NodeMut<'a> {
    pub fn id(&self) -> &str {
        self.id
    }

    pub fn class_type(&self) -> &str {
        self.node
            .get("class_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The node's inputs, or `None` if a binding replaced them with a scalar
    pub fn inputs_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.node.get_mut("inputs").and_then(Value::as_object_mut)
    }
}

impl WorkflowGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn node(&self, id: &str) -> Option<Node<'_>> {
        let (id, node) = self.nodes.get_key_value(id)?;
        node_view(id, node)
    }

    /// Iterate nodes in document order
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| node_view(id, node))
    }

    /// Iterate nodes mutably in document order
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = NodeMut<'_>> {
        self.nodes
            .iter_mut()
            .filter_map(|(id, node)| {
                node.as_object_mut().map(|node| NodeMut {
                    id: id.as_str(),
                    node,
                })
            })
    }

    /// Read the field a key path addresses
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        path.get(&self.nodes)
    }

    /// Check that a key path's parent exists without modifying anything
    pub fn resolve(&self, path: &KeyPath) -> Result<(), PathError> {
        path.resolve_parent(&self.nodes).map(|_| ())
    }

    /// Assign the field a key path addresses, returning the previous value
    pub fn set(&mut self, path: &KeyPath, value: Value) -> Result<Option<Value>, PathError> {
        path.assign(&mut self.nodes, value)
    }

    /// Check that every link (`[nodeId, outputIndex]`) points at an existing node
    pub fn validate_links(&self) -> Result<(), GraphError> {
        for node in self.nodes() {
            for (input, value) in node.inputs() {
                if let Some(target) = link_target(value) {
                    if !self.contains_node(target) {
                        return Err(GraphError::DanglingLink {
                            node: node.id().to_string(),
                            input: input.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.nodes
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.nodes)
    }
}

impl TryFrom<Value> for WorkflowGraph {
    type Error = GraphError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut nodes) = value else {
            return Err(GraphError::NotAnObject);
        };
        for (id, node) in nodes.iter_mut() {
            let Some(node) = node.as_object_mut() else {
                return Err(GraphError::InvalidNode(id.clone()));
            };
            if !node.get("class_type").map_or(false, Value::is_string) {
                return Err(GraphError::InvalidNode(id.clone()));
            }
            match node.get("inputs") {
                Some(Value::Object(_)) => {}
                None => {
                    node.insert("inputs".to_string(), Value::Object(Map::new()));
                }
                Some(_) => return Err(GraphError::InvalidNode(id.clone())),
            }
        }
        Ok(Self { nodes })
    }
}

impl<'de> Deserialize<'de> for WorkflowGraph {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        WorkflowGraph::try_from(value).map_err(serde::de::Error::custom)
    }
}

fn node_view<'a>(id: &'a str, node: &'a Value) -> Option<Node<'a>> {
    let class_type = node.get("class_type")?.as_str()?;
    let inputs = node.get("inputs")?.as_object()?;
    Some(Node {
        id,
        class_type,
        inputs,
    })
}

/// The node id a link value points at, if the value is a link
fn link_target(value: &Value) -> Option<&str> {
    match value.as_array()?.as_slice() {
        [Value::String(target), index] if index.is_u64() => Some(target.as_str()),
        _ => None,
    }
}
