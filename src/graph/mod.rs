//! Logical graph snapshots
//!
//! One [`Graph`] is produced per rewriting step by [`decode`]. Graphs are
//! immutable once built and are consumed by the visual layer.

mod decode;

pub use decode::{decode, decode_with, SnapshotFormat, DATA_ATOM_FLAG};

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable node identity assigned by the engine
pub type NodeId = u64;

/// A node (atom) in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
    pub id: NodeId,

    /// Atom name
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<u32>,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            arity: None,
        }
    }

    pub fn with_arity(mut self, arity: u32) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Label as drawn on screen, e.g. `cons/3`
    pub fn display_label(&self) -> String {
        display_label(&self.label, self.arity)
    }
}

pub(crate) fn display_label(label: &str, arity: Option<u32>) -> String {
    match arity {
        Some(arity) => format!("{}/{}", label, arity),
        None => label.to_string(),
    }
}

/// A link between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edge {
    #[serde(alias = "from")]
    pub source: NodeId,

    #[serde(alias = "to")]
    pub target: NodeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Port index on the source atom
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            source,
            target,
            label: None,
            port: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_port(mut self, port: u32) -> Self {
        self.port = Some(port);
        self
    }
}

/// One validated graph snapshot
///
/// Node ids are unique and every edge endpoint names a node of the same
/// graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    /// Build a graph, rejecting duplicate ids and dangling edges
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, DecodeError> {
        let mut ids = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !ids.insert(node.id) {
                return Err(DecodeError::DuplicateNode(node.id));
            }
        }

        for (index, edge) in edges.iter().enumerate() {
            for id in [edge.source, edge.target] {
                if !ids.contains(&id) {
                    return Err(DecodeError::UnknownNode { index, id });
                }
            }
        }

        Ok(Self { nodes, edges })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
