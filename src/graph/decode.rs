//! Snapshot decoder
//!
//! Parses one line of engine output into a [`Graph`]. Two shapes are
//! understood.
//!
//! Node/edge documents:
//!
//! ```json
//! {"nodes":[{"id":1,"label":"a"},{"id":2,"label":"b","arity":1}],
//!  "edges":[{"source":1,"target":2,"label":"x","port":0}]}
//! ```
//!
//! SLIM atom dumps, where every atom lists its links and a link either names
//! another atom or carries an inline data value (`attr & 0x80`):
//!
//! ```json
//! {"atoms":[{"id":1,"name":"a","links":[{"attr":0,"data":2},{"attr":128,"data":5}]},
//!           {"id":2,"name":"b","links":[{"attr":0,"data":1}]}],
//!  "membranes":[]}
//! ```
//!
//! Inline data values become nodes of their own, linked back to their owner.

use super::{Edge, Graph, Node, NodeId};
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Bit set on the ids of nodes made from inline data values
///
/// The rest of the id is `owner << 16 | port`, so a data node keeps its
/// identity across steps as long as its owner and port do.
pub const DATA_ATOM_FLAG: NodeId = 1 << 63;

/// Link attribute bit marking an inline data value
const DATA_LINK_ATTR: u32 = 0x80;

/// Which document shape a snapshot line uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// Pick by the top-level key (`atoms` or `nodes`)
    #[default]
    Auto,
    /// `{"nodes": [...], "edges": [...]}`
    Graph,
    /// `{"atoms": [...], "membranes": [...]}`
    Atoms,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotDocument {
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Membrane {
    atoms: Vec<AtomRecord>,
    #[serde(default)]
    membranes: Vec<Membrane>,
}

#[derive(Debug, Deserialize)]
struct AtomRecord {
    id: NodeId,
    name: String,
    #[serde(default)]
    links: Vec<LinkRecord>,
}

#[derive(Debug, Deserialize)]
struct LinkRecord {
    attr: u32,
    data: Value,
}

/// Decode one snapshot line, detecting its shape
pub fn decode(line: &str) -> Result<Graph, DecodeError> {
    decode_with(line, SnapshotFormat::Auto)
}

/// Decode one snapshot line in the given shape
pub fn decode_with(line: &str, format: SnapshotFormat) -> Result<Graph, DecodeError> {
    let value: Value = serde_json::from_str(line.trim())?;
    let format = match format {
        SnapshotFormat::Auto if value.get("atoms").is_some() => SnapshotFormat::Atoms,
        SnapshotFormat::Auto => SnapshotFormat::Graph,
        explicit => explicit,
    };

    match format {
        SnapshotFormat::Atoms => from_atoms(serde_json::from_value(value)?),
        _ => {
            let doc: SnapshotDocument = serde_json::from_value(value)?;
            Graph::new(doc.nodes, doc.edges)
        }
    }
}

fn from_atoms(root: Membrane) -> Result<Graph, DecodeError> {
    let mut atoms = Vec::new();
    collect_atoms(root, &mut atoms);
    let ids: HashSet<NodeId> = atoms.iter().map(|a| a.id).collect();

    let mut nodes = Vec::with_capacity(atoms.len());
    let mut edges = Vec::new();

    for atom in atoms {
        for (port, link) in atom.links.iter().enumerate() {
            let port_label = port as u32;

            if link.attr & DATA_LINK_ATTR != 0 {
                let data_id = DATA_ATOM_FLAG | (atom.id << 16) | (port as NodeId & 0xffff);
                nodes.push(Node::new(data_id, data_label(&link.data)).with_arity(1));
                edges.push(Edge::new(atom.id, data_id).with_port(port_label));
                continue;
            }

            let target = link.data.as_u64().ok_or(DecodeError::BadLink {
                atom: atom.id,
                port,
            })?;
            if !ids.contains(&target) {
                return Err(DecodeError::DanglingLink {
                    atom: atom.id,
                    port,
                    target,
                });
            }
            // Both ends list the link; keep the copy held by the lower id
            if atom.id <= target {
                edges.push(Edge::new(atom.id, target).with_port(port_label));
            }
        }

        let arity = atom.links.len() as u32;
        nodes.push(Node::new(atom.id, atom.name).with_arity(arity));
    }

    Graph::new(nodes, edges)
}

fn collect_atoms(membrane: Membrane, out: &mut Vec<AtomRecord>) {
    out.extend(membrane.atoms);
    for child in membrane.membranes {
        collect_atoms(child, out);
    }
}

fn data_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
