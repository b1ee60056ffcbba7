//! On-screen graph state
//!
//! Positioned nodes and edges shared by the mover, the step driver and the
//! paint pass. Structure only changes through [`VisualGraph::rewrite`].

use crate::graph::{display_label, Graph, NodeId};
use eframe::egui::{Pos2, Rect, Vec2};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// The single lock every reader and writer of the layout goes through
pub type SharedVisualGraph = Arc<Mutex<VisualGraph>>;

/// A positioned node
#[derive(Debug, Clone)]
pub struct VisualNode {
    pub id: NodeId,
    pub position: Pos2,
    pub velocity: Vec2,
    pub label: String,
    pub arity: Option<u32>,
}

impl VisualNode {
    pub fn display_label(&self) -> String {
        display_label(&self.label, self.arity)
    }
}

/// An edge between two live nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub label: Option<String>,
    pub port: Option<u32>,
}

/// Mutable layout of the current snapshot
#[derive(Debug)]
pub struct VisualGraph {
    nodes: BTreeMap<NodeId, VisualNode>,
    edges: Vec<VisualEdge>,
    canvas_size: Vec2,
    spawn_jitter: f32,
    rng: StdRng,
}

impl Default for VisualGraph {
    fn default() -> Self {
        Self::new(40.0)
    }
}

impl VisualGraph {
    /// Create an empty graph; new nodes land within `spawn_jitter` of the centroid
    pub fn new(spawn_jitter: f32) -> Self {
        Self::with_rng(spawn_jitter, StdRng::from_os_rng())
    }

    /// Deterministic placement, for tests and replays
    pub fn with_seed(spawn_jitter: f32, seed: u64) -> Self {
        Self::with_rng(spawn_jitter, StdRng::seed_from_u64(seed))
    }

    fn with_rng(spawn_jitter: f32, rng: StdRng) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            canvas_size: Vec2::new(800.0, 600.0),
            spawn_jitter: spawn_jitter.max(0.0),
            rng,
        }
    }

    pub fn into_shared(self) -> SharedVisualGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn set_canvas_size(&mut self, size: Vec2) {
        self.canvas_size = size;
    }

    pub fn canvas_center(&self) -> Pos2 {
        (self.canvas_size / 2.0).to_pos2()
    }

    /// Merge a new snapshot, keeping position and velocity of surviving nodes
    pub fn rewrite(&mut self, graph: &Graph) {
        let incoming: HashSet<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
        let before = self.nodes.len();
        self.nodes.retain(|id, _| incoming.contains(id));
        let removed = before - self.nodes.len();

        let anchor = self.centroid().unwrap_or_else(|| self.canvas_center());
        let mut created = 0;
        for node in graph.nodes() {
            match self.nodes.get_mut(&node.id) {
                Some(existing) => {
                    existing.label.clone_from(&node.label);
                    existing.arity = node.arity;
                }
                None => {
                    let position = anchor + self.jitter();
                    self.nodes.insert(
                        node.id,
                        VisualNode {
                            id: node.id,
                            position,
                            velocity: Vec2::ZERO,
                            label: node.label.clone(),
                            arity: node.arity,
                        },
                    );
                    created += 1;
                }
            }
        }

        self.edges = graph
            .edges()
            .iter()
            .map(|e| VisualEdge {
                source: e.source,
                target: e.target,
                label: e.label.clone(),
                port: e.port,
            })
            .collect();

        log::debug!(
            "Rewrite: {} kept, {} created, {} removed, {} edges",
            self.nodes.len() - created,
            created,
            removed,
            self.edges.len()
        );
    }

    fn jitter(&mut self) -> Vec2 {
        if self.spawn_jitter == 0.0 {
            return Vec2::ZERO;
        }
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        let radius = self.rng.random_range(0.0..=self.spawn_jitter);
        Vec2::angled(angle) * radius
    }

    /// Throw every node to a random spot on the canvas and stop it
    ///
    /// Structure is untouched; the mover lays the graph out again from scratch.
    pub fn scramble(&mut self) {
        let width = self.canvas_size.x.max(0.0);
        let height = self.canvas_size.y.max(0.0);
        for node in self.nodes.values_mut() {
            node.position = Pos2::new(
                self.rng.random_range(0.0..=width),
                self.rng.random_range(0.0..=height),
            );
            node.velocity = Vec2::ZERO;
        }
        log::debug!("Scrambled {} nodes", self.nodes.len());
    }

    pub fn node(&self, id: NodeId) -> Option<&VisualNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut VisualNode> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &VisualNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[VisualEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Mean node position
    pub fn centroid(&self) -> Option<Pos2> {
        if self.nodes.is_empty() {
            return None;
        }
        let sum = self
            .nodes
            .values()
            .fold(Vec2::ZERO, |acc, n| acc + n.position.to_vec2());
        Some((sum / self.nodes.len() as f32).to_pos2())
    }

    /// Bounding box of all node positions
    pub fn bounds(&self) -> Option<Rect> {
        let mut nodes = self.nodes.values();
        let first = nodes.next()?;
        let rect = nodes.fold(Rect::from_min_max(first.position, first.position), |r, n| {
            r.union(Rect::from_min_max(n.position, n.position))
        });
        Some(rect)
    }
}
