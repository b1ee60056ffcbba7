//! Force-directed mover
//!
//! One call to [`Mover::step`] is one relaxation tick:
//! - Repulsion between every pair of nodes (`repulsion / d²`)
//! - Spring attraction along edges toward `spring_length`
//! - Weak pull toward the canvas center
//! - Damped velocity integration, clamped to `max_speed`
//!
//! [`MoverHandle`] runs ticks on a fixed period in a background thread.

use super::graph::{SharedVisualGraph, VisualGraph};
use crate::config::LayoutConfig;
use crate::graph::NodeId;
use eframe::egui::{Pos2, Vec2};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Relaxation step over a [`VisualGraph`]
#[derive(Debug, Clone, Default)]
pub struct Mover {
    config: LayoutConfig,
}

impl Mover {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Run one tick; returns the summed displacement of all nodes
    pub fn step(&self, graph: &mut VisualGraph) -> f32 {
        let config = &self.config;
        let (ids, positions): (Vec<NodeId>, Vec<Pos2>) =
            graph.nodes().map(|n| (n.id, n.position)).unzip();
        let n = ids.len();
        if n == 0 {
            return 0.0;
        }

        let index: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut forces = vec![Vec2::ZERO; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = positions[j] - positions[i];
                let dist = delta.length().max(config.min_distance).max(f32::EPSILON);
                let force = separation(delta, i, j) * (config.repulsion / (dist * dist));
                forces[i] -= force;
                forces[j] += force;
            }
        }

        for edge in graph.edges() {
            let (Some(&a), Some(&b)) = (index.get(&edge.source), index.get(&edge.target)) else {
                continue;
            };
            if a == b {
                continue;
            }
            let delta = positions[b] - positions[a];
            let dist = delta.length();
            if dist <= f32::EPSILON {
                continue;
            }
            let force = delta / dist * (config.spring_strength * (dist - config.spring_length));
            forces[a] += force;
            forces[b] -= force;
        }

        if config.centering > 0.0 {
            let center = graph.canvas_center();
            for (force, position) in forces.iter_mut().zip(&positions) {
                *force += (center - *position) * config.centering;
            }
        }

        let mut displacement = 0.0;
        for (id, force) in ids.iter().zip(forces) {
            if let Some(node) = graph.node_mut(*id) {
                let mut velocity = (node.velocity + force) * config.damping;
                let speed = velocity.length();
                if speed > config.max_speed {
                    velocity = velocity * (config.max_speed / speed);
                }
                if !velocity.is_finite() {
                    velocity = Vec2::ZERO;
                }
                node.velocity = velocity;
                node.position += velocity;
                displacement += velocity.length();
            }
        }

        displacement
    }
}

/// Unit vector from node `i` toward node `j`; coincident nodes get a fixed
/// direction derived from their indices
fn separation(delta: Vec2, i: usize, j: usize) -> Vec2 {
    let len = delta.length();
    if len > f32::EPSILON {
        delta / len
    } else {
        Vec2::angled((i * 31 + j * 17) as f32)
    }
}

/// Background thread ticking a [`Mover`]
pub struct MoverHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MoverHandle {
    /// Tick every `tick`; `on_tick` receives each tick's displacement
    pub fn spawn<F>(graph: SharedVisualGraph, mover: Mover, tick: Duration, on_tick: F) -> Self
    where
        F: Fn(f32) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::spawn(move || {
            log::debug!("Mover started ({:?} tick)", tick);
            while flag.load(Ordering::Relaxed) {
                let started = Instant::now();
                let moved = {
                    let mut graph = graph.lock();
                    mover.step(&mut graph)
                };
                on_tick(moved);
                if let Some(rest) = tick.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
            log::debug!("Mover stopped");
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && self.handle.is_some()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Mover thread panicked");
            }
        }
    }
}

impl Drop for MoverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Graph, Node};

    fn chain(len: u64) -> Graph {
        Graph::new(
            (0..len).map(|i| Node::new(i, format!("n{}", i))).collect(),
            (1..len).map(|i| Edge::new(i - 1, i)).collect(),
        )
        .unwrap()
    }

    fn moving_average(samples: &[f32]) -> f32 {
        samples.iter().sum::<f32>() / samples.len() as f32
    }

    #[test]
    fn test_step_on_empty_graph_is_noop() {
        let mut graph = VisualGraph::with_seed(40.0, 0);
        assert_eq!(Mover::default().step(&mut graph), 0.0);
    }

    #[test]
    fn test_mover_converges() {
        let mut graph = VisualGraph::with_seed(60.0, 11);
        graph.set_canvas_size(Vec2::new(800.0, 600.0));
        let ring = Graph::new(
            (0..6).map(|i| Node::new(i, "ring")).collect(),
            (0..6).map(|i| Edge::new(i, (i + 1) % 6)).collect(),
        )
        .unwrap();
        graph.rewrite(&ring);

        let mover = Mover::default();
        let samples: Vec<f32> = (0..1500).map(|_| mover.step(&mut graph)).collect();

        assert!(samples.iter().all(|s| s.is_finite()));
        let early = moving_average(&samples[..50]);
        let late = moving_average(&samples[1450..]);
        assert!(late < early, "late {} should be below early {}", late, early);
        assert!(late < 0.5, "layout still moving: {}", late);

        for node in graph.nodes() {
            assert!(node.position.x.is_finite() && node.position.y.is_finite());
        }
    }

    #[test]
    fn test_fixed_point_is_stable() {
        let mut graph = VisualGraph::with_seed(30.0, 5);
        graph.rewrite(&chain(3));
        let mover = Mover::default();
        for _ in 0..2000 {
            mover.step(&mut graph);
        }

        let before: Vec<Pos2> = graph.nodes().map(|n| n.position).collect();
        let moved: f32 = (0..10).map(|_| mover.step(&mut graph)).sum();
        let after: Vec<Pos2> = graph.nodes().map(|n| n.position).collect();

        assert!(moved < 0.1, "moved {}", moved);
        for (a, b) in before.iter().zip(&after) {
            assert!((*a - *b).length() < 0.1);
        }
    }

    #[test]
    fn test_edge_pulls_distant_nodes_together() {
        let mut graph = VisualGraph::with_seed(0.0, 0);
        graph.rewrite(&chain(2));
        graph.node_mut(0).unwrap().position = Pos2::new(0.0, 300.0);
        graph.node_mut(1).unwrap().position = Pos2::new(800.0, 300.0);

        let mover = Mover::new(LayoutConfig {
            centering: 0.0,
            ..LayoutConfig::default()
        });
        for _ in 0..500 {
            mover.step(&mut graph);
        }

        let a = graph.node(0).unwrap().position;
        let b = graph.node(1).unwrap().position;
        let dist = (b - a).length();
        assert!(dist > 60.0 && dist < 120.0, "distance {}", dist);
    }

    #[test]
    fn test_coincident_nodes_separate() {
        let mut graph = VisualGraph::with_seed(0.0, 0);
        graph.rewrite(&Graph::new(vec![Node::new(1, "a"), Node::new(2, "b")], vec![]).unwrap());
        assert_eq!(graph.node(1).unwrap().position, graph.node(2).unwrap().position);

        Mover::default().step(&mut graph);

        let a = graph.node(1).unwrap().position;
        let b = graph.node(2).unwrap().position;
        assert!((b - a).length() > 0.0);
    }

    #[test]
    fn test_mover_never_changes_structure() {
        let mut graph = VisualGraph::with_seed(40.0, 9);
        graph.rewrite(&chain(4));
        let edges = graph.edges().to_vec();
        Mover::default().step(&mut graph);
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.edges(), edges.as_slice());
    }

    #[test]
    fn test_handle_ticks_in_background() {
        let shared = VisualGraph::with_seed(40.0, 1).into_shared();
        shared.lock().rewrite(&chain(3));
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let mut handle = MoverHandle::spawn(
            Arc::clone(&shared),
            Mover::default(),
            Duration::from_millis(1),
            move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            },
        );
        assert!(handle.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while ticks.load(Ordering::Relaxed) < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        handle.stop();

        assert!(!handle.is_running());
        assert!(ticks.load(Ordering::Relaxed) >= 5);
        assert_eq!(shared.lock().len(), 3);
    }
}
