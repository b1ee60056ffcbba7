//! Graph Renderer
//!
//! Stateless draw pass: edges first (behind nodes), then nodes with their
//! labels, everything offset by the [`ViewTransform`]. Drawing goes through
//! the [`Surface`] trait so the pass can be exercised without a window.

use super::graph::VisualGraph;
use super::transform::ViewTransform;
use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke, Vec2};

/// Something the graph can be drawn onto
pub trait Surface {
    /// Line between two screen points, with an optional label at its middle
    fn edge(&mut self, from: Pos2, to: Pos2, label: Option<&str>);

    /// Node shape centered on a screen point
    fn node(&mut self, center: Pos2, label: &str);
}

/// Paint `graph` through `transform` onto `surface`
///
/// The caller holds the layout lock for the duration of the pass.
pub fn render<S: Surface + ?Sized>(
    graph: &VisualGraph,
    transform: &ViewTransform,
    surface: &mut S,
) {
    for edge in graph.edges() {
        let (Some(from), Some(to)) = (graph.node(edge.source), graph.node(edge.target)) else {
            continue;
        };
        let label = match (&edge.label, edge.port) {
            (Some(label), _) => Some(label.clone()),
            (None, Some(port)) => Some(port.to_string()),
            (None, None) => None,
        };
        surface.edge(
            transform.apply(from.position),
            transform.apply(to.position),
            label.as_deref(),
        );
    }

    for node in graph.nodes() {
        surface.node(transform.apply(node.position), &node.display_label());
    }
}

/// Colors used on the canvas
#[derive(Clone, Copy, Debug)]
pub struct CanvasTheme {
    pub canvas_bg: Color32,
    pub node_fill: Color32,
    pub node_stroke: Color32,
    pub node_text: Color32,
    pub edge_color: Color32,
    pub edge_text: Color32,
}

impl CanvasTheme {
    pub fn dark() -> Self {
        Self {
            canvas_bg: Color32::from_rgb(30, 30, 30),
            node_fill: Color32::from_rgb(37, 37, 38),
            node_stroke: Color32::from_rgb(0, 122, 204),
            node_text: Color32::from_rgb(212, 212, 212),
            edge_color: Color32::from_rgb(128, 128, 128),
            edge_text: Color32::from_rgb(156, 220, 254),
        }
    }
}

impl Default for CanvasTheme {
    fn default() -> Self {
        Self::dark()
    }
}

/// egui painter anchored at the canvas rect
pub struct PainterSurface<'a> {
    painter: &'a Painter,
    origin: Vec2,
    theme: CanvasTheme,
    node_radius: f32,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &'a Painter, rect: Rect, theme: CanvasTheme, node_radius: f32) -> Self {
        painter.rect_filled(rect, 0.0, theme.canvas_bg);
        Self {
            painter,
            origin: rect.min.to_vec2(),
            theme,
            node_radius,
        }
    }
}

impl Surface for PainterSurface<'_> {
    fn edge(&mut self, from: Pos2, to: Pos2, label: Option<&str>) {
        let (from, to) = (from + self.origin, to + self.origin);
        self.painter
            .line_segment([from, to], Stroke::new(1.5, self.theme.edge_color));

        if let Some(label) = label {
            let mid = Pos2::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
            self.painter.text(
                mid,
                Align2::CENTER_CENTER,
                label,
                FontId::proportional(11.0),
                self.theme.edge_text,
            );
        }
    }

    fn node(&mut self, center: Pos2, label: &str) {
        let center = center + self.origin;
        self.painter.circle(
            center,
            self.node_radius,
            self.theme.node_fill,
            Stroke::new(1.5, self.theme.node_stroke),
        );
        self.painter.text(
            center,
            Align2::CENTER_CENTER,
            label,
            FontId::proportional(12.0),
            self.theme.node_text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Graph, Node};

    #[derive(Default)]
    struct RecordingSurface {
        edges: Vec<(Pos2, Pos2, Option<String>)>,
        nodes: Vec<(Pos2, String)>,
    }

    impl Surface for RecordingSurface {
        fn edge(&mut self, from: Pos2, to: Pos2, label: Option<&str>) {
            self.edges.push((from, to, label.map(str::to_string)));
        }

        fn node(&mut self, center: Pos2, label: &str) {
            self.nodes.push((center, label.to_string()));
        }
    }

    fn sample() -> VisualGraph {
        let mut graph = VisualGraph::with_seed(0.0, 0);
        graph.rewrite(
            &Graph::new(
                vec![Node::new(1, "a"), Node::new(2, "b").with_arity(1)],
                vec![Edge::new(1, 2).with_port(0), Edge::new(2, 1).with_label("x")],
            )
            .unwrap(),
        );
        graph.node_mut(1).unwrap().position = Pos2::new(0.0, 0.0);
        graph.node_mut(2).unwrap().position = Pos2::new(50.0, 20.0);
        graph
    }

    #[test]
    fn test_render_draws_every_edge_and_node() {
        let graph = sample();
        let mut surface = RecordingSurface::default();
        render(&graph, &ViewTransform::new(), &mut surface);

        assert_eq!(
            surface.edges,
            vec![
                (Pos2::new(0.0, 0.0), Pos2::new(50.0, 20.0), Some("0".to_string())),
                (Pos2::new(50.0, 20.0), Pos2::new(0.0, 0.0), Some("x".to_string())),
            ]
        );
        assert_eq!(
            surface.nodes,
            vec![
                (Pos2::new(0.0, 0.0), "a".to_string()),
                (Pos2::new(50.0, 20.0), "b/1".to_string()),
            ]
        );
    }

    #[test]
    fn test_render_applies_pan() {
        let graph = sample();
        let transform = ViewTransform::new();
        transform.drag(Pos2::new(100.0, 100.0), Pos2::new(80.0, 90.0));

        let mut surface = RecordingSurface::default();
        render(&graph, &transform, &mut surface);

        assert_eq!(surface.nodes[0].0, Pos2::new(-20.0, -10.0));
        assert_eq!(surface.nodes[1].0, Pos2::new(30.0, 10.0));
        assert_eq!(surface.edges[0].0, Pos2::new(-20.0, -10.0));
    }

    #[test]
    fn test_render_empty_graph_draws_nothing() {
        let mut surface = RecordingSurface::default();
        render(&VisualGraph::default(), &ViewTransform::new(), &mut surface);
        assert!(surface.edges.is_empty() && surface.nodes.is_empty());
    }
}
