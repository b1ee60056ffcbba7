//! Visual Graph Module
//!
//! Live, animated view of the current snapshot:
//! - `graph`: positioned nodes reconciled across steps
//! - `mover`: force-directed relaxation on its own tick
//! - `transform`: drag-to-pan offset
//! - `renderer`: draw pass onto an egui painter
//!
//! ## Locking
//!
//! The mover thread, the step driver and the paint pass all go through the
//! one mutex in [`SharedVisualGraph`]. [`ViewTransform`] is separate state
//! updated atomically.

pub mod graph;
pub mod mover;
pub mod renderer;
pub mod transform;

pub use graph::{SharedVisualGraph, VisualEdge, VisualGraph, VisualNode};
pub use mover::{Mover, MoverHandle};
pub use renderer::{render, CanvasTheme, PainterSurface, Surface};
pub use transform::ViewTransform;
