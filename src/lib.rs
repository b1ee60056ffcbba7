//! unyo - step-by-step LMNtal graph rewriting visualizer
//!
//! Drives the external engine one step at a time and animates each graph
//! snapshot with a force-directed layout.

pub mod app;
pub mod config;
pub mod error;
pub mod graph;
pub mod runtime;
pub mod visual;

// Re-export commonly used types
pub use app::{AppContext, Status, UnyoApp};
pub use config::{EngineConfig, LayoutConfig, UnyoConfig, WindowConfig};
pub use error::{ConfigError, DecodeError, StepError};
pub use graph::{decode, decode_with, Edge, Graph, Node, NodeId, SnapshotFormat};
pub use runtime::{DriverEvent, SessionCloser, StepDriver, StepSession};
pub use visual::{Mover, MoverHandle, SharedVisualGraph, ViewTransform, VisualGraph};
