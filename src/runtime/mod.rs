//! Engine runtime bridge
//!
//! Launches the LMNtal engine and pulls one graph snapshot per rewriting
//! step out of it.

pub mod driver;
pub mod session;

pub use driver::{DriverEvent, StepDriver};
pub use session::{SessionCloser, StepSession};
