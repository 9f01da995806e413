//! Atmosphere process framework.
//!
//! Re-exports the framework core and the physics processes, and provides
//! [`harness::ProcessHarness`] for driving one process by hand, e.g. from a
//! scripting environment or a notebook.

pub mod harness;

pub use atmproc_core;
pub use atmproc_physics;

pub use harness::ProcessHarness;
