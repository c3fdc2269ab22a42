//! Deterministic multi-node driver for protocol tests.
//!
//! Enabled by the `test-utils` feature.

mod silent;
mod test_context;

pub use silent::SilentNode;
pub use test_context::{BoxedGpa, TestContext};
