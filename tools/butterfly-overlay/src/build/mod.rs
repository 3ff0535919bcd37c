//! Producer side of the store layout
//!
//! Query code only ever reads stores; these builders write them, for tests
//! and for the `build-grid` command.

pub mod grid;
mod graph;
mod writer;

pub use graph::{EdgeSpec, GraphBuilder};
pub use writer::{Network, StoreWriter, WriteSummary};
