//! butterfly-overlay: point-to-point routing over a partitioned road graph
//!
//! The graph is split offline into clusters plus an overlay over the boundary
//! vertices. At query time the overlay and at most two clusters are stitched
//! into a `UnionGraph` and searched with a bidirectional Dijkstra.
//!
//! Data flow: mapped arrays (`butterfly_io`) -> `PartitionGraph` ->
//! (`UnionGraph`, `SpatialIndex`) -> `Heap` -> `Router` -> `Planner`.

pub mod build;
pub mod codec;
pub mod error;
pub mod geo;
pub mod graph;
pub mod heap;
pub mod mode;
pub mod planner;
pub mod router;
pub mod spatial;
pub mod store;

pub use error::{PlanError, RouteError, StoreError};
pub use geo::{BBox, Coord};
pub use graph::{Dart, EdgeRef, Graph, Hop, OverlayGraph, Owner, PartitionGraph, UnionGraph};
pub use heap::{Color, Heap};
pub use mode::{Metric, Transport};
pub use planner::{Leg, LegEdge, Planner, Route};
pub use router::Router;
pub use spatial::{KdTree, Location, SpatialIndex, Way};
pub use store::Store;
