//! Graph views used by the router
//!
//! Three closed variants share one adjacency contract: a single partition,
//! the overlay, and the query-scoped union of the overlay with up to two
//! partitions.

pub mod layout;
pub mod overlay;
pub mod partition;
pub mod union;

use serde::Serialize;

use crate::geo::Coord;
use crate::mode::{Metric, Transport};

pub use layout::GraphData;
pub use overlay::OverlayGraph;
pub use partition::{InEdges, Incident, PartitionGraph, VertexEdges};
pub use union::UnionGraph;

/// A (neighbor, weight) pair produced during relaxation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dart {
    pub vertex: u32,
    pub weight: f32,
}

/// Graph an edge id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    Overlay,
    Cluster(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeRef {
    pub owner: Owner,
    pub edge: u32,
}

/// The edge chosen between two consecutive path vertices.
/// `from` is numbered in the owner's vertex space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hop {
    pub edge: EdgeRef,
    pub from: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy)]
pub enum Graph<'a> {
    Partition { cluster: u32, graph: &'a PartitionGraph },
    Overlay(&'a OverlayGraph),
    Union(&'a UnionGraph<'a>),
}

impl Graph<'_> {
    pub fn vertex_count(&self) -> usize {
        match self {
            Graph::Partition { graph, .. } => graph.vertex_count(),
            Graph::Overlay(overlay) => overlay.vertex_count(),
            Graph::Union(union) => union.vertex_count(),
        }
    }

    pub fn neighbors(
        &self,
        v: u32,
        forward: bool,
        transport: Transport,
        metric: Metric,
        out: &mut Vec<Dart>,
    ) {
        match self {
            Graph::Partition { graph, .. } => graph.neighbors(v, forward, transport, metric, out),
            Graph::Overlay(overlay) => overlay.neighbors(v, forward, transport, metric, out),
            Graph::Union(union) => union.neighbors(v, forward, transport, metric, out),
        }
    }

    /// Cheapest edge traversable from `u` to `w`
    pub fn edge_between(&self, u: u32, w: u32, transport: Transport, metric: Metric) -> Option<Hop> {
        match self {
            Graph::Partition { cluster, graph } => {
                graph
                    .edge_between(u, w, transport, metric)
                    .map(|(edge, weight)| Hop {
                        edge: EdgeRef {
                            owner: Owner::Cluster(*cluster),
                            edge,
                        },
                        from: u,
                        weight,
                    })
            }
            Graph::Overlay(overlay) => {
                overlay
                    .edge_between(u, w, transport, metric)
                    .map(|(edge, weight)| Hop {
                        edge: EdgeRef {
                            owner: Owner::Overlay,
                            edge,
                        },
                        from: u,
                        weight,
                    })
            }
            Graph::Union(union) => union.edge_between(u, w, transport, metric),
        }
    }

    pub fn position(&self, v: u32) -> Coord {
        match self {
            Graph::Partition { graph, .. } => graph.position(v),
            Graph::Overlay(overlay) => overlay.position(v),
            Graph::Union(union) => union.position(v),
        }
    }
}
