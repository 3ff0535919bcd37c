//! Partition graph: one cluster (or the overlay) as a frozen CSR
//!
//! Every edge is stored once, in the CSR row of its tail. Its natural
//! direction is tail -> head and `endpoints[e] = tail ^ head`. In-edges of a
//! vertex are threaded through `next_in`, rooted at `first_in`; an edge whose
//! `next_in` points to itself ends the chain.
//!
//! Traversal rules for vertex `v`:
//! - forward: CSR row edges always (natural), in-chain edges unless oneway
//! - backward: in-chain edges always (natural), CSR row edges unless oneway
//!
//! and in both cases the edge must be accessible for the transport mode.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::codec::{half, varint::PolylineDecoder};
use crate::error::StoreError;
use crate::geo::Coord;
use crate::mode::{weight_slot, Metric, Transport, METRIC_COUNT, TRANSPORT_COUNT};

use super::layout::{GraphArrays, GraphData, NO_EDGE};
use super::Dart;

/// An edge seen from one of its endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incident {
    pub edge: u32,
    pub neighbor: u32,
}

pub struct PartitionGraph {
    source: PathBuf,
    a: GraphArrays,
}

impl PartitionGraph {
    /// Map and validate a graph directory
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let arrays = GraphArrays::open(dir)?;
        Self::validated(arrays, dir.to_path_buf())
    }

    /// Wrap owned arrays (tests, store writer)
    pub fn from_data(data: GraphData) -> Result<Self, StoreError> {
        Self::validated(GraphArrays::from_data(data), PathBuf::from("<memory>"))
    }

    fn validated(a: GraphArrays, source: PathBuf) -> Result<Self, StoreError> {
        let fail = |reason: String| Err(StoreError::malformed(&source, reason));

        if a.first_out.is_empty() {
            return fail("first_out is empty".into());
        }
        let n = a.first_out.len() - 1;
        let m = a.endpoints.len();

        if a.first_out.windows(2).any(|w| w[0] > w[1]) {
            return fail("first_out is not monotone".into());
        }
        if a.first_out[n] as usize != m {
            return fail(format!("first_out ends at {} but there are {} edges", a.first_out[n], m));
        }
        if a.first_in.len() != n || a.positions.len() != n {
            return fail(format!(
                "{} vertices but first_in has {} and positions has {} records",
                n,
                a.first_in.len(),
                a.positions.len()
            ));
        }
        if a.next_in.len() != m {
            return fail(format!("next_in has {} records, expected {}", a.next_in.len(), m));
        }
        if a.first_in.iter().any(|&e| e != NO_EDGE && e as usize >= m)
            || a.next_in.iter().any(|&e| e as usize >= m)
        {
            return fail("in-edge chain points past the edge array".into());
        }
        if a.step_offsets.len() != m + 1
            || a.step_offsets.windows(2).any(|w| w[0] > w[1])
            || a.step_offsets[m] as usize != a.steps.len()
        {
            return fail("step_offsets do not describe steps.bytes".into());
        }
        if a.vertex_access.len() != TRANSPORT_COUNT
            || a.edge_access.len() != TRANSPORT_COUNT
            || a.weights.len() != METRIC_COUNT * TRANSPORT_COUNT
        {
            return fail("per-mode array set is incomplete".into());
        }
        if a.vertex_access.iter().any(|b| b.capacity() < n)
            || a.edge_access.iter().any(|b| b.capacity() < m)
            || a.oneway.capacity() < m
        {
            return fail("bit-vector shorter than its index space".into());
        }
        if a.weights.iter().any(|w| w.len() != m) {
            return fail("weight array length differs from edge count".into());
        }

        Ok(Self { source, a })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.a.first_out.len() - 1
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.a.endpoints.len()
    }

    /// The endpoint of `e` that is not `v`
    #[inline]
    pub fn edge_opposite(&self, e: u32, v: u32) -> u32 {
        self.a.endpoints[e as usize] ^ v
    }

    #[inline]
    pub fn first_out(&self, v: u32) -> u32 {
        self.a.first_out[v as usize]
    }

    #[inline]
    pub fn out_edges(&self, v: u32) -> Range<u32> {
        self.a.first_out[v as usize]..self.a.first_out[v as usize + 1]
    }

    /// Whether `v` is the storage start of `e`
    #[inline]
    pub fn is_tail(&self, e: u32, v: u32) -> bool {
        self.out_edges(v).contains(&e)
    }

    pub fn in_edges(&self, v: u32) -> InEdges<'_> {
        InEdges {
            next_in: &self.a.next_in,
            cursor: self.a.first_in[v as usize],
            remaining: self.a.next_in.len(),
        }
    }

    /// Edges usable from `v` in the given search direction
    pub fn vertex_edges(&self, v: u32, forward: bool, transport: Transport) -> VertexEdges<'_> {
        VertexEdges {
            graph: self,
            vertex: v,
            forward,
            transport,
            out: self.out_edges(v),
            inn: self.in_edges(v),
        }
    }

    /// Append the darts of `v` to `out`
    pub fn neighbors(
        &self,
        v: u32,
        forward: bool,
        transport: Transport,
        metric: Metric,
        out: &mut Vec<Dart>,
    ) {
        out.extend(self.vertex_edges(v, forward, transport).map(|inc| Dart {
            vertex: inc.neighbor,
            weight: self.edge_weight(inc.edge, transport, metric),
        }));
    }

    /// Cheapest edge traversable from `u` to `w`
    pub fn edge_between(
        &self,
        u: u32,
        w: u32,
        transport: Transport,
        metric: Metric,
    ) -> Option<(u32, f32)> {
        let mut best: Option<(u32, f32)> = None;
        for inc in self.vertex_edges(u, true, transport) {
            if inc.neighbor != w {
                continue;
            }
            let weight = self.edge_weight(inc.edge, transport, metric);
            if best.map_or(true, |(_, b)| weight < b) {
                best = Some((inc.edge, weight));
            }
        }
        best
    }

    #[inline]
    pub fn edge_weight(&self, e: u32, transport: Transport, metric: Metric) -> f32 {
        half::decode(self.a.weights[weight_slot(metric, transport)][e as usize])
    }

    #[inline]
    pub fn position(&self, v: u32) -> Coord {
        self.a.positions[v as usize]
    }

    #[inline]
    pub fn vertex_accessible(&self, v: u32, transport: Transport) -> bool {
        self.a.vertex_access[transport.index()].get(v as usize)
    }

    #[inline]
    pub fn edge_accessible(&self, e: u32, transport: Transport) -> bool {
        self.a.edge_access[transport.index()].get(e as usize)
    }

    #[inline]
    pub fn is_oneway(&self, e: u32) -> bool {
        self.a.oneway.get(e as usize)
    }

    #[inline]
    fn admits(&self, e: u32, transport: Transport, natural: bool) -> bool {
        self.edge_accessible(e, transport) && (natural || !self.is_oneway(e))
    }

    /// Interior polyline points of `e`, ordered as seen when leaving `from`
    pub fn edge_steps(&self, e: u32, from: u32) -> Vec<Coord> {
        let reversed = !self.is_tail(e, from);
        let tail = if reversed { self.edge_opposite(e, from) } else { from };

        let mut points: Vec<Coord> = PolylineDecoder::new(self.position(tail), self.step_bytes(e)).collect();
        if reversed {
            points.reverse();
        }
        points
    }

    fn step_bytes(&self, e: u32) -> &[u8] {
        let lo = self.a.step_offsets[e as usize] as usize;
        let hi = self.a.step_offsets[e as usize + 1] as usize;
        &self.a.steps[lo..hi]
    }
}

impl std::fmt::Debug for PartitionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionGraph")
            .field("source", &self.source)
            .field("vertices", &self.vertex_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

/// In-edges of one vertex, following the `next_in` chain.
///
/// Finite and non-restartable: it yields each chain edge once and is spent.
/// A chain longer than the edge array can only come from a corrupt store.
pub struct InEdges<'a> {
    next_in: &'a [u32],
    cursor: u32,
    remaining: usize,
}

impl Iterator for InEdges<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.cursor == NO_EDGE {
            return None;
        }
        assert!(self.remaining > 0, "next_in chain does not terminate");
        self.remaining -= 1;

        let e = self.cursor;
        let next = self.next_in[e as usize];
        self.cursor = if next == e { NO_EDGE } else { next };
        Some(e)
    }
}

/// Accessible edges of a vertex for one search direction
pub struct VertexEdges<'a> {
    graph: &'a PartitionGraph,
    vertex: u32,
    forward: bool,
    transport: Transport,
    out: Range<u32>,
    inn: InEdges<'a>,
}

impl Iterator for VertexEdges<'_> {
    type Item = Incident;

    fn next(&mut self) -> Option<Incident> {
        for e in self.out.by_ref() {
            if self.graph.admits(e, self.transport, self.forward) {
                return Some(Incident {
                    edge: e,
                    neighbor: self.graph.edge_opposite(e, self.vertex),
                });
            }
        }
        for e in self.inn.by_ref() {
            if self.graph.admits(e, self.transport, !self.forward) {
                return Some(Incident {
                    edge: e,
                    neighbor: self.graph.edge_opposite(e, self.vertex),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{EdgeSpec, GraphBuilder};

    fn diamond() -> PartitionGraph {
        // 0 -> 1 (oneway), 0 - 2, 1 - 3, 2 - 3 (car-forbidden)
        let positions = vec![
            Coord::from_degrees(0.0, 0.0),
            Coord::from_degrees(0.0, 0.001),
            Coord::from_degrees(0.001, 0.0),
            Coord::from_degrees(0.001, 0.001),
        ];
        let edges = vec![
            EdgeSpec::new(0, 1).with_distance(3.0).oneway(),
            EdgeSpec::new(0, 2).with_distance(2.0),
            EdgeSpec::new(1, 3)
                .with_distance(4.0)
                .with_steps(vec![Coord::from_degrees(0.0004, 0.0011), Coord::from_degrees(0.0007, 0.0012)]),
            EdgeSpec::new(2, 3).with_distance(6.0).with_access(Transport::Car, false),
        ];
        GraphBuilder::new(positions).edges(&edges).into_graph().unwrap()
    }

    fn neighbors(g: &PartitionGraph, v: u32, forward: bool, t: Transport) -> Vec<u32> {
        let mut out: Vec<u32> = g.vertex_edges(v, forward, t).map(|i| i.neighbor).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_edge_opposite_round_trip() {
        let g = diamond();
        for v in 0..g.vertex_count() as u32 {
            let incident: Vec<u32> = g.out_edges(v).chain(g.in_edges(v)).collect();
            for e in incident {
                let other = g.edge_opposite(e, v);
                assert_ne!(other, v);
                assert_eq!(g.edge_opposite(e, other), v);
            }
        }
    }

    #[test]
    fn test_in_chain_covers_every_edge_once() {
        let g = diamond();
        let mut seen = vec![0; g.edge_count()];
        for v in 0..g.vertex_count() as u32 {
            for e in g.in_edges(v) {
                seen[e as usize] += 1;
                assert!(!g.is_tail(e, v));
            }
        }
        assert!(seen.iter().all(|&c| c == 1), "{:?}", seen);
    }

    #[test]
    fn test_oneway_direction() {
        let g = diamond();
        assert_eq!(neighbors(&g, 0, true, Transport::Foot), vec![1, 2]);
        // 1 -> 0 is against the oneway
        assert_eq!(neighbors(&g, 1, true, Transport::Foot), vec![3]);
        // Backward from 1: only 0 reaches it, and 3
        assert_eq!(neighbors(&g, 1, false, Transport::Foot), vec![0, 3]);
        assert_eq!(neighbors(&g, 0, false, Transport::Foot), vec![2]);
    }

    #[test]
    fn test_transport_access() {
        let g = diamond();
        assert_eq!(neighbors(&g, 3, true, Transport::Foot), vec![1, 2]);
        assert_eq!(neighbors(&g, 3, true, Transport::Car), vec![1]);
    }

    #[test]
    fn test_weights() {
        let g = diamond();
        let (e, w) = g.edge_between(0, 2, Transport::Car, Metric::Distance).unwrap();
        assert_eq!(w, 2.0);
        assert!(g.is_tail(e, 0));
        assert!(g.edge_between(1, 0, Transport::Car, Metric::Distance).is_none());
        // Duration defaults from the per-mode speed
        let foot = g.edge_weight(e, Transport::Foot, Metric::Duration);
        assert!((foot - 2.0 / (5.0 / 3.6)).abs() < 0.01, "{}", foot);
    }

    #[test]
    fn test_edge_steps_reverse_from_head() {
        let g = diamond();
        let (e, _) = g.edge_between(1, 3, Transport::Car, Metric::Distance).unwrap();
        let from_tail = g.edge_steps(e, 1);
        let from_head = g.edge_steps(e, 3);

        assert_eq!(from_tail.len(), 2);
        assert_eq!(from_tail[0], Coord::from_degrees(0.0004, 0.0011));
        let mut reversed = from_head.clone();
        reversed.reverse();
        assert_eq!(reversed, from_tail);
    }

    #[test]
    fn test_rejects_inconsistent_arrays() {
        let positions = vec![Coord::default(); 2];
        let mut data = GraphBuilder::new(positions).edges(&[EdgeSpec::new(0, 1)]).finish().unwrap();
        data.first_out[2] = 5;
        assert!(matches!(PartitionGraph::from_data(data), Err(StoreError::Malformed { .. })));
    }
}
