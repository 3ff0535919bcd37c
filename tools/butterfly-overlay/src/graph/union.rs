//! Query-scoped union of the overlay and up to two partitions
//!
//! Numbering: overlay vertices keep their overlay ids `0..N`. Each selected
//! partition `i` contributes only its internal vertices, at union ids
//! `offset_i..offset_i + internal_i`, with `offset_0 = N` and each following
//! partition placed right after the previous one. A partition's boundary
//! vertices are already overlay vertices and map through the cluster base.

use crate::geo::Coord;
use crate::mode::{Metric, Transport};

use super::{Dart, EdgeRef, Hop, OverlayGraph, Owner, PartitionGraph};

pub const MAX_PARTS: usize = 2;

#[derive(Debug)]
struct Selected<'a> {
    cluster: u32,
    graph: &'a PartitionGraph,
    /// Boundary vertices: local ids `0..boundary`
    boundary: u32,
    /// Overlay id of local vertex 0
    base: u32,
    /// Union id of local vertex `boundary`
    offset: u32,
    internal: u32,
}

#[derive(Debug)]
pub struct UnionGraph<'a> {
    overlay: &'a OverlayGraph,
    parts: Vec<Selected<'a>>,
    vertex_count: u32,
}

impl<'a> UnionGraph<'a> {
    /// Compose the overlay with `(cluster, partition)` pairs
    pub fn new(overlay: &'a OverlayGraph, selected: &[(u32, &'a PartitionGraph)]) -> Self {
        assert!(
            selected.len() <= MAX_PARTS,
            "a union graph holds at most {} partitions, got {}",
            MAX_PARTS,
            selected.len()
        );

        let mut parts: Vec<Selected<'a>> = Vec::with_capacity(selected.len());
        let mut offset = overlay.vertex_count() as u32;
        for &(cluster, graph) in selected {
            assert!(
                (cluster as usize) < overlay.cluster_count(),
                "cluster {} out of range ({} clusters)",
                cluster,
                overlay.cluster_count()
            );
            assert!(
                parts.iter().all(|p| p.cluster != cluster),
                "cluster {} selected twice",
                cluster
            );

            let boundary = overlay.cluster_size(cluster);
            assert!(
                boundary as usize <= graph.vertex_count(),
                "cluster {} has {} boundary vertices but only {} vertices",
                cluster,
                boundary,
                graph.vertex_count()
            );
            let internal = graph.vertex_count() as u32 - boundary;

            parts.push(Selected {
                cluster,
                graph,
                boundary,
                base: overlay.cluster_base(cluster),
                offset,
                internal,
            });
            offset += internal;
        }

        Self {
            overlay,
            parts,
            vertex_count: offset,
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count as usize
    }

    pub fn overlay(&self) -> &'a OverlayGraph {
        self.overlay
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Position of `cluster` among the selected partitions
    pub fn part_index(&self, cluster: u32) -> Option<usize> {
        self.parts.iter().position(|p| p.cluster == cluster)
    }

    #[inline]
    fn overlay_len(&self) -> u32 {
        self.overlay.vertex_count() as u32
    }

    /// `None` for overlay vertices, `Some(i)` for vertices internal to part `i`.
    ///
    /// Panics on ids outside the union: the caller composed an inconsistent graph.
    pub fn vertex_to_cluster(&self, v: u32) -> Option<usize> {
        if v < self.overlay_len() {
            return None;
        }
        for (i, p) in self.parts.iter().enumerate() {
            if v >= p.offset && v < p.offset + p.internal {
                return Some(i);
            }
        }
        panic!(
            "union vertex {} is neither overlay nor internal to a selected cluster ({} vertices)",
            v, self.vertex_count
        );
    }

    /// Local id of union vertex `v` in part `i`, if `v` belongs to that partition
    pub fn to_cluster_vertex(&self, v: u32, i: usize) -> Option<u32> {
        let p = &self.parts[i];
        if v < self.overlay_len() {
            (v >= p.base && v < p.base + p.boundary).then(|| v - p.base)
        } else {
            (v >= p.offset && v < p.offset + p.internal).then(|| v - p.offset + p.boundary)
        }
    }

    /// Union id of local vertex `local` of part `i`
    pub fn to_union_vertex(&self, local: u32, i: usize) -> u32 {
        let p = &self.parts[i];
        if local < p.boundary {
            p.base + local
        } else {
            assert!(
                local < p.boundary + p.internal,
                "local vertex {} out of range for cluster {}",
                local,
                p.cluster
            );
            p.offset + (local - p.boundary)
        }
    }

    /// Visit every usable edge of `v` as (edge, owner-local from, union neighbor, weight)
    fn for_each_incident<F>(&self, v: u32, forward: bool, transport: Transport, metric: Metric, mut f: F)
    where
        F: FnMut(EdgeRef, u32, u32, f32),
    {
        match self.vertex_to_cluster(v) {
            None => {
                let overlay = self.overlay.graph();
                for inc in overlay.vertex_edges(v, forward, transport) {
                    let edge = EdgeRef {
                        owner: Owner::Overlay,
                        edge: inc.edge,
                    };
                    f(edge, v, inc.neighbor, overlay.edge_weight(inc.edge, transport, metric));
                }

                let cluster = self.overlay.vertex_cluster(v);
                if let Some(i) = self.part_index(cluster) {
                    let local = v - self.parts[i].base;
                    self.visit_part(i, local, forward, transport, metric, &mut f);
                }
            }
            Some(i) => {
                let p = &self.parts[i];
                let local = v - p.offset + p.boundary;
                self.visit_part(i, local, forward, transport, metric, &mut f);
            }
        }
    }

    fn visit_part<F>(&self, i: usize, local: u32, forward: bool, transport: Transport, metric: Metric, f: &mut F)
    where
        F: FnMut(EdgeRef, u32, u32, f32),
    {
        let p = &self.parts[i];
        for inc in p.graph.vertex_edges(local, forward, transport) {
            let edge = EdgeRef {
                owner: Owner::Cluster(p.cluster),
                edge: inc.edge,
            };
            let weight = p.graph.edge_weight(inc.edge, transport, metric);
            f(edge, local, self.to_union_vertex(inc.neighbor, i), weight);
        }
    }

    pub fn neighbors(&self, v: u32, forward: bool, transport: Transport, metric: Metric, out: &mut Vec<Dart>) {
        self.for_each_incident(v, forward, transport, metric, |_, _, vertex, weight| {
            out.push(Dart { vertex, weight });
        });
    }

    /// Cheapest edge from `u` to `w`; on equal weight a partition edge wins
    /// over an overlay edge, so shortcuts are only chosen when they save something.
    pub fn edge_between(&self, u: u32, w: u32, transport: Transport, metric: Metric) -> Option<Hop> {
        let mut best: Option<Hop> = None;
        self.for_each_incident(u, true, transport, metric, |edge, from, neighbor, weight| {
            if neighbor != w {
                return;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    weight < b.weight
                        || (weight == b.weight
                            && b.edge.owner == Owner::Overlay
                            && edge.owner != Owner::Overlay)
                }
            };
            if better {
                best = Some(Hop { edge, from, weight });
            }
        });
        best
    }

    pub fn position(&self, v: u32) -> Coord {
        match self.vertex_to_cluster(v) {
            None => self.overlay.position(v),
            Some(i) => {
                let p = &self.parts[i];
                p.graph.position(v - p.offset + p.boundary)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{EdgeSpec, GraphBuilder};

    /// Overlay: cluster 0 boundary {0, 1}, cluster 1 boundary {2, 3, 4}
    fn overlay() -> OverlayGraph {
        let positions: Vec<Coord> = (0..5).map(|i| Coord::new(i, 0)).collect();
        let edges = vec![EdgeSpec::new(1, 2).with_distance(10.0), EdgeSpec::new(0, 1).with_distance(50.0).oneway()];
        OverlayGraph::from_data(GraphBuilder::new(positions).edges(&edges).finish().unwrap(), vec![0, 2, 5]).unwrap()
    }

    /// Cluster 0: local 0-1 boundary, 2-4 internal; path 0-2-3-4-1
    fn cluster0() -> PartitionGraph {
        let positions: Vec<Coord> = (0..5).map(|i| Coord::new(i, 100)).collect();
        let edges = vec![
            EdgeSpec::new(0, 2).with_distance(1.0),
            EdgeSpec::new(2, 3).with_distance(1.0),
            EdgeSpec::new(3, 4).with_distance(1.0),
            EdgeSpec::new(4, 1).with_distance(1.0),
        ];
        GraphBuilder::new(positions).edges(&edges).into_graph().unwrap()
    }

    /// Cluster 1: local 0-2 boundary, 3 internal
    fn cluster1() -> PartitionGraph {
        let positions: Vec<Coord> = (0..4).map(|i| Coord::new(i, 200)).collect();
        let edges = vec![EdgeSpec::new(0, 3).with_distance(2.0), EdgeSpec::new(3, 2).with_distance(2.0)];
        GraphBuilder::new(positions).edges(&edges).into_graph().unwrap()
    }

    #[test]
    fn test_internal_vertex_maps_past_overlay() {
        let o = overlay();
        let c0 = cluster0();
        let u = UnionGraph::new(&o, &[(0, &c0)]);

        assert_eq!(u.vertex_count(), 5 + 3);
        assert_eq!(u.vertex_to_cluster(6), Some(0));
        assert_eq!(u.to_cluster_vertex(6, 0), Some(3));
        assert_eq!(u.to_union_vertex(3, 0), 6);
        assert_eq!(u.vertex_to_cluster(4), None);
        assert_eq!(u.to_cluster_vertex(1, 0), Some(1));
        assert_eq!(u.to_cluster_vertex(2, 0), None);
    }

    #[test]
    fn test_bijection_with_two_parts() {
        let o = overlay();
        let c0 = cluster0();
        let c1 = cluster1();
        let u = UnionGraph::new(&o, &[(1, &c1), (0, &c0)]);
        assert_eq!(u.vertex_count(), 5 + 1 + 3);

        for v in 0..u.vertex_count() as u32 {
            let mut owners = 0;
            for i in 0..u.part_count() {
                if let Some(local) = u.to_cluster_vertex(v, i) {
                    assert_eq!(u.to_union_vertex(local, i), v, "v={} part={}", v, i);
                    owners += 1;
                }
            }
            // Every vertex belongs to exactly one selected partition here
            assert_eq!(owners, 1, "v={}", v);
        }
    }

    #[test]
    #[should_panic(expected = "neither overlay nor internal")]
    fn test_unclassifiable_vertex_is_fatal() {
        let o = overlay();
        let c0 = cluster0();
        let u = UnionGraph::new(&o, &[(0, &c0)]);
        u.vertex_to_cluster(8);
    }

    #[test]
    fn test_boundary_vertex_merges_overlay_and_partition_edges() {
        let o = overlay();
        let c0 = cluster0();
        let u = UnionGraph::new(&o, &[(0, &c0)]);

        let mut darts = Vec::new();
        u.neighbors(1, true, Transport::Car, Metric::Distance, &mut darts);
        let mut targets: Vec<u32> = darts.iter().map(|d| d.vertex).collect();
        targets.sort_unstable();
        // overlay edge 1-2, partition edge 1-4 (local 4 -> union 7)
        assert_eq!(targets, vec![2, 7]);

        darts.clear();
        u.neighbors(5, true, Transport::Car, Metric::Distance, &mut darts);
        let mut targets: Vec<u32> = darts.iter().map(|d| d.vertex).collect();
        targets.sort_unstable();
        // local 2 touches local 0 (overlay 0) and local 3 (union 6)
        assert_eq!(targets, vec![0, 6]);
    }

    #[test]
    fn test_edge_between_resolves_owner() {
        let o = overlay();
        let c0 = cluster0();
        let u = UnionGraph::new(&o, &[(0, &c0)]);

        let hop = u.edge_between(0, 1, Transport::Car, Metric::Distance).unwrap();
        assert_eq!(hop.edge.owner, Owner::Overlay);
        assert_eq!(hop.weight, 50.0);

        let hop = u.edge_between(6, 7, Transport::Car, Metric::Distance).unwrap();
        assert_eq!(hop.edge.owner, Owner::Cluster(0));
        assert_eq!(hop.from, 3);
        assert_eq!(u.position(7), Coord::new(4, 100));
    }
}
