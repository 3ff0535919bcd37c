//! Implicit k-d tree over vertices and edge-interior points
//!
//! The node of range `lo..hi` sits at `mid = lo + (hi - lo) / 2`; its left
//! subtree is `lo..mid` and its right subtree `mid + 1..hi`. Latitude splits
//! even levels and longitude odd ones. Entries are bit-packed and a parallel
//! coordinate array keeps comparisons off the graph arrays.

use butterfly_io::MappedVec;
use std::path::Path;

use crate::error::StoreError;
use crate::geo::Coord;
use crate::graph::layout::{KD_COORDS, KD_ENTRIES};
use crate::graph::PartitionGraph;
use crate::mode::Transport;

/// `{vertex:32, edge_offset:16, step_offset:16}`; `step_offset == 0` is the vertex itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedEntry {
    pub vertex: u32,
    pub edge_offset: u16,
    pub step_offset: u16,
}

impl PackedEntry {
    pub fn vertex(vertex: u32) -> Self {
        Self {
            vertex,
            edge_offset: 0,
            step_offset: 0,
        }
    }

    #[inline]
    pub fn pack(self) -> u64 {
        ((self.vertex as u64) << 32) | ((self.edge_offset as u64) << 16) | self.step_offset as u64
    }

    #[inline]
    pub fn unpack(bits: u64) -> Self {
        Self {
            vertex: (bits >> 32) as u32,
            edge_offset: (bits >> 16) as u16,
            step_offset: bits as u16,
        }
    }

    #[inline]
    pub fn is_vertex(&self) -> bool {
        self.step_offset == 0
    }

    /// Edge id of an edge-interior entry
    #[inline]
    pub fn edge(&self, graph: &PartitionGraph) -> Option<u32> {
        (!self.is_vertex()).then(|| graph.first_out(self.vertex) + self.edge_offset as u32)
    }

    /// Whether the entry is usable for `transport`
    pub fn accessible(&self, graph: &PartitionGraph, transport: Transport) -> bool {
        match self.edge(graph) {
            None => graph.vertex_accessible(self.vertex, transport),
            Some(e) => graph.edge_accessible(e, transport),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub entry: PackedEntry,
    pub position: Coord,
    pub dist2: u64,
}

#[derive(Debug)]
pub struct KdTree {
    entries: MappedVec<u64>,
    coords: MappedVec<Coord>,
}

impl KdTree {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let entries = MappedVec::open(dir.join(KD_ENTRIES))?;
        let coords: MappedVec<Coord> = MappedVec::open(dir.join(KD_COORDS))?;
        if entries.len() != coords.len() {
            return Err(StoreError::malformed(
                dir,
                format!("k-d tree has {} entries but {} coordinates", entries.len(), coords.len()),
            ));
        }
        Ok(Self { entries, coords })
    }

    pub fn write(&self, dir: &Path) -> Result<(), StoreError> {
        MappedVec::write(dir.join(KD_ENTRIES), &self.entries)?;
        MappedVec::write(dir.join(KD_COORDS), &self.coords)?;
        Ok(())
    }

    /// Arrange `(position, packed entry)` pairs into implicit tree order
    pub fn build(mut points: Vec<(Coord, u64)>) -> Self {
        arrange(&mut points, 0);
        let (coords, entries) = points.into_iter().unzip();
        Self {
            entries: MappedVec::from_vec(entries),
            coords: MappedVec::from_vec(coords),
        }
    }

    /// Index every vertex and every interior step of `graph`
    pub fn for_graph(graph: &PartitionGraph) -> Result<Self, StoreError> {
        let mut points = Vec::with_capacity(graph.vertex_count() + graph.edge_count());
        for v in 0..graph.vertex_count() as u32 {
            points.push((graph.position(v), PackedEntry::vertex(v).pack()));

            let row = graph.out_edges(v);
            if row.len() > u16::MAX as usize + 1 {
                return Err(StoreError::InvalidNetwork(format!("vertex {} has {} out-edges", v, row.len())));
            }
            for e in row.clone() {
                let steps = graph.edge_steps(e, v);
                if steps.len() >= u16::MAX as usize {
                    return Err(StoreError::InvalidNetwork(format!("edge {} has {} steps", e, steps.len())));
                }
                for (k, p) in steps.into_iter().enumerate() {
                    let entry = PackedEntry {
                        vertex: v,
                        edge_offset: (e - row.start) as u16,
                        step_offset: k as u16 + 1,
                    };
                    points.push((p, entry.pack()));
                }
            }
        }
        Ok(Self::build(points))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest entry to `q` among those `accept` admits.
    /// Rejected entries are skipped as results but their subtrees are still searched.
    pub fn nearest<F>(&self, q: Coord, accept: F) -> Option<Hit>
    where
        F: Fn(PackedEntry) -> bool,
    {
        let mut best: Option<(usize, u64)> = None;
        self.search(0, self.len(), 0, q, &accept, &mut best);
        best.map(|(i, dist2)| Hit {
            entry: PackedEntry::unpack(self.entries[i]),
            position: self.coords[i],
            dist2,
        })
    }

    fn search<F>(&self, lo: usize, hi: usize, depth: usize, q: Coord, accept: &F, best: &mut Option<(usize, u64)>)
    where
        F: Fn(PackedEntry) -> bool,
    {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let pivot = self.coords[mid];

        let d2 = pivot.dist2(&q);
        if best.map_or(true, |(_, b)| d2 < b) && accept(PackedEntry::unpack(self.entries[mid])) {
            *best = Some((mid, d2));
        }

        let diff = q.axis(depth) as i64 - pivot.axis(depth) as i64;
        if diff == 0 {
            // equal keys can sit on either side of the median
            self.search(lo, mid, depth + 1, q, accept, best);
            self.search(mid + 1, hi, depth + 1, q, accept, best);
            return;
        }

        let (near, far) = if diff < 0 { ((lo, mid), (mid + 1, hi)) } else { ((mid + 1, hi), (lo, mid)) };
        self.search(near.0, near.1, depth + 1, q, accept, best);
        let plane = diff.unsigned_abs().pow(2);
        if best.map_or(true, |(_, b)| plane < b) {
            self.search(far.0, far.1, depth + 1, q, accept, best);
        }
    }
}

fn arrange(points: &mut [(Coord, u64)], depth: usize) {
    if points.len() <= 1 {
        return;
    }
    let mid = points.len() / 2;
    points.select_nth_unstable_by_key(mid, |p| p.0.axis(depth));
    let (left, rest) = points.split_at_mut(mid);
    arrange(left, depth + 1);
    arrange(&mut rest[1..], depth + 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{EdgeSpec, GraphBuilder};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn tree_of(coords: &[Coord]) -> KdTree {
        let points = coords.iter().enumerate().map(|(i, &c)| (c, PackedEntry::vertex(i as u32).pack())).collect();
        KdTree::build(points)
    }

    fn linear_scan(coords: &[Coord], q: Coord) -> u64 {
        coords.iter().map(|c| c.dist2(&q)).min().unwrap()
    }

    #[test]
    fn test_pack_round_trip() {
        let e = PackedEntry {
            vertex: 0xdead_beef,
            edge_offset: 0x1234,
            step_offset: 0xfffe,
        };
        assert_eq!(PackedEntry::unpack(e.pack()), e);
    }

    #[test]
    fn test_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..30 {
            let n = rng.random_range(1..400);
            let coords: Vec<Coord> = (0..n)
                .map(|_| Coord::new(rng.random_range(-10_000..10_000), rng.random_range(-10_000..10_000)))
                .collect();
            let tree = tree_of(&coords);

            for _ in 0..50 {
                let q = Coord::new(rng.random_range(-12_000..12_000), rng.random_range(-12_000..12_000));
                let hit = tree.nearest(q, |_| true).unwrap();
                let expected = linear_scan(&coords, q);
                assert_eq!(hit.dist2, expected);
                // unique minimum: the same index as the scan
                let winners: Vec<usize> = (0..n).filter(|&i| coords[i].dist2(&q) == expected).collect();
                if winners.len() == 1 {
                    assert_eq!(hit.entry.vertex as usize, winners[0]);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_heavy_sets() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..30 {
            let n = rng.random_range(1..200);
            // a 6x6 lattice guarantees many exact duplicates and axis ties
            let coords: Vec<Coord> = (0..n)
                .map(|_| Coord::new(rng.random_range(0..6) * 10, rng.random_range(0..6) * 10))
                .collect();
            let tree = tree_of(&coords);

            for _ in 0..40 {
                let q = if rng.random_bool(0.5) {
                    coords[rng.random_range(0..n)]
                } else {
                    Coord::new(rng.random_range(-5..60), rng.random_range(-5..60))
                };
                let hit = tree.nearest(q, |_| true).unwrap();
                assert_eq!(hit.dist2, linear_scan(&coords, q));
                assert_eq!(coords[hit.entry.vertex as usize].dist2(&q), hit.dist2);
            }
        }
    }

    #[test]
    fn test_queries_across_antimeridian() {
        let coords: Vec<Coord> = [179.7, 179.75, 179.8, 179.85, 179.9]
            .iter()
            .enumerate()
            .map(|(i, &lon)| Coord::from_degrees(-17.0 + i as f64 * 0.1, lon))
            .collect();
        let tree = tree_of(&coords);

        for q in [
            Coord::from_degrees(0.5, -179.9),
            Coord::from_degrees(-17.2, -180.0),
            Coord::from_degrees(90.0, -180.0),
            Coord::from_degrees(-90.0, 180.0),
        ] {
            let hit = tree.nearest(q, |_| true).unwrap();
            assert_eq!(hit.dist2, linear_scan(&coords, q));
        }

        // and the mirrored set, queried from the far side
        let west: Vec<Coord> = coords.iter().map(|c| Coord::new(c.lat, -c.lon)).collect();
        let tree = tree_of(&west);
        let q = Coord::from_degrees(-16.8, 179.95);
        assert_eq!(tree.nearest(q, |_| true).unwrap().dist2, linear_scan(&west, q));
    }

    #[test]
    fn test_exact_duplicate_query() {
        let coords = vec![
            Coord::new(0, 0),
            Coord::new(5, 5),
            Coord::new(10, -3),
            Coord::new(5, 5),
            Coord::new(-7, 2),
        ];
        let tree = tree_of(&coords);
        let hit = tree.nearest(Coord::new(5, 5), |_| true).unwrap();
        assert_eq!(hit.dist2, 0);
        assert!(hit.entry.vertex == 1 || hit.entry.vertex == 3);
    }

    #[test]
    fn test_rejected_entries_are_skipped() {
        let coords = vec![Coord::new(0, 0), Coord::new(1, 1), Coord::new(50, 50), Coord::new(2, 2)];
        let tree = tree_of(&coords);
        let hit = tree.nearest(Coord::new(0, 0), |e| e.vertex != 0 && e.vertex != 1).unwrap();
        assert_eq!(hit.entry.vertex, 3);
        assert!(tree.nearest(Coord::new(0, 0), |_| false).is_none());
    }

    #[test]
    fn test_graph_entries_cover_steps() {
        let positions = vec![Coord::new(0, 0), Coord::new(0, 100), Coord::new(100, 0)];
        let g = GraphBuilder::new(positions)
            .edges(&[
                EdgeSpec::new(0, 1).with_steps(vec![Coord::new(10, 30), Coord::new(10, 60)]),
                EdgeSpec::new(0, 2).with_access(Transport::Car, false),
                EdgeSpec::new(2, 1).with_steps(vec![Coord::new(60, 60)]),
            ])
            .into_graph()
            .unwrap();
        let tree = KdTree::for_graph(&g).unwrap();
        assert_eq!(tree.len(), 3 + 3);

        let hit = tree.nearest(Coord::new(11, 61), |_| true).unwrap();
        assert_eq!(hit.position, Coord::new(10, 60));
        assert_eq!(hit.entry.step_offset, 2);
        let e = hit.entry.edge(&g).unwrap();
        assert_eq!(g.edge_opposite(e, hit.entry.vertex), 1);

        let hit = tree.nearest(Coord::new(60, 58), |_| true).unwrap();
        assert_eq!(hit.entry.vertex, 2);
        assert_eq!(hit.entry.step_offset, 1);
        assert!(hit.entry.accessible(&g, Transport::Car));
    }

    #[test]
    fn test_write_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let tree = tree_of(&[Coord::new(1, 2), Coord::new(3, 4)]);
        tree.write(dir.path()).unwrap();
        let back = KdTree::open(dir.path()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.nearest(Coord::new(3, 3), |_| true).unwrap().position, Coord::new(3, 4));
    }
}
