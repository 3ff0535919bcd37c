//! Snapping coordinates onto the partitioned graph
//!
//! The overlay index is always probed; a partition index is probed only when
//! the partition's bounding box contains the query point. The closest
//! accessible hit across all probed indexes wins.

mod kdtree;
mod location;

pub use kdtree::{Hit, KdTree, PackedEntry};
pub use location::{Location, Way};

use butterfly_io::MappedVec;
use std::path::Path;

use crate::error::StoreError;
use crate::geo::{BBox, Coord};
use crate::graph::layout::{cluster_dir, BBOXES, OVERLAY_DIR};
use crate::graph::{OverlayGraph, PartitionGraph};
use crate::mode::Transport;

#[derive(Debug)]
pub struct SpatialIndex {
    overlay: KdTree,
    clusters: Vec<KdTree>,
    bboxes: MappedVec<BBox>,
}

impl SpatialIndex {
    pub fn open(base: &Path, cluster_count: usize) -> Result<Self, StoreError> {
        let bboxes: MappedVec<BBox> = MappedVec::open(base.join(BBOXES))?;
        if bboxes.len() != cluster_count {
            return Err(StoreError::malformed(
                base,
                format!("{} has {} boxes for {} clusters", BBOXES, bboxes.len(), cluster_count),
            ));
        }
        let overlay = KdTree::open(&base.join(OVERLAY_DIR))?;
        let clusters = (0..cluster_count as u32)
            .map(|c| KdTree::open(&base.join(cluster_dir(c))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            overlay,
            clusters,
            bboxes,
        })
    }

    pub fn bbox(&self, cluster: u32) -> BBox {
        self.bboxes[cluster as usize]
    }

    /// Clusters whose bounding box contains `q`
    pub fn candidates(&self, q: Coord) -> impl Iterator<Item = u32> + '_ {
        self.bboxes
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.contains(q))
            .map(|(c, _)| c as u32)
    }

    /// Closest location usable by `transport`; `None` only if no probed
    /// index holds a single accessible entry.
    pub fn nearest(
        &self,
        q: Coord,
        transport: Transport,
        overlay: &OverlayGraph,
        clusters: &[PartitionGraph],
    ) -> Option<Location> {
        let mut best: Option<(Hit, Option<u32>)> = self
            .overlay
            .nearest(q, |e| e.accessible(overlay.graph(), transport))
            .map(|hit| (hit, None));

        for c in self.candidates(q) {
            let graph = &clusters[c as usize];
            let Some(hit) = self.clusters[c as usize].nearest(q, |e| e.accessible(graph, transport)) else {
                continue;
            };
            if best.as_ref().map_or(true, |(b, _)| hit.dist2 < b.dist2) {
                best = Some((hit, Some(c)));
            }
        }

        best.map(|(hit, cluster)| Location::new(hit.entry, hit.position, cluster))
    }
}
