//! Query session over one store directory
//!
//! Opened once, then shared by reference: everything here is read-only
//! mapped memory, so concurrent queries need no locking.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::StoreError;
use crate::geo::Coord;
use crate::graph::layout::{cluster_dir, OVERLAY_DIR};
use crate::graph::{Graph, OverlayGraph, Owner, PartitionGraph};
use crate::mode::Transport;
use crate::spatial::{Location, SpatialIndex};

#[derive(Debug)]
pub struct Store {
    base: PathBuf,
    overlay: OverlayGraph,
    clusters: Vec<PartitionGraph>,
    spatial: SpatialIndex,
}

impl Store {
    pub fn open(base: &Path) -> Result<Self, StoreError> {
        let start = Instant::now();

        let overlay = OverlayGraph::open(&base.join(OVERLAY_DIR))?;
        tracing::debug!(
            vertices = overlay.vertex_count(),
            edges = overlay.edge_count(),
            clusters = overlay.cluster_count(),
            "overlay mapped"
        );

        let mut clusters = Vec::with_capacity(overlay.cluster_count());
        for c in 0..overlay.cluster_count() as u32 {
            let graph = PartitionGraph::open(&base.join(cluster_dir(c)))?;
            let boundary = overlay.cluster_size(c) as usize;
            if graph.vertex_count() < boundary {
                return Err(StoreError::malformed(
                    graph.source(),
                    format!("{} vertices but {} boundary vertices", graph.vertex_count(), boundary),
                ));
            }
            if (0..boundary as u32).any(|v| graph.position(v) != overlay.position(overlay.to_overlay(c, v))) {
                return Err(StoreError::malformed(
                    graph.source(),
                    "boundary vertices disagree with the overlay",
                ));
            }
            tracing::trace!(cluster = c, vertices = graph.vertex_count(), edges = graph.edge_count(), "cluster mapped");
            clusters.push(graph);
        }

        let spatial = SpatialIndex::open(base, clusters.len())?;

        tracing::info!(
            base = %base.display(),
            clusters = clusters.len(),
            overlay_vertices = overlay.vertex_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store opened"
        );

        Ok(Self {
            base: base.to_path_buf(),
            overlay,
            clusters,
            spatial,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn overlay(&self) -> &OverlayGraph {
        &self.overlay
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn cluster(&self, c: u32) -> &PartitionGraph {
        &self.clusters[c as usize]
    }

    pub fn clusters(&self) -> &[PartitionGraph] {
        &self.clusters
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Graph whose numbering an edge reference uses
    pub fn graph_for(&self, owner: Owner) -> &PartitionGraph {
        match owner {
            Owner::Overlay => self.overlay.graph(),
            Owner::Cluster(c) => self.cluster(c),
        }
    }

    /// Graph a location was snapped in
    pub fn location_graph(&self, loc: &Location) -> &PartitionGraph {
        match loc.cluster {
            None => self.overlay.graph(),
            Some(c) => self.cluster(c),
        }
    }

    /// Whole-partition view, used for shortcut elaboration
    pub fn partition_view(&self, c: u32) -> Graph<'_> {
        Graph::Partition {
            cluster: c,
            graph: self.cluster(c),
        }
    }

    pub fn snap(&self, q: Coord, transport: Transport) -> Option<Location> {
        let loc = self.spatial.nearest(q, transport, &self.overlay, &self.clusters);
        match &loc {
            Some(l) => tracing::debug!(
                lat = q.lat_deg(),
                lon = q.lon_deg(),
                cluster = ?l.cluster,
                vertex = l.vertex,
                step = l.step_offset,
                "snapped"
            ),
            None => tracing::debug!(lat = q.lat_deg(), lon = q.lon_deg(), %transport, "nothing to snap to"),
        }
        loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{grid, StoreWriter};
    use tempfile::TempDir;

    fn grid_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let net = grid::grid(8, 6, grid::DEFAULT_SPACING);
        let clusters = grid::grid_clusters(8, 6, 2, 2);
        StoreWriter::new(dir.path()).write(&net, &clusters).unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_grid_store() {
        let (_dir, store) = grid_store();
        assert_eq!(store.cluster_count(), 4);
        let total: usize = (0..4).map(|c| store.cluster(c).vertex_count() - store.overlay().cluster_size(c) as usize).sum();
        assert_eq!(total + store.overlay().vertex_count(), 48);
    }

    #[test]
    fn test_snap_exact_vertex_in_cluster() {
        let (_dir, store) = grid_store();
        // (1, 1) is interior to cluster 0
        let q = Coord::from_degrees(grid::ORIGIN.0 + 0.001, grid::ORIGIN.1 + 0.001);
        let loc = store.snap(q, Transport::Car).unwrap();
        assert_eq!(loc.position, q);
        assert!(loc.is_vertex());
        assert_eq!(loc.cluster, Some(0));
        assert_eq!(store.location_graph(&loc).position(loc.vertex), q);
    }

    #[test]
    fn test_snap_far_away_falls_back_to_overlay() {
        let (_dir, store) = grid_store();
        let loc = store.snap(Coord::from_degrees(10.0, 10.0), Transport::Foot).unwrap();
        assert_eq!(loc.cluster, None);
    }

    #[test]
    fn test_missing_store_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Store::open(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn test_truncated_bboxes_rejected() {
        let (dir, store) = grid_store();
        drop(store);
        std::fs::write(dir.path().join(crate::graph::layout::BBOXES), [0u8; 16]).unwrap();
        assert!(matches!(Store::open(dir.path()), Err(StoreError::Malformed { .. })));
    }
}
