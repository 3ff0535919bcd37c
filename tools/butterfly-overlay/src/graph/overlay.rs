//! Overlay graph over the boundary vertices of every cluster
//!
//! Boundary vertices are grouped by cluster: cluster `p` owns overlay ids
//! `cluster_offsets[p]..cluster_offsets[p + 1]`, and the same vertices are
//! local ids `0..cluster_size(p)` of partition `p`, in the same order.
//!
//! Overlay edges are either cut edges (endpoints in different clusters) or
//! shortcuts (endpoints in the same cluster) that stand for a path inside
//! that cluster.

use butterfly_io::MappedVec;
use std::ops::Deref;
use std::path::Path;

use crate::error::StoreError;

use super::layout::{GraphData, CLUSTER_OFFSETS};
use super::PartitionGraph;

#[derive(Debug)]
pub struct OverlayGraph {
    graph: PartitionGraph,
    cluster_offsets: MappedVec<u32>,
}

impl OverlayGraph {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let graph = PartitionGraph::open(dir)?;
        let cluster_offsets = MappedVec::open(dir.join(CLUSTER_OFFSETS))?;
        Self::validated(graph, cluster_offsets)
    }

    pub fn from_data(data: GraphData, cluster_offsets: Vec<u32>) -> Result<Self, StoreError> {
        let graph = PartitionGraph::from_data(data)?;
        Self::validated(graph, MappedVec::from_vec(cluster_offsets))
    }

    fn validated(graph: PartitionGraph, cluster_offsets: MappedVec<u32>) -> Result<Self, StoreError> {
        let path = graph.source().to_path_buf();
        if cluster_offsets.len() < 2 {
            return Err(StoreError::malformed(&path, "cluster_offsets needs at least one cluster"));
        }
        if cluster_offsets[0] != 0 || cluster_offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(StoreError::malformed(&path, "cluster_offsets is not monotone from 0"));
        }
        let last = cluster_offsets[cluster_offsets.len() - 1] as usize;
        if last != graph.vertex_count() {
            return Err(StoreError::malformed(
                &path,
                format!("cluster_offsets covers {} of {} overlay vertices", last, graph.vertex_count()),
            ));
        }
        Ok(Self {
            graph,
            cluster_offsets,
        })
    }

    pub fn graph(&self) -> &PartitionGraph {
        &self.graph
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_offsets.len() - 1
    }

    /// Number of boundary vertices of cluster `p`
    #[inline]
    pub fn cluster_size(&self, p: u32) -> u32 {
        self.cluster_offsets[p as usize + 1] - self.cluster_offsets[p as usize]
    }

    /// Overlay id of local vertex 0 of cluster `p`
    #[inline]
    pub fn cluster_base(&self, p: u32) -> u32 {
        self.cluster_offsets[p as usize]
    }

    /// Cluster owning overlay vertex `v`
    #[inline]
    pub fn vertex_cluster(&self, v: u32) -> u32 {
        debug_assert!((v as usize) < self.graph.vertex_count());
        (self.cluster_offsets.partition_point(|&o| o <= v) - 1) as u32
    }

    /// Overlay id of boundary vertex `local` of cluster `p`
    #[inline]
    pub fn to_overlay(&self, p: u32, local: u32) -> u32 {
        debug_assert!(local < self.cluster_size(p));
        self.cluster_base(p) + local
    }

    /// (cluster, local id) of overlay vertex `v`
    #[inline]
    pub fn to_local(&self, v: u32) -> (u32, u32) {
        let p = self.vertex_cluster(v);
        (p, v - self.cluster_base(p))
    }

    /// Whether edge `e`, seen from endpoint `from`, summarizes an in-cluster path
    pub fn is_shortcut(&self, e: u32, from: u32) -> bool {
        let to = self.graph.edge_opposite(e, from);
        self.vertex_cluster(from) == self.vertex_cluster(to)
    }
}

impl Deref for OverlayGraph {
    type Target = PartitionGraph;

    fn deref(&self) -> &PartitionGraph {
        &self.graph
    }
}
