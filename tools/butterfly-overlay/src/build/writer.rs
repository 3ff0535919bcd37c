//! Write a partitioned store directory
//!
//! Given a network and a vertex -> cluster assignment (the output of the
//! external min-cut step), writes every `clusterN/`, the `overlay/` with cut
//! edges plus shortcut cliques, their k-d indexes and `bboxes.ftf`.

use butterfly_io::MappedVec;
use rayon::prelude::*;
use std::path::PathBuf;

use crate::error::StoreError;
use crate::geo::{BBox, Coord};
use crate::graph::layout::{cluster_dir, BBOXES, CLUSTER_OFFSETS, OVERLAY_DIR};
use crate::graph::{Dart, PartitionGraph};
use crate::heap::{Color, Heap};
use crate::mode::{weight_slot, Metric, Transport, METRIC_COUNT, TRANSPORT_COUNT};
use crate::spatial::KdTree;

use super::{EdgeSpec, GraphBuilder};

/// Unpartitioned input graph in global vertex ids
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub positions: Vec<Coord>,
    pub edges: Vec<EdgeSpec>,
}

impl Network {
    pub fn new(positions: Vec<Coord>) -> Self {
        Self {
            positions,
            edges: Vec::new(),
        }
    }

    pub fn push(&mut self, edge: EdgeSpec) {
        self.edges.push(edge);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub clusters: usize,
    pub boundary_vertices: usize,
    pub cut_edges: usize,
    pub shortcuts: usize,
}

struct ClusterOutput {
    bbox: BBox,
    shortcuts: Vec<EdgeSpec>,
}

pub struct StoreWriter {
    base: PathBuf,
}

impl StoreWriter {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn write(&self, network: &Network, cluster_of: &[u32]) -> Result<WriteSummary, StoreError> {
        let n = network.vertex_count();
        if n == 0 {
            return Err(StoreError::InvalidNetwork("network has no vertices".into()));
        }
        if cluster_of.len() != n {
            return Err(StoreError::InvalidNetwork(format!(
                "{} cluster assignments for {} vertices",
                cluster_of.len(),
                n
            )));
        }
        let clusters = cluster_of.iter().copied().max().unwrap_or(0) as usize + 1;

        let mut boundary = vec![false; n];
        for (i, e) in network.edges.iter().enumerate() {
            if e.from as usize >= n || e.to as usize >= n {
                return Err(StoreError::InvalidNetwork(format!("edge {} references a missing vertex", i)));
            }
            if cluster_of[e.from as usize] != cluster_of[e.to as usize] {
                boundary[e.from as usize] = true;
                boundary[e.to as usize] = true;
            }
        }

        // Local order: boundary vertices first, each group by global id
        let mut members: Vec<Vec<u32>> = vec![Vec::new(); clusters];
        let mut boundary_count = vec![0u32; clusters];
        for v in 0..n {
            if boundary[v] {
                members[cluster_of[v] as usize].push(v as u32);
                boundary_count[cluster_of[v] as usize] += 1;
            }
        }
        for v in 0..n {
            if !boundary[v] {
                members[cluster_of[v] as usize].push(v as u32);
            }
        }
        if let Some(c) = members.iter().position(|m| m.is_empty()) {
            return Err(StoreError::InvalidNetwork(format!("cluster {} has no vertices", c)));
        }

        let mut local = vec![0u32; n];
        for m in &members {
            for (i, &v) in m.iter().enumerate() {
                local[v as usize] = i as u32;
            }
        }
        let mut cluster_offsets = Vec::with_capacity(clusters + 1);
        cluster_offsets.push(0u32);
        for &b in &boundary_count {
            cluster_offsets.push(cluster_offsets[cluster_offsets.len() - 1] + b);
        }
        let overlay_id = |v: u32| cluster_offsets[cluster_of[v as usize] as usize] + local[v as usize];

        let mut part_edges: Vec<Vec<EdgeSpec>> = vec![Vec::new(); clusters];
        let mut overlay_edges = Vec::new();
        for e in &network.edges {
            let (cf, ct) = (cluster_of[e.from as usize], cluster_of[e.to as usize]);
            let mut mapped = e.clone();
            if cf == ct {
                mapped.from = local[e.from as usize];
                mapped.to = local[e.to as usize];
                part_edges[cf as usize].push(mapped);
            } else {
                mapped.from = overlay_id(e.from);
                mapped.to = overlay_id(e.to);
                overlay_edges.push(mapped);
            }
        }
        let cut_edges = overlay_edges.len();

        std::fs::create_dir_all(&self.base).map_err(|source| butterfly_io::Error::Io {
            path: self.base.clone(),
            source,
        })?;

        let outputs = (0..clusters)
            .into_par_iter()
            .map(|c| {
                let positions = members[c].iter().map(|&v| network.positions[v as usize]).collect();
                self.write_cluster(c as u32, positions, &part_edges[c], boundary_count[c], cluster_offsets[c])
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut bboxes = Vec::with_capacity(clusters);
        let mut shortcuts = 0;
        for out in outputs {
            bboxes.push(out.bbox);
            shortcuts += out.shortcuts.len();
            overlay_edges.extend(out.shortcuts);
        }

        let mut overlay_positions = Vec::with_capacity(cluster_offsets[clusters] as usize);
        for (c, m) in members.iter().enumerate() {
            overlay_positions.extend(m[..boundary_count[c] as usize].iter().map(|&v| network.positions[v as usize]));
        }

        let dir = self.base.join(OVERLAY_DIR);
        let data = GraphBuilder::new(overlay_positions).edges(&overlay_edges).finish()?;
        data.write(&dir)?;
        MappedVec::write(dir.join(CLUSTER_OFFSETS), &cluster_offsets)?;
        let overlay = PartitionGraph::from_data(data)?;
        KdTree::for_graph(&overlay)?.write(&dir)?;

        MappedVec::write(self.base.join(BBOXES), &bboxes)?;

        let summary = WriteSummary {
            clusters,
            boundary_vertices: overlay.vertex_count(),
            cut_edges,
            shortcuts,
        };
        tracing::info!(
            base = %self.base.display(),
            clusters,
            boundary = summary.boundary_vertices,
            cut_edges,
            shortcuts,
            "store written"
        );
        Ok(summary)
    }

    fn write_cluster(
        &self,
        cluster: u32,
        positions: Vec<Coord>,
        edges: &[EdgeSpec],
        boundary: u32,
        base: u32,
    ) -> Result<ClusterOutput, StoreError> {
        let dir = self.base.join(cluster_dir(cluster));
        let data = GraphBuilder::new(positions).edges(edges).finish()?;
        data.write(&dir)?;
        let graph = PartitionGraph::from_data(data)?;
        KdTree::for_graph(&graph)?.write(&dir)?;

        let bbox = bounding_box(&graph);
        let shortcuts = shortcut_clique(&graph, boundary, base);
        tracing::debug!(
            cluster,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            boundary,
            shortcuts = shortcuts.len(),
            "cluster written"
        );
        Ok(ClusterOutput { bbox, shortcuts })
    }
}

fn bounding_box(graph: &PartitionGraph) -> BBox {
    let mut bbox = BBox::empty();
    for v in 0..graph.vertex_count() as u32 {
        bbox.extend(graph.position(v));
        for e in graph.out_edges(v) {
            for p in graph.edge_steps(e, v) {
                bbox.extend(p);
            }
        }
    }
    bbox
}

/// One oneway overlay edge per ordered pair of boundary vertices connected
/// inside the cluster, weighted per metric and transport.
fn shortcut_clique(graph: &PartitionGraph, boundary: u32, base: u32) -> Vec<EdgeSpec> {
    let mut heap = Heap::new();
    let mut dist = Vec::new();
    let mut darts = Vec::new();
    let mut out = Vec::new();

    for a in 0..boundary {
        let mut rows = vec![[f32::INFINITY; METRIC_COUNT * TRANSPORT_COUNT]; boundary as usize];
        for &metric in Metric::all() {
            for &t in Transport::all() {
                one_to_all(graph, a, boundary, t, metric, &mut heap, &mut dist, &mut darts);
                for b in 0..boundary as usize {
                    rows[b][weight_slot(metric, t)] = dist[b];
                }
            }
        }

        for b in 0..boundary {
            if b == a {
                continue;
            }
            let row = rows[b as usize];
            let mut edge = EdgeSpec::new(base + a, base + b).oneway().with_weights(row);
            for &t in Transport::all() {
                edge = edge.with_access(t, row[weight_slot(Metric::Distance, t)].is_finite());
            }
            if edge.access.iter().any(|&allowed| allowed) {
                out.push(edge);
            }
        }
    }
    out
}

/// Dijkstra from `source`, stopping once every boundary vertex is settled
#[allow(clippy::too_many_arguments)]
fn one_to_all(
    graph: &PartitionGraph,
    source: u32,
    boundary: u32,
    transport: Transport,
    metric: Metric,
    heap: &mut Heap,
    dist: &mut Vec<f32>,
    darts: &mut Vec<Dart>,
) {
    let n = graph.vertex_count();
    heap.reset(n);
    dist.clear();
    dist.resize(n, f32::INFINITY);

    heap.push(source, 0.0);
    dist[source as usize] = 0.0;
    let mut pending = boundary;

    while let Some((v, d)) = heap.pop() {
        if v < boundary {
            pending -= 1;
            if pending == 0 {
                break;
            }
        }
        darts.clear();
        graph.neighbors(v, true, transport, metric, darts);
        for dart in darts.iter() {
            if !dart.weight.is_finite() {
                continue;
            }
            let nd = d + dart.weight;
            let improved = match heap.color(dart.vertex) {
                Color::Unvisited => {
                    heap.push(dart.vertex, nd);
                    true
                }
                Color::Frontier => heap.update(dart.vertex, nd),
                Color::Settled => false,
            };
            if improved {
                dist[dart.vertex as usize] = nd;
            }
        }
    }
}
