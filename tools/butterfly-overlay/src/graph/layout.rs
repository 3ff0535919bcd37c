//! On-disk layout of one graph directory
//!
//! One file per logical array; record counts are implied by file sizes and
//! arrays are correlated by index only.

use std::path::Path;

use butterfly_io::{BitVec, MappedVec};

use crate::error::StoreError;
use crate::geo::Coord;
use crate::mode::{Metric, Transport, METRIC_COUNT, TRANSPORT_COUNT};

pub const FIRST_OUT: &str = "first_out.u32";
pub const FIRST_IN: &str = "first_in.u32";
pub const NEXT_IN: &str = "next_in.u32";
pub const ENDPOINTS: &str = "endpoints.u32";
pub const POSITIONS: &str = "positions.coord";
pub const ONEWAY: &str = "oneway.bits";
pub const STEP_OFFSETS: &str = "step_offsets.u32";
pub const STEPS: &str = "steps.bytes";
pub const CLUSTER_OFFSETS: &str = "cluster_offsets.u32";
pub const KD_ENTRIES: &str = "kdtree.entries";
pub const KD_COORDS: &str = "kdtree.coords";
pub const BBOXES: &str = "bboxes.ftf";
pub const OVERLAY_DIR: &str = "overlay";

/// `first_in` value for a vertex without in-edges
pub const NO_EDGE: u32 = u32::MAX;

pub fn vertex_access_file(t: Transport) -> String {
    format!("access.vertex.{}.bits", t.name())
}

pub fn edge_access_file(t: Transport) -> String {
    format!("access.edge.{}.bits", t.name())
}

pub fn weight_file(m: Metric, t: Transport) -> String {
    format!("weight.{}.{}.f16", m.name(), t.name())
}

/// Directory of cluster `c` (0-based index, 1-based on disk)
pub fn cluster_dir(c: u32) -> String {
    format!("cluster{}", c + 1)
}

/// Owned arrays of one graph, as produced by the store writer.
/// Per-mode vectors are indexed by `Transport::index()`, weights by `weight_slot`.
#[derive(Debug, Clone, Default)]
pub struct GraphData {
    pub first_out: Vec<u32>,
    pub first_in: Vec<u32>,
    pub next_in: Vec<u32>,
    pub endpoints: Vec<u32>,
    pub positions: Vec<Coord>,
    pub vertex_access: Vec<Vec<u64>>,
    pub edge_access: Vec<Vec<u64>>,
    pub oneway: Vec<u64>,
    pub weights: Vec<Vec<u16>>,
    pub step_offsets: Vec<u32>,
    pub steps: Vec<u8>,
}

impl GraphData {
    pub fn write(&self, dir: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(dir).map_err(|source| butterfly_io::Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        MappedVec::write(dir.join(FIRST_OUT), &self.first_out)?;
        MappedVec::write(dir.join(FIRST_IN), &self.first_in)?;
        MappedVec::write(dir.join(NEXT_IN), &self.next_in)?;
        MappedVec::write(dir.join(ENDPOINTS), &self.endpoints)?;
        MappedVec::write(dir.join(POSITIONS), &self.positions)?;
        MappedVec::write(dir.join(ONEWAY), &self.oneway)?;
        MappedVec::write(dir.join(STEP_OFFSETS), &self.step_offsets)?;
        MappedVec::write(dir.join(STEPS), &self.steps)?;

        for &t in Transport::all() {
            MappedVec::write(dir.join(vertex_access_file(t)), &self.vertex_access[t.index()])?;
            MappedVec::write(dir.join(edge_access_file(t)), &self.edge_access[t.index()])?;
        }
        for &m in Metric::all() {
            for &t in Transport::all() {
                let slot = crate::mode::weight_slot(m, t);
                MappedVec::write(dir.join(weight_file(m, t)), &self.weights[slot])?;
            }
        }
        Ok(())
    }
}

/// Mapped (or in-memory) arrays, validated by `PartitionGraph`
pub(crate) struct GraphArrays {
    pub first_out: MappedVec<u32>,
    pub first_in: MappedVec<u32>,
    pub next_in: MappedVec<u32>,
    pub endpoints: MappedVec<u32>,
    pub positions: MappedVec<Coord>,
    pub vertex_access: Vec<BitVec>,
    pub edge_access: Vec<BitVec>,
    pub oneway: BitVec,
    pub weights: Vec<MappedVec<u16>>,
    pub step_offsets: MappedVec<u32>,
    pub steps: MappedVec<u8>,
}

impl GraphArrays {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let mut vertex_access = Vec::with_capacity(TRANSPORT_COUNT);
        let mut edge_access = Vec::with_capacity(TRANSPORT_COUNT);
        for &t in Transport::all() {
            vertex_access.push(BitVec::open(dir.join(vertex_access_file(t)))?);
            edge_access.push(BitVec::open(dir.join(edge_access_file(t)))?);
        }

        let mut weights = Vec::with_capacity(METRIC_COUNT * TRANSPORT_COUNT);
        for &m in Metric::all() {
            for &t in Transport::all() {
                weights.push(MappedVec::open(dir.join(weight_file(m, t)))?);
            }
        }

        Ok(Self {
            first_out: MappedVec::open(dir.join(FIRST_OUT))?,
            first_in: MappedVec::open(dir.join(FIRST_IN))?,
            next_in: MappedVec::open(dir.join(NEXT_IN))?,
            endpoints: MappedVec::open(dir.join(ENDPOINTS))?,
            positions: MappedVec::open(dir.join(POSITIONS))?,
            vertex_access,
            edge_access,
            oneway: BitVec::open(dir.join(ONEWAY))?,
            weights,
            step_offsets: MappedVec::open(dir.join(STEP_OFFSETS))?,
            steps: MappedVec::open(dir.join(STEPS))?,
        })
    }

    pub fn from_data(data: GraphData) -> Self {
        Self {
            first_out: MappedVec::from_vec(data.first_out),
            first_in: MappedVec::from_vec(data.first_in),
            next_in: MappedVec::from_vec(data.next_in),
            endpoints: MappedVec::from_vec(data.endpoints),
            positions: MappedVec::from_vec(data.positions),
            vertex_access: data.vertex_access.into_iter().map(BitVec::from_words).collect(),
            edge_access: data.edge_access.into_iter().map(BitVec::from_words).collect(),
            oneway: BitVec::from_words(data.oneway),
            weights: data.weights.into_iter().map(MappedVec::from_vec).collect(),
            step_offsets: MappedVec::from_vec(data.step_offsets),
            steps: MappedVec::from_vec(data.steps),
        }
    }
}
