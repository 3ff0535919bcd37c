//! Assemble one graph directory from an edge list

use butterfly_io::{bits, Region};

use crate::codec::{half, varint};
use crate::error::StoreError;
use crate::geo::{polyline_length, Coord};
use crate::graph::layout::{GraphData, NO_EDGE};
use crate::graph::PartitionGraph;
use crate::mode::{weight_slot, Metric, Transport, METRIC_COUNT, TRANSPORT_COUNT};

/// One road segment as handed over by the ingestion side
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub from: u32,
    pub to: u32,
    /// Meters; measured along the polyline when absent
    pub distance: Option<f32>,
    pub speed_kmh: [f32; TRANSPORT_COUNT],
    pub access: [bool; TRANSPORT_COUNT],
    /// Traversable only from `from` to `to`
    pub oneway: bool,
    /// Interior polyline points, ordered from `from` to `to`
    pub steps: Vec<Coord>,
    /// Explicit weights by `weight_slot`, bypassing distance and speed
    pub weights: Option<[f32; METRIC_COUNT * TRANSPORT_COUNT]>,
}

impl EdgeSpec {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            from,
            to,
            distance: None,
            speed_kmh: [
                Transport::Car.default_speed_kmh(),
                Transport::Bike.default_speed_kmh(),
                Transport::Foot.default_speed_kmh(),
            ],
            access: [true; TRANSPORT_COUNT],
            oneway: false,
            steps: Vec::new(),
            weights: None,
        }
    }

    pub fn with_distance(mut self, meters: f32) -> Self {
        self.distance = Some(meters);
        self
    }

    pub fn with_access(mut self, transport: Transport, allowed: bool) -> Self {
        self.access[transport.index()] = allowed;
        self
    }

    pub fn oneway(mut self) -> Self {
        self.oneway = true;
        self
    }

    pub fn with_steps(mut self, steps: Vec<Coord>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_weights(mut self, weights: [f32; METRIC_COUNT * TRANSPORT_COUNT]) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Length in meters, given the endpoint positions
    pub fn length(&self, positions: &[Coord]) -> f32 {
        if let Some(d) = self.distance {
            return d;
        }
        let mut points = Vec::with_capacity(self.steps.len() + 2);
        points.push(positions[self.from as usize]);
        points.extend_from_slice(&self.steps);
        points.push(positions[self.to as usize]);
        polyline_length(&points) as f32
    }

    pub fn weight(&self, metric: Metric, transport: Transport, positions: &[Coord]) -> f32 {
        if let Some(w) = &self.weights {
            return w[weight_slot(metric, transport)];
        }
        let length = self.length(positions);
        match metric {
            Metric::Distance => length,
            // seconds
            Metric::Duration => length / (self.speed_kmh[transport.index()] / 3.6),
        }
    }
}

/// Sorts edges into CSR rows by tail and threads the in-edge chains
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    positions: Vec<Coord>,
    edges: Vec<EdgeSpec>,
}

impl GraphBuilder {
    pub fn new(positions: Vec<Coord>) -> Self {
        Self {
            positions,
            edges: Vec::new(),
        }
    }

    pub fn edges(mut self, edges: &[EdgeSpec]) -> Self {
        self.edges.extend_from_slice(edges);
        self
    }

    pub fn push(&mut self, edge: EdgeSpec) {
        self.edges.push(edge);
    }

    pub fn finish(self) -> Result<GraphData, StoreError> {
        let n = self.positions.len();
        let m = self.edges.len();
        if n >= NO_EDGE as usize || m >= NO_EDGE as usize {
            return Err(StoreError::InvalidNetwork(format!("{} vertices / {} edges exceed u32 ids", n, m)));
        }
        for (i, e) in self.edges.iter().enumerate() {
            if e.from as usize >= n || e.to as usize >= n {
                return Err(StoreError::InvalidNetwork(format!(
                    "edge {} ({} -> {}) references a vertex outside 0..{}",
                    i, e.from, e.to, n
                )));
            }
            if e.from == e.to {
                return Err(StoreError::InvalidNetwork(format!("edge {} is a self-loop on {}", i, e.from)));
            }
        }

        // Stable, so parallel edges keep their input order
        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by_key(|&i| self.edges[i].from);

        let mut first_out = vec![0u32; n + 1];
        for e in &self.edges {
            first_out[e.from as usize + 1] += 1;
        }
        for v in 0..n {
            first_out[v + 1] += first_out[v];
        }

        let mut endpoints = Vec::with_capacity(m);
        let mut oneway = Vec::with_capacity(m);
        let mut edge_access = vec![Vec::with_capacity(m); TRANSPORT_COUNT];
        let mut vertex_access = vec![vec![false; n]; TRANSPORT_COUNT];
        let mut weights = vec![Vec::with_capacity(m); METRIC_COUNT * TRANSPORT_COUNT];

        // Polylines are staged in a region, then flattened into steps.bytes
        let mut region = Region::new();
        let mut spans = Vec::with_capacity(m);
        let mut scratch = Vec::new();

        for &i in &order {
            let e = &self.edges[i];
            endpoints.push(e.from ^ e.to);
            oneway.push(e.oneway);

            for &t in Transport::all() {
                let allowed = e.access[t.index()];
                edge_access[t.index()].push(allowed);
                if allowed {
                    vertex_access[t.index()][e.from as usize] = true;
                    vertex_access[t.index()][e.to as usize] = true;
                }
            }
            for &metric in Metric::all() {
                for &t in Transport::all() {
                    let w = e.weight(metric, t, &self.positions);
                    if e.access[t.index()] && w.is_finite() && w >= half::MAX {
                        return Err(StoreError::InvalidNetwork(format!(
                            "edge {} -> {} costs {} {} for {}, beyond the largest storable weight {}",
                            e.from,
                            e.to,
                            w,
                            metric,
                            t,
                            half::MAX
                        )));
                    }
                    weights[weight_slot(metric, t)].push(half::encode(w));
                }
            }

            scratch.clear();
            varint::encode_polyline(self.positions[e.from as usize], &e.steps, &mut scratch);
            spans.push(region.alloc_copy(&scratch)?);
        }

        let mut step_offsets = Vec::with_capacity(m + 1);
        let mut steps = Vec::with_capacity(region.allocated());
        step_offsets.push(0u32);
        for span in &spans {
            steps.extend_from_slice(region.bytes(*span));
            step_offsets.push(steps.len() as u32);
        }
        tracing::trace!(edges = m, bytes = steps.len(), blocks = region.block_count(), "polylines staged");
        region.free();

        // Chains in ascending edge order; the last edge points to itself
        let mut first_in = vec![NO_EDGE; n];
        let mut next_in = vec![0u32; m];
        for (e, &i) in order.iter().enumerate().rev() {
            let head = self.edges[i].to as usize;
            let e = e as u32;
            next_in[e as usize] = if first_in[head] == NO_EDGE { e } else { first_in[head] };
            first_in[head] = e;
        }

        Ok(GraphData {
            first_out,
            first_in,
            next_in,
            endpoints,
            positions: self.positions,
            vertex_access: vertex_access.into_iter().map(bits::pack).collect(),
            edge_access: edge_access.into_iter().map(bits::pack).collect(),
            oneway: bits::pack(oneway),
            weights,
            step_offsets,
            steps,
        })
    }

    pub fn into_graph(self) -> Result<PartitionGraph, StoreError> {
        PartitionGraph::from_data(self.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_sorted_by_tail() {
        let positions = vec![Coord::default(); 3];
        let data = GraphBuilder::new(positions)
            .edges(&[EdgeSpec::new(2, 0), EdgeSpec::new(0, 1), EdgeSpec::new(2, 1)])
            .finish()
            .unwrap();
        assert_eq!(data.first_out, vec![0, 1, 1, 3]);
        assert_eq!(data.endpoints, vec![1, 2, 3]);
        // vertex 1 receives edges 0 and 2
        assert_eq!(data.first_in, vec![1, 0, NO_EDGE]);
        assert_eq!(data.next_in[0], 2);
        assert_eq!(data.next_in[2], 2);
    }

    #[test]
    fn test_length_from_polyline() {
        let positions = vec![Coord::from_degrees(50.0, 4.0), Coord::from_degrees(50.0, 4.002)];
        let straight = EdgeSpec::new(0, 1).length(&positions);
        let bent = EdgeSpec::new(0, 1)
            .with_steps(vec![Coord::from_degrees(50.001, 4.001)])
            .length(&positions);
        assert!(straight > 140.0 && straight < 146.0, "{}", straight);
        assert!(bent > straight);
    }

    #[test]
    fn test_vertex_access_follows_edges() {
        let positions = vec![Coord::default(); 3];
        let g = GraphBuilder::new(positions)
            .edges(&[EdgeSpec::new(0, 1).with_access(Transport::Car, false), EdgeSpec::new(1, 2)])
            .into_graph()
            .unwrap();
        assert!(!g.vertex_accessible(0, Transport::Car));
        assert!(g.vertex_accessible(0, Transport::Foot));
        assert!(g.vertex_accessible(1, Transport::Car));
    }

    #[test]
    fn test_rejects_bad_edges() {
        let positions = vec![Coord::default(); 2];
        let err = GraphBuilder::new(positions.clone()).edges(&[EdgeSpec::new(0, 5)]).finish();
        assert!(matches!(err, Err(StoreError::InvalidNetwork(_))));
        let err = GraphBuilder::new(positions).edges(&[EdgeSpec::new(1, 1)]).finish();
        assert!(matches!(err, Err(StoreError::InvalidNetwork(_))));
    }

    #[test]
    fn test_rejects_unstorable_weight() {
        let positions = vec![Coord::default(); 2];
        let err = GraphBuilder::new(positions.clone())
            .edges(&[EdgeSpec::new(0, 1).with_distance(70_000.0)])
            .finish();
        assert!(matches!(err, Err(StoreError::InvalidNetwork(_))));

        // a closed mode may carry any weight
        let long = EdgeSpec::new(0, 1)
            .with_distance(70_000.0)
            .with_access(Transport::Car, false)
            .with_access(Transport::Bike, false)
            .with_access(Transport::Foot, false);
        assert!(GraphBuilder::new(positions).edges(&[long]).finish().is_ok());
    }
}
