//! Snapped query points and their partial-edge expansions

use serde::Serialize;

use crate::geo::{polyline_length, Coord};
use crate::graph::PartitionGraph;
use crate::mode::{Metric, Transport};

use super::kdtree::PackedEntry;

/// A snapped point: a vertex, or an interior step of an edge.
///
/// `vertex`, `edge_offset` and `step_offset` are read in the graph that owns
/// the location: partition `cluster`, or the overlay when `cluster` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub cluster: Option<u32>,
    pub vertex: u32,
    pub edge_offset: u16,
    pub step_offset: u16,
    pub position: Coord,
}

/// Partial edge between a location and one graph vertex.
///
/// `steps` holds the points strictly between the two, in travel order:
/// location -> vertex for sources, vertex -> location for targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub vertex: u32,
    pub weight: f32,
    pub steps: Vec<Coord>,
}

impl Location {
    pub fn new(entry: PackedEntry, position: Coord, cluster: Option<u32>) -> Self {
        Self {
            cluster,
            vertex: entry.vertex,
            edge_offset: entry.edge_offset,
            step_offset: entry.step_offset,
            position,
        }
    }

    pub fn entry(&self) -> PackedEntry {
        PackedEntry {
            vertex: self.vertex,
            edge_offset: self.edge_offset,
            step_offset: self.step_offset,
        }
    }

    #[inline]
    pub fn is_vertex(&self) -> bool {
        self.step_offset == 0
    }

    /// Expand into the ways a search can start from (`forward`) or end at.
    ///
    /// An edge location yields both endpoints, except that a oneway edge only
    /// allows leaving towards its head and arriving from its tail.
    pub fn decode(&self, graph: &PartitionGraph, forward: bool, transport: Transport, metric: Metric) -> Vec<Way> {
        let Some(e) = self.entry().edge(graph) else {
            return vec![Way {
                vertex: self.vertex,
                weight: 0.0,
                steps: Vec::new(),
            }];
        };
        if !graph.edge_accessible(e, transport) {
            return Vec::new();
        }

        let tail = self.vertex;
        let head = graph.edge_opposite(e, tail);
        let steps = graph.edge_steps(e, tail);
        let k = self.step_offset as usize - 1;
        assert!(k < steps.len(), "step {} past the {} steps of edge {}", k, steps.len(), e);

        let mut to_tail = Vec::with_capacity(k + 2);
        to_tail.push(graph.position(tail));
        to_tail.extend_from_slice(&steps[..=k]);
        let mut to_head = Vec::with_capacity(steps.len() - k + 1);
        to_head.extend_from_slice(&steps[k..]);
        to_head.push(graph.position(head));

        let tail_len = polyline_length(&to_tail);
        let head_len = polyline_length(&to_head);
        let total = tail_len + head_len;
        let tail_share = if total > 0.0 { (tail_len / total) as f32 } else { 0.5 };
        let weight = graph.edge_weight(e, transport, metric);

        // interior points between the location and each endpoint, tail -> head order
        let before = &steps[..k];
        let after = &steps[k + 1..];
        let natural = Way {
            vertex: if forward { head } else { tail },
            weight: weight * if forward { 1.0 - tail_share } else { tail_share },
            steps: if forward { after.to_vec() } else { before.to_vec() },
        };

        let mut ways = vec![natural];
        if !graph.is_oneway(e) {
            let mut steps = if forward { before.to_vec() } else { after.to_vec() };
            steps.reverse();
            ways.push(Way {
                vertex: if forward { tail } else { head },
                weight: weight * if forward { tail_share } else { 1.0 - tail_share },
                steps,
            });
        }
        ways
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{EdgeSpec, GraphBuilder};

    fn road(oneway: bool) -> PartitionGraph {
        // 0 ---s1---s2---s3--- 1, evenly spaced along a meridian
        let positions = vec![Coord::from_degrees(50.0, 4.0), Coord::from_degrees(50.004, 4.0)];
        let steps = (1..4).map(|i| Coord::from_degrees(50.0 + i as f64 * 0.001, 4.0)).collect();
        let mut edge = EdgeSpec::new(0, 1).with_distance(400.0).with_steps(steps);
        if oneway {
            edge = edge.oneway();
        }
        GraphBuilder::new(positions).edges(&[edge]).into_graph().unwrap()
    }

    fn at_step(step_offset: u16) -> Location {
        Location {
            cluster: Some(0),
            vertex: 0,
            edge_offset: 0,
            step_offset,
            position: Coord::default(),
        }
    }

    #[test]
    fn test_vertex_location_is_one_free_way() {
        let g = road(false);
        let loc = Location::new(PackedEntry::vertex(1), g.position(1), None);
        let ways = loc.decode(&g, true, Transport::Car, Metric::Distance);
        assert_eq!(ways, vec![Way { vertex: 1, weight: 0.0, steps: vec![] }]);
    }

    #[test]
    fn test_two_way_edge_splits_by_length() {
        let g = road(false);
        // first interior step: a quarter of the way from 0
        let ways = at_step(1).decode(&g, true, Transport::Car, Metric::Distance);
        assert_eq!(ways.len(), 2);
        assert_eq!(ways[0].vertex, 1);
        assert!((ways[0].weight - 300.0).abs() < 0.5, "{}", ways[0].weight);
        assert_eq!(ways[0].steps.len(), 2);
        assert_eq!(ways[0].steps[0], Coord::from_degrees(50.002, 4.0));
        assert_eq!(ways[1].vertex, 0);
        assert!((ways[1].weight - 100.0).abs() < 0.5);
        assert!(ways[1].steps.is_empty());
    }

    #[test]
    fn test_target_side_orders_steps_towards_location() {
        let g = road(false);
        let ways = at_step(3).decode(&g, false, Transport::Car, Metric::Distance);
        let from_tail = ways.iter().find(|w| w.vertex == 0).unwrap();
        assert_eq!(
            from_tail.steps,
            vec![Coord::from_degrees(50.001, 4.0), Coord::from_degrees(50.002, 4.0)]
        );
        assert!((from_tail.weight - 300.0).abs() < 0.5);
    }

    #[test]
    fn test_oneway_keeps_natural_direction_only() {
        let g = road(true);
        let out = at_step(2).decode(&g, true, Transport::Car, Metric::Distance);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].vertex, 1);
        let inn = at_step(2).decode(&g, false, Transport::Car, Metric::Distance);
        assert_eq!(inn.len(), 1);
        assert_eq!(inn[0].vertex, 0);
    }
}
