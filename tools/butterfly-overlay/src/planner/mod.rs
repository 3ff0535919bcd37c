//! Multi-waypoint route planning
//!
//! Waypoints are snapped in parallel, every leg is routed over a union of
//! the overlay and the (at most two) partitions its endpoints sit in, and
//! overlay shortcuts on the result are expanded back into partition edges.

mod unpack;

use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::time::Instant;

use crate::error::{PlanError, RouteError};
use crate::geo::Coord;
use crate::graph::{Graph, Hop, Owner, PartitionGraph, UnionGraph};
use crate::mode::{Metric, Transport};
use crate::router::Router;
use crate::spatial::{Location, Way};
use crate::store::Store;

/// One traversed edge; `from` is the entry vertex in the owner's numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LegEdge {
    pub owner: Owner,
    pub edge: u32,
    pub from: u32,
}

impl From<Hop> for LegEdge {
    fn from(hop: Hop) -> Self {
        Self {
            owner: hop.edge.owner,
            edge: hop.edge.edge,
            from: hop.from,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Leg {
    pub distance: f32,
    pub source: Location,
    pub target: Location,
    pub edges: Vec<LegEdge>,
    #[serde(serialize_with = "as_degrees")]
    pub polyline: Vec<Coord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub transport: Transport,
    pub metric: Metric,
    pub distance: f32,
    pub legs: Vec<Leg>,
}

fn as_degrees<S: Serializer>(points: &[Coord], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(points.iter().map(|c| [c.lat_deg(), c.lon_deg()]))
}

pub struct Planner<'a> {
    store: &'a Store,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn plan(&self, waypoints: &[Coord], transport: Transport, metric: Metric) -> Result<Route, PlanError> {
        if waypoints.len() < 2 {
            return Err(PlanError::TooFewWaypoints(waypoints.len()));
        }
        let start = Instant::now();

        let locations = self.snap_all(waypoints, transport)?;

        let legs: Vec<Result<Leg, RouteError>> = locations
            .par_windows(2)
            .map(|pair| self.leg(&pair[0], &pair[1], transport, metric))
            .collect();
        let legs = legs
            .into_iter()
            .enumerate()
            .map(|(leg, result)| result.map_err(|_| PlanError::NotFound { leg }))
            .collect::<Result<Vec<_>, _>>()?;

        let distance = legs.iter().map(|l| l.distance).sum();
        tracing::info!(
            waypoints = waypoints.len(),
            %transport,
            %metric,
            distance,
            elapsed_us = start.elapsed().as_micros() as u64,
            "route planned"
        );

        Ok(Route {
            transport,
            metric,
            distance,
            legs,
        })
    }

    /// Snap every waypoint, reporting the first one that cannot be placed
    pub fn snap_all(&self, waypoints: &[Coord], transport: Transport) -> Result<Vec<Location>, PlanError> {
        let snapped: Vec<Option<Location>> = waypoints.par_iter().map(|&q| self.store.snap(q, transport)).collect();
        snapped
            .into_iter()
            .enumerate()
            .map(|(index, loc)| loc.ok_or(PlanError::Unsnappable { index }))
            .collect()
    }

    /// Route one leg between two snapped locations
    pub fn leg(&self, source: &Location, target: &Location, transport: Transport, metric: Metric) -> Result<Leg, RouteError> {
        let mut selected: Vec<(u32, &PartitionGraph)> = Vec::with_capacity(2);
        for c in [source.cluster, target.cluster].into_iter().flatten() {
            if selected.iter().all(|&(s, _)| s != c) {
                selected.push((c, self.store.cluster(c)));
            }
        }
        let union = UnionGraph::new(self.store.overlay(), &selected);
        let view = Graph::Union(&union);

        let sources = self.seeds(&union, source, true, transport, metric);
        let targets = self.seeds(&union, target, false, transport, metric);

        let mut router = Router::new();
        router.reset(union.vertex_count());
        for (v, way) in &sources {
            router.add_source(*v, way.weight);
        }
        for (v, way) in &targets {
            router.add_target(*v, way.weight);
        }
        let distance = router.run(&view, transport, metric)?;

        let vpath = router.vpath();
        let (first, last) = match (vpath.first(), vpath.last()) {
            (Some(&f), Some(&l)) => (f, l),
            _ => unreachable!("a found route has a meeting vertex"),
        };
        let source_way = root_way(&sources, first);
        let target_way = root_way(&targets, last);

        let hops = router.path(&view, transport, metric);
        let edges = unpack::expand(self.store, &hops, transport, metric);

        let mut polyline = vec![source.position];
        polyline.extend_from_slice(&source_way.steps);
        for e in &edges {
            let graph = self.store.graph_for(e.owner);
            polyline.push(graph.position(e.from));
            polyline.extend(graph.edge_steps(e.edge, e.from));
        }
        polyline.push(match edges.last() {
            Some(e) => {
                let graph = self.store.graph_for(e.owner);
                graph.position(graph.edge_opposite(e.edge, e.from))
            }
            None => union.position(first),
        });
        polyline.extend_from_slice(&target_way.steps);
        polyline.push(target.position);
        polyline.dedup();

        tracing::debug!(
            distance,
            vertices = vpath.len(),
            hops = hops.len(),
            edges = edges.len(),
            clusters = union.part_count(),
            "leg routed"
        );

        Ok(Leg {
            distance,
            source: *source,
            target: *target,
            edges,
            polyline,
        })
    }

    /// Ways of a location, keyed by union vertex
    fn seeds(
        &self,
        union: &UnionGraph<'_>,
        loc: &Location,
        forward: bool,
        transport: Transport,
        metric: Metric,
    ) -> Vec<(u32, Way)> {
        let graph = self.store.location_graph(loc);
        let part = loc.cluster.map(|c| match union.part_index(c) {
            Some(i) => i,
            None => unreachable!("cluster {} is selected for its own location", c),
        });
        loc.decode(graph, forward, transport, metric)
            .into_iter()
            .map(|way| {
                let v = match part {
                    None => way.vertex,
                    Some(i) => union.to_union_vertex(way.vertex, i),
                };
                (v, way)
            })
            .collect()
    }
}

/// The cheapest way seeded at the root of the search tree
fn root_way(seeds: &[(u32, Way)], root: u32) -> &Way {
    seeds
        .iter()
        .filter(|(v, _)| *v == root)
        .map(|(_, way)| way)
        .min_by(|a, b| a.weight.total_cmp(&b.weight))
        .unwrap_or_else(|| panic!("search root {} is not a seeded vertex", root))
}
