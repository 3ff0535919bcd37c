//! Bidirectional Dijkstra over any `Graph` variant
//!
//! Forward search grows from the sources, backward search from the targets.
//! The side with the smaller frontier minimum is expanded next, and the
//! search stops once `best <= min_forward + min_backward` or either frontier
//! is exhausted. Every relaxation checks the opposite side's distance, so a
//! meeting vertex is found even when it is never settled by both searches.

use crate::error::RouteError;
use crate::graph::{Dart, Graph, Hop};
use crate::heap::{Color, Heap};
use crate::mode::{Metric, Transport};

pub const NO_PARENT: u32 = u32::MAX;

#[derive(Debug, Default)]
struct Search {
    heap: Heap,
    parent: Vec<u32>,
    dist: Vec<f32>,
}

impl Search {
    fn reset(&mut self, vertex_count: usize) {
        self.heap.reset(vertex_count);
        self.parent.clear();
        self.parent.resize(vertex_count, NO_PARENT);
        self.dist.clear();
        self.dist.resize(vertex_count, f32::INFINITY);
    }

    /// Seed `v` as a root at `offset`; returns whether its distance improved
    fn seed(&mut self, v: u32, offset: f32) -> bool {
        match self.heap.color(v) {
            Color::Unvisited => self.heap.push(v, offset),
            Color::Frontier => {
                if !self.heap.update(v, offset) {
                    return false;
                }
            }
            Color::Settled => return false,
        }
        self.dist[v as usize] = offset;
        self.parent[v as usize] = NO_PARENT;
        true
    }

    /// Vertices from `v` back to its root, `v` first
    fn chain(&self, mut v: u32) -> Vec<u32> {
        let mut out = vec![v];
        while self.parent[v as usize] != NO_PARENT {
            v = self.parent[v as usize];
            assert!(out.len() <= self.parent.len(), "parent chain does not terminate");
            out.push(v);
        }
        out
    }
}

/// Per-query search state; reuse it across queries with `reset`
#[derive(Debug)]
pub struct Router {
    forward: Search,
    backward: Search,
    best: f32,
    meet: u32,
    bound: f32,
    darts: Vec<Dart>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            forward: Search::default(),
            backward: Search::default(),
            best: f32::INFINITY,
            meet: NO_PARENT,
            bound: f32::INFINITY,
            darts: Vec::new(),
        }
    }

    /// Clear both searches for a graph with `vertex_count` vertices
    pub fn reset(&mut self, vertex_count: usize) {
        self.forward.reset(vertex_count);
        self.backward.reset(vertex_count);
        self.best = f32::INFINITY;
        self.meet = NO_PARENT;
        self.bound = f32::INFINITY;
    }

    /// Give up on paths longer than `bound`
    pub fn set_bound(&mut self, bound: f32) {
        self.bound = bound;
    }

    pub fn add_source(&mut self, v: u32, offset: f32) {
        if self.forward.seed(v, offset) {
            self.check_meet(v, offset + self.backward.dist[v as usize]);
        }
    }

    pub fn add_target(&mut self, v: u32, offset: f32) {
        if self.backward.seed(v, offset) {
            self.check_meet(v, offset + self.forward.dist[v as usize]);
        }
    }

    #[inline]
    fn check_meet(&mut self, v: u32, total: f32) {
        if total < self.best {
            self.best = total;
            self.meet = v;
        }
    }

    /// Run both searches to completion and return the best distance
    pub fn run(&mut self, graph: &Graph<'_>, transport: Transport, metric: Metric) -> Result<f32, RouteError> {
        assert_eq!(
            self.forward.heap.vertex_count(),
            graph.vertex_count(),
            "router was reset for a different graph"
        );

        let mut settled = 0usize;
        loop {
            let (Some(fmin), Some(bmin)) = (self.forward.heap.min_priority(), self.backward.heap.min_priority()) else {
                break;
            };
            let floor = fmin + bmin;
            if self.best <= floor || floor > self.bound {
                break;
            }
            self.step(graph, fmin <= bmin, transport, metric);
            settled += 1;
        }

        tracing::trace!(settled, distance = self.best, meet = self.meet, "search finished");

        if self.meet == NO_PARENT || self.best > self.bound {
            return Err(RouteError::NotFound);
        }
        Ok(self.best)
    }

    fn step(&mut self, graph: &Graph<'_>, forward: bool, transport: Transport, metric: Metric) {
        let Router {
            forward: fwd,
            backward: bwd,
            best,
            meet,
            darts,
            ..
        } = self;
        let (this, other) = if forward { (fwd, &*bwd) } else { (bwd, &*fwd) };

        let Some((v, d)) = this.heap.pop() else {
            return;
        };

        darts.clear();
        graph.neighbors(v, forward, transport, metric, darts);

        for dart in darts.iter() {
            if !dart.weight.is_finite() {
                continue;
            }
            let w = dart.vertex;
            let nd = d + dart.weight;

            let improved = match this.heap.color(w) {
                Color::Settled => false,
                Color::Unvisited => {
                    this.heap.push(w, nd);
                    true
                }
                Color::Frontier => this.heap.update(w, nd),
            };
            if improved {
                this.dist[w as usize] = nd;
                this.parent[w as usize] = v;
            }

            let total = this.dist[w as usize] + other.dist[w as usize];
            if total < *best {
                *best = total;
                *meet = w;
            }
        }
    }

    /// Best meeting distance, infinite if none was found
    pub fn distance(&self) -> f32 {
        self.best
    }

    /// Vertices from the source root through the meeting vertex to the target root
    pub fn vpath(&self) -> Vec<u32> {
        if self.meet == NO_PARENT {
            return Vec::new();
        }
        let mut path = self.forward.chain(self.meet);
        path.reverse();
        path.extend(self.backward.chain(self.meet).into_iter().skip(1));
        path
    }

    /// Edges of `vpath`, each resolved to the cheapest edge between its endpoints
    pub fn path(&self, graph: &Graph<'_>, transport: Transport, metric: Metric) -> Vec<Hop> {
        self.vpath()
            .windows(2)
            .map(|pair| {
                graph
                    .edge_between(pair[0], pair[1], transport, metric)
                    .unwrap_or_else(|| panic!("no edge {} -> {} behind the search tree", pair[0], pair[1]))
            })
            .collect()
    }
}
