//! Shortcut elaboration - expand overlay shortcuts into partition edges

use rayon::prelude::*;

use crate::graph::{Hop, OverlayGraph, Owner};
use crate::mode::{Metric, Transport};
use crate::router::Router;
use crate::store::Store;

use super::LegEdge;

/// Overlay shortcut in the numbering of its cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Shortcut {
    pub cluster: u32,
    pub from: u32,
    pub to: u32,
    pub weight: f32,
}

pub(crate) fn shortcut(overlay: &OverlayGraph, hop: &Hop) -> Option<Shortcut> {
    if hop.edge.owner != Owner::Overlay || !overlay.is_shortcut(hop.edge.edge, hop.from) {
        return None;
    }
    let (cluster, from) = overlay.to_local(hop.from);
    let (_, to) = overlay.to_local(overlay.edge_opposite(hop.edge.edge, hop.from));
    Some(Shortcut {
        cluster,
        from,
        to,
        weight: hop.weight,
    })
}

/// Replace every shortcut hop by the partition edges it stands for
pub(crate) fn expand(store: &Store, hops: &[Hop], transport: Transport, metric: Metric) -> Vec<LegEdge> {
    let overlay = store.overlay();
    let parts: Vec<Vec<LegEdge>> = hops
        .par_iter()
        .map_init(Router::new, |router, hop| match shortcut(overlay, hop) {
            None => vec![LegEdge::from(*hop)],
            Some(s) => elaborate(store, router, &s, transport, metric),
        })
        .collect();
    parts.into_iter().flatten().collect()
}

/// Bounded single-cluster search between the shortcut endpoints
pub(crate) fn elaborate(
    store: &Store,
    router: &mut Router,
    s: &Shortcut,
    transport: Transport,
    metric: Metric,
) -> Vec<LegEdge> {
    let view = store.partition_view(s.cluster);
    router.reset(view.vertex_count());
    // half-float rounding of the stored shortcut weight
    router.set_bound(s.weight * 1.05 + 1.0);
    router.add_source(s.from, 0.0);
    router.add_target(s.to, 0.0);

    match router.run(&view, transport, metric) {
        Ok(found) => tracing::trace!(
            cluster = s.cluster,
            from = s.from,
            to = s.to,
            shortcut = s.weight,
            found,
            "shortcut elaborated"
        ),
        Err(_) => panic!(
            "shortcut {} -> {} of cluster {} has no path within {}",
            s.from, s.to, s.cluster, s.weight
        ),
    }

    router.path(&view, transport, metric).into_iter().map(LegEdge::from).collect()
}
