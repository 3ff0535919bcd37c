//! Synthetic grid networks
//!
//! A `width` x `height` lattice around Brussels with a few realistic
//! wrinkles: every horizontal edge bends through a midpoint step, every
//! fourth row is oneway eastbound, and every fifth column is closed to cars.

use crate::geo::Coord;
use crate::mode::Transport;

use super::{EdgeSpec, Network};

/// Grand-Place, Brussels
pub const ORIGIN: (f64, f64) = (50.8467, 4.3525);

/// Default spacing between lattice points in degrees (~110 m north-south)
pub const DEFAULT_SPACING: f64 = 0.001;

#[inline]
pub fn vertex_id(x: u32, y: u32, width: u32) -> u32 {
    y * width + x
}

pub fn grid(width: u32, height: u32, spacing: f64) -> Network {
    let mut positions = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            positions.push(Coord::from_degrees(
                ORIGIN.0 + y as f64 * spacing,
                ORIGIN.1 + x as f64 * spacing,
            ));
        }
    }

    let mut net = Network::new(positions);
    for y in 0..height {
        for x in 0..width {
            let v = vertex_id(x, y, width);
            if x + 1 < width {
                let bend = Coord::from_degrees(
                    ORIGIN.0 + (y as f64 + 0.1) * spacing,
                    ORIGIN.1 + (x as f64 + 0.5) * spacing,
                );
                let mut edge = EdgeSpec::new(v, vertex_id(x + 1, y, width)).with_steps(vec![bend]);
                if y % 4 == 3 {
                    edge = edge.oneway();
                }
                net.push(edge);
            }
            if y + 1 < height {
                let mut edge = EdgeSpec::new(v, vertex_id(x, y + 1, width));
                if x % 5 == 2 {
                    edge = edge.with_access(Transport::Car, false);
                }
                net.push(edge);
            }
        }
    }
    net
}

/// Rectangular blocks of `clusters_x` x `clusters_y` clusters, numbered row-major
pub fn grid_clusters(width: u32, height: u32, clusters_x: u32, clusters_y: u32) -> Vec<u32> {
    let clusters_x = clusters_x.clamp(1, width.max(1));
    let clusters_y = clusters_y.clamp(1, height.max(1));
    let mut out = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let cx = x * clusters_x / width;
            let cy = y * clusters_y / height;
            out.push(cy * clusters_x + cx);
        }
    }
    out
}
