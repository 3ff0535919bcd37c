//! Fixed-point coordinates, bounding boxes and geodesic lengths

use bytemuck::{Pod, Zeroable};
use geo::Point;
use serde::Serialize;

/// Fixed-point scale: 1e-7 degrees per unit
pub const COORD_SCALE: f64 = 1e7;

/// Latitude/longitude in 1e-7 degrees, as stored in `positions.coord`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable, Serialize)]
pub struct Coord {
    pub lat: i32,
    pub lon: i32,
}

impl Coord {
    pub const fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * COORD_SCALE).round() as i32,
            lon: (lon * COORD_SCALE).round() as i32,
        }
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat as f64 / COORD_SCALE
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon as f64 / COORD_SCALE
    }

    /// Component used by the k-d tree at `depth`: latitude on even levels
    #[inline]
    pub fn axis(&self, depth: usize) -> i32 {
        if depth % 2 == 0 {
            self.lat
        } else {
            self.lon
        }
    }

    /// Exact squared planar distance in fixed-point units.
    /// Fits u64 for any pair of valid coordinates.
    #[inline]
    pub fn dist2(&self, other: &Coord) -> u64 {
        let dlat = (self.lat as i64 - other.lat as i64).unsigned_abs();
        let dlon = (self.lon as i64 - other.lon as i64).unsigned_abs();
        dlat * dlat + dlon * dlon
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.lon_deg(), self.lat_deg())
    }
}

/// Great-circle distance in meters
#[allow(deprecated)]
pub fn haversine_distance(a: Coord, b: Coord) -> f64 {
    use geo::HaversineDistance;
    a.to_point().haversine_distance(&b.to_point())
}

/// Length of a polyline in meters
pub fn polyline_length(points: &[Coord]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(w[0], w[1]))
        .sum()
}

/// Partition bounding box in degrees, one record per cluster in `bboxes.ftf`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize)]
pub struct BBox {
    pub min_lat: f32,
    pub min_lon: f32,
    pub max_lat: f32,
    pub max_lon: f32,
}

impl BBox {
    /// Box containing nothing; `extend` grows it
    pub fn empty() -> Self {
        Self {
            min_lat: f32::INFINITY,
            min_lon: f32::INFINITY,
            max_lat: f32::NEG_INFINITY,
            max_lon: f32::NEG_INFINITY,
        }
    }

    pub fn extend(&mut self, c: Coord) {
        let lat = c.lat_deg() as f32;
        let lon = c.lon_deg() as f32;
        self.min_lat = self.min_lat.min(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lat = self.max_lat.max(lat);
        self.max_lon = self.max_lon.max(lon);
    }

    pub fn contains(&self, c: Coord) -> bool {
        let lat = c.lat_deg() as f32;
        let lon = c.lon_deg() as f32;
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_round_trip() {
        let c = Coord::from_degrees(50.8503, 4.3517);
        assert_eq!(c, Coord::new(508_503_000, 43_517_000));
        assert!((c.lat_deg() - 50.8503).abs() < 1e-9);
    }

    #[test]
    fn test_dist2_extremes_do_not_overflow() {
        let a = Coord::from_degrees(-90.0, -180.0);
        let b = Coord::from_degrees(90.0, 180.0);
        assert_eq!(a.dist2(&b), 1_800_000_000u64.pow(2) + 3_600_000_000u64.pow(2));
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance(Coord::from_degrees(0.0, 0.0), Coord::from_degrees(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn test_bbox() {
        let mut bbox = BBox::empty();
        assert!(!bbox.contains(Coord::from_degrees(0.0, 0.0)));
        bbox.extend(Coord::from_degrees(1.0, 1.0));
        bbox.extend(Coord::from_degrees(2.0, 3.0));
        assert!(bbox.contains(Coord::from_degrees(1.5, 2.0)));
        assert!(!bbox.contains(Coord::from_degrees(1.5, 3.5)));
    }
}
