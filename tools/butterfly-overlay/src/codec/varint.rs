//! Zigzag LEB128 varints and delta-encoded polylines
//!
//! A polyline is stored as the sequence of (dlat, dlon) deltas from the
//! previous point, starting from the edge's tail coordinate. Deltas are i64
//! because a longitude step can exceed the i32 range.

use crate::geo::Coord;

#[inline]
pub fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
pub fn unzigzag(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

pub fn write_u64(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

/// Read one varint at `*pos`; `None` on truncated or over-long input
pub fn read_u64(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        if shift >= 64 {
            return None;
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
    }
}

/// Append the encoding of `points` relative to `origin`
pub fn encode_polyline(origin: Coord, points: &[Coord], out: &mut Vec<u8>) {
    let mut prev = origin;
    for p in points {
        write_u64(out, zigzag(p.lat as i64 - prev.lat as i64));
        write_u64(out, zigzag(p.lon as i64 - prev.lon as i64));
        prev = *p;
    }
}

/// Lazy decoder over one edge's step payload
pub struct PolylineDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    prev: Coord,
}

impl<'a> PolylineDecoder<'a> {
    pub fn new(origin: Coord, bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            prev: origin,
        }
    }
}

impl Iterator for PolylineDecoder<'_> {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let dlat = unzigzag(read_u64(self.bytes, &mut self.pos)?);
        let dlon = unzigzag(read_u64(self.bytes, &mut self.pos)?);
        self.prev = Coord {
            lat: (self.prev.lat as i64 + dlat) as i32,
            lon: (self.prev.lon as i64 + dlon) as i32,
        };
        Some(self.prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        for v in [0i64, 1, -1, 63, -64, i32::MAX as i64 * 2, i64::MIN, i64::MAX] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
    }

    #[test]
    fn test_varint_lengths() {
        let mut out = Vec::new();
        write_u64(&mut out, 127);
        assert_eq!(out, [0x7f]);
        out.clear();
        write_u64(&mut out, 300);
        assert_eq!(out, [0xac, 0x02]);

        let mut pos = 0;
        assert_eq!(read_u64(&out, &mut pos), Some(300));
        assert_eq!(pos, 2);
    }

    #[test]
    fn test_truncated_varint() {
        let mut pos = 0;
        assert_eq!(read_u64(&[0x80, 0x80], &mut pos), None);
    }

    #[test]
    fn test_polyline_exact_round_trip() {
        let origin = Coord::from_degrees(50.85, 4.35);
        let points = vec![
            Coord::from_degrees(50.8501, 4.3502),
            Coord::from_degrees(50.8499, 4.3507),
            Coord::new(-900_000_000, -1_800_000_000),
            Coord::new(900_000_000, 1_800_000_000),
        ];
        let mut bytes = Vec::new();
        encode_polyline(origin, &points, &mut bytes);

        assert_eq!(PolylineDecoder::new(origin, &bytes).collect::<Vec<_>>(), points);
    }

    #[test]
    fn test_small_deltas_are_compact() {
        let origin = Coord::new(0, 0);
        let points: Vec<Coord> = (1..=10).map(|i| Coord::new(i * 10, -i * 10)).collect();
        let mut bytes = Vec::new();
        encode_polyline(origin, &points, &mut bytes);
        assert_eq!(bytes.len(), 20);
    }
}
