//! Transport modes and weighting metrics
//!
//! Both enums are small dense indices: they select which accessibility
//! bit-vector and which weight array a graph reads.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const TRANSPORT_COUNT: usize = 3;
pub const METRIC_COUNT: usize = 2;

/// Travel mode, matching the on-disk file suffixes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Car = 0,
    Bike = 1,
    Foot = 2,
}

impl Transport {
    pub fn all() -> &'static [Transport] {
        &[Transport::Car, Transport::Bike, Transport::Foot]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transport::Car => "car",
            Transport::Bike => "bike",
            Transport::Foot => "foot",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Default cruising speed used when a producer gives no explicit speed
    pub fn default_speed_kmh(self) -> f32 {
        match self {
            Transport::Car => 50.0,
            Transport::Bike => 18.0,
            Transport::Foot => 5.0,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transport::all()
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown transport '{}' (expected car, bike or foot)", s))
    }
}

/// Edge weighting
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Meters
    Distance = 0,
    /// Seconds
    Duration = 1,
}

impl Metric {
    pub fn all() -> &'static [Metric] {
        &[Metric::Distance, Metric::Duration]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Distance => "distance",
            Metric::Duration => "duration",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::all()
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown metric '{}' (expected distance or duration)", s))
    }
}

/// Flat index of a (metric, transport) weight array
#[inline]
pub fn weight_slot(metric: Metric, transport: Transport) -> usize {
    metric.index() * TRANSPORT_COUNT + transport.index()
}
