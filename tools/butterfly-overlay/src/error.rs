//! Error types for store loading, routing and planning

use std::path::PathBuf;
use thiserror::Error;

/// Failures while opening (or writing) a store directory
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] butterfly_io::Error),

    #[error("malformed store at {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}

impl StoreError {
    pub(crate) fn malformed(path: &std::path::Path, reason: impl Into<String>) -> Self {
        StoreError::Malformed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Recoverable search outcome: the endpoints are disconnected for this mode
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route between the requested endpoints")]
    NotFound,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("at least two waypoints are required, got {0}")]
    TooFewWaypoints(usize),

    #[error("waypoint {index} could not be snapped to an accessible road")]
    Unsnappable { index: usize },

    #[error("no route found for leg {leg}")]
    NotFound { leg: usize },
}
