//! Memory-mapped array storage for butterfly-osm
//!
//! Every on-disk array is a flat file of fixed-size little-endian records.
//! The record count is implied by the file size, and arrays are correlated
//! purely by index, so nothing here carries a header.

pub mod bits;
pub mod error;
pub mod mapped;
pub mod region;

pub use bits::BitVec;
pub use error::{Error, Result};
pub use mapped::MappedVec;
pub use region::{Region, Span, DEFAULT_BLOCK_SIZE};
