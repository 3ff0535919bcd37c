//! Compact encodings used by the edge arrays

pub mod half;
pub mod varint;
