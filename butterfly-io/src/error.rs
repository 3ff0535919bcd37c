//! Error types for mapped storage

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is {len} bytes, not a multiple of the {elem_size}-byte record size", .path.display())]
    Size {
        path: PathBuf,
        len: u64,
        elem_size: usize,
    },

    #[error("failed to map {}: {source}", .path.display())]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("anonymous mapping of {len} bytes failed: {source}")]
    Anon {
        len: usize,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
