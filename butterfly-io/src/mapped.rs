//! Typed memory-mapped arrays
//!
//! `MappedVec<T>` is the only place where raw file bytes become typed slices.
//! The cast goes through `bytemuck`, so `T` must be plain old data and the
//! mapping must be suitably aligned (mmap is always page aligned).

use bytemuck::Pod;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

enum Backing<T> {
    /// Zero-length files cannot be mapped on every platform
    Empty,
    ReadOnly(Mmap),
    Writable(MmapMut),
    Heap(Vec<T>),
}

/// Fixed-size records backed by a file mapping (or, for in-memory graphs, a Vec)
pub struct MappedVec<T: Pod> {
    backing: Backing<T>,
    path: Option<PathBuf>,
}

impl<T: Pod> MappedVec<T> {
    /// Map an existing file read-only; record count = file size / record size
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let byte_len = file.metadata().map_err(|e| Error::io(path, e))?.len();

        let elem_size = std::mem::size_of::<T>();
        if byte_len % elem_size as u64 != 0 {
            return Err(Error::Size {
                path: path.to_path_buf(),
                len: byte_len,
                elem_size,
            });
        }

        let backing = if byte_len == 0 {
            Backing::Empty
        } else {
            // SAFETY: store files are written once offline and never modified
            // while a query process has them mapped.
            let map = unsafe { MmapOptions::new().map(&file) }.map_err(|source| Error::Map {
                path: path.to_path_buf(),
                source,
            })?;
            Backing::ReadOnly(map)
        };

        tracing::trace!(path = %path.display(), records = byte_len / elem_size as u64, "mapped");

        Ok(Self {
            backing,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create (or truncate) a file sized for `count` records and map it read-write
    pub fn create<P: AsRef<Path>>(path: P, count: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        let byte_len = (count * std::mem::size_of::<T>()) as u64;
        file.set_len(byte_len).map_err(|e| Error::io(path, e))?;

        let backing = if byte_len == 0 {
            Backing::Empty
        } else {
            // SAFETY: the file was just created by us and is exclusively owned
            // by this mapping until `close`.
            let map = unsafe { MmapOptions::new().map_mut(&file) }.map_err(|source| Error::Map {
                path: path.to_path_buf(),
                source,
            })?;
            Backing::Writable(map)
        };

        Ok(Self {
            backing,
            path: Some(path.to_path_buf()),
        })
    }

    /// Write `values` to a fresh file in one go
    pub fn write<P: AsRef<Path>>(path: P, values: &[T]) -> Result<()> {
        let mut out = Self::create(path, values.len())?;
        out.as_mut_slice().copy_from_slice(values);
        out.close()
    }

    /// In-memory array with the same read interface
    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            backing: Backing::Heap(values),
            path: None,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.backing {
            Backing::Empty => &[],
            Backing::ReadOnly(map) => bytemuck::cast_slice(&map[..]),
            Backing::Writable(map) => bytemuck::cast_slice(&map[..]),
            Backing::Heap(values) => values,
        }
    }

    /// Mutable view; only arrays obtained from `create` or `from_vec` are writable
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.backing {
            Backing::Empty => &mut [],
            Backing::Writable(map) => bytemuck::cast_slice_mut(&mut map[..]),
            Backing::Heap(values) => values,
            Backing::ReadOnly(_) => panic!(
                "write access to read-only mapping {}",
                self.path.as_deref().unwrap_or(Path::new("<memory>")).display()
            ),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush and unmap. Consuming `self` makes a second close impossible.
    pub fn close(self) -> Result<()> {
        if let Backing::Writable(map) = &self.backing {
            if let Err(source) = map.flush() {
                let path = self.path.clone().unwrap_or_default();
                return Err(Error::Io { path, source });
            }
        }
        Ok(())
    }
}

impl<T: Pod> Deref for MappedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> fmt::Debug for MappedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.backing {
            Backing::Empty => "empty",
            Backing::ReadOnly(_) => "mmap-ro",
            Backing::Writable(_) => "mmap-rw",
            Backing::Heap(_) => "heap",
        };
        f.debug_struct("MappedVec")
            .field("kind", &kind)
            .field("len", &self.len())
            .field("path", &self.path)
            .finish()
    }
}
