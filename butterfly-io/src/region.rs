//! Bump-allocating region for many small byte buffers
//!
//! Buffers are carved out of fixed-size anonymous mappings. A request larger
//! than the block size gets a dedicated mapping of its own. There is no
//! per-allocation free: `free` drops every block at once.

use memmap2::MmapMut;

use crate::error::{Error, Result};

pub const DEFAULT_BLOCK_SIZE: usize = 1 << 20;

/// Handle to bytes inside a `Region`; invalid after `Region::free`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    block: u32,
    offset: u32,
    len: u32,
}

impl Span {
    const EMPTY: Span = Span {
        block: u32::MAX,
        offset: 0,
        len: 0,
    };

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct Region {
    block_size: usize,
    blocks: Vec<MmapMut>,
    /// Block currently being bumped; dedicated blocks never become current
    current: Option<usize>,
    used: usize,
    allocated: usize,
}

impl Region {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "region block size must be non-zero");
        Self {
            block_size,
            blocks: Vec::new(),
            current: None,
            used: 0,
            allocated: 0,
        }
    }

    /// Reserve `len` zeroed bytes
    pub fn alloc(&mut self, len: usize) -> Result<Span> {
        if len == 0 {
            return Ok(Span::EMPTY);
        }

        if len > self.block_size {
            let block = self.map_block(len)?;
            self.allocated += len;
            return Ok(Span {
                block: block as u32,
                offset: 0,
                len: len as u32,
            });
        }

        let block = match self.current {
            Some(block) if self.used + len <= self.block_size => block,
            _ => {
                let block = self.map_block(self.block_size)?;
                self.current = Some(block);
                self.used = 0;
                block
            }
        };

        let span = Span {
            block: block as u32,
            offset: self.used as u32,
            len: len as u32,
        };
        self.used += len;
        self.allocated += len;
        Ok(span)
    }

    /// Reserve and fill in one step
    pub fn alloc_copy(&mut self, data: &[u8]) -> Result<Span> {
        let span = self.alloc(data.len())?;
        self.bytes_mut(span).copy_from_slice(data);
        Ok(span)
    }

    pub fn bytes(&self, span: Span) -> &[u8] {
        if span.is_empty() {
            return &[];
        }
        let start = span.offset as usize;
        &self.blocks[span.block as usize][start..start + span.len as usize]
    }

    pub fn bytes_mut(&mut self, span: Span) -> &mut [u8] {
        if span.is_empty() {
            return &mut [];
        }
        let start = span.offset as usize;
        &mut self.blocks[span.block as usize][start..start + span.len as usize]
    }

    /// Total bytes handed out since the last `free`
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Release every block
    pub fn free(&mut self) {
        tracing::trace!(blocks = self.blocks.len(), bytes = self.allocated, "region free");
        self.blocks.clear();
        self.current = None;
        self.used = 0;
        self.allocated = 0;
    }

    fn map_block(&mut self, len: usize) -> Result<usize> {
        let map = MmapMut::map_anon(len).map_err(|source| Error::Anon { len, source })?;
        self.blocks.push(map);
        Ok(self.blocks.len() - 1)
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}
