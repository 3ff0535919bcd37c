//! Packed bit-vectors stored as u64 words
//!
//! Bit `i` lives in word `i / 64` at position `i % 64`.

use std::path::Path;

use crate::error::Result;
use crate::mapped::MappedVec;

#[derive(Debug)]
pub struct BitVec {
    words: MappedVec<u64>,
}

impl BitVec {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            words: MappedVec::open(path)?,
        })
    }

    pub fn from_words(words: Vec<u64>) -> Self {
        Self {
            words: MappedVec::from_vec(words),
        }
    }

    /// Bits past the stored words read as unset
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let word = index / 64;
        let bit = index % 64;
        word < self.words.len() && (self.words[word] & (1u64 << bit)) != 0
    }

    /// Number of addressable bits
    pub fn capacity(&self) -> usize {
        self.words.len() * 64
    }
}

/// Pack booleans into u64 words
pub fn pack<I: IntoIterator<Item = bool>>(bits: I) -> Vec<u64> {
    let mut words = Vec::new();
    for (i, bit) in bits.into_iter().enumerate() {
        if i % 64 == 0 {
            words.push(0u64);
        }
        if bit {
            words[i / 64] |= 1u64 << (i % 64);
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_get() {
        let pattern: Vec<bool> = (0..130).map(|i| i % 3 == 0).collect();
        let bits = BitVec::from_words(pack(pattern.iter().copied()));

        assert_eq!(bits.capacity(), 192);
        for (i, &expected) in pattern.iter().enumerate() {
            assert_eq!(bits.get(i), expected, "bit {}", i);
        }
        assert!(!bits.get(500));
    }

    #[test]
    fn test_write_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("flags.bits");
        MappedVec::write(&path, &pack([true, false, false, true])).unwrap();

        let bits = BitVec::open(&path).unwrap();
        assert!(bits.get(0));
        assert!(!bits.get(1));
        assert!(bits.get(3));
    }
}
