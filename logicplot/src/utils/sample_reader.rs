//! Packed logic sample decoding.

use std::io;

use bitstream_io::{BitRead, BitReader, LittleEndian};

/// Iterates the complete `unit_size`-byte samples of a buffer.
///
/// Samples are little-endian: bit `p` of the decoded value belongs to the
/// `p`-th enabled channel. Bytes past the last complete sample are never read.
#[derive(Debug)]
pub struct PackedSampleReader<'a> {
    bs: BitReader<io::Cursor<&'a [u8]>, LittleEndian>,
    unit_bits: u32,
    remaining: usize,
}

impl<'a> PackedSampleReader<'a> {
    /// # Panics
    ///
    /// Panics if `unit_size` is zero or wider than a `u64`.
    pub fn new(data: &'a [u8], unit_size: usize) -> Self {
        assert!(
            (1..=8).contains(&unit_size),
            "unit size must be 1..=8 bytes, got {unit_size}"
        );

        let complete = data.len() / unit_size;
        Self {
            bs: BitReader::new(io::Cursor::new(&data[..complete * unit_size])),
            unit_bits: (unit_size * 8) as u32,
            remaining: complete,
        }
    }

    /// Number of complete samples not yet read.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Iterator for PackedSampleReader<'_> {
    type Item = io::Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.bs.read_unsigned_var(self.unit_bits))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PackedSampleReader<'_> {}
