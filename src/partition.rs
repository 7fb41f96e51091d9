use std::fmt;

use crate::error::VocabError;

/// A contiguous slice of the input file, `[start, start + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub size: u64,
}

impl ByteRange {
    pub fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// Splits `file_size` bytes into `n` disjoint, contiguous ranges. The first
/// range also takes the remainder `file_size % n`.
///
/// Fails with [`VocabError::InvalidArgument`] unless `0 < n <= file_size`.
pub fn partition(file_size: i64, n: i64) -> Result<Vec<ByteRange>, VocabError> {
    if n <= 0 || file_size <= 0 || n > file_size {
        return Err(VocabError::InvalidArgument {
            file_size,
            parts: n,
        });
    }

    let (file_size, n) = (file_size as u64, n as u64);
    let base = file_size / n;
    let first = base + file_size % n;

    let mut ranges = Vec::with_capacity(n as usize);
    ranges.push(ByteRange::new(0, first));
    let mut start = first;
    for _ in 1..n {
        ranges.push(ByteRange::new(start, base));
        start += base;
    }

    let covered: u64 = ranges.iter().map(|r| r.size).sum();
    if covered != file_size || start != file_size {
        return Err(VocabError::InvalidArgument {
            file_size: file_size as i64,
            parts: n as i64,
        });
    }

    Ok(ranges)
}
