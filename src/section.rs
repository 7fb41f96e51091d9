use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};

use crate::partition::ByteRange;

/// Opens independent, seekable handles onto the input.
///
/// Every worker calls [`ChunkSource::open`] for itself, so no read cursor is
/// ever shared between ranges.
pub trait ChunkSource: Send + Sync {
    type Reader: Read + Seek + Send;

    fn open(&self) -> io::Result<Self::Reader>;

    fn len(&self) -> io::Result<u64>;

    fn describe(&self) -> String;
}

/// A [`ChunkSource`] that reopens a file on disk for every caller.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkSource for FileSource {
    type Reader = File;

    fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Reader over a single [`ByteRange`].
///
/// Reports end-of-data once `range.size` bytes have been handed out, even when
/// the underlying handle continues. The handle is closed when the reader is
/// dropped.
#[derive(Debug)]
pub struct SectionReader<R> {
    inner: Take<R>,
    range: ByteRange,
}

impl<R: Read + Seek> SectionReader<R> {
    /// Seeks `handle` to the start of `range` and limits it to `range.size` bytes.
    pub fn new(mut handle: R, range: ByteRange) -> io::Result<Self> {
        let pos = handle.seek(SeekFrom::Start(range.start))?;
        if pos != range.start {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("seek to {} landed at {}", range.start, pos),
            ));
        }
        Ok(Self {
            inner: handle.take(range.size),
            range,
        })
    }
}

impl<R> SectionReader<R> {
    pub fn range(&self) -> ByteRange {
        self.range
    }

    pub fn consumed(&self) -> u64 {
        self.range.size - self.inner.limit()
    }

    pub fn remaining(&self) -> u64 {
        self.inner.limit()
    }
}

impl<R: Read> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R> Drop for SectionReader<R> {
    fn drop(&mut self) {
        log::trace!(
            "closing section {} after {} of {} bytes",
            self.range,
            self.consumed(),
            self.range.size
        );
    }
}
