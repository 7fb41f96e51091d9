//! Per-range counting task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::CancelFlag;
use crate::error::ScanError;
use crate::partition::ByteRange;
use crate::section::{ChunkSource, SectionReader};
use crate::tokenizer::{Tokens, DEFAULT_MAX_TOKEN_LEN, MB};
use crate::vocab::WordCount;

/// Memory limits applied to each worker's tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    /// Upper bound on the initial working buffer, in bytes.
    pub buffer_cap: usize,
    /// Longest token kept, in bytes.
    pub max_token_len: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            buffer_cap: 200 * MB,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

impl ScanSettings {
    /// Working buffer for `range`: `min(range.size, buffer_cap)`, at least one byte.
    pub fn buffer_size(&self, range: &ByteRange) -> usize {
        let size = usize::try_from(range.size).unwrap_or(usize::MAX);
        size.min(self.buffer_cap).max(1)
    }
}

/// How far a worker got through its range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    Complete,
    /// Stopped early on an I/O error; counts cover the bytes read before it.
    Partial(String),
    Cancelled,
}

impl ChunkStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, ChunkStatus::Complete)
    }
}

#[derive(Debug)]
pub struct ChunkReport {
    pub index: usize,
    pub range: ByteRange,
    pub counts: WordCount,
    pub tokens: u64,
    pub skipped: u64,
    pub bytes_read: u64,
    pub status: ChunkStatus,
    pub elapsed: Duration,
}

impl ChunkReport {
    pub fn summary(&self) -> ChunkSummary {
        ChunkSummary {
            index: self.index,
            range: self.range,
            tokens: self.tokens,
            unique: self.counts.len(),
            skipped: self.skipped,
            bytes_read: self.bytes_read,
            status: self.status.clone(),
        }
    }
}

/// A [`ChunkReport`] without its word counts, kept after the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    pub index: usize,
    pub range: ByteRange,
    pub tokens: u64,
    pub unique: usize,
    pub skipped: u64,
    pub bytes_read: u64,
    pub status: ChunkStatus,
}

/// Counts the words of one range into a map no other task can see.
pub struct ChunkCounter<S> {
    source: Arc<S>,
    settings: ScanSettings,
    cancel: CancelFlag,
}

impl<S> Clone for ChunkCounter<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            settings: self.settings,
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: ChunkSource> ChunkCounter<S> {
    pub fn new(source: Arc<S>, settings: ScanSettings, cancel: CancelFlag) -> Self {
        Self {
            source,
            settings,
            cancel,
        }
    }

    /// Scans `range` and returns its counts. Never fails: read errors end the
    /// scan early and are recorded in the report's status.
    pub fn run(&self, index: usize, range: ByteRange) -> ChunkReport {
        let timer = Instant::now();
        log::debug!(
            "{} - reading {} size:{:.2} Mb",
            index,
            range,
            range.size as f64 / MB as f64
        );

        let mut report = ChunkReport {
            index,
            range,
            counts: WordCount::new(),
            tokens: 0,
            skipped: 0,
            bytes_read: 0,
            status: ChunkStatus::Complete,
            elapsed: Duration::ZERO,
        };

        let section = match self.source.open().and_then(|handle| SectionReader::new(handle, range)) {
            Ok(section) => section,
            Err(e) => {
                log::error!("{} - cannot open {}: {}", index, range, e);
                report.status = ChunkStatus::Partial(e.to_string());
                report.elapsed = timer.elapsed();
                return report;
            }
        };

        let mut tokens = Tokens::new(
            section,
            self.settings.buffer_size(&range),
            self.settings.max_token_len,
        )
        .with_cancel(self.cancel.clone());
        let status = loop {
            if self.cancel.is_cancelled() {
                break ChunkStatus::Cancelled;
            }
            match tokens.next_token() {
                None => break ChunkStatus::Complete,
                Some(Ok(word)) => {
                    report.tokens += 1;
                    match report.counts.get_mut(word) {
                        Some(count) => *count += 1,
                        None => {
                            report.counts.insert(word.to_vec(), 1);
                        }
                    }
                }
                Some(Err(ScanError::TokenTooLong { len, max })) => {
                    report.skipped += 1;
                    log::warn!("{} - skipped a {} byte token (limit {})", index, len, max);
                }
                Some(Err(ScanError::Io(e))) => {
                    log::error!("{} - reading input: {}", index, e);
                    break ChunkStatus::Partial(e.to_string());
                }
                Some(Err(ScanError::Cancelled)) => break ChunkStatus::Cancelled,
            }
        };
        report.status = status;
        report.bytes_read = tokens.get_ref().consumed();
        drop(tokens);

        report.elapsed = timer.elapsed();
        log::info!(
            "{} - read time:{:.1} sec, words:{}, uniq:{}",
            index,
            report.elapsed.as_secs_f64(),
            report.tokens,
            report.counts.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::io::{self, Cursor, Read, Seek, SeekFrom};

    struct MemorySource(Vec<u8>);

    impl ChunkSource for MemorySource {
        type Reader = Cursor<Vec<u8>>;

        fn open(&self) -> io::Result<Self::Reader> {
            Ok(Cursor::new(self.0.clone()))
        }

        fn len(&self) -> io::Result<u64> {
            Ok(self.0.len() as u64)
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    // fails every read at or past `fail_at`
    struct FaultyReader {
        inner: Cursor<Vec<u8>>,
        fail_at: u64,
    }

    impl Read for FaultyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let pos = self.inner.position();
            if pos >= self.fail_at {
                return Err(io::Error::other("bad sector"));
            }
            let room = (self.fail_at - pos) as usize;
            let len = buf.len().min(room);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for FaultyReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    struct FaultySource {
        data: Vec<u8>,
        fail_at: u64,
    }

    impl ChunkSource for FaultySource {
        type Reader = FaultyReader;

        fn open(&self) -> io::Result<Self::Reader> {
            Ok(FaultyReader {
                inner: Cursor::new(self.data.clone()),
                fail_at: self.fail_at,
            })
        }

        fn len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn describe(&self) -> String {
            "faulty".to_string()
        }
    }

    fn counter<S: ChunkSource>(source: S, settings: ScanSettings) -> ChunkCounter<S> {
        ChunkCounter::new(Arc::new(source), settings, CancelFlag::new())
    }

    #[test]
    fn counts_words_in_its_range_only() {
        let data = b"a b a | c c c".to_vec();
        let counter = counter(MemorySource(data), ScanSettings::default());

        let report = counter.run(0, ByteRange::new(0, 6));
        assert_eq!(report.status, ChunkStatus::Complete);
        assert_eq!(report.tokens, 3);
        assert_eq!(report.bytes_read, 6);
        assert_eq!(report.counts.get(b"a".as_slice()), Some(&2));
        assert_eq!(report.counts.get(b"b".as_slice()), Some(&1));
        assert!(!report.counts.contains_key(b"c".as_slice()));

        let report = counter.run(1, ByteRange::new(8, 5));
        assert_eq!(report.counts.get(b"c".as_slice()), Some(&3));
        assert_eq!(report.summary().unique, 1);
    }

    #[test]
    fn read_error_keeps_partial_counts() {
        let source = FaultySource {
            data: b"one two three four".to_vec(),
            fail_at: 9,
        };
        let settings = ScanSettings {
            buffer_cap: 4,
            ..ScanSettings::default()
        };
        let report = counter(source, settings).run(0, ByteRange::new(0, 18));

        assert_eq!(report.status, ChunkStatus::Partial("bad sector".to_string()));
        assert!(!report.status.is_complete());
        assert_eq!(report.counts.get(b"one".as_slice()), Some(&1));
        assert_eq!(report.counts.get(b"two".as_slice()), Some(&1));
        assert!(!report.counts.contains_key(b"four".as_slice()));
        assert_eq!(report.bytes_read, 9);
    }

    #[test]
    fn oversized_tokens_are_counted_as_skipped() {
        let data = format!("short {} short", "w".repeat(100)).into_bytes();
        let size = data.len() as u64;
        let settings = ScanSettings {
            buffer_cap: 16,
            max_token_len: 10,
        };
        let report = counter(MemorySource(data), settings).run(0, ByteRange::new(0, size));

        assert_eq!(report.status, ChunkStatus::Complete);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.tokens, 2);
        assert_eq!(report.counts.len(), 1);
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let counter = ChunkCounter::new(
            Arc::new(MemorySource(b"x y z".to_vec())),
            ScanSettings::default(),
            cancel,
        );
        let report = counter.run(0, ByteRange::new(0, 5));
        assert_eq!(report.status, ChunkStatus::Cancelled);
        assert_eq!(report.tokens, 0);
    }

    #[test]
    fn buffer_size_is_capped() {
        let settings = ScanSettings {
            buffer_cap: 100,
            max_token_len: 10,
        };
        assert_eq!(settings.buffer_size(&ByteRange::new(0, 7)), 7);
        assert_eq!(settings.buffer_size(&ByteRange::new(0, 1 << 30)), 100);
    }
}
