use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;

use crate::aggregate::{Aggregator, CompletionBarrier};
use crate::cancel::CancelFlag;
use crate::chunk::{ChunkCounter, ChunkSummary, ScanSettings};
use crate::error::VocabError;
use crate::partition::partition;
use crate::section::{ChunkSource, FileSource};
use crate::tokenizer::MB;
use crate::vocab::{RankedVocabulary, Vocabulary};

/// Everything one vocabulary run needs, passed in rather than held globally.
#[derive(Debug, Clone)]
pub struct RunContext {
    // ranges, and pool threads scanning them
    pub workers: usize,
    pub scan: ScanSettings,
    /// Limit on the wait for all chunks; `None` waits forever.
    pub timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            workers: 1,
            scan: ScanSettings::default(),
            timeout: None,
            cancel: CancelFlag::new(),
        }
    }
}

impl RunContext {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }
}

/// Outcome of a run: the vocabulary plus how much of the input it covers.
#[derive(Debug)]
pub struct VocabReport {
    pub vocabulary: Vocabulary,
    pub ranked: RankedVocabulary,
    pub file_size: u64,
    // one per range, in range order
    pub chunks: Vec<ChunkSummary>,
    pub elapsed: Duration,
}

impl VocabReport {
    pub fn distinct_words(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn total_tokens(&self) -> u64 {
        self.chunks.iter().map(|c| c.tokens).sum()
    }

    pub fn skipped_tokens(&self) -> u64 {
        self.chunks.iter().map(|c| c.skipped).sum()
    }

    pub fn bytes_scanned(&self) -> u64 {
        self.chunks.iter().map(|c| c.bytes_read).sum()
    }

    pub fn incomplete_chunks(&self) -> impl Iterator<Item = &ChunkSummary> {
        self.chunks.iter().filter(|c| !c.status.is_complete())
    }

    /// True when every chunk finished and every byte of the file was scanned.
    pub fn is_complete(&self) -> bool {
        self.incomplete_chunks().next().is_none() && self.bytes_scanned() == self.file_size
    }

    pub fn log_summary(&self) {
        log::info!(
            "counted {} tokens, {} distinct, scanned {} of {} bytes in {:.1} sec",
            self.total_tokens(),
            self.distinct_words(),
            self.bytes_scanned(),
            self.file_size,
            self.elapsed.as_secs_f64()
        );
        if self.skipped_tokens() > 0 {
            log::warn!("{} oversized token(s) skipped", self.skipped_tokens());
        }
        for chunk in self.incomplete_chunks() {
            log::warn!(
                "chunk {} {} incomplete ({:?}), read {} of {} bytes",
                chunk.index,
                chunk.range,
                chunk.status,
                chunk.bytes_read,
                chunk.range.size
            );
        }
    }
}

pub struct Counts {}

impl Counts {
    pub fn run(path: impl AsRef<Path>, ctx: &RunContext) -> Result<VocabReport, VocabError> {
        Counts::run_source(FileSource::new(path), ctx)
    }

    /// Splits `source` into `ctx.workers` ranges, counts each on its own pool
    /// thread and merges the results on the calling thread.
    ///
    /// Setup failures (stat, open, partitioning, pool creation) are returned
    /// as errors. Read failures inside a worker only shorten that worker's
    /// chunk and show up in [`VocabReport::chunks`].
    pub fn run_source<S: ChunkSource + 'static>(
        source: S,
        ctx: &RunContext,
    ) -> Result<VocabReport, VocabError> {
        let timer = Instant::now();
        let name = source.describe();

        let file_size = source
            .len()
            .map_err(|e| VocabError::io(format!("failed to get stats for '{name}'"), e))?;
        // fail here rather than in every worker when the file cannot be read at all
        source
            .open()
            .map_err(|e| VocabError::io(format!("failed to open '{name}'"), e))?;

        let parts = i64::try_from(ctx.workers).unwrap_or(i64::MAX);
        let ranges = partition(i64::try_from(file_size).unwrap_or(i64::MAX), parts)?;
        log::info!(
            "file '{}': {} chunks, first {:.2} Mb, using {} threads on {} cores",
            name,
            ranges.len(),
            ranges[0].size as f64 / MB as f64,
            ctx.workers,
            rayon::current_num_threads()
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(ctx.workers)
            .thread_name(|i| format!("chunk-{i}"))
            .panic_handler(|_| log::error!("a chunk worker panicked"))
            .build()?;

        let (tx, rx) = mpsc::channel();
        let counter = ChunkCounter::new(Arc::new(source), ctx.scan, ctx.cancel.clone());
        for (index, range) in ranges.iter().copied().enumerate() {
            let counter = counter.clone();
            let tx = tx.clone();
            pool.spawn(move || {
                let report = counter.run(index, range);
                // the aggregator only hangs up after giving up on the run
                let _ = tx.send(report);
            });
        }
        drop(tx);

        let mut aggregator = Aggregator::new(CompletionBarrier::new(ranges.len()));
        if let Err(e) = aggregator.collect(&rx, ctx.timeout) {
            ctx.cancel.cancel();
            return Err(e);
        }
        let (vocabulary, chunks) = aggregator.finish()?;
        let ranked = vocabulary.rank();

        Ok(VocabReport {
            vocabulary,
            ranked,
            file_size,
            chunks,
            elapsed: timer.elapsed(),
        })
    }
}
