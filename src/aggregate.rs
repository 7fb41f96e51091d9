// workers hand whole partial maps over the channel; only the aggregator
// touches the merged map, and merge order does not change the result

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::chunk::{ChunkReport, ChunkSummary};
use crate::error::VocabError;
use crate::vocab::{Vocabulary, WordCount};


pub fn merge(dst: &mut WordCount, mut src: WordCount) {
    // fold the smaller map into the larger one
    if src.len() > dst.len() {
        std::mem::swap(dst, &mut src);
    }
    for (word, count) in src {
        *dst.entry(word).or_insert(0) += count;
    }
}

/// Counts handed-off reports until every expected chunk has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionBarrier {
    expected: usize,
    arrived: usize,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            arrived: 0,
        }
    }

    pub fn arrive(&mut self) {
        if self.arrived < self.expected {
            self.arrived += 1;
        }
    }

    pub fn pending(&self) -> usize {
        self.expected - self.arrived
    }

    pub fn is_complete(&self) -> bool {
        self.arrived == self.expected
    }
}

pub struct Aggregator {
    global: WordCount,
    barrier: CompletionBarrier,
    summaries: Vec<ChunkSummary>,
}

impl Aggregator {
    pub fn new(barrier: CompletionBarrier) -> Self {
        Self {
            global: WordCount::new(),
            barrier,
            summaries: Vec::new(),
        }
    }

    /// Takes ownership of one worker's report and folds it in.
    pub fn absorb(&mut self, report: ChunkReport) {
        self.summaries.push(report.summary());
        merge(&mut self.global, report.counts);
        self.barrier.arrive();
        log::debug!(
            "merged chunk {}, {} pending, {} distinct words so far",
            report.index,
            self.barrier.pending(),
            self.global.len()
        );
    }

    pub fn pending(&self) -> usize {
        self.barrier.pending()
    }

    /// Receives reports until the barrier is satisfied.
    ///
    /// Fails with [`VocabError::Timeout`] if `timeout` elapses first, or
    /// [`VocabError::WorkerLost`] if every sender hung up early.
    pub fn collect(
        &mut self,
        rx: &Receiver<ChunkReport>,
        timeout: Option<Duration>,
    ) -> Result<(), VocabError> {
        let started = Instant::now();
        while !self.barrier.is_complete() {
            let received = match timeout {
                Some(limit) => rx.recv_timeout(limit.saturating_sub(started.elapsed())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(report) => self.absorb(report),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(VocabError::Timeout {
                        waited: started.elapsed(),
                        pending: self.barrier.pending(),
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(VocabError::WorkerLost {
                        pending: self.barrier.pending(),
                    })
                }
            }
        }
        Ok(())
    }

    /// The merged vocabulary and per-chunk summaries in chunk order.
    /// Only available once every expected report was absorbed.
    pub fn finish(mut self) -> Result<(Vocabulary, Vec<ChunkSummary>), VocabError> {
        if !self.barrier.is_complete() {
            return Err(VocabError::WorkerLost {
                pending: self.barrier.pending(),
            });
        }
        self.summaries.sort_by_key(|s| s.index);
        Ok((Vocabulary::new(self.global), self.summaries))
    }
}
