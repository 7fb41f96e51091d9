//! Parallel, bounded-memory vocabulary builder: split the file into byte
//! ranges, count each on its own worker, merge and rank by frequency.

mod aggregate;
mod cancel;
mod chunk;
mod config;
mod consumer;
mod counts;
mod error;
mod partition;
mod pipeline;
mod section;
mod tokenizer;
mod vocab;
pub mod logging;

pub use aggregate::{merge, Aggregator, CompletionBarrier};
pub use cancel::CancelFlag;
pub use chunk::{ChunkCounter, ChunkReport, ChunkStatus, ChunkSummary, ScanSettings};
pub use config::{Config, Params};
pub use consumer::{VocabConsumer, VocabFileWriter};
pub use counts::{Counts, RunContext, VocabReport};
pub use error::{ScanError, VocabError};
pub use partition::{partition, ByteRange};
pub use pipeline::Pipeline;
pub use section::{ChunkSource, FileSource, SectionReader};
pub use tokenizer::{is_space, Tokenizer, Tokens, WhitespaceTokenizer, DEFAULT_MAX_TOKEN_LEN, KB, MB};
pub use vocab::{rank, RankedEntry, RankedVocabulary, Vocabulary, Word, WordCount};
