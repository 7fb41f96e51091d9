// later stages (co-occurrence counting, shard sorting) only ever see a ranked vocabulary

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::Params;
use crate::error::VocabError;
use crate::vocab::{RankedEntry, RankedVocabulary};

pub trait VocabConsumer {
    type Error;
    fn consume(&mut self, vocab: &RankedVocabulary) -> Result<(), Self::Error>;
}

/// Writes the kept part of the vocabulary to `output_dir`:
/// - `vocab.txt` (or `vocab.txt.gz`): one `word count` line per entry, in rank order
/// - `words.json`: word -> id, ids being ranks, words escaped by
///   [`RankedEntry::escaped`]
#[derive(Debug, Clone)]
pub struct VocabFileWriter {
    output_dir: PathBuf,
    compress: bool,
    max_vocab: Option<usize>,
    min_count: u64,
}

impl VocabFileWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            compress: false,
            max_vocab: None,
            min_count: 1,
        }
    }

    pub fn from_params(params: &Params) -> Self {
        Self {
            output_dir: PathBuf::from(&params.output_dir),
            compress: params.compress,
            max_vocab: params.max_vocab,
            min_count: params.min_count,
        }
    }

    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn limits(mut self, max_vocab: Option<usize>, min_count: u64) -> Self {
        self.max_vocab = max_vocab;
        self.min_count = min_count;
        self
    }

    pub fn counts_path(&self) -> PathBuf {
        let name = if self.compress { "vocab.txt.gz" } else { "vocab.txt" };
        self.output_dir.join(name)
    }

    pub fn ids_path(&self) -> PathBuf {
        self.output_dir.join("words.json")
    }

    fn write_counts(&self, vocab: &RankedVocabulary) -> io::Result<()> {
        let f = BufWriter::new(File::create(self.counts_path())?);
        let entries = vocab.kept(self.max_vocab, self.min_count);
        if self.compress {
            let mut writer = GzEncoder::new(f, Compression::default());
            write_lines(&mut writer, entries)?;
            writer.finish()?.flush()
        } else {
            let mut writer = f;
            write_lines(&mut writer, entries)?;
            writer.flush()
        }
    }

    fn write_ids(&self, vocab: &RankedVocabulary) -> io::Result<()> {
        // json keys must be text; escaping keeps every distinct word a distinct key
        let t2i: HashMap<String, usize> = vocab
            .kept(self.max_vocab, self.min_count)
            .enumerate()
            .map(|(i, entry)| (entry.escaped().into_owned(), i))
            .collect();
        let f = BufWriter::new(File::create(self.ids_path())?);
        serde_json::to_writer(f, &t2i)?;
        Ok(())
    }
}

fn write_lines<'a, W: Write>(
    w: &mut W,
    entries: impl Iterator<Item = &'a RankedEntry>,
) -> io::Result<()> {
    for entry in entries {
        w.write_all(&entry.word)?;
        writeln!(w, " {}", entry.count)?;
    }
    Ok(())
}

impl VocabConsumer for VocabFileWriter {
    type Error = VocabError;

    fn consume(&mut self, vocab: &RankedVocabulary) -> Result<(), VocabError> {
        let dir = self.output_dir.display().to_string();
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| VocabError::io(format!("cannot create '{dir}'"), e))?;
        self.write_counts(vocab)
            .map_err(|e| VocabError::io(format!("cannot write counts to '{dir}'"), e))?;
        self.write_ids(vocab)
            .map_err(|e| VocabError::io(format!("cannot write word ids to '{dir}'"), e))?;
        log::info!("saved vocabulary to {}", dir);
        Ok(())
    }
}
