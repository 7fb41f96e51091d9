use serde_json::Value;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

use crate::chunk::ScanSettings;
use crate::counts::RunContext;
use crate::error::VocabError;
use crate::tokenizer::{DEFAULT_MAX_TOKEN_LEN, MB};

#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub corpus_file: String,
    pub output_dir: String,
    pub workers: usize,
    pub buffer_mb: usize,
    pub max_token_len: usize,
    pub timeout_secs: Option<u64>,
    pub max_vocab: Option<usize>,
    pub min_count: u64,
    pub compress: bool,
    pub log_to_file: bool,
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using parameters:
        corpus_file: {}
        output_dir: {}
        workers: {}
        buffer_mb: {}
        max_token_len: {}
        timeout_secs: {:?}
        max_vocab: {:?}
        min_count: {}
        compress: {}
        log_to_file: {}",
        self.corpus_file, self.output_dir, self.workers, self.buffer_mb, self.max_token_len,
        self.timeout_secs, self.max_vocab, self.min_count, self.compress, self.log_to_file
        )
    }
}

impl Params {
    /// The run context these parameters describe, with a fresh cancel flag.
    pub fn run_context(&self) -> RunContext {
        RunContext {
            workers: self.workers,
            scan: ScanSettings {
                buffer_cap: self.buffer_mb.saturating_mul(MB),
                max_token_len: self.max_token_len,
            },
            timeout: self.timeout_secs.map(Duration::from_secs),
            ..RunContext::default()
        }
    }
}

pub struct Config {
    params: Params
}

impl Config {

    pub fn get_params(&self) -> Params {
        self.params.clone()
    }

    /// `args` is the full argument vector; the only argument must be a path
    /// to a json parameter file.
    pub fn new(args: &[String]) -> Result<Config, VocabError> {

        if args.len() != 2 {
            return Err(VocabError::Config("input should be a path to json file only".to_string()));
        }

        let f = File::open(&args[1])
            .map_err(|e| VocabError::io(format!("cannot open json file '{}'", &args[1]), e))?;
        let json: Value = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| VocabError::Config(format!("cannot read json file: {e}")))?;

        Config::from_json(&json)
    }

    pub fn from_json(json: &Value) -> Result<Config, VocabError> {

        // input and output are required, everything else has a default
        let corpus_file = required_str(json, "corpus_file")?;
        let output_dir = required_str(json, "output_dir")?;

        let workers = optional_u64(json, "workers")?.unwrap_or(1);
        let buffer_mb = optional_u64(json, "buffer_mb")?.unwrap_or(200);
        let max_token_len = optional_u64(json, "max_token_len")?.unwrap_or(DEFAULT_MAX_TOKEN_LEN as u64);
        let timeout_secs = optional_u64(json, "timeout_secs")?;
        let max_vocab = optional_u64(json, "max_vocab")?;
        let min_count = optional_u64(json, "min_count")?.unwrap_or(1);
        let compress = optional_bool(json, "compress")?.unwrap_or(false);
        let log_to_file = optional_bool(json, "log_to_file")?.unwrap_or(false);

        if workers == 0 {
            return Err(VocabError::Config("workers must be at least 1".to_string()));
        }
        if buffer_mb == 0 || max_token_len == 0 {
            return Err(VocabError::Config("buffer_mb and max_token_len must be positive".to_string()));
        }

        let params = Params {
            corpus_file,
            output_dir,
            workers: to_usize("workers", workers)?,
            buffer_mb: to_usize("buffer_mb", buffer_mb)?,
            max_token_len: to_usize("max_token_len", max_token_len)?,
            timeout_secs,
            max_vocab: max_vocab.map(|v| to_usize("max_vocab", v)).transpose()?,
            min_count,
            compress,
            log_to_file,
        };

        Ok(Self { params })
    }

}

fn required_str(json: &Value, key: &str) -> Result<String, VocabError> {
    match json.get(key) {
        Some(Value::String(s)) => Ok(s.to_owned()),
        Some(_) => Err(VocabError::Config(format!("{key} should be a string"))),
        None => Err(VocabError::Config(format!("{key} was not supplied through json"))),
    }
}

fn optional_u64(json: &Value, key: &str) -> Result<Option<u64>, VocabError> {
    match json.get(key) {
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| VocabError::Config(format!("given {key} is not a non-negative integer"))),
        None => Ok(None),
    }
}

fn optional_bool(json: &Value, key: &str) -> Result<Option<bool>, VocabError> {
    match json.get(key) {
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| VocabError::Config(format!("given {key} is not boolean"))),
        None => Ok(None),
    }
}

fn to_usize(key: &str, value: u64) -> Result<usize, VocabError> {
    usize::try_from(value).map_err(|_| VocabError::Config(format!("{key} is too large")))
}
