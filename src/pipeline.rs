// imports
use crate::config::{Config, Params};
use crate::consumer::{VocabConsumer, VocabFileWriter};
use crate::counts::{Counts, VocabReport};
use crate::logging::{self, LogDestination};

use std::env;
use std::error::Error;
use std::time::Instant;
use log::LevelFilter;

pub struct Pipeline {}

impl Pipeline {

    // runs the vocabulary stage end to end -
    // -> configuration of arguments
    // -> parallel word counting and ranking
    // -> hand-off to the downstream consumer

    pub fn run() -> Result<(), Box<dyn Error>> {

        let args: Vec<String> = env::args().collect();
        let params = Config::new(&args)?.get_params();

        logging::initialize(
            LogDestination::for_output(&params.output_dir, params.log_to_file),
            LevelFilter::Info,
        );
        log::info!("{}", params);

        let mut writer = VocabFileWriter::from_params(&params);
        let report = Pipeline::run_with(&params, &mut writer)?;
        if !report.is_complete() {
            log::warn!("vocabulary is missing part of the input, see chunk warnings above");
        }
        Ok(())

    }

    /// Builds the vocabulary described by `params` and passes it to `consumer`.
    pub fn run_with<C>(params: &Params, consumer: &mut C) -> Result<VocabReport, Box<dyn Error>>
    where
        C: VocabConsumer,
        C::Error: Error + 'static,
    {

        let timer = Instant::now();
        log::info!("building vocabulary...");
        let report = Counts::run(&params.corpus_file, &params.run_context())?;
        report.log_summary();
        report.ranked.log_head(10);
        log::info!("finished vocabulary, took {:.1} seconds", timer.elapsed().as_secs_f64());

        // co-occurrence shards, sorting and serialization all start from here
        consumer.consume(&report.ranked)?;

        Ok(report)

    }

}
