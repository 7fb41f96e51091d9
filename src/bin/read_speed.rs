use std::env;
use std::error::Error;
use std::io::{self, Read};
use std::time::{Duration, Instant};

use log::LevelFilter;
use rayon::{prelude::*, ThreadPoolBuilder};
extern crate vocab_prep;
use vocab_prep::logging::{self, LogDestination};
use vocab_prep::{partition, ByteRange, ChunkSource, FileSource, SectionReader, MB};

// measures raw read throughput with the same range split the vocabulary
// builder uses, to find the worker count that saturates the disk.
// arguments: path to file, block size in Mb (default 4), number of workers (default 1)
// example: ... corpus.txt 16 8

fn main() -> Result<(), Box<dyn Error>> {

    logging::initialize(LogDestination::Terminal, LevelFilter::Info);

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 4 {
        return Err("usage: read_speed <file> [block_mb] [workers]".into());
    }
    let block_mb: usize = args.get(2).map(|s| s.parse()).transpose()?.unwrap_or(4);
    let workers: usize = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(1);

    let source = FileSource::new(&args[1]);
    let file_size = source.len()?;
    let ranges = partition(i64::try_from(file_size)?, i64::try_from(workers)?)?;

    let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
    let timer = Instant::now();
    let reads: Vec<io::Result<(u64, Duration)>> = pool.install(|| {
        ranges.par_iter().enumerate().map(|(i, range)| {
            read_range(&source, i, *range, block_mb.max(1) * MB)
        }).collect()
    });
    let wall = timer.elapsed().as_secs_f64();

    let mut count = 0u64;
    let mut busy = 0.0;
    for read in reads {
        let (n, took) = read?;
        count += n;
        busy += took.as_secs_f64();
    }

    let mb = count as f64 / MB as f64;
    log::info!("{:.0} Mb total in {:.2}s, aggregate {:.2} Mb/sec", mb, wall, mb / wall);
    log::info!("avg per worker: {:.2} Mb/sec", mb / busy.max(f64::EPSILON));
    Ok(())

}

fn read_range(source: &FileSource, index: usize, range: ByteRange, block: usize) -> io::Result<(u64, Duration)> {

    let mut section = SectionReader::new(source.open()?, range)?;
    let mut mem = vec![0u8; block];

    let timer = Instant::now();
    let mut count = 0u64;
    loop {
        match section.read(&mut mem) {
            Ok(0) => break,
            Ok(n) => count += n as u64,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let took = timer.elapsed();

    let secs = took.as_secs_f64().max(f64::EPSILON);
    log::info!("\t{} - {} Mb read, took {:.2}s - {:.2} Mb/s", index, count / MB as u64, secs, count as f64 / MB as f64 / secs);
    Ok((count, took))

}
