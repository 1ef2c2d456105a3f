use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use maxfeap::counter::HashtagCounter;
use maxfeap::{MaxFibHeap, Node};
use rudac::heap::FibonacciHeap;

const EXTRACTS: &[u64; 0x18] = &[0x10, 0x3f, 0x69, 0x78, 0x100, 0x420, 0x532, 0x548, 0x5a5, 0x62d, 0x7d9, 0x803, 0x817, 0x860, 0x874, 0x98f, 0x99c, 0xa4d, 0xb90, 0xd1e, 0xd69, 0xe71, 0xed6, 0x1000];

#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Max Fibonacci heap: hashtag counter and benchmarks")]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// count hashtags from an input file and answer top-k queries
    Count {
        /// input file with `#tag count`, `k` and `stop` lines
        input: PathBuf,
        /// where query results go, `-` for stdout
        #[clap(short, long, default_value = "output_file.txt")]
        output: PathBuf,
    },
    /// time insert and extract-max
    Bench {
        /// entries inserted per round
        #[clap(short, long, default_value_t = 0x1000)]
        entries: u64,
        /// number of rounds
        #[clap(short, long, default_value_t = 0x10)]
        rounds: usize,
        #[clap(long, value_enum, default_value_t = Against::Feap)]
        against: Against,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Against {
    Feap,
    Rudac,
}

fn count(input: PathBuf, output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(&input)?);
    let mut counter = HashtagCounter::new();
    let start = Instant::now();
    if output.as_os_str() == "-" {
        counter.run(reader, io::stdout().lock())?;
    } else {
        counter.run(reader, BufWriter::new(File::create(&output)?))?;
    }
    info!(
        "processed {} hashtags from {} in {:?}",
        counter.len(),
        input.display(),
        start.elapsed()
    );
    Ok(())
}

fn feap_bench(entries: u64, rounds: usize) {
    let mut insert_time = Duration::ZERO;
    let mut extract_time = Duration::ZERO;
    let (mut inserts, mut extracts) = (0u32, 0u32);
    for _ in 0..rounds {
        let mut heap = MaxFibHeap::new();
        for x in 0..=entries {
            let start = Instant::now();
            heap.insert(Node::new(x, ()));
            insert_time += start.elapsed();
            inserts += 1;
            if EXTRACTS.binary_search(&x).is_ok() {
                let start = Instant::now();
                let max = heap.extract_max().map(|node| node.priority());
                extract_time += start.elapsed();
                extracts += 1;
                assert_eq!(max, Ok(x));
            }
        }
        #[cfg(feature = "introspection")]
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("{:?}", heap.timer());
        }
    }
    report(insert_time, inserts, extract_time, extracts);
}

fn rudac_bench(entries: u64, rounds: usize) {
    let mut insert_time = Duration::ZERO;
    let mut extract_time = Duration::ZERO;
    let (mut inserts, mut extracts) = (0u32, 0u32);
    for _ in 0..rounds {
        let mut heap = FibonacciHeap::init_max();
        for x in 0..=entries {
            let start = Instant::now();
            heap.push(x);
            insert_time += start.elapsed();
            inserts += 1;
            if EXTRACTS.binary_search(&x).is_ok() {
                let start = Instant::now();
                let max = heap.pop();
                extract_time += start.elapsed();
                extracts += 1;
                assert_eq!(max, Some(x));
            }
        }
    }
    report(insert_time, inserts, extract_time, extracts);
}

fn report(insert_time: Duration, inserts: u32, extract_time: Duration, extracts: u32) {
    let avg = |total: Duration, n: u32| if n == 0 { total } else { total / n };
    println!(
        "Avg insert: {:?} <=> Avg extract: {:?}",
        avg(insert_time, inserts),
        avg(extract_time, extracts),
    );
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Count { input, output } => {
            if let Err(e) = count(input, output) {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
        Commands::Bench { entries, rounds, against } => match against {
            Against::Feap => feap_bench(entries, rounds),
            Against::Rudac => rudac_bench(entries, rounds),
        },
    }
    ExitCode::SUCCESS
}
