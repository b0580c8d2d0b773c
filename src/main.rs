use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use pals_rust::align::{self, AlignOpt};
use pals_rust::io::morass::DEFAULT_CHUNK;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "pals-rust", author, version, about = "Pairwise and self local alignment of long DNA sequences", arg_required_else_help = true)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Align a query FASTA against a target FASTA
    Align {
        /// Target FASTA file
        target: String,
        /// Query FASTA file
        query: String,
        #[command(flatten)]
        opts: Opts,
    },
    /// Find repeats within a single FASTA
    Repeats {
        /// Sequence FASTA file
        target: String,
        #[command(flatten)]
        opts: Opts,
    },
}

#[derive(Args, Debug)]
struct Opts {
    /// Output GFF path (stdout if omitted)
    #[arg(short, long)]
    out: Option<String>,
    /// Minimum hit length
    #[arg(short = 'l', long = "length", default_value_t = 400)]
    length: usize,
    /// Minimum hit identity
    #[arg(short = 'i', long = "identity", default_value_t = 0.94)]
    identity: f64,
    /// K-mer length (derived from target size if omitted)
    #[arg(long = "word-size")]
    word_size: Option<usize>,
    /// Diagonal distance between filter tubes
    #[arg(long = "tube-offset")]
    tube_offset: Option<usize>,
    /// Maximum errors within a minimum-length hit
    #[arg(long = "max-error")]
    max_error: Option<usize>,
    /// Upper bound on index memory in bytes
    #[arg(long = "max-mem")]
    max_mem: Option<usize>,
    /// Worker threads for strand and DP parallelism
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,
    /// Only align the forward strand
    #[arg(long = "forward-only")]
    forward_only: bool,
    /// Filter hits held in memory before spilling to disk
    #[arg(long = "spool-chunk", default_value_t = DEFAULT_CHUNK)]
    spool_chunk: usize,
}

impl From<&Opts> for AlignOpt {
    fn from(o: &Opts) -> Self {
        AlignOpt {
            min_hit_length: o.length,
            min_identity: o.identity,
            word_size: o.word_size,
            tube_offset: o.tube_offset,
            max_error: o.max_error,
            max_mem: o.max_mem,
            threads: o.threads,
            forward_only: o.forward_only,
            spool_chunk: o.spool_chunk,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Both strands and the DP stage share this pool, so `-t 1` keeps the whole run on one worker.
fn init_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        anyhow::bail!("--threads must be at least 1");
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("cannot configure thread pool")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("started at {}", chrono::Utc::now().to_rfc3339());

    match cli.command {
        Commands::Align { target, query, opts } => {
            init_threads(opts.threads)?;
            run(&target, Some(&query), &opts)
        }
        Commands::Repeats { target, opts } => {
            init_threads(opts.threads)?;
            run(&target, None, &opts)
        }
    }
}

fn run(target: &str, query: Option<&str>, opts: &Opts) -> Result<()> {
    let opt = AlignOpt::from(opts);
    align::align_files(target, query, opts.out.as_deref(), &opt)
}
