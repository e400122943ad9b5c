use std::fs::File;
use std::time::Instant;

use clap::{ArgAction, Parser};
use log::{debug, LevelFilter};
use prefetchlib::config::{ByteSize, CacheConfig, PrefetcherConfig, ReplacementPolicyConfig};
use prefetchlib::io::get_reader;
use prefetchlib::simulator::Simulator;
use simplelog::{ColorChoice, TermLogger, TerminalMode};

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Set-associative cache simulator with replacement policies and prefetching"))]
struct Args {
    /// Trace file, one `<R|W> <hex address>` reference per line
    trace: String,

    /// JSON cache configuration, replaces all of the cache options below
    #[arg(short, long)]
    config: Option<String>,

    /// Total cache size in bytes, suffixes K, M and G are accepted
    #[arg(long, default_value = "32K")]
    cache_size: ByteSize,

    /// Line size in bytes
    #[arg(long, default_value = "64")]
    line_size: ByteSize,

    #[arg(long, default_value_t = 4)]
    associativity: u32,

    #[arg(long, value_enum, default_value_t = ReplacementPolicyConfig::LeastRecentlyUsed)]
    replacement_policy: ReplacementPolicyConfig,

    #[arg(long, value_enum, default_value_t = PrefetcherConfig::Null)]
    prefetcher: PrefetcherConfig,

    /// Lines fetched ahead by the sequential prefetcher
    #[arg(long)]
    prefetch_amount: Option<u32>,

    /// Seed for the random replacement policy
    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,

    /// Log more, repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn cache_config(&self) -> Result<CacheConfig, String> {
        match &self.config {
            Some(path) => CacheConfig::from_path(path)
                .map_err(|e| format!("Couldn't load the config file at path {path}: {e}")),
            None => Ok(CacheConfig {
                cache_size: self.cache_size,
                line_size: self.line_size,
                associativity: self.associativity,
                replacement_policy: self.replacement_policy,
                prefetcher: self.prefetcher,
                prefetch_amount: self.prefetch_amount,
                seed: self.seed,
            }),
        }
    }
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .map_err(|e| format!("Couldn't initialise logging: {e}"))?;

    let config = args.cache_config()?;
    debug!("Parsed configuration: {config:?}");
    let mut simulator =
        Simulator::new(&config).map_err(|e| format!("Invalid cache configuration: {e}"))?;
    let trace_file = File::open(&args.trace)
        .map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let trace_reader = get_reader(trace_file).map_err(|e| e.to_string())?;
    let result = simulator
        .simulate(trace_reader)
        .map_err(|e| format!("Couldn't simulate {}: {e}", args.trace))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result)
            .map_err(|e| format!("Couldn't serialise the output {e}"))?
    );
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!(
            "Total execution time (includes initial parsing, configuration, and output): {}s",
            total_time.as_nanos() as f64 / 1e9
        )
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        println!(
            "Uninitialised cache lines: {}",
            simulator.get_invalid_line_count()
        );
    }
    Ok(())
}
