use strace_behavior::config::{AnalysisConfig, DEFAULT_OUTPUT, SIGNATURES_ENV};
use strace_behavior::database::{BehaviorAppender, Database};
use strace_behavior::parallel_processor;
use strace_behavior::processor::ProcessStats;
use strace_behavior::signatures::SignatureTable;

use anyhow::{Context, Result, bail};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "strace-behavior")]
#[command(about = "Decode strace logs into syscall records and process trees", long_about = None)]
struct Args {
    /// Syscall signature data file (linux-syscalls.json)
    #[arg(short = 'S', long, env = SIGNATURES_ENV)]
    signatures: PathBuf,

    /// Output database path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Also write one JSON result per trace into this directory
    #[arg(short, long)]
    json_dir: Option<PathBuf>,

    /// Sequential mode (disable parallel processing)
    #[arg(short, long)]
    sequential: bool,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Input trace files
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    if args.files.is_empty() {
        bail!("No input files specified");
    }

    let signatures = Arc::new(
        SignatureTable::from_path(&args.signatures).context("Failed to load syscall signatures")?,
    );
    info!("Loaded {} syscall signatures", signatures.len());

    // Delete existing database if it exists
    if args.output.exists() {
        std::fs::remove_file(&args.output).context("Failed to delete existing database")?;
    }

    let db_path = args
        .output
        .to_str()
        .context("Output path is not valid UTF-8")?;
    let db = Arc::new(Database::init(db_path)?);

    let mut config = AnalysisConfig::new(args.output.clone());
    if let Some(dir) = args.json_dir {
        config = config.with_json_dir(dir);
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }

    println!("Processing {} trace(s)...", args.files.len());

    let start = std::time::Instant::now();
    let total_stats = if args.sequential {
        let mut total_stats = ProcessStats::default();

        let conn = db.get_connection();
        let conn = conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;
        let mut appender = BehaviorAppender::new(&conn)?;

        for file_path in &args.files {
            println!("Processing: {}", file_path.display());
            let stats =
                parallel_processor::process_trace(&mut appender, &signatures, &config, file_path)?;
            total_stats.accumulate(&stats);

            println!(
                "  Lines: {} total, {} syscall records, {} processes",
                stats.total_lines, stats.records, stats.processes
            );
        }
        appender.flush()?;
        total_stats
    } else {
        println!("Using {} threads", config.threads);
        parallel_processor::process_files_parallel(
            Arc::clone(&db),
            Arc::clone(&signatures),
            &config,
            args.files,
        )?
    };

    let elapsed = start.elapsed();

    println!("\n=== Summary ===");
    println!("Total lines:  {}", total_stats.total_lines);
    println!("Records:      {}", total_stats.records);
    println!("Processes:    {}", total_stats.processes);
    println!("Time:         {:.2}s", elapsed.as_secs_f64());
    println!(
        "Throughput:   {:.1}K lines/sec",
        total_stats.total_lines as f64 / elapsed.as_secs_f64() / 1000.0
    );

    println!("\n=== Time Breakdown ===");
    let total_work = total_stats.time_reading + total_stats.time_parsing + total_stats.time_tree;
    let share = |part: std::time::Duration| {
        if total_work.is_zero() {
            0.0
        } else {
            part.as_secs_f64() / total_work.as_secs_f64() * 100.0
        }
    };
    println!(
        "File I/O:     {:.2}s ({:.1}%)",
        total_stats.time_reading.as_secs_f64(),
        share(total_stats.time_reading)
    );
    println!(
        "Reconcile:    {:.2}s ({:.1}%)",
        total_stats.time_parsing.as_secs_f64(),
        share(total_stats.time_parsing)
    );
    println!(
        "Tree:         {:.2}s ({:.1}%)",
        total_stats.time_tree.as_secs_f64(),
        share(total_stats.time_tree)
    );

    println!("\nDatabase:     {}", args.output.display());
    println!("Syscalls in DB:  {}", db.count_syscalls()?);
    println!("Processes in DB: {}", db.count_processes()?);

    Ok(())
}
