use crate::config::AnalysisConfig;
use crate::database::{BehaviorAppender, Database};
use crate::output;
use crate::processor::{self, ProcessStats};
use crate::signatures::SignatureTable;
use anyhow::{Context, Result};
use crossbeam::channel;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::Instant;

/// Analyse one trace and store its result in the database and, if
/// configured, as JSON
pub fn process_trace(
    appender: &mut BehaviorAppender<'_>,
    signatures: &SignatureTable,
    config: &AnalysisConfig,
    file_path: &Path,
) -> Result<ProcessStats> {
    let (behavior, stats) = processor::process_file(signatures, file_path)?;

    if let Some(json_path) = config.json_path_for(file_path) {
        output::write_behavior(&behavior, &json_path)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
    }

    let trace_file = file_path.display().to_string();
    appender.append(&trace_file, &behavior)?;
    Ok(stats)
}

pub fn process_files_parallel(
    db: Arc<Database>,
    signatures: Arc<SignatureTable>,
    config: &AnalysisConfig,
    files: Vec<PathBuf>,
) -> Result<ProcessStats> {
    let num_threads = config.threads.min(files.len()).max(1);
    let num_files = files.len();
    let (sender, receiver) = channel::unbounded::<PathBuf>();

    for file in files {
        sender.send(file)?;
    }
    drop(sender);

    let progress = ProgressBar::new(num_files as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} traces ({percent}%) | {msg}",
            )?
            .progress_chars("#>-"),
    );

    let files_processed = Arc::new(AtomicUsize::new(0));
    let total_stats = Arc::new(Mutex::new(ProcessStats::default()));
    let start_time = Instant::now();

    let mut handles = vec![];

    for worker_id in 0..num_threads {
        let receiver = receiver.clone();
        let db = Arc::clone(&db);
        let signatures = Arc::clone(&signatures);
        let config = config.clone();
        let totals = Arc::clone(&total_stats);
        let files_done = Arc::clone(&files_processed);
        let progress = progress.clone();

        let handle = thread::spawn(move || -> Result<()> {
            // Clone connection for this worker (connection to same DB instance)
            let worker_conn = {
                let main_conn = db.get_connection();
                let conn = main_conn
                    .lock()
                    .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;
                conn.try_clone()?
            };

            let mut appender = BehaviorAppender::new(&worker_conn)?;

            while let Ok(file_path) = receiver.recv() {
                debug!("[Worker {}] analysing {}", worker_id, file_path.display());

                match process_trace(&mut appender, &signatures, &config, &file_path) {
                    Ok(stats) => {
                        let total_records = {
                            let mut totals = totals
                                .lock()
                                .map_err(|_| anyhow::anyhow!("stats lock poisoned"))?;
                            totals.accumulate(&stats);
                            totals.records
                        };

                        let done = files_done.fetch_add(1, Ordering::SeqCst) + 1;
                        let elapsed = start_time.elapsed().as_secs_f64();
                        let records_per_sec = if elapsed > 0.0 {
                            total_records as f64 / elapsed
                        } else {
                            0.0
                        };

                        progress.set_position(done as u64);
                        progress.set_message(format!(
                            "{:.1}K records/sec | Last: {}",
                            records_per_sec / 1000.0,
                            file_path
                                .file_name()
                                .and_then(|n| n.to_str())
                                .unwrap_or("unknown")
                        ));
                    }
                    Err(e) => {
                        warn!(
                            "[Worker {}] Error processing {}: {:#}",
                            worker_id,
                            file_path.display(),
                            e
                        );
                        progress.inc(1);
                    }
                }
            }

            appender.flush()?;
            Ok(())
        });

        handles.push(handle);
    }

    for (i, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Worker {} returned error: {:#}", i, e),
            Err(_) => warn!("Worker {} panicked", i),
        }
    }

    progress.finish_with_message("Complete!");

    let totals = total_stats
        .lock()
        .map_err(|_| anyhow::anyhow!("stats lock poisoned"))?
        .clone();
    Ok(totals)
}
