use crate::error::TraceError;
use crate::facts::{self, FactSource, StraceFactSource};
use crate::reconciler::Reconciler;
use crate::signatures::SignatureTable;
use crate::tree;
use crate::types::StraceBehavior;
use anyhow::Result;
use log::debug;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct ProcessStats {
    pub total_lines: usize,
    pub records: usize,
    pub processes: usize,
    pub time_reading: Duration,
    pub time_parsing: Duration,
    pub time_tree: Duration,
}

impl ProcessStats {
    pub fn accumulate(&mut self, other: &ProcessStats) {
        self.total_lines += other.total_lines;
        self.records += other.records;
        self.processes += other.processes;
        self.time_reading += other.time_reading;
        self.time_parsing += other.time_parsing;
        self.time_tree += other.time_tree;
    }
}

/// Read a whole trace into memory; a missing trace is fatal
pub fn read_trace(path: &Path) -> Result<String, TraceError> {
    std::fs::read_to_string(path).map_err(|source| TraceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Run both components over one trace
pub fn analyze_trace<S>(
    trace: &str,
    signatures: &SignatureTable,
    source: &S,
) -> (StraceBehavior, ProcessStats)
where
    S: FactSource + ?Sized,
{
    let mut stats = ProcessStats {
        total_lines: trace.lines().count(),
        ..ProcessStats::default()
    };

    let parse_start = Instant::now();
    let processes = Reconciler::new(signatures).reconcile_and_parse(trace);
    stats.time_parsing = parse_start.elapsed();
    stats.records = processes.len();

    let tree_start = Instant::now();
    let facts = facts::collect_facts(source, trace);
    stats.processes = facts.len();
    let processtree = tree::build_tree(facts);
    stats.time_tree = tree_start.elapsed();

    debug!(
        "Analysed {} lines: {} syscall records, {} processes in {} trees",
        stats.total_lines,
        stats.records,
        stats.processes,
        processtree.len()
    );

    (
        StraceBehavior {
            processes,
            processtree,
        },
        stats,
    )
}

/// Analyse a single trace file with the default strace fact source
pub fn process_file(
    signatures: &SignatureTable,
    file_path: &Path,
) -> Result<(StraceBehavior, ProcessStats)> {
    let read_start = Instant::now();
    let trace = read_trace(file_path)?;
    let time_reading = read_start.elapsed();

    let (behavior, mut stats) = analyze_trace(&trace, signatures, &StraceFactSource);
    stats.time_reading = time_reading;
    Ok((behavior, stats))
}
