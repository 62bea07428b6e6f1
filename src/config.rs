//! Configuration and constants for the CLI.

use std::path::{Path, PathBuf};

/// DuckDB file written when `--output` is not given
pub const DEFAULT_OUTPUT: &str = "strace-behavior.duckdb";

/// Environment variable naming the syscall signature data file
pub const SIGNATURES_ENV: &str = "STRACE_SIGNATURES";

pub const JSON_EXTENSION: &str = "json";

/// Settings shared by every trace analysed in one run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub output: PathBuf,
    pub json_dir: Option<PathBuf>,
    pub threads: usize,
}

impl AnalysisConfig {
    pub fn new(output: PathBuf) -> Self {
        Self {
            output,
            json_dir: None,
            threads: num_cpus::get(),
        }
    }

    pub fn with_json_dir(mut self, dir: PathBuf) -> Self {
        self.json_dir = Some(dir);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// JSON destination for a trace: `<json_dir>/<trace file name>.json`
    pub fn json_path_for(&self, trace: &Path) -> Option<PathBuf> {
        let dir = self.json_dir.as_ref()?;
        let name = trace.file_name()?.to_string_lossy();
        Some(dir.join(format!("{}.{}", name, JSON_EXTENSION)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_path_for() {
        let config = AnalysisConfig::new(PathBuf::from("out.duckdb"));
        assert_eq!(config.json_path_for(Path::new("/tmp/strace.log")), None);

        let config = config.with_json_dir(PathBuf::from("/results"));
        assert_eq!(
            config.json_path_for(Path::new("/tmp/strace.log")),
            Some(PathBuf::from("/results/strace.log.json"))
        );
    }

    #[test]
    fn test_threads_at_least_one() {
        let config = AnalysisConfig::new(PathBuf::from("out.duckdb")).with_threads(0);
        assert_eq!(config.threads, 1);
    }
}
