//! JSON result writer.
//!
//! One file per trace, holding the `processes` and `processtree` keys.

use crate::error::OutputError;
use crate::types::StraceBehavior;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Write an analysis result as pretty-printed JSON, creating parent
/// directories as needed
pub fn write_behavior(
    behavior: &StraceBehavior,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    if output_path.as_os_str().is_empty() || output_path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "{} is not a file path",
            output_path.display()
        )));
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(writer, behavior)?;

    info!(
        "Wrote {} records and {} process trees to {}",
        behavior.processes.len(),
        behavior.processtree.len(),
        output_path.display()
    );
    Ok(())
}

/// Read back a result written by [`write_behavior`]
pub fn read_behavior(path: impl AsRef<Path>) -> Result<StraceBehavior, OutputError> {
    let reader = BufReader::new(File::open(path.as_ref()).map_err(OutputError::ReadFailed)?);
    Ok(serde_json::from_reader(reader)?)
}
