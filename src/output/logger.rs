use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{JobFailure, Result};
use crate::output::Stats;

/// Append-only run log, one timestamped line per event.
#[derive(Clone)]
pub struct RunLog {
    file: Arc<Mutex<File>>,
}

impl RunLog {
    pub fn new(log_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn log(&self, message: &str) -> Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "run log lock poisoned"))?;
        writeln!(file, "{}", message)?;
        file.flush()?;
        Ok(())
    }

    pub fn log_with_timestamp(&self, message: &str) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        self.log(&format!("[{}] {}", timestamp, message))
    }
}

static GLOBAL_LOG: Mutex<Option<RunLog>> = Mutex::new(None);

pub fn init_logger(log_path: &Path) -> Result<()> {
    let log = RunLog::new(log_path)?;
    if let Ok(mut global) = GLOBAL_LOG.lock() {
        *global = Some(log);
    }
    Ok(())
}

fn with_log(f: impl FnOnce(&RunLog)) {
    if let Ok(global) = GLOBAL_LOG.lock() {
        if let Some(log) = global.as_ref() {
            f(log);
        }
    }
}

/// Writes a timestamped line if a run log is open; otherwise a no-op.
pub fn log_with_timestamp(message: &str) {
    with_log(|log| {
        let _ = log.log_with_timestamp(message);
    });
}

pub fn log_stats(stats: &Stats) {
    log_with_timestamp(&format!("{} ok: {} ({:.2?})", stats.op, stats, stats.elapsed));
}

pub fn log_failure(failure: &JobFailure) {
    log_with_timestamp(&format!("{} failed: {}", failure.stats.op, failure));
}

pub fn is_logging_enabled() -> bool {
    GLOBAL_LOG
        .lock()
        .map(|global| global.is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeltaError;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_run_log_appends() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        let log = RunLog::new(temp_file.path())?;

        log.log("first")?;
        log.log_with_timestamp("second")?;

        let contents = fs::read_to_string(temp_file.path())?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "first");
        assert!(lines[1].starts_with('['));
        assert!(lines[1].ends_with("] second"));
        Ok(())
    }

    #[test]
    fn test_global_log_records_stats_and_failures() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        init_logger(temp_file.path())?;
        assert!(is_logging_enabled());

        let mut stats = Stats::new("delta");
        stats.in_bytes = 42;
        log_stats(&stats);
        log_failure(&JobFailure::new(
            DeltaError::Input("basis too short".to_string()),
            Stats::new("patch"),
        ));

        let contents = fs::read_to_string(temp_file.path())?;
        assert!(contents.contains("delta ok: delta: in=42"));
        assert!(contents.contains("patch failed: Input error: basis too short"));
        Ok(())
    }
}
