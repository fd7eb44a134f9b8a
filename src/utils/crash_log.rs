//! Append-only diagnostics file for malformed-input failures

use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CrashLog {
    path: PathBuf,
}

impl CrashLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Failures are logged and swallowed.
    pub fn record(&self, step: &str, input: &Path, error: &dyn std::fmt::Display) {
        let line = format!(
            "{} step={} input={} error={}\n",
            Utc::now().to_rfc3339(),
            step,
            input.display(),
            error
        );

        if let Err(e) = self.append(&line) {
            warn!("Failed to append crash record to {}: {}", self.path.display(), e);
        } else {
            debug!("Crash record appended to {}", self.path.display());
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = CrashLog::new(dir.path().join("logs").join("crash.log"));

        log.record("guide", Path::new("/data/guide.xml"), &"unexpected end of file");
        log.record("playlist", Path::new("/data/list.m3u"), &"invalid utf-8");

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("step=guide input=/data/guide.xml error=unexpected end of file"));
        assert!(lines[1].contains("step=playlist"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let log = CrashLog::new(dir.path());
        log.record("guide", Path::new("guide.xml"), &"boom");
        assert!(logs_contain("Failed to append crash record"));
    }
}
