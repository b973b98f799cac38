//! Append-only traffic logs (inbound webhook bodies, full search responses).
//!
//! Each record is wrapped in a timestamped banner. Writers are serialized by an
//! in-process mutex and an exclusive advisory lock on the file, so records from
//! concurrent requests or other processes never interleave.

use fs2::FileExt;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wrap `content` in the log record banner.
pub fn format_record(timestamp: &str, content: &str) -> String {
    format!(
        "\n===== {} =====\n{}\n===========================\n",
        timestamp, content
    )
}

/// Handle to one append-only log file. Cheap to clone.
#[derive(Clone)]
pub struct AppendLog {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a JSON value, pretty-printed.
    pub async fn append_json(&self, value: &Value) {
        let content = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.append_raw(&content).await;
    }

    /// Append text as-is. Failures are logged and swallowed.
    pub async fn append_raw(&self, content: &str) {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let record = format_record(&timestamp, content);
        let path = self.path.clone();

        let _guard = self.lock.lock().await;
        let result = tokio::task::spawn_blocking(move || write_record(&path, &record)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("appending to {} failed: {}", self.path.display(), e),
            Err(e) => log::warn!("log writer task for {} failed: {}", self.path.display(), e),
        }
    }
}

fn write_record(path: &Path, record: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let written = file.write_all(record.as_bytes()).and_then(|_| file.flush());
    let unlocked = file.unlock();
    written.and(unlocked)
}
