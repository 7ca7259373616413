//! JSONL file writer for per-context logs.
//!
//! Every browsing context (a tab, the CLI, a test) appends to its own file,
//! so contexts sharing an origin never interleave partial lines.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::entry::JsonLogEntry;

/// Appends log entries to `<logs_dir>/raw/<date>_<context>.jsonl`.
pub struct ContextLogWriter {
    context: String,
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl ContextLogWriter {
    /// Open (or create) today's log file for `context`.
    pub fn new(logs_dir: impl AsRef<Path>, context: impl Into<String>) -> std::io::Result<Self> {
        let context = context.into();
        let raw_dir = logs_dir.as_ref().join("raw");
        fs::create_dir_all(&raw_dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = raw_dir.join(format!("{}_{}.jsonl", date, context));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            context,
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry as a single line and flush.
    pub fn write(&self, entry: &JsonLogEntry) -> std::io::Result<()> {
        let json = entry
            .to_json_line()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    /// Write an entry built from plain parts.
    pub fn write_raw(
        &self,
        level: &str,
        target: &str,
        message: &str,
        fields: Option<serde_json::Value>,
    ) -> std::io::Result<()> {
        let mut entry = JsonLogEntry::new(level, &self.context, target, message);
        if let Some(f) = fields {
            entry = entry.with_fields(f);
        }
        self.write(&entry)
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

impl Drop for ContextLogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Read every entry under `<logs_dir>/raw`, oldest first.
///
/// Lines that fail to parse are skipped.
pub fn read_all_entries(logs_dir: impl AsRef<Path>) -> std::io::Result<Vec<JsonLogEntry>> {
    let raw_dir = logs_dir.as_ref().join("raw");
    if !raw_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(&raw_dir)? {
        let path = dir_entry?.path();
        if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
            let content = fs::read_to_string(&path)?;
            entries.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .filter_map(|line| JsonLogEntry::from_json_line(line).ok()),
            );
        }
    }

    entries.sort_by(|a, b| a.ts.cmp(&b.ts));
    Ok(entries)
}

/// Entries logged by one context, oldest first.
pub fn read_entries_for_context(
    logs_dir: impl AsRef<Path>,
    context: &str,
) -> std::io::Result<Vec<JsonLogEntry>> {
    Ok(read_all_entries(logs_dir)?
        .into_iter()
        .filter(|entry| entry.context == context)
        .collect())
}
