//! The shared result log.
//!
//! The file starts as a lone `[` and every driver run appends one compact JSON
//! object followed by `,\n`. Nothing locks the file, so runs against the same
//! file must be serialized by whoever schedules them. [`finalize`] closes the
//! array once all runs are done; [`read_records`] reads either form.

use crate::t_args;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Reset `path` to contain exactly `[`.
pub fn init(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e)
                .with_context(|| t_args!("accumulator-remove-failed", "file" => path.display()))
        }
    }
    fs::write(path, "[")
        .with_context(|| t_args!("accumulator-write-failed", "file" => path.display()))
}

/// Append one record followed by `,\n`.
pub fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut line = serde_json::to_vec(record)
        .with_context(|| t_args!("accumulator-encode-failed", "file" => path.display()))?;
    line.extend_from_slice(b",\n");

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| t_args!("accumulator-write-failed", "file" => path.display()))?;
    file.write_all(&line)
        .with_context(|| t_args!("accumulator-write-failed", "file" => path.display()))
}

/// Turn the open stream into a proper JSON array.
fn close(content: &str) -> String {
    let body = content.trim_end();
    if body.ends_with(']') {
        return format!("{body}\n");
    }
    let body = body.strip_suffix(',').unwrap_or(body);
    format!("{body}]\n")
}

/// Drop the trailing comma and write the closing `]`. Already closed files are left alone.
pub fn finalize(path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| t_args!("accumulator-read-failed", "file" => path.display()))?;
    if content.trim_end().ends_with(']') {
        return Ok(());
    }
    fs::write(path, close(&content))
        .with_context(|| t_args!("accumulator-write-failed", "file" => path.display()))
}

/// Parse all records, whether or not the file has been finalized.
pub fn read_records(path: &Path) -> Result<Vec<serde_json::Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| t_args!("accumulator-read-failed", "file" => path.display()))?;
    serde_json::from_str(&close(&content))
        .with_context(|| t_args!("accumulator-parse-failed", "file" => path.display()))
}

#[cfg(test)]
mod tests {
    use super::close;

    #[test]
    fn closes_open_streams() {
        assert_eq!(close("["), "[]\n");
        assert_eq!(close("[{\"a\":1},\n"), "[{\"a\":1}]\n");
        assert_eq!(close("[{\"a\":1},\n{\"b\":2},\n"), "[{\"a\":1},\n{\"b\":2}]\n");
        assert_eq!(close("[{\"a\":1}]\n"), "[{\"a\":1}]\n");
    }
}
