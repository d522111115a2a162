//! Human-readable output for the fetch log.

pub use gitlet_core::{FetchLog, FetchLogEntry};

use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Format a fetch log entry for display.
pub fn format_entry(entry: &FetchLogEntry) -> String {
    let date = chrono::DateTime::from_timestamp_millis(entry.timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| entry.timestamp_ms.to_string());

    let refs = if entry.changed_refs.is_empty() {
        "no ref changes".to_string()
    } else {
        entry.changed_refs.join(", ")
    };

    format!(
        "[{}] {} ({}) | {} objects | {}ms | {}",
        date, entry.remote, entry.identifier, entry.objects_transferred, entry.duration_ms, refs,
    )
}

/// Print the fetch log of the repository at `git_dir`, optionally only the
/// entries of one remote.
pub fn print_fetch_log(git_dir: &Path, remote: Option<&str>, writer: &mut dyn Write) -> Result<()> {
    let log = FetchLog::new(git_dir);
    let entries = match remote {
        Some(name) => log.for_remote(name)?,
        None => log.all()?,
    };

    if entries.is_empty() {
        writeln!(writer, "No fetch log entries found.")?;
        return Ok(());
    }

    writeln!(writer, "Fetch Log ({} entries):", entries.len())?;
    writeln!(writer, "{}", "-".repeat(80))?;
    for entry in &entries {
        writeln!(writer, "  {}", format_entry(entry))?;
    }
    writeln!(writer, "{}", "-".repeat(80))?;

    let total_objects: u64 = entries.iter().map(|e| e.objects_transferred).sum();
    let total_ms: u64 = entries.iter().map(|e| e.duration_ms).sum();
    writeln!(
        writer,
        "Summary: {} fetches, {} objects, {}ms total",
        entries.len(),
        total_objects,
        total_ms,
    )?;

    Ok(())
}
