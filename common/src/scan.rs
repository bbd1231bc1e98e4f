use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::fs::{read, read_dir};
use tracing::{debug, error, info};

use crate::{
    parser::{FileSummary, IncompletePolicy, parse_log},
    record::Record,
};

pub const LOG_EXTENSION: &str = ".log";

/// Lists the `*.log` files in `dir`, sorted by name. Symlinks are listed
/// too and resolved when the file is opened.
pub async fn discover_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut items = read_dir(dir)
        .await
        .context(format!("Listing {}", dir.display()))?;
    let mut files = Vec::new();
    loop {
        let entry = match items.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                error!("Listing {} stopped early: {err}", dir.display());
                break;
            }
        };
        if !entry.file_name().to_string_lossy().ends_with(LOG_EXTENSION) {
            continue;
        }
        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() || file_type.is_symlink() => {
                files.push(entry.path())
            }
            Ok(_) => {}
            Err(err) => error!("Unable to stat {}: {err}", entry.path().display()),
        }
    }
    files.sort();
    debug!("Found {} log files in {}", files.len(), dir.display());
    Ok(files)
}

/// The test type is the file name up to its first dot.
pub fn test_type(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_owned()
}

/// Parses one log file. Bytes that are not valid UTF-8 become U+FFFD, so
/// they only spoil the line they sit on.
pub async fn extract_file(
    path: &Path,
    policy: IncompletePolicy,
) -> Result<(Vec<Record>, FileSummary)> {
    let bytes = read(path)
        .await
        .context(format!("Reading {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    let source = path.display().to_string();
    Ok(parse_log(&source, &test_type(path), &content, policy))
}

/// Extracts records from every log file in `dir`, one file after another.
/// Files that cannot be read are reported and skipped.
pub async fn extract_dir(dir: &Path, policy: IncompletePolicy) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for path in discover_log_files(dir).await? {
        match extract_file(&path, policy).await {
            Ok((mut file_records, summary)) => {
                info!(
                    "{}: {} records, {} malformed lines, {} incomplete blocks, {} discarded blocks",
                    path.display(),
                    summary.records,
                    summary.malformed_lines,
                    summary.incomplete_blocks,
                    summary.discarded_blocks
                );
                records.append(&mut file_records);
            }
            Err(err) => error!("Unable to open file {}: {err:#}", path.display()),
        }
    }
    Ok(records)
}
