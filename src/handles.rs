//! Handle list loading.
//!
//! One screen name per line. Anything after a `#` is a comment. Surrounding
//! whitespace and a leading `@` are stripped and blank lines are ignored.
//! Lines that are not a valid screen name are logged and dropped.

use crate::error::{Result, ScrapeError};
use std::path::Path;
use tracing::{info, warn};

/// Longest screen name X accepts.
pub const MAX_HANDLE_LEN: usize = 15;

/// `[A-Za-z0-9_]{1,15}`
#[must_use]
pub fn is_valid_handle(handle: &str) -> bool {
    (1..=MAX_HANDLE_LEN).contains(&handle.len())
        && handle.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Parse handle list text, preserving input order.
#[must_use]
pub fn parse_handles(content: &str) -> Vec<String> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let line = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
            let handle = line.strip_prefix('@').unwrap_or(line);
            if handle.is_empty() {
                return None;
            }
            if !is_valid_handle(handle) {
                warn!(line = index + 1, entry = handle, "Ignoring invalid screen name");
                return None;
            }
            Some(handle.to_string())
        })
        .collect()
}

/// Read and parse the handle list at `path`.
///
/// # Errors
///
/// Returns `ScrapeError::Config` if the file is missing, unreadable, or
/// contains no handles.
pub fn load_handles(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ScrapeError::config(format!("cannot read handle list '{}': {e}", path.display()))
    })?;

    let handles = parse_handles(&content);
    if handles.is_empty() {
        return Err(ScrapeError::config(format!(
            "handle list '{}' contains no handles",
            path.display()
        )));
    }

    info!(count = handles.len(), path = %path.display(), "Loaded handle list");
    Ok(handles)
}
