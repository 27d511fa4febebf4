//! Line-oriented input parsers (§6.1, C9). Each format has its own
//! submodule; all of them share the same contract: reject a malformed line,
//! emit one diagnostic for it via `tracing`, and keep going rather than
//! aborting the whole file.

pub mod blockages;
pub mod bootstrap;
pub mod breakdowns;
pub mod maintenance;
pub mod orders;

use std::{fs, path::Path};

use tracing::warn;

/// Reads `path` as UTF-8 lines, skipping blank lines. Returns the lines or
/// the `io::Error` from the read itself - that failure is fatal (missing
/// file), unlike a malformed individual line.
fn read_nonblank_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parses every line of `path` with `parse_line`, logging a diagnostic and
/// skipping any line that fails rather than aborting the file (§6.1).
fn parse_lines<T>(
    path: &Path,
    parse_line: impl Fn(&str) -> Result<T, String>,
) -> std::io::Result<Vec<T>> {
    let lines = read_nonblank_lines(path)?;
    let mut records = Vec::with_capacity(lines.len());
    for (lineno, line) in lines.iter().enumerate() {
        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(reason) => warn!(
                file = %path.display(),
                line = lineno + 1,
                content = %line,
                "skipping malformed record: {reason}"
            ),
        }
    }
    Ok(records)
}
