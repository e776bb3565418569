// ABOUTME: GitHub Actions step output support
// ABOUTME: Appends name=value lines to the file named by GITHUB_OUTPUT

use crate::{Error, Result};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub fn running_in_actions() -> bool {
    env::var("GITHUB_ACTIONS").map(|v| v == "true").unwrap_or(false)
}

/// Formats one step output; multi-line values use the heredoc form.
pub fn format_output(name: &str, value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    if value.contains('\n') {
        return format!("{}<<OUTPUT\n{}\nOUTPUT\n", name, value);
    }

    format!("{}={}\n", name, value)
}

pub fn write_output_to(path: &Path, name: &str, value: &str) -> Result<()> {
    let output = format_output(name, value);
    if output.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new().append(true).open(path).map_err(|e| {
        Error::Storage(format!(
            "failed to open result file {}: {}. Self-hosted runners must be version 2.297.0 or greater",
            path.display(),
            e
        ))
    })?;

    file.write_all(output.as_bytes()).map_err(|e| {
        Error::Storage(format!(
            "failed to write result to file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Writes to `$GITHUB_OUTPUT`.
pub fn write_output(name: &str, value: &str) -> Result<()> {
    let path = env::var("GITHUB_OUTPUT").unwrap_or_default();
    write_output_to(Path::new(&path), name, value)
}
