//! CSV text to raw rows
//!
//! Only splits text into header-keyed cells. All typing and validation happens
//! in the normalizer, so spreadsheet exports that arrive as JSON rows take the
//! same path.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// One heterogeneous input row, keyed by whatever headers the source used.
pub type RawRow = Map<String, Value>;

// Lines shorter than this are treated as malformed and skipped
const MIN_CELLS: usize = 5;

/// Parse CSV content. The first non-empty line is the header row.
pub fn parse_csv(content: &str) -> Vec<RawRow> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    let headers = match lines.next() {
        Some(line) => split_csv_line(line),
        None => return Vec::new(),
    };

    let mut rows = Vec::new();
    for line in lines {
        let cells = split_csv_line(line);
        if cells.len() < MIN_CELLS {
            continue;
        }

        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(cells) {
            row.insert(header.clone(), Value::String(cell));
        }
        rows.push(row);
    }

    rows
}

pub fn read_csv_file(path: impl AsRef<Path>) -> Result<Vec<RawRow>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_csv(&content))
}

/// Split one line on commas that are not inside double quotes.
/// Surrounding quotes are stripped, `""` inside a quoted cell becomes `"`.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);

    cells.into_iter().map(|c| c.trim().to_string()).collect()
}
