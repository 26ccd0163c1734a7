//! Table detection over extracted page text.
//!
//! pdf-extract yields plain text, so tables are recovered from layout: a
//! table is a maximal run of at least two consecutive lines that each split
//! into two or more cells. Cells are separated by a tab, a `|`, or a run of
//! two or more spaces. The first line of a run is the header.

use docsift_core::models::TableRow;
use tracing::debug;

/// One detected table.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub header: Vec<String>,
    /// Data rows whose cell count matched the header.
    pub rows: Vec<TableRow>,
    /// Data rows skipped because their cell count differed from the header.
    pub dropped_rows: usize,
}

/// Detect every table in `text`, in reading order.
pub fn detect_tables(text: &str) -> Vec<DetectedTable> {
    let mut tables = Vec::new();
    let mut run: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        match split_cells(line) {
            Some(cells) if is_rule(&cells) => continue,
            Some(cells) => run.push(cells),
            None => flush(&mut run, &mut tables),
        }
    }
    flush(&mut run, &mut tables);

    tables
}

fn flush(run: &mut Vec<Vec<String>>, tables: &mut Vec<DetectedTable>) {
    if run.len() >= 2 {
        tables.push(build_table(std::mem::take(run)));
    }
    run.clear();
}

fn build_table(lines: Vec<Vec<String>>) -> DetectedTable {
    let mut lines = lines.into_iter();
    let header = normalize_header(lines.next().unwrap_or_default());

    let mut rows = Vec::new();
    let mut dropped_rows = 0;
    for (i, cells) in lines.enumerate() {
        match TableRow::from_header(&header, &cells) {
            Some(row) => rows.push(row),
            None => {
                dropped_rows += 1;
                debug!(
                    row = i + 1,
                    expected = header.len(),
                    actual = cells.len(),
                    "dropping table row with mismatched cell count"
                );
            }
        }
    }

    DetectedTable {
        header,
        rows,
        dropped_rows,
    }
}

/// Blank names become `column_{n}` (1-based); repeats get `_2`, `_3`, ...
fn normalize_header(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("column_{}", i + 1)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while out.contains(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// Split one line into cells, or `None` if it has fewer than two.
pub fn split_cells(line: &str) -> Option<Vec<String>> {
    if line.trim().is_empty() {
        return None;
    }
    // Leading tabs mark empty cells, so only spaces are trimmed.
    let trimmed = line.trim_matches(|c| c == ' ' || c == '\r');

    let cells: Vec<String> = if trimmed.contains('\t') {
        trimmed.split('\t').map(|c| c.trim().to_string()).collect()
    } else if trimmed.contains('|') {
        let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
        let inner = inner.strip_suffix('|').unwrap_or(inner);
        inner.split('|').map(|c| c.trim().to_string()).collect()
    } else {
        split_on_wide_gaps(trimmed)
    };

    if cells.len() >= 2 {
        Some(cells)
    } else {
        None
    }
}

fn split_on_wide_gaps(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut spaces = 0;

    for ch in line.chars() {
        if ch == ' ' {
            spaces += 1;
            continue;
        }
        if spaces >= 2 {
            cells.push(std::mem::take(&mut current));
        } else if spaces == 1 {
            current.push(' ');
        }
        spaces = 0;
        current.push(ch);
    }
    cells.push(current);
    cells
}

/// Markdown-style separator rows such as `|---|:--:|`.
fn is_rule(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | '=' | '+')))
}
