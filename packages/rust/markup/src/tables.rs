//! Table flattening: `{| ... |}` blocks become one text line per row line.

use crate::templates::split_top_level;

/// Separator used when a row line carries several cells.
const CELL_JOINER: &str = " | ";

/// Flatten every table block into plain lines.
///
/// Row separators and the start/end lines disappear, captions keep their
/// text, and multi-cell lines stay on one line joined by `" | "`. Lines
/// inside a table that start with no marker continue the previous cell and
/// are kept as they are. A table with no end line runs to the end of the text.
pub(crate) fn flatten_tables(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_table = false;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("{|") {
            in_table = true;
            continue;
        }
        if !in_table {
            lines.push(line.to_string());
            continue;
        }
        if trimmed.starts_with("|}") {
            in_table = false;
            continue;
        }
        if trimmed.starts_with("|-") {
            continue;
        }

        let row = if let Some(caption) = trimmed.strip_prefix("|+") {
            cell_text(caption).to_string()
        } else if let Some(header) = trimmed.strip_prefix('!') {
            join_cells(header, &["!!", "||"])
        } else if let Some(body) = trimmed.strip_prefix('|') {
            join_cells(body, &["||"])
        } else {
            line.to_string()
        };

        if !row.trim().is_empty() {
            lines.push(row);
        }
    }

    lines.join("\n")
}

/// Split a row line on any of `separators`, keep non-empty cell texts.
fn join_cells(row: &str, separators: &[&str]) -> String {
    let mut cells = vec![row];
    for sep in separators {
        cells = cells.into_iter().flat_map(|c| c.split(*sep)).collect();
    }

    cells
        .into_iter()
        .map(cell_text)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(CELL_JOINER)
}

/// Text of one cell, without an `attrs |` prefix.
fn cell_text(cell: &str) -> &str {
    split_top_level(cell, '|')
        .last()
        .copied()
        .unwrap_or_default()
        .trim()
}
