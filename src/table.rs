//! Plain-text grids for `preview`, `describe` and friends.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    database::{FetchedRows, TableDescriptor},
    frame::TabularFrame,
};

/// Cells wider than this are cut and end in `...`.
pub const MAX_CELL_WIDTH: usize = 48;
const NULL_LABEL: &str = "NULL";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let cells = rows
        .iter()
        .map(|row| row.iter().map(|cell| clip(cell)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let headers = headers.iter().map(|h| clip(h)).collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths));
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let rule = rule_widths
        .iter()
        .map(|w| Cow::Owned("-".repeat(*w)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in &cells {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Frame preview with the inferred type under each header.
pub fn render_frame(frame: &TabularFrame, limit: usize) -> String {
    let headers = frame
        .columns()
        .iter()
        .map(|c| format!("{} ({})", c.name, c.column_type))
        .collect::<Vec<_>>();
    let mut output = render_table(&headers, &frame.display_rows(limit));
    if frame.row_count() > limit {
        let _ = writeln!(
            output,
            "... {} more row(s)",
            frame.row_count() - limit
        );
    }
    output
}

pub fn render_fetched(fetched: &FetchedRows) -> String {
    let rows = fetched
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Some(value) => value.as_display(),
                    None => NULL_LABEL.to_string(),
                })
                .collect()
        })
        .collect::<Vec<_>>();
    render_table(&fetched.columns, &rows)
}

pub fn render_descriptor(descriptor: &TableDescriptor) -> String {
    let headers = vec!["#".to_string(), "column".to_string(), "type".to_string()];
    let rows = descriptor
        .columns
        .iter()
        .enumerate()
        .map(|(idx, c)| vec![(idx + 1).to_string(), c.name.clone(), c.declared_type.clone()])
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn format_row(values: &[Cow<'_, str>], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let padding = width.saturating_sub(display_width(value));
            format!("{value}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn clip(value: &str) -> Cow<'_, str> {
    let sanitized = sanitize_cell(value);
    if display_width(&sanitized) <= MAX_CELL_WIDTH || sanitized.contains('\u{1b}') {
        return sanitized;
    }
    let mut clipped = sanitized
        .chars()
        .take(MAX_CELL_WIDTH - 3)
        .collect::<String>();
    clipped.push_str("...");
    Cow::Owned(clipped)
}

// ANSI color sequences take no space on screen.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
