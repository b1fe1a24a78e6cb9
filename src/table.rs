//! Elastic plain-text tables for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    data::{Record, display_value},
    query::QueryPage,
};

const COLUMN_GAP: &str = "  ";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Display strings for `columns` of each record, in column order.
pub fn record_rows(records: &[&Record], columns: &[String]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| display_value(record, column))
                .collect()
        })
        .collect()
}

/// A page of records as a table followed by its position summary.
pub fn render_page(page: &QueryPage<'_>, columns: &[String]) -> String {
    let mut output = render_table(columns, &record_rows(&page.rows, columns));
    let _ = writeln!(output, "{}", page.describe());
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            let mut cell = sanitized.into_owned();
            cell.push_str(&" ".repeat(padding));
            cell
        })
        .collect::<Vec<_>>();
    cells.join(COLUMN_GAP).trim_end_matches(' ').to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
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
