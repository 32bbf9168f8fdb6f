//! Aligned plain-text rendering of typed rows for terminal output.

use std::borrow::Cow;

use itertools::Itertools;

use crate::data::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Numeric columns are right-aligned; everything else is left-aligned.
pub fn render_rows(headers: &[String], rows: &[Vec<Value>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(headers.len())
                .map(|value| sanitize_cell(&value.as_display()).into_owned())
                .collect()
        })
        .collect();

    let aligns: Vec<Align> = (0..headers.len())
        .map(|idx| {
            let numeric = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|value| !value.is_null())
                .all(|value| matches!(value, Value::Integer(_) | Value::Number(_)));
            if numeric && !rows.is_empty() {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            cells
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_line(headers, &widths, &vec![Align::Left; widths.len()]));
    lines.push(widths.iter().map(|w| "-".repeat(*w)).join("  "));
    for row in &cells {
        lines.push(format_line(row, &widths, &aligns));
    }
    let mut output = lines.join("\n");
    output.push('\n');
    output
}

fn format_line(cells: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .zip(aligns)
        .map(|((cell, width), align)| match align {
            Align::Left => format!("{cell:<width$}"),
            Align::Right => format!("{cell:>width$}"),
        })
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
