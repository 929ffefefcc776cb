//! Plain-text presentation of the record manager state.

use client_core::{Operation, RequestState};
use shared::domain::Record;

pub fn header() -> String {
    "User Management System\nUser record operations\n[ User Management ]".to_string()
}

pub fn records(records: &[Record]) -> String {
    if records.is_empty() {
        return "(no records)".to_string();
    }

    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|record| {
            [
                record.id.to_string(),
                record.fields.name.clone(),
                record.fields.email.clone().unwrap_or_else(|| "-".into()),
                record
                    .fields
                    .status
                    .map(|status| status.as_str().to_string())
                    .unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();

    let headings = ["ID", "NAME", "EMAIL", "STATUS"];
    let mut widths = headings.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = format_row(&headings.map(str::to_string), &widths);
    for row in &rows {
        out.push('\n');
        out.push_str(&format_row(row, &widths));
    }
    out
}

fn format_row(cells: &[String; 4], widths: &[usize; 4]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

pub fn status_line(operation: Operation, state: &RequestState) -> String {
    format!("[{operation}] {state}")
}
