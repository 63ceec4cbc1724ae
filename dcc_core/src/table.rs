//! Plain text table of contest events, aligned without relying on tab stops.

use crate::contest_client::ContestEvent;

static HEADERS: [&str; 7] = [
    "Contest",
    "Startdatum",
    "Startzeit",
    "Enddatum",
    "Endzeit",
    "Mode",
    "Notiz",
];
static SEPARATOR: &str = "  ";
static PLACEHOLDER: &str = "keine Einträge";
static DATE_FORMAT: &str = "%d.%m.%Y";
static TIME_FORMAT: &str = "%H:%M";

/// Render the events as a table, one line per event, every line ending in a newline.
pub fn render(events: &[ContestEvent]) -> String {
    let rows: Vec<[String; 7]> = events.iter().map(row).collect();
    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let mut table = line(&HEADERS.map(String::from), &widths);
    let rule_width = widths.iter().sum::<usize>() + SEPARATOR.len() * (widths.len() - 1);
    table.push_str(&"-".repeat(rule_width));
    table.push('\n');
    if rows.is_empty() {
        table.push_str(PLACEHOLDER);
        table.push('\n');
    }
    for row in &rows {
        table.push_str(&line(row, &widths));
    }
    table
}

fn row(event: &ContestEvent) -> [String; 7] {
    let end_date = event.end.map(|end| end.format(DATE_FORMAT).to_string());
    let end_time = event.end.map(|end| end.format(TIME_FORMAT).to_string());
    [
        event.title.clone(),
        event.start.format(DATE_FORMAT).to_string(),
        event.start.format(TIME_FORMAT).to_string(),
        end_date.unwrap_or_default(),
        end_time.unwrap_or_default(),
        event.mode.clone(),
        event.note.clone(),
    ]
}

fn line(cells: &[String; 7], widths: &[usize; 7]) -> String {
    let mut line = cells
        .iter()
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<String>>()
        .join(SEPARATOR);
    line.push('\n');
    line
}
