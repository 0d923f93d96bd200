//! Plain-text tables for the summaries written to the log.

use std::fmt::Write as _;

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct TextTable {
    headers: Vec<String>,
    align: Vec<Align>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            align: vec![Align::Left; headers.len()],
            rows: Vec::new(),
        }
    }

    /// Right-aligns the given column, used for counts and percentages.
    pub fn align_right(mut self, column: usize) -> Self {
        if let Some(slot) = self.align.get_mut(column) {
            *slot = Align::Right;
        }
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| display_width(h)).collect();
        for row in &self.rows {
            for (idx, cell) in row.iter().enumerate().take(widths.len()) {
                widths[idx] = widths[idx].max(display_width(cell));
            }
        }
        for width in &mut widths {
            *width = (*width).max(3);
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", self.format_row(&self.headers, &widths));
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(output, "{}", self.format_row(&separator, &widths));
        for row in &self.rows {
            let _ = writeln!(output, "{}", self.format_row(row, &widths));
        }
        output
    }

    fn format_row(&self, values: &[String], widths: &[usize]) -> String {
        widths
            .iter()
            .enumerate()
            .map(|(idx, width)| {
                let value = values.get(idx).map(|v| sanitize_cell(v)).unwrap_or_default();
                let padding = width.saturating_sub(display_width(&value));
                match self.align[idx] {
                    Align::Left => format!("{value}{}", " ".repeat(padding)),
                    Align::Right => format!("{}{value}", " ".repeat(padding)),
                }
            })
            .join("  ")
            .trim_end()
            .to_string()
    }
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}
