//! Console rendering helpers.

use std::fmt::Write as _;

use crate::model::StockLevel;

/// Five-star rendering of an average rating, e.g. `★★★★☆ 4.2`.
#[must_use]
pub fn rating_stars(rating: f64) -> String {
    if rating <= 0.0 {
        return "no ratings".to_string();
    }
    // Clamped to 0..=5 before the cast.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let full = rating.clamp(0.0, 5.0).floor() as usize;
    format!("{}{} {rating:.1}", "★".repeat(full), "☆".repeat(5 - full))
}

/// Stock count with its band, e.g. `3 (Low stock)`.
#[must_use]
pub fn stock_display(stock: i64, threshold: i64) -> String {
    format!("{stock} ({})", StockLevel::classify(stock, threshold).label())
}

/// Shorten `text` to at most `width` characters, marking the cut with `…`.
#[must_use]
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// A left-aligned text table.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Start a table with the given column headers.
    #[must_use]
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; missing cells render empty.
    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Whether no rows were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Render with a header underline and two spaces between columns.
    #[must_use]
    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();
        let mut line = |cells: &[String]| {
            let text = widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = cells.get(i).map_or("", String::as_str);
                    let pad = width.saturating_sub(cell.chars().count());
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect::<Vec<_>>()
                .join("  ");
            let _ = writeln!(out, "{}", text.trim_end());
        };

        line(&self.headers);
        line(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>());
        for row in &self.rows {
            line(row);
        }
        out
    }
}
