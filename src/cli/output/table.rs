//! Table output formatting for preview results
//!
//! Failure logs, per-reason counts and trajectory nodes rendered with
//! comfy-table. Colors follow `NO_COLOR` and dumb terminals.

use std::collections::BTreeMap;
use std::env;

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::domain::models::{Failure, FailureReason, TrajectoryNode};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub const fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format failed instants in chronological order
    pub fn format_failures(&self, failures: &[Failure]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("t [s]").add_attribute(Attribute::Bold),
            Cell::new("Reason").add_attribute(Attribute::Bold),
            Cell::new("Detail").add_attribute(Attribute::Bold),
        ]);

        for failure in failures {
            let reason = Cell::new(failure.reason.as_str());
            let reason = if self.use_colors {
                reason.fg(reason_color(failure.reason))
            } else {
                reason
            };
            table.add_row(vec![
                Cell::new(format!("{:.4}", failure.t)).set_alignment(CellAlignment::Right),
                reason,
                Cell::new(truncate_text(&failure.detail, 60)),
            ]);
        }

        table.to_string()
    }

    /// Format the number of failures per reason
    pub fn format_failure_counts(&self, counts: &BTreeMap<FailureReason, usize>) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Reason").add_attribute(Attribute::Bold),
            Cell::new("Count").add_attribute(Attribute::Bold),
        ]);

        for (reason, count) in counts {
            table.add_row(vec![
                Cell::new(reason.as_str()),
                Cell::new(count).set_alignment(CellAlignment::Right),
            ]);
        }

        table.to_string()
    }

    /// Format trajectory nodes, keeping at most `max_rows` evenly spaced
    /// rows plus the final node
    pub fn format_trajectory(&self, nodes: &[TrajectoryNode], max_rows: usize) -> String {
        let mut table = self.create_base_table();
        let joints = nodes.first().map_or(0, |node| node.q.len());

        let mut header = vec![Cell::new("t [s]").add_attribute(Attribute::Bold)];
        header.extend((0..joints).map(|j| Cell::new(format!("q{j}")).add_attribute(Attribute::Bold)));
        table.set_header(header);

        let stride = nodes.len().div_ceil(max_rows.max(1)).max(1);
        let last = nodes.len().saturating_sub(1);
        for (index, node) in nodes.iter().enumerate() {
            if index % stride != 0 && index != last {
                continue;
            }
            let mut row = vec![Cell::new(format!("{:.4}", node.t)).set_alignment(CellAlignment::Right)];
            row.extend(
                node.q
                    .iter()
                    .map(|value| Cell::new(format!("{value:+.4}")).set_alignment(CellAlignment::Right)),
            );
            table.add_row(row);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(u16::try_from(width).unwrap_or(u16::MAX));
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

const fn reason_color(reason: FailureReason) -> Color {
    match reason {
        FailureReason::UnfeasibleSolve => Color::Yellow,
        FailureReason::ConstraintViolated => Color::Red,
        FailureReason::SingularConfiguration => Color::Magenta,
        FailureReason::Other => Color::Grey,
    }
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
