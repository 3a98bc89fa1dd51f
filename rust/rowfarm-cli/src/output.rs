//! Rendering a finished run for people and for machines.

use rowfarm_core::Matrix;
use rowfarm_runtime::RunReport;
use std::fmt::Write;

/// Matrices larger than this are never printed.
pub const PRINT_LIMIT: usize = 10;

/// `label:` followed by one line per row, six decimals per entry.
pub fn render_matrix(label: &str, m: &Matrix) -> String {
    let mut out = format!("{label}:\n");
    for i in 0..m.size() {
        let line = (0..m.size())
            .map(|j| format!("{:.6}", m.get(i, j)))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// The checksum and timing lines, preceded by A, B and C when asked for
/// and small enough.
pub fn render_text(report: &RunReport, operands: Option<(&Matrix, &Matrix)>) -> String {
    let mut out = String::new();
    if let Some((a, b)) = operands.filter(|_| report.size <= PRINT_LIMIT) {
        for (label, m) in [("A", a), ("B", b), ("C", &report.c)] {
            out.push_str(&render_matrix(label, m));
            out.push('\n');
        }
    }
    let _ = writeln!(out, "Checksum: {:.6}", report.checksum());
    let _ = writeln!(
        out,
        "Execution time with {} workers: {:.2} s",
        report.workers,
        report.elapsed.as_secs_f64()
    );
    out
}

pub fn render_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&report.summary())
}
