//! Formatted terminal output for each pipeline stage.
//!
//! Formatting lives here so the analytics modules stay free of presentation
//! and output changes are localized.

use std::path::Path;

use chrono::NaiveDate;

use crate::credit::{CdsReturnOutput, ReturnComparison};
use crate::curve::CurveRun;
use crate::domain::{AggregationMethod, CdsPortfolio, ColumnLabel, RateMatrix, TimeFrame};
use crate::report::{root_mean_square, summarize_columns};

/// Rows shown in table previews.
const PREVIEW_ROWS: usize = 6;
/// Columns shown in table previews.
const PREVIEW_COLS: usize = 8;

pub fn format_rates_summary(matrix: &RateMatrix, dropped: &[NaiveDate], path: &Path) -> String {
    let mut out = String::new();
    out.push_str("=== cdsr - Treasury rate matrix ===\n");
    out.push_str(&format_span(matrix));
    out.push_str(&format!(
        "Maturities (months): {}\n",
        matrix
            .columns()
            .iter()
            .map(ColumnLabel::label)
            .collect::<Vec<_>>()
            .join(", ")
    ));
    out.push_str(&format_dropped(dropped));
    out.push('\n');
    out.push_str(&format_frame_tail(matrix, PREVIEW_ROWS, PREVIEW_COLS, 4));
    out.push_str(&format!("\nWrote {}\n", path.display()));
    out
}

pub fn format_curve_summary(run: &CurveRun, path: &Path) -> String {
    let mut out = String::new();
    out.push_str("=== cdsr - Discount factors ===\n");
    out.push_str(&format_span(&run.discount));
    out.push_str(&format!(
        "Curve: {} quarterly maturities | horizons: {} quarters\n",
        run.curve.columns().len(),
        run.discount.columns().len()
    ));
    out.push_str(&format_dropped(&run.dropped));
    out.push('\n');
    out.push_str(&format_frame_tail(&run.discount, PREVIEW_ROWS, PREVIEW_COLS, 6));
    out.push_str(&format!("\nWrote {}\n", path.display()));
    out
}

pub fn format_cds_summary(portfolio: &CdsPortfolio, method: AggregationMethod, path: &Path) -> String {
    let mut out = String::new();
    out.push_str("=== cdsr - CDS quantile portfolios ===\n");
    out.push_str(&format!("Method: {}\n", method.as_str()));
    out.push_str(&format_span(portfolio));
    out.push_str("\nAverage spread by portfolio (bp):\n");
    out.push_str(&format_column_summaries(portfolio, 10_000.0));
    out.push_str(&format!("\nWrote {}\n", path.display()));
    out
}

pub fn format_returns_summary(output: &CdsReturnOutput, method: AggregationMethod, path: &Path) -> String {
    let mut out = String::new();
    out.push_str("=== cdsr - CDS portfolio returns ===\n");
    out.push_str(&format!("Method: {}\n", method.as_str()));
    out.push_str(&format_span(&output.returns));
    out.push_str("\nMonthly return by portfolio (%):\n");
    out.push_str(&format_column_summaries(&output.returns, 100.0));
    out.push_str("\nRisky duration by portfolio (years):\n");
    out.push_str(&format_column_summaries(&output.durations, 1.0));
    out.push_str(&format!("\nWrote {}\n", path.display()));
    out
}

pub fn format_comparison(cmp: &ReturnComparison, cutoff: NaiveDate) -> String {
    let mut out = String::new();
    out.push_str("=== cdsr - Calculated vs published CDS returns ===\n");
    out.push_str(&format!("Cutoff: {cutoff}\n"));
    out.push_str(&format_span(&cmp.calculated));
    if let Some(rms) = root_mean_square(&cmp.diff) {
        out.push_str(&format!("RMS difference: {rms:.4} pp\n"));
    }
    out.push_str("\nDifference by portfolio (actual - calculated, pp):\n");
    out.push_str(&format_column_summaries(&cmp.diff, 1.0));
    out
}

fn format_span<C: ColumnLabel>(frame: &TimeFrame<C>) -> String {
    match (frame.first_date(), frame.last_date()) {
        (Some(first), Some(last)) => format!("Months: n={} | {first} .. {last}\n", frame.len()),
        _ => "Months: n=0\n".to_string(),
    }
}

fn format_dropped(dropped: &[NaiveDate]) -> String {
    if dropped.is_empty() {
        return "Dropped dates: none\n".to_string();
    }
    let shown: Vec<String> = dropped.iter().take(PREVIEW_ROWS).map(|d| d.to_string()).collect();
    let more = dropped.len().saturating_sub(shown.len());
    let suffix = if more > 0 { format!(" (+{more} more)") } else { String::new() };
    format!(
        "Dropped dates (fewer than 2 maturities): {}{suffix}\n",
        shown.join(", ")
    )
}

fn format_column_summaries<C: ColumnLabel>(frame: &TimeFrame<C>, scale: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<8} {:>6} {:>10} {:>10} {:>10}\n", "column", "n", "mean", "min", "max"));
    out.push_str(&format!("{:-<8} {:-<6} {:-<10} {:-<10} {:-<10}\n", "", "", "", "", ""));
    for s in summarize_columns(frame) {
        out.push_str(&format!(
            "{:<8} {:>6} {:>10.4} {:>10.4} {:>10.4}\n",
            truncate(&s.label, 8),
            s.count,
            s.mean * scale,
            s.min * scale,
            s.max * scale
        ));
    }
    out
}

/// Last `rows` rows and first `cols` columns of a frame as a fixed-width table.
pub fn format_frame_tail<C: ColumnLabel>(frame: &TimeFrame<C>, rows: usize, cols: usize, precision: usize) -> String {
    let shown = &frame.columns()[..frame.columns().len().min(cols)];
    let mut out = String::new();

    let mut header = format!("{:<10}", "date");
    for c in shown {
        header.push_str(&format!(" {:>10}", truncate(&c.label(), 10)));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    let skip = frame.len().saturating_sub(rows);
    for (date, row) in frame.rows().skip(skip) {
        let mut line = date.format("%Y-%m-%d").to_string();
        for value in row.iter().take(shown.len()) {
            match value {
                Some(v) => line.push_str(&format!(" {v:>10.precision$}")),
                None => line.push_str(&format!(" {:>10}", "-")),
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
