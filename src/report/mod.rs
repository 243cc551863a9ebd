//! Reporting utilities: per-column summaries and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{ColumnLabel, TimeFrame};

/// Descriptive statistics of one column over the present cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub label: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Summaries for every column with at least one present value.
pub fn summarize_columns<C: ColumnLabel>(frame: &TimeFrame<C>) -> Vec<ColumnSummary> {
    frame
        .columns()
        .iter()
        .filter_map(|col| {
            let values: Vec<f64> = frame.column(*col).into_iter().filter_map(|(_, v)| v).collect();
            if values.is_empty() {
                return None;
            }
            let count = values.len();
            let mean = values.iter().sum::<f64>() / count as f64;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Some(ColumnSummary {
                label: col.label(),
                count,
                mean,
                min,
                max,
            })
        })
        .collect()
}

/// Root mean square over all present cells, or `None` for an empty frame.
pub fn root_mean_square<C: ColumnLabel>(frame: &TimeFrame<C>) -> Option<f64> {
    let (sum, n) = frame
        .rows()
        .flat_map(|(_, row)| row.iter().flatten())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v * v, n + 1));
    (n > 0).then(|| (sum / n as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Quantile;
    use chrono::NaiveDate;

    #[test]
    fn summaries_skip_missing_cells() {
        let d = |m| NaiveDate::from_ymd_opt(2020, m, 28).unwrap();
        let frame = TimeFrame::from_rows(
            vec![Quantile(1), Quantile(2)],
            vec![
                (d(1), vec![Some(1.0), None]),
                (d(2), vec![Some(3.0), None]),
                (d(3), vec![None, None]),
            ],
        )
        .unwrap();

        let summary = summarize_columns(&frame);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].label, "cds_1");
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].mean, 2.0);
        assert_eq!((summary[0].min, summary[0].max), (1.0, 3.0));
        assert_eq!(root_mean_square(&frame), Some(5.0f64.sqrt()));
    }
}
