//! Stage checkpoints.
//!
//! Each pipeline stage can persist its output table as CSV:
//!
//! ```text
//! date,3,6,12,...
//! 2020-01-31,0.0155,0.0157,...
//! ```
//!
//! Column headers are the frame's column labels; an empty cell is a missing value.
//! Floats are written in Rust's shortest round-trip form, so a reload is exact.

use std::fs::{self, File};
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{ColumnLabel, TimeFrame};
use crate::error::{AnalyticsError, AnalyticsResult};

/// Checkpoint file names, one per stage.
pub const RATE_MATRIX_FILE: &str = "rate_matrix.csv";
pub const INTERPOLATED_CURVE_FILE: &str = "interpolated_curve.csv";
pub const DISCOUNT_FACTORS_FILE: &str = "discount_factors.csv";

pub fn cds_returns_file(method: &str) -> String {
    format!("cds_returns_{method}.csv")
}

pub fn risky_durations_file(method: &str) -> String {
    format!("risky_durations_{method}.csv")
}

pub fn return_diff_file(method: &str) -> String {
    format!("cds_return_diff_{method}.csv")
}

/// Write a frame to `path`, creating parent directories as needed.
pub fn write_frame_csv<C: ColumnLabel>(path: &Path, frame: &TimeFrame<C>) -> AnalyticsResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AnalyticsError::invalid(format!("failed to create '{}': {e}", parent.display()))
        })?;
    }

    let file = File::create(path)
        .map_err(|e| AnalyticsError::invalid(format!("failed to create '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header = vec!["date".to_string()];
    header.extend(frame.columns().iter().map(ColumnLabel::label));
    writer
        .write_record(&header)
        .map_err(|e| AnalyticsError::invalid(format!("failed to write checkpoint header: {e}")))?;

    for (date, row) in frame.rows() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(date.format("%Y-%m-%d").to_string());
        record.extend(row.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        writer
            .write_record(&record)
            .map_err(|e| AnalyticsError::invalid(format!("failed to write checkpoint row {date}: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AnalyticsError::invalid(format!("failed to flush '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a frame written by [`write_frame_csv`].
pub fn read_frame_csv<C: ColumnLabel>(path: &Path) -> AnalyticsResult<TimeFrame<C>> {
    let file = File::open(path)
        .map_err(|e| AnalyticsError::invalid(format!("failed to open '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AnalyticsError::invalid(format!("failed to read headers of '{}': {e}", path.display())))?
        .clone();

    let mut labels = Vec::with_capacity(headers.len().saturating_sub(1));
    for raw in headers.iter().skip(1) {
        let label = C::parse_label(raw).ok_or_else(|| {
            AnalyticsError::invalid(format!("unrecognized column '{raw}' in '{}'", path.display()))
        })?;
        labels.push(label);
    }
    if labels.windows(2).any(|w| w[0] >= w[1]) {
        return Err(AnalyticsError::invalid(format!(
            "columns of '{}' are not in ascending order",
            path.display()
        )));
    }

    let mut frame = TimeFrame::new(labels);
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result
            .map_err(|e| AnalyticsError::invalid(format!("{}:{line}: {e}", path.display())))?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
            AnalyticsError::invalid(format!("{}:{line}: invalid date '{raw_date}': {e}", path.display()))
        })?;

        let mut values = Vec::with_capacity(frame.columns().len());
        for col in 1..=frame.columns().len() {
            let cell = record.get(col).unwrap_or_default();
            if cell.is_empty() {
                values.push(None);
                continue;
            }
            let value = cell.parse::<f64>().map_err(|e| {
                AnalyticsError::invalid(format!("{}:{line}: invalid number '{cell}': {e}", path.display()))
            })?;
            values.push(Some(value));
        }
        frame.insert_row(date, values)?;
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Maturity, Quantile};

    #[test]
    fn frame_survives_a_checkpoint_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(RATE_MATRIX_FILE);
        let d1 = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        let frame = TimeFrame::from_rows(
            vec![Maturity(3), Maturity(12), Maturity(120)],
            vec![
                (d1, vec![Some(0.0155), None, Some(1.0 / 3.0)]),
                (d2, vec![Some(0.0152), Some(0.0149), Some(0.0191)]),
            ],
        )
        .unwrap();

        write_frame_csv(&path, &frame).unwrap();
        let back: TimeFrame<Maturity> = read_frame_csv(&path).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn quantile_headers_are_written_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cds.csv");
        let d1 = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let frame =
            TimeFrame::from_rows(vec![Quantile(1), Quantile(2)], vec![(d1, vec![Some(0.004), Some(0.009)])])
                .unwrap();
        write_frame_csv(&path, &frame).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date,cds_1,cds_2"));
    }

    #[test]
    fn unknown_headers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "date,ten_year\n2020-01-31,0.01\n").unwrap();
        assert!(read_frame_csv::<Maturity>(&path).is_err());
    }
}
