//! CSV ingest and normalization.
//!
//! Two inputs arrive as CSV:
//!
//! - yearly CDS quote exports (`date,ticker,tenor,country,parspread`)
//! - published monthly CDS test-asset returns (`yyyymm,CDS_01,...,CDS_20`)
//!
//! Required columns are checked up front; bad rows are skipped and reported
//! rather than failing the whole file.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::data::cds::{CDS_COUNTRY, CDS_TENOR};
use crate::domain::{CdsObservation, CdsReturns, Quantile, TimeFrame, month_end};
use crate::error::{AnalyticsError, AnalyticsResult};

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: parsed observations plus what was skipped.
#[derive(Debug, Clone)]
pub struct CdsIngest {
    pub observations: Vec<CdsObservation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load CDS quotes from a CSV export.
///
/// `tenor` and `country` are optional columns: exports produced by a query that
/// already filtered on them (5Y, United States) may omit them.
pub fn read_cds_observations_csv(path: &Path) -> AnalyticsResult<CdsIngest> {
    let file = File::open(path)
        .map_err(|e| AnalyticsError::invalid(format!("failed to open CDS CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AnalyticsError::invalid(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for required in ["date", "ticker", "parspread"] {
        if !header_map.contains_key(required) {
            return Err(AnalyticsError::invalid(format!(
                "missing required column `{required}` in '{}'",
                path.display()
            )));
        }
    }

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_cds_row(&record, &header_map) {
            Ok(obs) => observations.push(obs),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    Ok(CdsIngest {
        observations,
        row_errors,
        rows_read,
    })
}

fn parse_cds_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<CdsObservation, String> {
    let date = parse_date(get_required(record, header_map, "date")?)?;
    let ticker = get_required(record, header_map, "ticker")?.to_string();
    let raw_spread = get_required(record, header_map, "parspread")?;
    let parspread = raw_spread
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid `parspread` value '{raw_spread}'."))?;

    let tenor = get_optional(record, header_map, "tenor").unwrap_or(CDS_TENOR).to_string();
    let country = get_optional(record, header_map, "country")
        .unwrap_or(CDS_COUNTRY)
        .to_string();

    Ok(CdsObservation {
        date,
        ticker,
        tenor,
        country,
        parspread,
    })
}

/// Load published monthly CDS portfolio returns.
///
/// `yyyymm` is stamped at its month end; columns `CDS_01..` become quantiles.
/// Rows with any missing return are dropped.
pub fn read_actual_returns_csv(path: &Path) -> AnalyticsResult<CdsReturns> {
    let file = File::open(path)
        .map_err(|e| AnalyticsError::invalid(format!("failed to open returns CSV '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AnalyticsError::invalid(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let date_idx = *header_map
        .get("yyyymm")
        .ok_or_else(|| AnalyticsError::invalid("missing required column `yyyymm`"))?;

    let mut quantile_columns: Vec<(Quantile, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            let name = normalize_header_name(name);
            let digits = name.strip_prefix("cds_")?;
            digits.parse::<u32>().ok().map(|k| (Quantile(k), idx))
        })
        .collect();
    quantile_columns.sort();
    if quantile_columns.is_empty() {
        return Err(AnalyticsError::invalid(format!(
            "no `CDS_nn` return columns in '{}'",
            path.display()
        )));
    }

    let mut frame = TimeFrame::new(quantile_columns.iter().map(|(q, _)| *q).collect());
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record =
            result.map_err(|e| AnalyticsError::invalid(format!("{}:{line}: {e}", path.display())))?;

        let Some(date) = record.get(date_idx).and_then(parse_yyyymm) else {
            continue;
        };
        let values: Vec<Option<f64>> = quantile_columns
            .iter()
            .map(|(_, col)| record.get(*col).and_then(|s| s.parse::<f64>().ok()))
            .collect();
        if values.iter().any(|v| !v.is_some_and(f64::is_finite)) {
            continue;
        }
        frame.insert_row(date, values)?;
    }

    Ok(frame)
}

fn parse_yyyymm(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let raw = raw.split('.').next().unwrap_or(raw);
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[..4].parse().ok()?;
    let month: u32 = raw[4..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(month_end)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // Database exports carry either a bare date or a midnight timestamp.
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!("Invalid date '{s}'. Expected YYYY-MM-DD."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cds_rows_are_validated_individually() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cds_2020.csv");
        std::fs::write(
            &path,
            "\u{feff}Date,Ticker,Tenor,Country,ParSpread\n\
             2020-01-02,AAA,5Y,United States,0.0042\n\
             2020-01-02,BBB,5Y,United States,not-a-number\n\
             bad-date,CCC,5Y,United States,0.01\n\
             2020-01-03 00:00:00,DDD,3Y,Canada,0.02\n",
        )
        .unwrap();

        let ingest = read_cds_observations_csv(&path).unwrap();
        assert_eq!(ingest.rows_read, 4);
        assert_eq!(ingest.observations.len(), 2);
        assert_eq!(ingest.row_errors.len(), 2);
        assert_eq!(ingest.row_errors[0].line, 3);
        assert_eq!(ingest.observations[1].tenor, "3Y");
        assert_eq!(ingest.observations[1].country, "Canada");
    }

    #[test]
    fn cds_export_without_tenor_columns_defaults_to_the_universe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cds_2021.csv");
        std::fs::write(&path, "date,ticker,parspread\n2021-06-30,XYZ,0.015\n").unwrap();

        let ingest = read_cds_observations_csv(&path).unwrap();
        assert_eq!(ingest.observations[0].tenor, CDS_TENOR);
        assert_eq!(ingest.observations[0].country, CDS_COUNTRY);
    }

    #[test]
    fn actual_returns_are_stamped_at_month_end_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("returns.csv");
        std::fs::write(
            &path,
            "yyyymm,other,CDS_01,CDS_02\n200101,9,0.001,0.002\n200102,9,0.003,\n200103,9,0.004,0.005\n",
        )
        .unwrap();

        let frame = read_actual_returns_csv(&path).unwrap();
        assert_eq!(frame.columns(), &[Quantile(1), Quantile(2)]);
        let dates: Vec<_> = frame.dates().collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2001, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2001, 3, 31).unwrap()
            ]
        );
        assert_eq!(frame.get(dates[1], Quantile(2)), Some(0.005));
    }

    #[test]
    fn malformed_months_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("returns.csv");
        std::fs::write(
            &path,
            "yyyymm,CDS_01\n200\u{e9}1,0.001\n2001-1,0.002\n200113,0.003\n200104.0,0.004\n",
        )
        .unwrap();

        let frame = read_actual_returns_csv(&path).unwrap();
        let dates: Vec<_> = frame.dates().collect();
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2001, 4, 30).unwrap()]);
        assert_eq!(parse_yyyymm("20\u{e9}01"), None);
    }
}
