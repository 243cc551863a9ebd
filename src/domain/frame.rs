//! Date-indexed tables.
//!
//! Every stage of the pipeline exchanges a [`TimeFrame`]: rows keyed by date
//! (ascending, unique) and a fixed, ordered set of column labels. Missing cells
//! are `None`; non-finite values are normalized to `None` on the way in.
//!
//! All transforms return a new frame. Nothing is mutated behind a shared borrow.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::error::{AnalyticsError, AnalyticsResult};

/// A column label with a stable textual form (used for CSV checkpoints).
pub trait ColumnLabel: Copy + Ord + fmt::Debug + Send + Sync {
    fn label(&self) -> String;
    fn parse_label(raw: &str) -> Option<Self>;
}

/// Maturity in months (`3`, `6`, `12`, ... `120`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Maturity(pub u32);

impl Maturity {
    pub fn months(self) -> u32 {
        self.0
    }
}

impl ColumnLabel for Maturity {
    fn label(&self) -> String {
        self.0.to_string()
    }

    fn parse_label(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(Maturity)
    }
}

/// Discounting horizon in quarters (`1` ..= `20`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quarter(pub u32);

impl ColumnLabel for Quarter {
    fn label(&self) -> String {
        self.0.to_string()
    }

    fn parse_label(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(Quarter)
    }
}

/// Spread-ranked portfolio number; 1 holds the tightest names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantile(pub u32);

impl ColumnLabel for Quantile {
    fn label(&self) -> String {
        format!("cds_{}", self.0)
    }

    fn parse_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits = raw
            .strip_prefix("cds_")
            .or_else(|| raw.strip_prefix("CDS_"))
            .unwrap_or(raw);
        digits.parse().ok().map(Quantile)
    }
}

/// A date-indexed table of optional floats.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrame<C> {
    columns: Vec<C>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl<C: ColumnLabel> TimeFrame<C> {
    /// Empty frame over `columns` (sorted and deduplicated).
    pub fn new(mut columns: Vec<C>) -> Self {
        columns.sort();
        columns.dedup();
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Build a frame from whole rows. Later rows for the same date win.
    pub fn from_rows(
        columns: Vec<C>,
        rows: impl IntoIterator<Item = (NaiveDate, Vec<Option<f64>>)>,
    ) -> AnalyticsResult<Self> {
        let mut frame = Self::new(columns);
        for (date, values) in rows {
            frame.insert_row(date, values)?;
        }
        Ok(frame)
    }

    pub fn columns(&self) -> &[C] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next_back().copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, &[Option<f64>])> + '_ {
        self.rows.iter().map(|(d, r)| (*d, r.as_slice()))
    }

    pub fn row(&self, date: NaiveDate) -> Option<&[Option<f64>]> {
        self.rows.get(&date).map(Vec::as_slice)
    }

    pub fn column_index(&self, column: C) -> Option<usize> {
        self.columns.binary_search(&column).ok()
    }

    pub fn get(&self, date: NaiveDate, column: C) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(&date).and_then(|row| row[idx])
    }

    /// Values of one column in date order.
    pub fn column(&self, column: C) -> Vec<(NaiveDate, Option<f64>)> {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().map(|(d, r)| (*d, r[idx])).collect(),
            None => self.rows.keys().map(|d| (*d, None)).collect(),
        }
    }

    /// Insert (or replace) a whole row.
    pub fn insert_row(&mut self, date: NaiveDate, values: Vec<Option<f64>>) -> AnalyticsResult<()> {
        if values.len() != self.columns.len() {
            return Err(AnalyticsError::invalid(format!(
                "row for {date} has {} values, frame has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        let values = values.into_iter().map(finite).collect();
        self.rows.insert(date, values);
        Ok(())
    }

    /// Set a single cell, creating an empty row for `date` if needed.
    pub fn set(&mut self, date: NaiveDate, column: C, value: Option<f64>) -> AnalyticsResult<()> {
        let idx = self.column_index(column).ok_or_else(|| {
            AnalyticsError::invalid(format!("unknown column '{}'", column.label()))
        })?;
        self.row_mut(date)[idx] = finite(value);
        Ok(())
    }

    fn row_mut(&mut self, date: NaiveDate) -> &mut Vec<Option<f64>> {
        let width = self.columns.len();
        self.rows.entry(date).or_insert_with(|| vec![None; width])
    }

    /// Column-wise concatenation with an outer join on dates.
    ///
    /// Where both frames carry the same column, `other`'s present values win.
    pub fn outer_join(&self, other: &Self) -> Self {
        let columns = self.columns.iter().chain(other.columns.iter()).copied().collect();
        let mut out = Self::new(columns);
        for frame in [self, other] {
            for (date, row) in &frame.rows {
                let positions: Vec<usize> = frame
                    .columns
                    .iter()
                    .filter_map(|c| out.column_index(*c))
                    .collect();
                let target = out.row_mut(*date);
                for (pos, value) in positions.into_iter().zip(row) {
                    if value.is_some() {
                        target[pos] = *value;
                    }
                }
            }
        }
        out
    }

    /// Carry the last present value of each column forward.
    pub fn ffill(&self) -> Self {
        let mut out = self.clone();
        let mut last = vec![None; self.columns.len()];
        for row in out.rows.values_mut() {
            fill_from(row, &mut last);
        }
        out
    }

    /// Carry the next present value of each column backward.
    pub fn bfill(&self) -> Self {
        let mut out = self.clone();
        let mut next = vec![None; self.columns.len()];
        for row in out.rows.values_mut().rev() {
            fill_from(row, &mut next);
        }
        out
    }

    /// Resample to a contiguous month-end grid, keeping the last present value
    /// of each column within each calendar month.
    pub fn resample_month_end(&self) -> Self {
        let mut out = Self::new(self.columns.clone());
        let (Some(first), Some(last)) = (self.first_date(), self.last_date()) else {
            return out;
        };

        let end = month_end(last);
        let mut month = month_end(first);
        loop {
            out.row_mut(month);
            let next = next_month_end(month);
            if month >= end || next == month {
                break;
            }
            month = next;
        }

        for (date, row) in &self.rows {
            let target = out.row_mut(month_end(*date));
            for (slot, value) in target.iter_mut().zip(row) {
                if value.is_some() {
                    *slot = *value;
                }
            }
        }
        out
    }

    /// Rows with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let rows = if start <= end {
            self.rows.range(start..=end).map(|(d, r)| (*d, r.clone())).collect()
        } else {
            BTreeMap::new()
        };
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Split rows by `keep`; returns the kept frame and the dropped dates.
    pub fn retain_rows(&self, keep: impl Fn(NaiveDate, &[Option<f64>]) -> bool) -> (Self, Vec<NaiveDate>) {
        let mut kept = Self::new(self.columns.clone());
        let mut dropped = Vec::new();
        for (date, row) in &self.rows {
            if keep(*date, row.as_slice()) {
                kept.rows.insert(*date, row.clone());
            } else {
                dropped.push(*date);
            }
        }
        (kept, dropped)
    }

    /// Rows whose date is in `dates`.
    pub fn restrict_to(&self, dates: &BTreeSet<NaiveDate>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|(d, _)| dates.contains(*d))
                .map(|(d, r)| (*d, r.clone()))
                .collect(),
        }
    }

    /// Reindex onto `dates`: rows missing here come back empty.
    pub fn reindex(&self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let width = self.columns.len();
        Self {
            columns: self.columns.clone(),
            rows: dates
                .into_iter()
                .map(|d| (d, self.rows.get(&d).cloned().unwrap_or_else(|| vec![None; width])))
                .collect(),
        }
    }

    /// Positional lag: row `i` takes the values of row `i - periods`.
    pub fn shift(&self, periods: usize) -> Self {
        let width = self.columns.len();
        let values: Vec<&Vec<Option<f64>>> = self.rows.values().collect();
        let rows = self
            .rows
            .keys()
            .enumerate()
            .map(|(i, d)| {
                let row = match i.checked_sub(periods) {
                    Some(src) => values[src].clone(),
                    None => vec![None; width],
                };
                (*d, row)
            })
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// First difference between consecutive rows; the first row is empty.
    pub fn diff(&self) -> Self {
        let lagged = self.shift(1);
        self.zip_cells(&lagged, |now, before| now - before)
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|(d, r)| (*d, r.iter().map(|v| finite(v.map(&f))).collect()))
                .collect(),
        }
    }

    /// Cell-wise combination of two frames with identical columns.
    ///
    /// The output keeps `self`'s dates; a cell is present only when both inputs are.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> AnalyticsResult<Self> {
        if self.columns != other.columns {
            return Err(AnalyticsError::invalid(
                "cannot combine frames with different columns",
            ));
        }
        Ok(self.zip_cells(other, f))
    }

    fn zip_cells(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let width = self.columns.len();
        let rows = self
            .rows
            .iter()
            .map(|(d, left)| {
                let row = match other.rows.get(d) {
                    Some(right) => left
                        .iter()
                        .zip(right)
                        .map(|(a, b)| match (a, b) {
                            (Some(a), Some(b)) => finite(Some(f(*a, *b))),
                            _ => None,
                        })
                        .collect(),
                    None => vec![None; width],
                };
                (*d, row)
            })
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn fill_from(row: &mut [Option<f64>], carry: &mut [Option<f64>]) {
    for (cell, held) in row.iter_mut().zip(carry.iter_mut()) {
        match cell {
            Some(v) => *held = Some(*v),
            None => *cell = *held,
        }
    }
}

/// Last calendar day of `date`'s month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

fn next_month_end(date: NaiveDate) -> NaiveDate {
    month_end(month_end(date).succ_opt().unwrap_or(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_end_handles_december_and_leap_years() {
        assert_eq!(month_end(d(2020, 2, 3)), d(2020, 2, 29));
        assert_eq!(month_end(d(2021, 2, 28)), d(2021, 2, 28));
        assert_eq!(month_end(d(2023, 12, 5)), d(2023, 12, 31));
    }

    #[test]
    fn resample_keeps_last_valid_value_and_fills_the_month_grid() {
        let frame = TimeFrame::from_rows(
            vec![Maturity(3), Maturity(12)],
            vec![
                (d(2020, 1, 2), vec![Some(1.0), Some(2.0)]),
                (d(2020, 1, 30), vec![Some(1.5), None]),
                (d(2020, 3, 10), vec![None, Some(3.0)]),
            ],
        )
        .unwrap();

        let monthly = frame.resample_month_end();
        let dates: Vec<_> = monthly.dates().collect();
        assert_eq!(dates, vec![d(2020, 1, 31), d(2020, 2, 29), d(2020, 3, 31)]);
        assert_eq!(monthly.row(d(2020, 1, 31)).unwrap(), &[Some(1.5), Some(2.0)]);
        assert_eq!(monthly.row(d(2020, 2, 29)).unwrap(), &[None, None]);
        assert_eq!(monthly.row(d(2020, 3, 31)).unwrap(), &[None, Some(3.0)]);
    }

    #[test]
    fn outer_join_unions_dates_and_columns() {
        let short = TimeFrame::from_rows(vec![Maturity(3)], vec![(d(2020, 1, 2), vec![Some(0.01)])]).unwrap();
        let long = TimeFrame::from_rows(vec![Maturity(12)], vec![(d(2020, 1, 3), vec![Some(0.02)])]).unwrap();

        let joined = short.outer_join(&long);
        assert_eq!(joined.columns(), &[Maturity(3), Maturity(12)]);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.get(d(2020, 1, 2), Maturity(12)), None);
        assert_eq!(joined.get(d(2020, 1, 3), Maturity(12)), Some(0.02));
    }

    #[test]
    fn fills_shift_and_diff() {
        let frame = TimeFrame::from_rows(
            vec![Quantile(1)],
            vec![
                (d(2020, 1, 31), vec![None]),
                (d(2020, 2, 29), vec![Some(0.01)]),
                (d(2020, 3, 31), vec![None]),
                (d(2020, 4, 30), vec![Some(0.02)]),
            ],
        )
        .unwrap();

        let ff: Vec<_> = frame.ffill().column(Quantile(1)).into_iter().map(|(_, v)| v).collect();
        assert_eq!(ff, vec![None, Some(0.01), Some(0.01), Some(0.02)]);

        let bf: Vec<_> = frame.bfill().column(Quantile(1)).into_iter().map(|(_, v)| v).collect();
        assert_eq!(bf, vec![Some(0.01), Some(0.01), Some(0.02), Some(0.02)]);

        let filled = frame.bfill();
        let lagged: Vec<_> = filled.shift(1).column(Quantile(1)).into_iter().map(|(_, v)| v).collect();
        assert_eq!(lagged, vec![None, Some(0.01), Some(0.01), Some(0.02)]);

        let changes: Vec<_> = filled.diff().column(Quantile(1)).into_iter().map(|(_, v)| v).collect();
        assert_eq!(changes[0], None);
        assert_eq!(changes[1], Some(0.0));
        assert!((changes[2].unwrap() - 0.01).abs() < 1e-15);
        assert_eq!(changes[3], Some(0.0));
    }

    #[test]
    fn insert_row_rejects_wrong_width_and_drops_nan() {
        let mut frame = TimeFrame::new(vec![Quarter(1), Quarter(2)]);
        assert!(frame.insert_row(d(2020, 1, 31), vec![Some(1.0)]).is_err());
        frame.insert_row(d(2020, 1, 31), vec![Some(f64::NAN), Some(0.9)]).unwrap();
        assert_eq!(frame.row(d(2020, 1, 31)).unwrap(), &[None, Some(0.9)]);
    }

    #[test]
    fn quantile_labels_round_trip() {
        assert_eq!(Quantile(7).label(), "cds_7");
        assert_eq!(Quantile::parse_label("cds_7"), Some(Quantile(7)));
        assert_eq!(Quantile::parse_label("CDS_07"), Some(Quantile(7)));
        assert_eq!(Maturity::parse_label(" 120 "), Some(Maturity(120)));
    }
}
