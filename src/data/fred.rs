//! FRED API integration for constant-maturity Treasury bills.
//!
//! Short end of the curve: `DGS3MO` and `DGS6MO`, published in percent on
//! business days. Each series is fetched independently; gaps are forward-filled.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::data::RateSource;
use crate::domain::{Maturity, RateMatrix, TimeFrame, percent_to_decimal};
use crate::error::{AnalyticsError, AnalyticsResult};

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const OBS_LIMIT: usize = 100000;

/// Series id and the maturity (months) it lands in.
const SHORT_SERIES: [(&str, u32); 2] = [("DGS3MO", 3), ("DGS6MO", 6)];

pub struct FredClient {
    client: Client,
    api_key: String,
}

impl FredClient {
    pub fn from_env() -> AnalyticsResult<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("FRED_API_KEY")
            .map_err(|_| AnalyticsError::invalid("Missing FRED_API_KEY in environment (.env)."))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalyticsResult<Vec<(NaiveDate, f64)>> {
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("series_id", series_id),
                ("api_key", &self.api_key),
                ("file_type", "json"),
                ("sort_order", "asc"),
                ("limit", &OBS_LIMIT.to_string()),
                ("observation_start", &start.to_string()),
                ("observation_end", &end.to_string()),
            ])
            .send()
            .map_err(|e| AnalyticsError::source_unavailable(series_id, format!("FRED request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AnalyticsError::source_unavailable(
                series_id,
                format!("FRED request failed with status {}.", resp.status()),
            ));
        }

        let body: ObservationsResponse = resp.json().map_err(|e| {
            AnalyticsError::source_unavailable(series_id, format!("Failed to parse FRED response: {e}"))
        })?;
        parse_observations(series_id, body.observations)
    }
}

impl RateSource for FredClient {
    fn name(&self) -> &str {
        "fred"
    }

    fn pull(&self, start: NaiveDate, end: NaiveDate) -> AnalyticsResult<RateMatrix> {
        let mut fragments = Vec::new();
        for (series_id, months) in SHORT_SERIES {
            match self.fetch_series(series_id, start, end) {
                Ok(obs) if obs.is_empty() => warn!(series_id, "FRED returned no observations"),
                Ok(obs) => {
                    debug!(series_id, count = obs.len(), "fetched FRED series");
                    fragments.push((Maturity(months), obs));
                }
                Err(e) => warn!(series_id, error = %e, "skipping FRED series"),
            }
        }

        if fragments.is_empty() {
            return Err(AnalyticsError::source_unavailable(
                self.name(),
                "no short-rate series could be fetched",
            ));
        }

        let matrix = assemble_series(&fragments)?;
        info!(rows = matrix.len(), series = fragments.len(), "short rates loaded");
        Ok(matrix.between(start, end))
    }
}

/// Combine per-series observations into one forward-filled decimal matrix.
fn assemble_series(fragments: &[(Maturity, Vec<(NaiveDate, f64)>)]) -> AnalyticsResult<RateMatrix> {
    let mut matrix = TimeFrame::new(fragments.iter().map(|(m, _)| *m).collect());
    for (maturity, obs) in fragments {
        for (date, value) in obs {
            matrix.set(*date, *maturity, Some(percent_to_decimal(*value)))?;
        }
    }
    Ok(matrix.ffill())
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

fn parse_observations(series_id: &str, observations: Vec<Observation>) -> AnalyticsResult<Vec<(NaiveDate, f64)>> {
    let mut out = Vec::with_capacity(observations.len());
    for obs in observations {
        let value = match parse_value(&obs.value) {
            Some(v) => v,
            None => continue,
        };
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
            AnalyticsError::source_unavailable(series_id, format!("Invalid FRED date '{}': {e}", obs.date))
        })?;
        out.push((date, value));
    }
    Ok(out)
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn missing_values_are_skipped() {
        let body = r#"{"observations":[
            {"date":"2020-01-02","value":"1.55"},
            {"date":"2020-01-03","value":"."},
            {"date":"2020-01-06","value":"1.54"}
        ]}"#;
        let parsed: ObservationsResponse = serde_json::from_str(body).unwrap();
        let obs = parse_observations("DGS3MO", parsed.observations).unwrap();
        assert_eq!(obs, vec![(d(2020, 1, 2), 1.55), (d(2020, 1, 6), 1.54)]);
    }

    #[test]
    fn series_are_converted_to_decimal_and_forward_filled() {
        let fragments = vec![
            (Maturity(3), vec![(d(2020, 1, 2), 1.5), (d(2020, 1, 6), 1.6)]),
            (Maturity(6), vec![(d(2020, 1, 2), 1.7), (d(2020, 1, 3), 1.8)]),
        ];
        let matrix = assemble_series(&fragments).unwrap();
        assert_eq!(matrix.columns(), &[Maturity(3), Maturity(6)]);
        assert_eq!(matrix.get(d(2020, 1, 3), Maturity(3)), Some(0.015));
        approx::assert_relative_eq!(matrix.get(d(2020, 1, 6), Maturity(6)).unwrap(), 0.018, epsilon = 1e-15);
    }
}
