//! CDS spread aggregator.
//!
//! Raw quotes become a monthly panel of quantile-portfolio spreads:
//!
//! 1. same-day duplicate quotes per ticker are averaged
//! 2. each ticker keeps its last quote of every calendar month (stamped at month end)
//! 3. per month, tickers are ranked by spread and cut into `n_quantiles` equal-count bins
//! 4. each (month, bin) is reduced with the chosen [`AggregationMethod`]
//!
//! Portfolio membership is recomputed every month.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{AggregationMethod, CdsObservation, CdsPortfolio, Quantile, TimeFrame, month_end};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::io::{read_frame_csv, write_frame_csv};
use crate::math::qcut;

pub const DEFAULT_QUANTILES: usize = 20;

/// Build the monthly quantile-portfolio spread panel.
pub fn aggregate(
    observations: &[CdsObservation],
    method: AggregationMethod,
    n_quantiles: usize,
) -> AnalyticsResult<CdsPortfolio> {
    if n_quantiles == 0 {
        return Err(AnalyticsError::invalid("quantile count must be > 0"));
    }
    if observations.is_empty() {
        return Err(AnalyticsError::invalid("no CDS observations to aggregate"));
    }

    let by_month = month_end_spreads(observations);
    let months: Vec<(NaiveDate, Vec<(String, f64)>)> = by_month.into_iter().collect();

    let rows: Vec<(NaiveDate, Option<Vec<Option<f64>>>)> = months
        .par_iter()
        .map(|(date, quotes)| (*date, bucket_month(*date, quotes, method, n_quantiles)))
        .collect();

    let columns = (1..=n_quantiles as u32).map(Quantile).collect();
    let mut portfolio = TimeFrame::new(columns);
    let mut skipped = 0usize;
    for (date, values) in rows {
        match values {
            Some(values) => portfolio.insert_row(date, values)?,
            None => skipped += 1,
        }
    }

    info!(
        months = portfolio.len(),
        skipped,
        method = method.as_str(),
        n_quantiles,
        "aggregated CDS portfolios"
    );
    Ok(portfolio)
}

/// Average same-day duplicates, then keep each ticker's last quote per month.
///
/// Returns, per month end, the `(ticker, spread)` pairs ordered by spread then ticker.
fn month_end_spreads(observations: &[CdsObservation]) -> BTreeMap<NaiveDate, Vec<(String, f64)>> {
    let mut daily: BTreeMap<(&str, NaiveDate), (f64, usize)> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.parspread.is_finite()) {
        let slot = daily.entry((obs.ticker.as_str(), obs.date)).or_insert((0.0, 0));
        slot.0 += obs.parspread;
        slot.1 += 1;
    }

    // Keys iterate by (ticker, date), so later days overwrite earlier ones within a month.
    let mut last: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
    for ((ticker, date), (sum, count)) in daily {
        last.insert((month_end(date), ticker), sum / count as f64);
    }

    let mut by_month: BTreeMap<NaiveDate, Vec<(String, f64)>> = BTreeMap::new();
    for ((date, ticker), spread) in last {
        by_month.entry(date).or_default().push((ticker.to_string(), spread));
    }
    for quotes in by_month.values_mut() {
        quotes.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    }
    by_month
}

fn bucket_month(
    date: NaiveDate,
    quotes: &[(String, f64)],
    method: AggregationMethod,
    n_quantiles: usize,
) -> Option<Vec<Option<f64>>> {
    let spreads: Vec<f64> = quotes.iter().map(|(_, s)| *s).collect();
    let labels = match qcut(&spreads, n_quantiles) {
        Ok(labels) => labels,
        Err(e) => {
            warn!(%date, tickers = spreads.len(), error = %e, "skipping CDS month");
            return None;
        }
    };

    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); n_quantiles];
    for (label, spread) in labels.into_iter().zip(spreads) {
        buckets[label - 1].push(spread);
    }
    Some(buckets.iter().map(|b| method.apply(b)).collect())
}

/// Cache key over the quote content, the method and the quantile count.
pub fn cache_key(observations: &[CdsObservation], method: AggregationMethod, n_quantiles: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    observations.len().hash(&mut hasher);
    for obs in observations {
        obs.date.hash(&mut hasher);
        obs.ticker.hash(&mut hasher);
        obs.tenor.hash(&mut hasher);
        obs.country.hash(&mut hasher);
        obs.parspread.to_bits().hash(&mut hasher);
    }
    method.hash(&mut hasher);
    n_quantiles.hash(&mut hasher);
    hasher.finish()
}

pub fn cache_file_name(method: AggregationMethod, key: u64) -> String {
    format!("cds_monthly_{}_{key:016x}.csv", method.as_str())
}

/// [`aggregate`], memoized on disk under `cache_dir`. Returns the panel and its cache file.
///
/// A cached panel is reused only when the quotes, method and quantile count
/// hash to the same key. An unreadable cache file is recomputed and overwritten.
pub fn aggregate_cached(
    observations: &[CdsObservation],
    method: AggregationMethod,
    n_quantiles: usize,
    cache_dir: &Path,
) -> AnalyticsResult<(CdsPortfolio, PathBuf)> {
    let key = cache_key(observations, method, n_quantiles);
    let path = cache_dir.join(cache_file_name(method, key));

    if path.exists() {
        match read_frame_csv::<Quantile>(&path) {
            Ok(portfolio) => {
                info!(path = %path.display(), "using cached CDS portfolios");
                return Ok((portfolio, path));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable CDS cache"),
        }
    }

    let portfolio = aggregate(observations, method, n_quantiles)?;
    write_frame_csv(&path, &portfolio)?;
    Ok((portfolio, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn quote(date: NaiveDate, ticker: &str, spread: f64) -> CdsObservation {
        CdsObservation {
            date,
            ticker: ticker.to_string(),
            tenor: "5Y".to_string(),
            country: "United States".to_string(),
            parspread: spread,
        }
    }

    fn panel(tickers: usize) -> Vec<CdsObservation> {
        let mut obs = Vec::new();
        for i in 0..tickers {
            let name = format!("T{i:02}");
            let base = 0.001 * (((i * 7) % tickers) as f64 + 1.0);
            obs.push(quote(d(2020, 1, 15), &name, base * 2.0));
            obs.push(quote(d(2020, 1, 30), &name, base));
            obs.push(quote(d(2020, 2, 10), &name, base * 1.1));
        }
        obs
    }

    #[test]
    fn twenty_quantiles_per_month_with_twenty_plus_tickers() {
        let portfolio = aggregate(&panel(45), AggregationMethod::Mean, 20).unwrap();
        assert_eq!(portfolio.columns().len(), 20);
        assert_eq!(portfolio.columns()[0], Quantile(1));
        for (_, row) in portfolio.rows() {
            assert!(row.iter().all(Option::is_some));
        }
        let jan = portfolio.row(d(2020, 1, 31)).unwrap();
        assert!(jan.windows(2).all(|w| w[0].unwrap() < w[1].unwrap()));
    }

    #[test]
    fn duplicates_are_averaged_and_last_quote_of_month_wins() {
        let obs = vec![
            quote(d(2020, 1, 2), "AAA", 0.050),
            quote(d(2020, 1, 29), "AAA", 0.010),
            quote(d(2020, 1, 29), "AAA", 0.020),
            quote(d(2020, 1, 29), "BBB", 0.030),
        ];
        let portfolio = aggregate(&obs, AggregationMethod::Mean, 2).unwrap();
        assert_relative_eq!(portfolio.get(d(2020, 1, 31), Quantile(1)).unwrap(), 0.015, epsilon = 1e-15);
        assert_relative_eq!(portfolio.get(d(2020, 1, 31), Quantile(2)).unwrap(), 0.030, epsilon = 1e-15);
    }

    #[test]
    fn methods_reduce_each_bucket() {
        let obs: Vec<_> = [("A", 0.01), ("B", 0.02), ("C", 0.06), ("D", 0.07), ("E", 0.08), ("F", 0.30)]
            .iter()
            .map(|(t, s)| quote(d(2021, 3, 31), t, *s))
            .collect();

        let mean = aggregate(&obs, AggregationMethod::Mean, 2).unwrap();
        let median = aggregate(&obs, AggregationMethod::Median, 2).unwrap();
        let weighted = aggregate(&obs, AggregationMethod::Weighted, 2).unwrap();
        let date = d(2021, 3, 31);

        assert_relative_eq!(mean.get(date, Quantile(1)).unwrap(), 0.03, epsilon = 1e-15);
        assert_relative_eq!(median.get(date, Quantile(1)).unwrap(), 0.02, epsilon = 1e-15);
        assert_relative_eq!(
            weighted.get(date, Quantile(2)).unwrap(),
            (0.07 * 0.07 + 0.08 * 0.08 + 0.30 * 0.30) / 0.45,
            epsilon = 1e-15
        );
    }

    #[test]
    fn aggregation_is_deterministic() {
        let obs = panel(33);
        let a = aggregate(&obs, AggregationMethod::Weighted, 20).unwrap();
        let b = aggregate(&obs, AggregationMethod::Weighted, 20).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_ticker_months_are_skipped() {
        let mut obs = panel(5);
        obs.push(quote(d(2020, 5, 5), "LONE", 0.01));
        let portfolio = aggregate(&obs, AggregationMethod::Mean, 5).unwrap();
        assert!(portfolio.row(d(2020, 5, 31)).is_none());
        assert_eq!(portfolio.len(), 2);
    }

    #[test]
    fn tied_spreads_still_fill_every_portfolio() {
        let obs: Vec<_> = [1, 2, 3, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]
            .iter()
            .enumerate()
            .map(|(i, bp)| quote(d(2022, 6, 30), &format!("T{i:02}"), f64::from(*bp) * 1e-4))
            .collect();
        let portfolio = aggregate(&obs, AggregationMethod::Mean, 20).unwrap();
        let row = portfolio.row(d(2022, 6, 30)).unwrap();
        assert!(row.iter().all(Option::is_some));
        assert_relative_eq!(row[2].unwrap(), 3e-4, epsilon = 1e-15);
        assert_relative_eq!(row[3].unwrap(), 3e-4, epsilon = 1e-15);
    }

    #[test]
    fn thin_months_keep_empty_portfolios() {
        let obs: Vec<_> = (0..5)
            .map(|i| quote(d(2022, 7, 29), &format!("T{i}"), 0.01 * f64::from(i + 1)))
            .collect();
        let portfolio = aggregate(&obs, AggregationMethod::Mean, 20).unwrap();
        let row = portfolio.row(d(2022, 7, 31)).unwrap();
        assert_eq!(row.iter().filter(|v| v.is_some()).count(), 5);
        assert_eq!(row[0], Some(0.01));
        assert_eq!(row[19], Some(0.05));
    }

    #[test]
    fn cache_is_keyed_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let obs = panel(25);

        let (first, path) = aggregate_cached(&obs, AggregationMethod::Mean, 20, dir.path()).unwrap();
        let key = cache_key(&obs, AggregationMethod::Mean, 20);
        assert_eq!(path, dir.path().join(cache_file_name(AggregationMethod::Mean, key)));
        assert!(path.exists());
        let (again, _) = aggregate_cached(&obs, AggregationMethod::Mean, 20, dir.path()).unwrap();
        assert_eq!(first, again);

        let mut changed = obs.clone();
        changed[0].parspread *= 3.0;
        assert_ne!(cache_key(&changed, AggregationMethod::Mean, 20), key);
        assert_ne!(cache_key(&obs, AggregationMethod::Median, 20), key);
        assert_ne!(cache_key(&obs, AggregationMethod::Mean, 10), key);
    }
}
