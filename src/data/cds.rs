//! CDS quotes from yearly CSV exports.
//!
//! The quote database is partitioned by year (`cds_2001.csv`, `cds_2002.csv`, ...).
//! Only 5-year contracts on US reference entities enter the portfolios.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::data::CdsSource;
use crate::domain::CdsObservation;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::io::read_cds_observations_csv;

/// Contract tenor kept in the universe.
pub const CDS_TENOR: &str = "5Y";
/// Reference-entity country kept in the universe.
pub const CDS_COUNTRY: &str = "United States";

/// Whether a quote belongs to the 5Y US universe.
pub fn in_universe(obs: &CdsObservation) -> bool {
    obs.tenor.eq_ignore_ascii_case(CDS_TENOR) && obs.country == CDS_COUNTRY
}

#[derive(Debug, Clone)]
pub struct CsvCdsSource {
    dir: PathBuf,
}

impl CsvCdsSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn year_path(&self, year: i32) -> PathBuf {
        self.dir.join(format!("cds_{year}.csv"))
    }

    fn load_year(&self, path: &Path) -> AnalyticsResult<Vec<CdsObservation>> {
        let ingest = read_cds_observations_csv(path)?;
        if !ingest.row_errors.is_empty() {
            warn!(
                path = %path.display(),
                skipped = ingest.row_errors.len(),
                rows = ingest.rows_read,
                first = %ingest.row_errors[0].message,
                "skipped malformed CDS rows"
            );
        }
        Ok(ingest.observations.into_iter().filter(in_universe).collect())
    }
}

impl CdsSource for CsvCdsSource {
    fn name(&self) -> &str {
        "cds-csv"
    }

    fn pull(&self, years: RangeInclusive<i32>) -> AnalyticsResult<Vec<CdsObservation>> {
        let mut observations = Vec::new();
        let mut loaded = 0usize;

        for year in years {
            let path = self.year_path(year);
            if !path.exists() {
                warn!(year, path = %path.display(), "no CDS export for year");
                continue;
            }
            match self.load_year(&path) {
                Ok(rows) => {
                    debug!(year, rows = rows.len(), "loaded CDS year");
                    observations.extend(rows);
                    loaded += 1;
                }
                Err(e) => warn!(year, error = %e, "skipping CDS year"),
            }
        }

        if loaded == 0 {
            return Err(AnalyticsError::source_unavailable(
                self.name(),
                format!("no readable CDS exports in '{}'", self.dir.display()),
            ));
        }
        info!(years = loaded, rows = observations.len(), "CDS quotes loaded");
        Ok(observations)
    }
}
