//! Federal Reserve yield-curve tables (Gürkaynak-Sack-Wright par yields).
//!
//! The Board publishes the fitted curve as 13 paginated HTML pages. Each page
//! carries a short description table followed by the data table with one row
//! per business day and `SVENY01` .. `SVENY10` par-yield columns in percent.
//!
//! There is no HTML dependency here: the pages are plain, well-formed tables,
//! so a small tag scanner pulls out the cell text.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::data::RateSource;
use crate::domain::{LONG_MATURITIES, Maturity, RateMatrix, TimeFrame, percent_to_decimal};
use crate::error::{AnalyticsError, AnalyticsResult};

const BASE_URL: &str = "https://www.federalreserve.gov/data/yield-curve-tables/feds200628_";
const PAGE_COUNT: usize = 13;

/// Par-yield columns in maturity order (1..=10 years).
const SVENY_COLUMNS: [&str; 10] = [
    "SVENY01", "SVENY02", "SVENY03", "SVENY04", "SVENY05", "SVENY06", "SVENY07", "SVENY08", "SVENY09", "SVENY10",
];

pub struct FedYieldCurveClient {
    client: Client,
    base_url: String,
    pages: usize,
}

impl Default for FedYieldCurveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FedYieldCurveClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
            pages: PAGE_COUNT,
        }
    }

    fn fetch_page(&self, page: usize) -> AnalyticsResult<String> {
        let url = format!("{}{page}.html", self.base_url);
        let origin = format!("fed-yield-curve page {page}");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| AnalyticsError::source_unavailable(&origin, format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AnalyticsError::source_unavailable(
                &origin,
                format!("request failed with status {}.", resp.status()),
            ));
        }
        resp.text()
            .map_err(|e| AnalyticsError::source_unavailable(&origin, format!("failed to read body: {e}")))
    }
}

impl RateSource for FedYieldCurveClient {
    fn name(&self) -> &str {
        "fed-yield-curve"
    }

    fn pull(&self, start: NaiveDate, end: NaiveDate) -> AnalyticsResult<RateMatrix> {
        let pages = (1..=self.pages).map(|page| (page, self.fetch_page(page)));
        let matrix = assemble_pages(pages)?;
        info!(rows = matrix.len(), "long rates loaded");
        Ok(matrix.between(start, end))
    }
}

/// Concatenate page tables in page order; a date seen twice keeps its last row.
fn assemble_pages(
    pages: impl IntoIterator<Item = (usize, AnalyticsResult<String>)>,
) -> AnalyticsResult<RateMatrix> {
    let mut merged = TimeFrame::new(LONG_MATURITIES.iter().map(|m| Maturity(*m)).collect());
    let mut loaded = 0usize;

    for (page, body) in pages {
        let table = body.and_then(|html| parse_yield_table(&html));
        match table {
            Ok(table) => {
                debug!(page, rows = table.len(), "parsed yield-curve page");
                for (date, row) in table.rows() {
                    merged.insert_row(date, row.to_vec())?;
                }
                loaded += 1;
            }
            Err(e) => warn!(page, error = %e, "skipping yield-curve page"),
        }
    }

    if loaded == 0 {
        return Err(AnalyticsError::source_unavailable(
            "fed-yield-curve",
            "no yield-curve page could be loaded",
        ));
    }
    Ok(merged)
}

/// Parse one yield-curve page into a decimal rate matrix over 12..=120 months.
///
/// Uses the second table on the page when there are two or more, else the first.
pub fn parse_yield_table(html: &str) -> AnalyticsResult<RateMatrix> {
    let tables = extract_tables(html);
    let table = match tables.len() {
        0 => return Err(AnalyticsError::invalid("no <table> found in yield-curve page")),
        1 => &tables[0],
        _ => &tables[1],
    };

    let header_idx = table
        .iter()
        .position(|row| row.iter().any(|cell| cell.eq_ignore_ascii_case("date")))
        .ok_or_else(|| AnalyticsError::invalid("yield-curve table has no `Date` header"))?;
    let header = &table[header_idx];
    let date_col = header
        .iter()
        .position(|cell| cell.eq_ignore_ascii_case("date"))
        .unwrap_or(0);

    let mut positions = Vec::with_capacity(SVENY_COLUMNS.len());
    for name in SVENY_COLUMNS {
        let pos = header
            .iter()
            .position(|cell| cell.eq_ignore_ascii_case(name))
            .ok_or_else(|| AnalyticsError::invalid(format!("yield-curve table is missing `{name}`")))?;
        positions.push(pos);
    }

    let mut matrix = TimeFrame::new(LONG_MATURITIES.iter().map(|m| Maturity(*m)).collect());
    for row in &table[header_idx + 1..] {
        // Footnote and spacer rows have no parseable date.
        let Some(date) = row.get(date_col).and_then(|cell| parse_table_date(cell)) else {
            continue;
        };
        let values = positions
            .iter()
            .map(|pos| row.get(*pos).and_then(|cell| parse_rate_cell(cell)))
            .collect();
        matrix.insert_row(date, values)?;
    }
    Ok(matrix)
}

fn parse_table_date(raw: &str) -> Option<NaiveDate> {
    const FMTS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
    FMTS.iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

fn parse_rate_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(percent_to_decimal)
}

/// Every `<table>` as rows of cell text.
fn extract_tables(html: &str) -> Vec<Vec<Vec<String>>> {
    let html = strip_comments(html);
    let html = html.as_str();
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut tables = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_tag(&lower, cursor, "table") {
        let end = lower[start..]
            .find("</table")
            .map(|i| start + i)
            .unwrap_or(lower.len());
        tables.push(extract_rows(html, &lower, start, end));
        cursor = end;
        if cursor >= lower.len() {
            break;
        }
        cursor += 1;
    }
    tables
}

fn extract_rows(html: &str, lower: &str, start: usize, end: usize) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut cursor = start;
    while let Some(row_start) = find_tag(&lower[..end], cursor, "tr") {
        let row_end = find_tag(&lower[..end], row_start + 3, "tr").unwrap_or(end);
        let cells = extract_cells(html, lower, row_start, row_end);
        if !cells.is_empty() {
            rows.push(cells);
        }
        cursor = row_end;
    }
    rows
}

fn extract_cells(html: &str, lower: &str, start: usize, end: usize) -> Vec<String> {
    let scope = &lower[..end];
    let mut cells = Vec::new();
    let mut cursor = start;
    loop {
        let next_td = find_tag(scope, cursor, "td");
        let next_th = find_tag(scope, cursor, "th");
        let cell_start = match (next_td, next_th) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => break,
        };
        let Some(open_end) = scope[cell_start..].find('>').map(|i| cell_start + i + 1) else {
            break;
        };

        let closing = ["</td", "</th"]
            .iter()
            .filter_map(|tag| scope[open_end..].find(tag).map(|i| open_end + i))
            .chain(find_tag(scope, open_end, "td"))
            .chain(find_tag(scope, open_end, "th"))
            .min()
            .unwrap_or(end);

        cells.push(cell_text(&html[open_end..closing]));
        cursor = closing;
    }
    cells
}

/// Position of the next `<name` opening tag at or after `from`.
fn find_tag(lower: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("<{name}");
    let mut cursor = from;
    while cursor < lower.len() {
        let pos = cursor + lower[cursor..].find(&needle)?;
        let after = lower[pos + needle.len()..].chars().next();
        // `<th` must not match `<thead`, `<tr` must not match `<track`.
        if matches!(after, Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/') {
            return Some(pos);
        }
        cursor = pos + needle.len();
    }
    None
}

/// Drop `<!-- ... -->` blocks; an unterminated comment runs to the end of the page.
fn strip_comments(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find("<!--") {
        out.push_str(&rest[..open]);
        rest = match rest[open + 4..].find("-->") {
            Some(close) => &rest[open + 4 + close + 3..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

fn cell_text(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode named and numeric character references. Unknown references are kept verbatim.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| entity_char(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_char(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        // Non-breaking spaces count as whitespace for cell text.
        return if code == 0xa0 { Some(' ') } else { char::from_u32(code) };
    }
    match name {
        "nbsp" => Some(' '),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "minus" => Some('-'),
        _ => None,
    }
}
