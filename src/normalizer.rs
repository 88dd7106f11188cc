//! Row normalization
//!
//! Maps heterogeneous header names onto the canonical trade shape. Each canonical
//! field owns an ordered list of header matchers: the exact export header first,
//! then case-insensitive patterns. The first matcher that hits a header wins.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::ingest::RawRow;
use crate::trade::{Trade, TradeFacts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Time,
    Ticker,
    TradePrice,
    Sector,
    Industry,
    Shares,
    Notional,
    RelativeSize,
    Percentile,
    Rank,
    Date,
}

/// Header matchers for one canonical field, in priority order.
#[derive(Debug)]
pub struct FieldSpec {
    pub field: Field,
    pub exact: &'static str,
    pub patterns: Vec<Regex>,
}

impl FieldSpec {
    fn new(field: Field, exact: &'static str, patterns: &[&str]) -> Self {
        FieldSpec {
            field,
            exact,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("bad header pattern {:?}: {}", p, e)))
                .collect(),
        }
    }

    /// Find this field's cell in `row`, or `None` if no header matches.
    pub fn locate<'a>(&self, row: &'a RawRow) -> Option<&'a Value> {
        if let Some(v) = row.get(self.exact) {
            return Some(v);
        }

        self.patterns.iter().find_map(|re| {
            row.iter()
                .find(|(header, _)| re.is_match(header.trim()))
                .map(|(_, v)| v)
        })
    }
}

static FIELD_SPECS: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    vec![
        FieldSpec::new(Field::Time, "Time", &[r"(?i)^time$", r"(?i)timestamp", r"(?i)\btime\b"]),
        FieldSpec::new(Field::Ticker, "Ticker (#T)", &[r"(?i)ticker", r"(?i)symbol"]),
        FieldSpec::new(Field::TradePrice, "TP", &[r"(?i)^tp$", r"(?i)trade\s*price", r"(?i)price"]),
        FieldSpec::new(Field::Sector, "Sector", &[r"(?i)sector"]),
        FieldSpec::new(Field::Industry, "Industry", &[r"(?i)industry"]),
        FieldSpec::new(Field::Shares, "Sh", &[r"(?i)^sh$", r"(?i)^shares?$"]),
        FieldSpec::new(Field::Notional, "$$", &[r"(?i)^\$\$$", r"(?i)notional", r"(?i)value"]),
        FieldSpec::new(Field::RelativeSize, "RS", &[r"(?i)^rs$", r"(?i)relative"]),
        FieldSpec::new(Field::Percentile, "PCT", &[r"(?i)^pct$", r"(?i)percentile"]),
        FieldSpec::new(Field::Rank, "R", &[r"(?i)^r$", r"(?i)^rank$"]),
        FieldSpec::new(Field::Date, "Last", &[r"(?i)^last$", r"(?i)date"]),
    ]
});

/// Locate a canonical field's cell in a row.
pub fn resolve(row: &RawRow, field: Field) -> Option<&Value> {
    FIELD_SPECS
        .iter()
        .find(|spec| spec.field == field)?
        .locate(row)
}

/// Date given to rows that carry none: the newest date column in the batch,
/// or today when no row is dated.
pub fn fallback_date(rows: &[RawRow]) -> NaiveDate {
    rows.iter()
        .filter_map(row_date)
        .max()
        .unwrap_or_else(|| Local::now().date_naive())
}

/// Normalize a batch. Rows without a ticker or with a non-positive notional are
/// dropped silently. Without `force_date`, undated rows get [`fallback_date`].
pub fn normalize_rows(rows: &[RawRow], force_date: Option<NaiveDate>) -> Vec<Trade> {
    let fallback = force_date.unwrap_or_else(|| fallback_date(rows));
    let trades: Vec<Trade> = rows
        .iter()
        .filter_map(|row| normalize_row(row, force_date, fallback))
        .collect();

    let dropped = rows.len() - trades.len();
    if dropped > 0 {
        debug!(dropped, kept = trades.len(), "normalizer discarded unusable rows");
    }

    trades
}

/// The observed date is `force_date`, else the row's date column, else `fallback`.
pub fn normalize_row(row: &RawRow, force_date: Option<NaiveDate>, fallback: NaiveDate) -> Option<Trade> {
    let ticker = resolve(row, Field::Ticker)
        .and_then(cell_text)
        .map(|t| t.to_uppercase())
        .filter(|t| !t.is_empty())?;

    let notional = number_field(row, Field::Notional);
    if notional <= 0.0 {
        return None;
    }

    let observed_date = force_date.or_else(|| row_date(row)).unwrap_or(fallback);

    let rank = resolve(row, Field::Rank)
        .and_then(cell_number)
        .filter(|r| *r >= 1.0)
        .map(|r| r as u32);

    let share_count = number_field(row, Field::Shares).max(0.0) as u64;

    Some(Trade::from_facts(TradeFacts {
        ticker,
        timestamp: text_field(row, Field::Time),
        trade_price: number_field(row, Field::TradePrice),
        sector: text_field(row, Field::Sector),
        industry: text_field(row, Field::Industry),
        share_count,
        notional,
        relative_size: number_field(row, Field::RelativeSize).max(0.0),
        percentile_rank: number_field(row, Field::Percentile),
        rank,
        observed_date,
    }))
}

/// The row's own date column, if it has a parseable one.
pub fn row_date(row: &RawRow) -> Option<NaiveDate> {
    resolve(row, Field::Date).and_then(cell_date)
}

fn text_field(row: &RawRow, field: Field) -> String {
    resolve(row, field).and_then(cell_text).unwrap_or_default()
}

fn number_field(row: &RawRow, field: Field) -> f64 {
    resolve(row, field).and_then(cell_number).unwrap_or(0.0)
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a numeric cell, tolerating currency symbols and thousands separators.
pub fn cell_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '_') && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn cell_date(value: &Value) -> Option<NaiveDate> {
    let text = cell_text(value)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&text, "%m/%d/%Y"))
        .ok()
}
