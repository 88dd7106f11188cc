//! Caller-owned dataset and the batch pipeline
//!
//! A [`Dataset`] keeps raw rows per calendar date. [`run`] turns the whole
//! dataset into freshly built, scored and annotated records; nothing derived is
//! kept between runs.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::calendar::market_closed;
use crate::error::Result;
use crate::ingest::RawRow;
use crate::normalizer::{fallback_date, normalize_rows, row_date};
use crate::overlay::{apply_context, resolve_move, SignalFallback, SignalOracle};
use crate::relations::{detect_relationships, RelationSummary};
use crate::scoring::{score_batch, BatchStats};
use crate::trade::Trade;

/// Raw batches keyed by the date they were observed on.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    batches: BTreeMap<NaiveDate, Vec<RawRow>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the batch for `date`, replacing any batch already held for it.
    pub fn insert_batch(&mut self, date: NaiveDate, rows: Vec<RawRow>) {
        if let Some(reason) = market_closed(date) {
            warn!(%date, %reason, "batch stamped on a closed market day");
        }

        let count = rows.len();
        if self.batches.insert(date, rows).is_some() {
            info!(%date, rows = count, "replaced batch");
        } else {
            info!(%date, rows = count, "registered batch");
        }
    }

    /// Split undated input by each row's own date column and register one batch
    /// per date. Rows without a usable date join the newest date of the input
    /// (today if none is dated). Returns the dates touched.
    pub fn insert_rows(&mut self, rows: Vec<RawRow>) -> Vec<NaiveDate> {
        let fallback = fallback_date(&rows);
        let mut undated = 0;
        let mut by_date: BTreeMap<NaiveDate, Vec<RawRow>> = BTreeMap::new();
        for row in rows {
            let date = row_date(&row).unwrap_or_else(|| {
                undated += 1;
                fallback
            });
            by_date.entry(date).or_default().push(row);
        }

        if undated > 0 {
            debug!(undated, %fallback, "rows without a date column joined the newest batch");
        }

        let dates: Vec<NaiveDate> = by_date.keys().copied().collect();
        for (date, batch) in by_date {
            self.insert_batch(date, batch);
        }
        dates
    }

    pub fn remove_batch(&mut self, date: NaiveDate) -> Option<Vec<RawRow>> {
        self.batches.remove(&date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.batches.keys().copied()
    }

    pub fn row_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Normalize, score and annotate one batch of rows.
pub fn process_rows(rows: &[RawRow], force_date: Option<NaiveDate>) -> Vec<Trade> {
    let mut trades = normalize_rows(rows, force_date);
    score_batch(&mut trades);
    detect_relationships(&mut trades);
    trades
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone)]
pub struct Analysis {
    trades: Vec<Trade>,
    pub stats: BatchStats,
    pub relations: RelationSummary,
}

/// One date's records with the context overlay applied.
#[derive(Debug, Clone)]
pub struct ContextView {
    pub date: NaiveDate,
    pub signal_move: f64,
    pub trades: Vec<Trade>,
}

/// Run every batch of the dataset as one snapshot.
pub fn run(dataset: &Dataset) -> Analysis {
    let mut trades = Vec::with_capacity(dataset.row_count());
    for (date, rows) in &dataset.batches {
        trades.extend(normalize_rows(rows, Some(*date)));
    }

    let stats = score_batch(&mut trades);
    let relations = detect_relationships(&mut trades);

    info!(
        dates = dataset.batches.len(),
        rows = dataset.row_count(),
        records = trades.len(),
        "pipeline run complete"
    );

    Analysis {
        trades,
        stats,
        relations,
    }
}

impl Analysis {
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Distinct observed dates, newest first.
    pub fn available_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.trades.iter().map(|t| t.observed_date).collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        dates
    }

    /// Copies of the records observed on `date`, in insertion order.
    pub fn for_date(&self, date: NaiveDate) -> Vec<Trade> {
        self.trades
            .iter()
            .filter(|t| t.observed_date == date)
            .cloned()
            .collect()
    }

    /// Records for `date` with the overlay for that date's signal move. The
    /// analysis itself is left untouched.
    pub fn with_context(
        &self,
        date: NaiveDate,
        oracle: &dyn SignalOracle,
        fallback: SignalFallback,
    ) -> Result<ContextView> {
        let signal_move = resolve_move(oracle, date, fallback)?;
        let mut trades = self.for_date(date);
        apply_context(&mut trades, signal_move);

        Ok(ContextView {
            date,
            signal_move,
            trades,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::overlay::MoveTable;
    use serde_json::json;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    fn row(ticker: &str, sector: &str, notional: &str, rs: &str) -> RawRow {
        json!({
            "Time": "5:34:41 PM", "Ticker (#T)": ticker, "TP": "50.0", "Sector": sector,
            "Industry": "Misc", "Sh": "1000", "$$": notional, "RS": rs, "PCT": "99.0", "R": ""
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn dated(mut r: RawRow, date: &str) -> RawRow {
        r.insert("Last".to_string(), json!(date));
        r
    }

    #[test]
    fn test_batch_replacement() {
        let mut ds = Dataset::new();
        ds.insert_batch(d(5), vec![row("A", "Technology", "100", "1"), row("B", "Energy", "100", "1")]);
        ds.insert_batch(d(5), vec![row("C", "Energy", "100", "1")]);
        assert_eq!(ds.row_count(), 1);

        let analysis = run(&ds);
        assert_eq!(analysis.trades().len(), 1);
        assert_eq!(analysis.trades()[0].ticker, "C");
    }

    #[test]
    fn test_insert_rows_groups_by_date_column() {
        let mut ds = Dataset::new();
        let dates = ds.insert_rows(vec![
            dated(row("A", "Technology", "100", "1"), "2026-01-05"),
            dated(row("B", "Technology", "100", "1"), "01/06/2026"),
            dated(row("C", "Technology", "100", "1"), "2026-01-05"),
            row("D", "Technology", "100", "1"),
        ]);
        assert_eq!(dates, vec![d(5), d(6)]);
        assert_eq!(ds.row_count(), 4);

        // the undated row joins the newest date
        let analysis = run(&ds);
        let newest = analysis.for_date(d(6));
        assert_eq!(newest.len(), 2);
        assert!(newest.iter().any(|t| t.ticker == "D"));
    }

    #[test]
    fn test_available_dates_newest_first() {
        let mut ds = Dataset::new();
        ds.insert_batch(d(2), vec![row("A", "Technology", "100", "1")]);
        ds.insert_batch(d(7), vec![row("B", "Technology", "100", "1")]);
        ds.insert_batch(d(5), vec![row("C", "Technology", "100", "1"), row("D", "Energy", "5", "1")]);

        let analysis = run(&ds);
        assert_eq!(analysis.available_dates(), vec![d(7), d(5), d(2)]);
        assert_eq!(analysis.for_date(d(5)).len(), 2);
        assert!(analysis.for_date(d(9)).is_empty());
    }

    #[test]
    fn test_with_context_leaves_analysis_untouched() {
        let mut ds = Dataset::new();
        ds.insert_batch(d(7), vec![row("NVDA", "Technology", "261905931", "19.87")]);
        let analysis = run(&ds);

        let mut table = MoveTable::new();
        table.insert(d(7), 5.4);
        let view = analysis.with_context(d(7), &table, SignalFallback::Error).unwrap();
        assert_eq!(view.signal_move, 5.4);
        assert!(view.trades[0].context_overlay.is_some());
        assert!(analysis.trades()[0].context_overlay.is_none());

        assert!(matches!(
            analysis.with_context(d(8), &table, SignalFallback::Error),
            Err(FlowError::UnknownSignalDate(_))
        ));
    }

    #[test]
    fn test_empty_dataset() {
        let analysis = run(&Dataset::new());
        assert!(analysis.trades().is_empty());
        assert!(analysis.available_dates().is_empty());
    }

    #[test]
    fn test_process_rows_is_idempotent() {
        let rows = vec![
            row("C", "Financial Services", "179199535", "61.63"),
            row("C", "Financial Services", "57211200", "19.67"),
            row("C", "Financial Services", "15372551", "5.29"),
        ];
        let first = process_rows(&rows, Some(d(5)));
        let second = process_rows(&rows, Some(d(5)));
        assert_eq!(first, second);
    }
}
