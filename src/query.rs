//! Sort and filter over a flat trade list
//!
//! Filters narrow, quick filters are preset views, and the sort key decides the
//! order. All sorts are stable, so `SortKey::Time` keeps insertion order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::{FlowError, Result};
use crate::layout::SectorGroup;
use crate::trade::{SentimentCategory, Trade};

// Quick-filter presets
const TOP_RANK_CUTOFF: u32 = 5;
const HIGH_CONVICTION: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Value,
    Rank,
    Time,
    RelativeSize,
    Force,
    Gravity,
    Defense,
    Momentum,
    Contrarian,
    Stealth,
}

impl FromStr for SortKey {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s.trim().to_ascii_lowercase().as_str() {
            "value" => SortKey::Value,
            "rank" => SortKey::Rank,
            "time" => SortKey::Time,
            "rs" => SortKey::RelativeSize,
            "force" => SortKey::Force,
            "gravity" => SortKey::Gravity,
            "defense" => SortKey::Defense,
            "momentum" => SortKey::Momentum,
            "contrarian" => SortKey::Contrarian,
            "stealth" => SortKey::Stealth,
            other => return Err(FlowError::Config(format!("unknown sort key '{}'", other))),
        };
        Ok(key)
    }
}

impl SortKey {
    pub fn compare(self, a: &Trade, b: &Trade) -> Ordering {
        match self {
            SortKey::Value => b.notional.total_cmp(&a.notional),
            SortKey::Rank => match (a.rank, b.rank) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortKey::Time => Ordering::Equal,
            SortKey::RelativeSize => b.relative_size.total_cmp(&a.relative_size),
            SortKey::Force => b.whale_force_score.total_cmp(&a.whale_force_score),
            SortKey::Gravity => {
                let volume = |t: &Trade| t.gravity_anchor.as_ref().map_or(0.0, |g| g.total_volume_at_level);
                b.is_anchor()
                    .cmp(&a.is_anchor())
                    .then_with(|| volume(b).total_cmp(&volume(a)))
            }
            SortKey::Defense => b.defense_score.cmp(&a.defense_score),
            SortKey::Momentum => category_first(a, b, SentimentCategory::Momentum),
            SortKey::Contrarian => category_first(a, b, SentimentCategory::Contrarian),
            SortKey::Stealth => category_first(a, b, SentimentCategory::Stealth),
        }
    }
}

fn category_first(a: &Trade, b: &Trade, category: SentimentCategory) -> Ordering {
    (b.sentiment_category == category)
        .cmp(&(a.sentiment_category == category))
        .then_with(|| b.whale_force_score.total_cmp(&a.whale_force_score))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuickFilter {
    #[default]
    All,
    Top5,
    HighConviction,
}

impl QuickFilter {
    pub fn matches(self, t: &Trade) -> bool {
        match self {
            QuickFilter::All => true,
            QuickFilter::Top5 => t.rank.is_some_and(|r| r <= TOP_RANK_CUTOFF),
            QuickFilter::HighConviction => t.conviction_score > HIGH_CONVICTION,
        }
    }
}

/// Structured filter. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TradeFilter {
    /// Any-of, case-insensitive substring on the sector name
    pub sectors: Vec<String>,
    pub industry: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_rs: Option<f64>,
    pub max_rs: Option<f64>,
    /// Unranked trades never satisfy a rank bound
    pub min_rank: Option<u32>,
    pub max_rank: Option<u32>,
    /// Exact ticker, case-insensitive
    pub ticker: Option<String>,
    /// Ticker substring search
    pub search: Option<String>,
}

impl TradeFilter {
    pub fn matches(&self, t: &Trade) -> bool {
        if !self.sectors.is_empty() {
            let sector = t.sector_lower();
            if !self.sectors.iter().any(|s| sector.contains(&s.to_lowercase())) {
                return false;
            }
        }

        if let Some(industry) = &self.industry {
            if !t.industry.to_lowercase().contains(&industry.to_lowercase()) {
                return false;
            }
        }

        if self.min_value.is_some_and(|v| t.notional < v) || self.max_value.is_some_and(|v| t.notional > v) {
            return false;
        }
        if self.min_rs.is_some_and(|v| t.relative_size < v) || self.max_rs.is_some_and(|v| t.relative_size > v) {
            return false;
        }

        if self.min_rank.is_some() || self.max_rank.is_some() {
            let Some(rank) = t.rank else {
                return false;
            };
            if self.min_rank.is_some_and(|r| rank < r) || self.max_rank.is_some_and(|r| rank > r) {
                return false;
            }
        }

        if let Some(ticker) = &self.ticker {
            if !t.ticker.eq_ignore_ascii_case(ticker.trim()) {
                return false;
            }
        }

        if let Some(search) = &self.search {
            if !t.ticker.contains(&search.trim().to_uppercase()) {
                return false;
            }
        }

        true
    }
}

/// A full view request: preset, filter, then order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Query {
    pub quick: QuickFilter,
    pub filter: TradeFilter,
    pub sort: SortKey,
}

impl Query {
    pub fn apply<'a>(&self, trades: &'a [Trade]) -> Vec<&'a Trade> {
        let mut selected: Vec<&Trade> = trades
            .iter()
            .filter(|t| self.quick.matches(t) && self.filter.matches(t))
            .collect();
        selected.sort_by(|a, b| self.sort.compare(a, b));
        selected
    }
}

/// The first `n` trades in `key` order.
pub fn top_by(trades: &[Trade], key: SortKey, n: usize) -> Vec<&Trade> {
    let mut sorted: Vec<&Trade> = trades.iter().collect();
    sorted.sort_by(|a, b| key.compare(a, b));
    sorted.truncate(n);
    sorted
}

/// Sectors by summed notional, largest first.
pub fn sector_leaderboard(trades: &[Trade], n: usize) -> Vec<(String, f64)> {
    SectorGroup::build(trades)
        .into_iter()
        .take(n)
        .map(|g| (g.key, g.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::test_support::trade;
    use crate::trade::GravityAnchor;

    fn tickers(trades: &[&Trade]) -> Vec<String> {
        trades.iter().map(|t| t.ticker.clone()).collect()
    }

    fn sample() -> Vec<Trade> {
        let mut a = trade("QGEN", 48.94, 78_975_957.0, 31.09);
        a.rank = Some(3);
        a.sector = "Healthcare".to_string();
        a.conviction_score = 304.68;
        a.whale_force_score = 70.0;
        a.sentiment_category = SentimentCategory::Momentum;

        let mut b = trade("STT", 133.01, 20_962_376.0, 4.0);
        b.sector = "Financial Services".to_string();
        b.industry = "Asset Management".to_string();
        b.whale_force_score = 40.0;
        b.sentiment_category = SentimentCategory::Contrarian;
        b.defense_score = 3;

        let mut c = trade("ACHR", 8.56, 65_738_343.0, 27.12);
        c.rank = Some(6);
        c.whale_force_score = 90.0;
        c.defense_score = 7;
        c.gravity_anchor = Some(GravityAnchor {
            is_anchor: true,
            total_volume_at_level: 80_000_000.0,
            cluster_count: 2,
        });

        vec![a, b, c]
    }

    #[test]
    fn test_sort_keys() {
        let trades = sample();
        let order = |key: SortKey| {
            let q = Query { sort: key, ..Query::default() };
            tickers(&q.apply(&trades))
        };
        assert_eq!(order(SortKey::Value), ["QGEN", "ACHR", "STT"]);
        assert_eq!(order(SortKey::Rank), ["QGEN", "ACHR", "STT"]);
        assert_eq!(order(SortKey::Time), ["QGEN", "STT", "ACHR"]);
        assert_eq!(order(SortKey::RelativeSize), ["QGEN", "ACHR", "STT"]);
        assert_eq!(order(SortKey::Force), ["ACHR", "QGEN", "STT"]);
        assert_eq!(order(SortKey::Gravity)[0], "ACHR");
        assert_eq!(order(SortKey::Defense), ["ACHR", "STT", "QGEN"]);
        assert_eq!(order(SortKey::Contrarian), ["STT", "ACHR", "QGEN"]);
    }

    #[test]
    fn test_quick_filters() {
        let trades = sample();
        let q = Query { quick: QuickFilter::Top5, ..Query::default() };
        assert_eq!(tickers(&q.apply(&trades)), ["QGEN"]);
        let q = Query { quick: QuickFilter::HighConviction, ..Query::default() };
        assert_eq!(tickers(&q.apply(&trades)), ["QGEN"]);
    }

    #[test]
    fn test_structured_filter() {
        let trades = sample();
        let pick = |filter: TradeFilter| {
            let q = Query { filter, sort: SortKey::Time, ..Query::default() };
            tickers(&q.apply(&trades))
        };

        assert_eq!(
            pick(TradeFilter { sectors: vec!["financial".into(), "health".into()], ..Default::default() }),
            ["QGEN", "STT"]
        );
        assert_eq!(pick(TradeFilter { industry: Some("asset".into()), ..Default::default() }), ["STT"]);
        assert_eq!(
            pick(TradeFilter { min_value: Some(50_000_000.0), max_rs: Some(30.0), ..Default::default() }),
            ["ACHR"]
        );
        // unranked STT is excluded by any rank bound
        assert_eq!(pick(TradeFilter { max_rank: Some(10), ..Default::default() }), ["QGEN", "ACHR"]);
        assert_eq!(pick(TradeFilter { min_rank: Some(4), ..Default::default() }), ["ACHR"]);
        assert_eq!(pick(TradeFilter { ticker: Some("stt".into()), ..Default::default() }), ["STT"]);
        assert_eq!(pick(TradeFilter { search: Some("ch".into()), ..Default::default() }), ["ACHR"]);
    }

    #[test]
    fn test_filter_from_json() {
        let filter: TradeFilter = serde_json::from_str(r#"{ "sectors": ["tech"], "minRs": 10 }"#).unwrap();
        assert_eq!(filter.min_rs, Some(10.0));
        assert!(filter.max_rank.is_none());
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("rs".parse::<SortKey>().unwrap(), SortKey::RelativeSize);
        assert!("volume".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_leaderboard() {
        let trades = sample();
        let board = sector_leaderboard(&trades, 2);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].0, "Healthcare");
        assert_eq!(board[1].0, "Industrials");
        assert_eq!(top_by(&trades, SortKey::Force, 1)[0].ticker, "ACHR");
    }
}
