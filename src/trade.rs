//! Trade records and their derived annotations
//!
//! A [`Trade`] is built fresh from raw facts on every pipeline run. Scores and
//! annotations are filled in by the scoring, relationship and overlay passes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Sector assigned when a row carries none.
pub const DEFAULT_SECTOR: &str = "Uncategorized";
/// Industry assigned when a row carries none.
pub const DEFAULT_INDUSTRY: &str = "General";

/// Stable identity of a trade: `TICKER|date|timestamp|notional`.
///
/// Re-parsing the same row always yields the same id, so batches can be diffed
/// and deduplicated across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(String);

impl TradeId {
    pub fn compose(ticker: &str, date: NaiveDate, timestamp: &str, notional: f64) -> Self {
        TradeId(format!("{}|{}|{}|{}", ticker, date.format("%Y-%m-%d"), timestamp, notional))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short display hash, e.g. `0x3fa91c02d7e4`.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        format!("0x{}", &hex::encode(digest)[..12])
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BehavioralTag {
    Whale,
    Blitz,
    Accumulator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentimentCategory {
    #[default]
    Momentum,
    Contrarian,
    Stealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Direction::Up
        } else if value < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayTag {
    SympathyPlay,
    Drag,
    Beta,
}

/// Price level where several trades of one ticker landed within 1% of each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GravityAnchor {
    pub is_anchor: bool,
    pub total_volume_at_level: f64,
    pub cluster_count: usize,
}

/// Secondary context derived from a correlated asset's move on the trade date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOverlay {
    pub tag: OverlayTag,
    pub direction: Direction,
    pub rationale: String,
    pub signal_magnitude: f64,
}

/// Raw, already-coerced facts of one trade row.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeFacts {
    pub ticker: String,
    pub timestamp: String,
    pub trade_price: f64,
    pub sector: String,
    pub industry: String,
    pub share_count: u64,
    pub notional: f64,
    pub relative_size: f64,
    pub percentile_rank: f64,
    pub rank: Option<u32>,
    pub observed_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: TradeId,
    pub fingerprint: String,
    #[serde(rename = "tickerSymbol")]
    pub ticker: String,
    #[serde(rename = "tradeTimestamp")]
    pub timestamp: String,
    pub trade_price: f64,
    pub sector: String,
    pub industry: String,
    pub share_count: u64,
    #[serde(rename = "notionalValue")]
    pub notional: f64,
    pub relative_size: f64,
    pub percentile_rank: f64,
    pub rank: Option<u32>,
    pub observed_date: NaiveDate,

    pub conviction_score: f64,
    pub whale_force_score: f64,
    pub defense_score: u8,
    pub sentiment_category: SentimentCategory,
    pub sentiment_vibe: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavioral_tag: Option<BehavioralTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity_anchor: Option<GravityAnchor>,
    #[serde(default)]
    pub shadow_cluster: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_overlay: Option<ContextOverlay>,
}

impl Trade {
    /// Build a record with zeroed scores and no annotations.
    pub fn from_facts(facts: TradeFacts) -> Self {
        let sector = if facts.sector.trim().is_empty() {
            DEFAULT_SECTOR.to_string()
        } else {
            facts.sector.trim().to_string()
        };
        let industry = if facts.industry.trim().is_empty() {
            DEFAULT_INDUSTRY.to_string()
        } else {
            facts.industry.trim().to_string()
        };
        let id = TradeId::compose(&facts.ticker, facts.observed_date, &facts.timestamp, facts.notional);
        let fingerprint = id.fingerprint();

        Trade {
            id,
            fingerprint,
            ticker: facts.ticker,
            timestamp: facts.timestamp,
            trade_price: facts.trade_price,
            sector,
            industry,
            share_count: facts.share_count,
            notional: facts.notional,
            relative_size: facts.relative_size,
            percentile_rank: facts.percentile_rank,
            rank: facts.rank,
            observed_date: facts.observed_date,
            conviction_score: 0.0,
            whale_force_score: 0.0,
            defense_score: 0,
            sentiment_category: SentimentCategory::default(),
            sentiment_vibe: String::new(),
            behavioral_tag: None,
            gravity_anchor: None,
            shadow_cluster: false,
            context_overlay: None,
        }
    }

    /// Drop every relationship and overlay annotation so a pass can start clean.
    pub fn reset_annotations(&mut self) {
        self.behavioral_tag = None;
        self.gravity_anchor = None;
        self.shadow_cluster = false;
        self.context_overlay = None;
    }

    pub fn is_anchor(&self) -> bool {
        self.gravity_anchor.as_ref().is_some_and(|g| g.is_anchor)
    }

    /// Sector name lower-cased for keyword checks.
    pub fn sector_lower(&self) -> String {
        self.sector.to_lowercase()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = trade("GE", 324.32, 23_555_362.0, 7.46);
        let b = trade("GE", 324.32, 23_555_362.0, 7.46);
        assert_eq!(a.id, b.id);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.id.as_str(), "GE|2026-01-05|4:33:18 PM|23555362");
        assert!(a.fingerprint.starts_with("0x"));
        assert_eq!(a.fingerprint.len(), 14);
    }

    #[test]
    fn test_identity_changes_with_notional() {
        let a = trade("GE", 324.32, 23_555_362.0, 7.46);
        let b = trade("GE", 324.32, 23_555_363.0, 7.46);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_empty_sector_and_industry_get_sentinels() {
        let mut f = facts("YETI", 46.24, 26_910_108.0, 8.27);
        f.sector = "  ".to_string();
        f.industry = String::new();
        let t = Trade::from_facts(f);
        assert_eq!(t.sector, DEFAULT_SECTOR);
        assert_eq!(t.industry, DEFAULT_INDUSTRY);
    }

    #[test]
    fn test_serializes_tags_in_screaming_case() {
        let mut t = trade("C", 123.3, 179_199_535.0, 61.63);
        t.behavioral_tag = Some(BehavioralTag::Whale);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["behavioralTag"], "WHALE");
        assert_eq!(json["sentimentCategory"], "MOMENTUM");
        assert_eq!(json["tickerSymbol"], "C");
        assert!(json.get("gravityAnchor").is_none());
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::of(2.5), Direction::Up);
        assert_eq!(Direction::of(-0.4), Direction::Down);
        assert_eq!(Direction::of(0.0), Direction::Flat);
    }
}
