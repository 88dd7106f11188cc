//! Score engine
//!
//! Two passes over a full batch: the first collects extrema, the second derives
//! every per-record score from those extrema. Scores are batch-relative and not
//! comparable across runs on different batches.

use tracing::debug;

use crate::trade::{SentimentCategory, Trade};

// Whale-force blend: size relative to the ticker norm outweighs absolute notional
const RS_WEIGHT: f64 = 60.0;
const NOTIONAL_WEIGHT: f64 = 40.0;

// Conviction: rank contribution per point below 100
const RANK_CONVICTION_FACTOR: f64 = 2.5;

// Stands in for the minimum notional of an empty batch so log10 stays finite
const MIN_NOTIONAL_SENTINEL: f64 = 1_000_000.0;

const DEFENSE_MIN: u8 = 1;
const DEFENSE_MAX: u8 = 10;

/// Dataset-wide extrema from the first pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchStats {
    pub max_relative_size: f64,
    pub max_notional: f64,
    pub min_notional: f64,
    pub max_log_notional: f64,
    pub min_log_notional: f64,
}

impl BatchStats {
    pub fn collect(trades: &[Trade]) -> Self {
        let mut max_relative_size: f64 = 0.0;
        let mut max_notional: f64 = 0.0;
        let mut min_notional = f64::INFINITY;

        for t in trades {
            max_relative_size = max_relative_size.max(t.relative_size);
            max_notional = max_notional.max(t.notional);
            min_notional = min_notional.min(t.notional);
        }

        let max_log_notional = (if max_notional > 0.0 { max_notional } else { 1.0 }).log10();
        let min_log_notional = if min_notional > 0.0 && min_notional.is_finite() {
            min_notional.log10()
        } else {
            MIN_NOTIONAL_SENTINEL.log10()
        };

        BatchStats {
            max_relative_size,
            max_notional,
            min_notional,
            max_log_notional,
            min_log_notional,
        }
    }
}

/// Score every record in place. Safe to call repeatedly on the same batch.
pub fn score_batch(trades: &mut [Trade]) -> BatchStats {
    let stats = BatchStats::collect(trades);

    for t in trades.iter_mut() {
        score_trade(t, &stats);
    }

    debug!(
        records = trades.len(),
        max_rs = stats.max_relative_size,
        max_log = stats.max_log_notional,
        "scored batch"
    );
    stats
}

pub fn score_trade(trade: &mut Trade, stats: &BatchStats) {
    trade.conviction_score = conviction_score(trade);

    let log_value = trade.notional.max(1.0).log10();
    trade.whale_force_score = whale_force_score(trade.relative_size, log_value, stats);
    trade.defense_score = defense_score(log_value, stats);

    let rule = classify_sentiment(trade);
    trade.sentiment_category = rule.category;
    trade.sentiment_vibe = rule.vibe.to_string();
}

pub fn conviction_score(trade: &Trade) -> f64 {
    let rank_part = trade
        .rank
        .map(|r| (100.0 - r as f64) * RANK_CONVICTION_FACTOR)
        .unwrap_or(0.0);
    trade.relative_size * 2.0 + rank_part
}

pub fn whale_force_score(relative_size: f64, log_value: f64, stats: &BatchStats) -> f64 {
    let rs_part = relative_size / stats.max_relative_size.max(1.0) * RS_WEIGHT;
    let value_part = log_value / stats.max_log_notional.max(1.0) * NOTIONAL_WEIGHT;
    rs_part + value_part
}

/// Bucket log-notional into 1..=10 across the batch's log range.
pub fn defense_score(log_value: f64, stats: &BatchStats) -> u8 {
    let range = stats.max_log_notional - stats.min_log_notional;
    if range <= 0.0 || !range.is_finite() {
        return DEFENSE_MIN;
    }

    let normalized = (log_value - stats.min_log_notional) / range;
    let bucket = (normalized * 9.0).floor() + 1.0;
    bucket.clamp(DEFENSE_MIN as f64, DEFENSE_MAX as f64) as u8
}

/// One row of the sentiment decision table.
pub struct SentimentRule {
    pub name: &'static str,
    pub applies: fn(&Trade) -> bool,
    pub category: SentimentCategory,
    pub vibe: &'static str,
}

fn sector_has(trade: &Trade, keywords: &[&str]) -> bool {
    let sector = trade.sector_lower();
    keywords.iter().any(|k| sector.contains(k))
}

/// Evaluated top to bottom; the first rule that applies wins. The last rule
/// always applies.
pub static SENTIMENT_RULES: &[SentimentRule] = &[
    SentimentRule {
        name: "max_impact_block",
        applies: |t| t.relative_size > 20.0,
        category: SentimentCategory::Momentum,
        vibe: "MAXIMUM IMPACT BLOCK TRADE. HIGH CONVICTION ENTRY.",
    },
    SentimentRule {
        name: "algorithmic_high_value",
        applies: |t| t.relative_size < 5.0 && t.notional > 10_000_000.0,
        category: SentimentCategory::Contrarian,
        vibe: "HIGH VALUE FLOW EXECUTED ALGORITHMICALLY.",
    },
    SentimentRule {
        name: "lagging_name_accumulation",
        applies: |t| t.relative_size > 15.0 && t.rank.map_or(true, |r| r > 50),
        category: SentimentCategory::Stealth,
        vibe: "LARGE SIZE ACCUMULATION IN LAGGING NAME.",
    },
    SentimentRule {
        name: "tech_allocation",
        applies: |t| t.relative_size > 10.0 && sector_has(t, &["tech", "semis", "software"]),
        category: SentimentCategory::Momentum,
        vibe: "AGGRESSIVE SIZE ALLOCATION IN TECH SECTOR.",
    },
    SentimentRule {
        name: "cyclical_blocks",
        applies: |t| t.relative_size > 10.0 && sector_has(t, &["energy", "oil"]),
        category: SentimentCategory::Contrarian,
        vibe: "HEAVY BLOCK TRADING IN CYCLICAL ASSET.",
    },
    SentimentRule {
        name: "standard_block",
        applies: |_| true,
        category: SentimentCategory::Momentum,
        vibe: "STANDARD INSTITUTIONAL BLOCK SIZE.",
    },
];

pub fn classify_sentiment(trade: &Trade) -> &'static SentimentRule {
    SENTIMENT_RULES
        .iter()
        .find(|rule| (rule.applies)(trade))
        .unwrap_or(&SENTIMENT_RULES[SENTIMENT_RULES.len() - 1])
}
