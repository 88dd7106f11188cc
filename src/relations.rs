//! Relationship detection
//!
//! Three grouping passes over a scored batch:
//! - behavioral tags per ticker history (WHALE / BLITZ / ACCUMULATOR)
//! - shadow clusters of oversized trades within one industry
//! - gravity anchors where one ticker's trades stack at the same price level
//!
//! The gravity pass runs last because an anchor clears the behavioral tag.

use std::collections::HashMap;
use tracing::info;

use crate::trade::{BehavioralTag, GravityAnchor, Trade};

// Behavioral tagging needs more than this many trades in the ticker
const BEHAVIOR_MIN_GROUP: usize = 2;
const WHALE_GROUP_NOTIONAL: f64 = 100_000_000.0;
const BLITZ_MEAN_RANK: f64 = 20.0;
// Unranked trades count as this rank when averaging
const UNRANKED_RANK: f64 = 100.0;

// Shadow clusters need more than this many oversized trades in one industry
const SHADOW_MIN_MEMBERS: usize = 3;
const SHADOW_RS_THRESHOLD: f64 = 10.0;
const UNKNOWN_INDUSTRY: &str = "Unknown";

// Maximum relative distance from the anchor price
const GRAVITY_VARIANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationSummary {
    pub behavioral_tags: usize,
    pub shadow_members: usize,
    pub gravity_anchors: usize,
}

/// Run all three passes from a clean slate.
pub fn detect_relationships(trades: &mut [Trade]) -> RelationSummary {
    for t in trades.iter_mut() {
        t.reset_annotations();
    }

    tag_behavior(trades);
    let shadow_members = mark_shadow_clusters(trades);
    let gravity_anchors = find_gravity_anchors(trades);
    let behavioral_tags = trades.iter().filter(|t| t.behavioral_tag.is_some()).count();

    let summary = RelationSummary {
        behavioral_tags,
        shadow_members,
        gravity_anchors,
    };
    info!(
        records = trades.len(),
        tagged = summary.behavioral_tags,
        shadow = summary.shadow_members,
        anchors = summary.gravity_anchors,
        "relationship passes complete"
    );
    summary
}

fn group_indices(trades: &[Trade], key: impl Fn(&Trade) -> &str) -> HashMap<String, Vec<usize>> {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, t) in trades.iter().enumerate() {
        groups.entry(key(t).to_string()).or_default().push(i);
    }
    groups
}

/// Tag every member of a ticker group larger than two trades.
/// Returns the number of records tagged.
pub fn tag_behavior(trades: &mut [Trade]) -> usize {
    let mut tagged = 0;

    for members in group_indices(trades, |t| t.ticker.as_str()).into_values() {
        if members.len() <= BEHAVIOR_MIN_GROUP {
            continue;
        }

        let total_notional: f64 = members.iter().map(|&i| trades[i].notional).sum();
        let mean_rank = members
            .iter()
            .map(|&i| trades[i].rank.map(f64::from).unwrap_or(UNRANKED_RANK))
            .sum::<f64>()
            / members.len() as f64;

        let tag = if total_notional > WHALE_GROUP_NOTIONAL {
            BehavioralTag::Whale
        } else if mean_rank < BLITZ_MEAN_RANK {
            BehavioralTag::Blitz
        } else {
            BehavioralTag::Accumulator
        };

        for &i in &members {
            trades[i].behavioral_tag = Some(tag);
        }
        tagged += members.len();
    }

    tagged
}

/// Flag the oversized trades of an industry once there are more than three of them.
/// Only the qualifying trades are flagged, not the whole industry.
pub fn mark_shadow_clusters(trades: &mut [Trade]) -> usize {
    let groups = group_indices(trades, |t| {
        if t.industry.trim().is_empty() {
            UNKNOWN_INDUSTRY
        } else {
            t.industry.as_str()
        }
    });

    let mut flagged = 0;
    for members in groups.into_values() {
        let oversized: Vec<usize> = members
            .into_iter()
            .filter(|&i| trades[i].relative_size > SHADOW_RS_THRESHOLD)
            .collect();

        if oversized.len() > SHADOW_MIN_MEMBERS {
            for &i in &oversized {
                trades[i].shadow_cluster = true;
            }
            flagged += oversized.len();
        }
    }

    flagged
}

/// Scan each ticker's trades in ascending price order. A trade becomes an anchor
/// when at least one later trade sits within 1% of its price.
pub fn find_gravity_anchors(trades: &mut [Trade]) -> usize {
    let mut anchors = 0;

    for mut members in group_indices(trades, |t| t.ticker.as_str()).into_values() {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|&a, &b| trades[a].trade_price.total_cmp(&trades[b].trade_price));

        for (pos, &anchor) in members.iter().enumerate() {
            let anchor_price = trades[anchor].trade_price;
            if anchor_price <= 0.0 {
                continue;
            }

            let mut volume = trades[anchor].notional;
            let mut count = 1;
            // Sorted ascending, so once one price leaves the band every later one does too
            for &next in &members[pos + 1..] {
                let variance = ((trades[next].trade_price - anchor_price) / anchor_price).abs();
                if variance > GRAVITY_VARIANCE {
                    break;
                }
                volume += trades[next].notional;
                count += 1;
            }

            if count > 1 {
                let t = &mut trades[anchor];
                t.gravity_anchor = Some(GravityAnchor {
                    is_anchor: true,
                    total_volume_at_level: volume,
                    cluster_count: count,
                });
                t.behavioral_tag = None;
                anchors += 1;
            }
        }
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::test_support::trade;

    fn with_rank(mut t: Trade, rank: Option<u32>) -> Trade {
        t.rank = rank;
        t
    }

    #[test]
    fn test_whale_tag() {
        // prices spread apart so no gravity anchor interferes
        let mut trades = vec![
            trade("MU", 100.0, 46_822_500.0, 10.76),
            trade("MU", 120.0, 38_123_816.0, 8.76),
            trade("MU", 140.0, 119_322_147.0, 27.42),
        ];
        detect_relationships(&mut trades);
        assert!(trades.iter().all(|t| t.behavioral_tag == Some(BehavioralTag::Whale)));
    }

    #[test]
    fn test_blitz_and_accumulator_tags() {
        let mut blitz = vec![
            with_rank(trade("ACHR", 8.0, 1_000_000.0, 5.0), Some(6)),
            with_rank(trade("ACHR", 9.0, 1_000_000.0, 5.0), Some(10)),
            with_rank(trade("ACHR", 10.0, 1_000_000.0, 5.0), Some(20)),
        ];
        detect_relationships(&mut blitz);
        assert!(blitz.iter().all(|t| t.behavioral_tag == Some(BehavioralTag::Blitz)));

        // the unranked trade counts as 100: (1 + 1 + 100) / 3 = 34
        let mut accumulator = vec![
            with_rank(trade("ACHR", 8.0, 1_000_000.0, 5.0), Some(1)),
            with_rank(trade("ACHR", 9.0, 1_000_000.0, 5.0), Some(1)),
            with_rank(trade("ACHR", 10.0, 1_000_000.0, 5.0), None),
        ];
        detect_relationships(&mut accumulator);
        assert!(accumulator
            .iter()
            .all(|t| t.behavioral_tag == Some(BehavioralTag::Accumulator)));
    }

    #[test]
    fn test_small_groups_untagged() {
        let mut trades = vec![
            trade("PLTR", 100.0, 500_000_000.0, 10.3),
            trade("PLTR", 150.0, 500_000_000.0, 9.55),
        ];
        detect_relationships(&mut trades);
        assert!(trades.iter().all(|t| t.behavioral_tag.is_none()));
    }

    #[test]
    fn test_shadow_cluster_flags_only_oversized() {
        let mut trades: Vec<Trade> = (0..4)
            .map(|i| {
                let mut t = trade(&format!("S{i}"), 30.0, 50_000_000.0, 12.0);
                t.industry = "Software - Infrastructure".to_string();
                t
            })
            .collect();
        let mut small = trade("S9", 30.0, 50_000_000.0, 8.0);
        small.industry = "Software - Infrastructure".to_string();
        trades.push(small);

        assert_eq!(mark_shadow_clusters(&mut trades), 4);
        assert!(trades[..4].iter().all(|t| t.shadow_cluster));
        assert!(!trades[4].shadow_cluster);
    }

    #[test]
    fn test_shadow_needs_more_than_three() {
        let mut trades: Vec<Trade> = (0..3)
            .map(|i| trade(&format!("S{i}"), 30.0, 50_000_000.0, 12.0))
            .collect();
        assert_eq!(mark_shadow_clusters(&mut trades), 0);
    }

    #[test]
    fn test_gravity_cluster() {
        let mut trades = vec![
            trade("GE", 105.0, 10_000_000.0, 5.0),
            trade("GE", 100.0, 20_000_000.0, 5.0),
            trade("GE", 100.5, 30_000_000.0, 5.0),
        ];
        assert_eq!(find_gravity_anchors(&mut trades), 1);
        let anchor = trades[1].gravity_anchor.as_ref().unwrap();
        assert_eq!(anchor.cluster_count, 2);
        assert_eq!(anchor.total_volume_at_level, 50_000_000.0);
        assert!(trades[0].gravity_anchor.is_none());
        assert!(trades[2].gravity_anchor.is_none());
    }

    #[test]
    fn test_anchor_clears_behavioral_tag() {
        let mut trades = vec![
            trade("C", 123.3, 57_211_200.0, 19.67),
            trade("C", 123.3, 15_372_551.0, 5.29),
            trade("C", 150.0, 179_199_535.0, 61.63),
        ];
        detect_relationships(&mut trades);
        let anchors: Vec<&Trade> = trades.iter().filter(|t| t.is_anchor()).collect();
        assert_eq!(anchors.len(), 1);
        assert!(anchors[0].behavioral_tag.is_none());
        assert!(trades
            .iter()
            .all(|t| !(t.is_anchor() && t.behavioral_tag.is_some())));
        // the non-anchors keep the group tag
        assert_eq!(
            trades.iter().filter(|t| t.behavioral_tag == Some(BehavioralTag::Whale)).count(),
            2
        );
    }

    #[test]
    fn test_passes_are_idempotent() {
        let mut trades = vec![
            trade("C", 123.3, 57_211_200.0, 19.67),
            trade("C", 123.3, 15_372_551.0, 5.29),
            trade("C", 150.0, 179_199_535.0, 61.63),
            trade("MU", 312.15, 119_322_147.0, 27.42),
        ];
        detect_relationships(&mut trades);
        let first = trades.clone();
        detect_relationships(&mut trades);
        assert_eq!(first, trades);
    }
}
