//! Slice-and-dice treemap layout and sector grouping
//!
//! The item list is bisected by running value and the rectangle is cut along its
//! longer side at each level. Leaves tile the root exactly; areas are only
//! approximately proportional because the cut ratios compound down the tree.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::trade::Trade;

/// Key used for trades that carry no sector at all.
pub const UNCLASSIFIED_SECTOR: &str = "Unclassified";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Area shared with `other`; zero when the rectangles only touch.
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Cut into two pieces, the first holding `ratio` of the area.
    /// Vertical cut when wider than tall, horizontal otherwise.
    fn cut(&self, ratio: f64) -> (Rect, Rect) {
        if self.width > self.height {
            let first = self.width * ratio;
            (
                Rect::new(self.x, self.y, first, self.height),
                Rect::new(self.x + first, self.y, self.width - first, self.height),
            )
        } else {
            let first = self.height * ratio;
            (
                Rect::new(self.x, self.y, self.width, first),
                Rect::new(self.x, self.y + first, self.width, self.height - first),
            )
        }
    }
}

/// Lay out `values` (expected sorted descending) inside `root`.
/// Returns one rectangle per value, in input order. Empty input or a
/// non-positive total yields no rectangles.
pub fn slice_and_dice(values: &[f64], root: Rect) -> Vec<Rect> {
    let total: f64 = values.iter().sum();
    if values.is_empty() || total <= 0.0 || !total.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len());
    dice(values, root, &mut out);
    out
}

fn dice(values: &[f64], rect: Rect, out: &mut Vec<Rect>) {
    match values.len() {
        0 => return,
        1 => {
            out.push(rect);
            return;
        }
        _ => {}
    }

    let total: f64 = values.iter().sum();
    let half = total / 2.0;

    let mut split = values.len();
    let mut running = 0.0;
    for (i, v) in values.iter().enumerate() {
        running += v;
        if running >= half {
            split = i + 1;
            break;
        }
    }
    let split = split.clamp(1, values.len() - 1);

    let (left, right) = values.split_at(split);
    let ratio = if total > 0.0 {
        left.iter().sum::<f64>() / total
    } else {
        0.5
    };

    let (left_rect, right_rect) = rect.cut(ratio);
    dice(left, left_rect, out);
    dice(right, right_rect, out);
}

/// Trades sharing a sector, with their summed notional.
#[derive(Debug, Clone)]
pub struct SectorGroup<'a> {
    pub key: String,
    pub value: f64,
    pub members: Vec<&'a Trade>,
}

impl<'a> SectorGroup<'a> {
    /// Group by sector, largest value first (key breaks ties).
    pub fn build(trades: &'a [Trade]) -> Vec<SectorGroup<'a>> {
        let mut by_key: HashMap<&str, SectorGroup<'a>> = HashMap::new();
        for t in trades {
            let key = match t.sector.trim() {
                "" => UNCLASSIFIED_SECTOR,
                s => s,
            };
            let group = by_key.entry(key).or_insert_with(|| SectorGroup {
                key: key.to_string(),
                value: 0.0,
                members: Vec::new(),
            });
            group.value += t.notional;
            group.members.push(t);
        }

        let mut groups: Vec<SectorGroup<'a>> = by_key.into_values().collect();
        groups.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
        groups
    }

    /// Member with the highest whale-force score.
    pub fn top_member(&self) -> Option<&'a Trade> {
        self.members
            .iter()
            .copied()
            .max_by(|a, b| a.whale_force_score.total_cmp(&b.whale_force_score))
    }
}

/// One rendered sector block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorTile {
    pub key: String,
    pub value: f64,
    pub member_count: usize,
    pub top_ticker: Option<String>,
    pub rect: Rect,
}

pub fn layout_sectors(trades: &[Trade], root: Rect) -> Vec<SectorTile> {
    let groups = SectorGroup::build(trades);
    let values: Vec<f64> = groups.iter().map(|g| g.value).collect();
    let rects = slice_and_dice(&values, root);

    groups
        .iter()
        .zip(rects)
        .map(|(g, rect)| SectorTile {
            key: g.key.clone(),
            value: g.value,
            member_count: g.members.len(),
            top_ticker: g.top_member().map(|t| t.ticker.clone()),
            rect,
        })
        .collect()
}
