//! Context overlay from a correlated asset's daily move
//!
//! The move for a date comes from an injected [`SignalOracle`]. What happens on a
//! lookup miss is the caller's choice via [`SignalFallback`]; `Random` reproduces
//! the simulated live feed and is non-deterministic, so tests should pick `Zero`
//! or `Error`.

use chrono::NaiveDate;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{FlowError, Result};
use crate::trade::{ContextOverlay, Direction, OverlayTag, Trade};

/// Tickers that track the correlated asset directly.
pub const CORRELATED_PROXIES: &[&str] = &["COIN", "MSTR", "SQ", "HOOD", "RIOT", "MARA", "CLSK", "PYPL"];

const CORRELATED_SECTOR_KEYWORDS: &[&str] = &["tech", "financial", "comm"];
// Correlated sectors only react to moves larger than this (percent)
const SECTOR_GATE_MOVE: f64 = 1.5;

const SYMPATHY_MOVE: f64 = 2.0;
const SYMPATHY_MIN_RS: f64 = 15.0;
const DRAG_MOVE: f64 = -2.0;
const DRAG_MAX_RS: f64 = 5.0;

/// Source of the correlated asset's percentage move per calendar date.
pub trait SignalOracle {
    fn move_for(&self, date: NaiveDate) -> Option<f64>;
}

impl<F> SignalOracle for F
where
    F: Fn(NaiveDate) -> Option<f64>,
{
    fn move_for(&self, date: NaiveDate) -> Option<f64> {
        self(date)
    }
}

/// Date-keyed move table, stored on disk as `{ "YYYY-MM-DD": move_pct }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveTable {
    moves: BTreeMap<NaiveDate, f64>,
}

impl MoveTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, move_pct: f64) {
        self.moves.insert(date, move_pct);
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, f64> = serde_json::from_str(content)?;
        let mut table = MoveTable::new();
        for (key, move_pct) in raw {
            let date = NaiveDate::parse_from_str(&key, "%Y-%m-%d")
                .map_err(|_| FlowError::InvalidDate(key.clone()))?;
            table.insert(date, move_pct);
        }
        Ok(table)
    }

    /// Load a table from `path`. A missing or unreadable file yields an empty
    /// table, so every lookup falls through to the caller's fallback.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => match Self::from_json(&content) {
                Ok(table) => {
                    debug!(path = %path.display(), dates = table.len(), "loaded signal moves");
                    table
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not parse signal moves, starting empty");
                    MoveTable::new()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "signal moves file unavailable, starting empty");
                MoveTable::new()
            }
        }
    }
}

impl SignalOracle for MoveTable {
    fn move_for(&self, date: NaiveDate) -> Option<f64> {
        self.moves.get(&date).copied()
    }
}

/// Behaviour when the oracle has no move for a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalFallback {
    /// Uniform draw in [-1, 1]; mimics a live feed, not reproducible
    #[default]
    Random,
    Zero,
    Error,
}

impl FromStr for SignalFallback {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(SignalFallback::Random),
            "zero" => Ok(SignalFallback::Zero),
            "error" => Ok(SignalFallback::Error),
            other => Err(FlowError::Config(format!(
                "unknown signal fallback '{}', expected random|zero|error",
                other
            ))),
        }
    }
}

pub fn resolve_move(oracle: &dyn SignalOracle, date: NaiveDate, fallback: SignalFallback) -> Result<f64> {
    if let Some(move_pct) = oracle.move_for(date) {
        return Ok(move_pct);
    }

    match fallback {
        SignalFallback::Random => {
            let move_pct = rand::rng().random_range(-1.0..=1.0);
            warn!(%date, move_pct, "no signal for date, using random move");
            Ok(move_pct)
        }
        SignalFallback::Zero => Ok(0.0),
        SignalFallback::Error => Err(FlowError::UnknownSignalDate(date)),
    }
}

/// What the overlay rules look at for one trade.
#[derive(Debug, Clone, Copy)]
pub struct OverlayInput {
    pub move_pct: f64,
    pub relative_size: f64,
    pub is_proxy: bool,
}

pub struct OverlayRule {
    pub applies: fn(&OverlayInput) -> bool,
    pub build: fn(&OverlayInput) -> ContextOverlay,
}

/// First applicable rule wins. No match means no overlay.
pub static OVERLAY_RULES: &[OverlayRule] = &[
    OverlayRule {
        applies: |i| i.move_pct > SYMPATHY_MOVE && i.relative_size > SYMPATHY_MIN_RS,
        build: |i| ContextOverlay {
            tag: OverlayTag::SympathyPlay,
            direction: Direction::Up,
            rationale: format!("Aligned with correlated asset +{}% surge", i.move_pct),
            signal_magnitude: i.move_pct,
        },
    },
    OverlayRule {
        applies: |i| i.move_pct < DRAG_MOVE && i.relative_size < DRAG_MAX_RS,
        build: |i| ContextOverlay {
            tag: OverlayTag::Drag,
            direction: Direction::Down,
            rationale: format!("Weighed down by correlated asset {}% drop", i.move_pct),
            signal_magnitude: i.move_pct,
        },
    },
    OverlayRule {
        applies: |i| i.is_proxy,
        build: |i| ContextOverlay {
            tag: OverlayTag::Beta,
            direction: Direction::of(i.move_pct),
            rationale: "Direct exposure to the correlated asset".to_string(),
            signal_magnitude: i.move_pct,
        },
    },
];

pub fn is_correlated_proxy(ticker: &str) -> bool {
    CORRELATED_PROXIES.contains(&ticker)
}

/// Overlay for a single trade, or `None` when the trade is outside the gate or
/// no rule applies.
pub fn context_for(trade: &Trade, move_pct: f64) -> Option<ContextOverlay> {
    let is_proxy = is_correlated_proxy(&trade.ticker);
    let sector = trade.sector_lower();
    let correlated_sector = CORRELATED_SECTOR_KEYWORDS.iter().any(|k| sector.contains(k));

    if !(is_proxy || (correlated_sector && move_pct.abs() > SECTOR_GATE_MOVE)) {
        return None;
    }

    let input = OverlayInput {
        move_pct,
        relative_size: trade.relative_size,
        is_proxy,
    };
    OVERLAY_RULES
        .iter()
        .find(|rule| (rule.applies)(&input))
        .map(|rule| (rule.build)(&input))
}

/// Replace every trade's overlay for the given move. Returns how many got one.
pub fn apply_context(trades: &mut [Trade], move_pct: f64) -> usize {
    let mut overlaid = 0;
    for t in trades.iter_mut() {
        t.context_overlay = context_for(t, move_pct);
        if t.context_overlay.is_some() {
            overlaid += 1;
        }
    }
    debug!(move_pct, overlaid, "applied context overlay");
    overlaid
}
