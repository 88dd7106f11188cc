//! Institutional block-trade analytics
//!
//! Raw rows are normalized into [`Trade`] records, scored against batch-wide
//! extrema, grouped into behavioral, shadow and gravity relationships, and
//! optionally overlaid with a correlated asset's daily move. The layout module
//! turns sector totals into treemap rectangles.

pub mod calendar;
pub mod config;
pub mod error;
pub mod ingest;
pub mod layout;
pub mod normalizer;
pub mod overlay;
pub mod pipeline;
pub mod query;
pub mod relations;
pub mod scoring;
pub mod summarizer;
pub mod trade;

pub use error::{FlowError, Result};
pub use layout::{layout_sectors, slice_and_dice, Rect, SectorGroup, SectorTile};
pub use overlay::{MoveTable, SignalFallback, SignalOracle};
pub use pipeline::{process_rows, run, Analysis, ContextView, Dataset};
pub use query::{sector_leaderboard, Query, QuickFilter, SortKey, TradeFilter};
pub use trade::{BehavioralTag, Direction, OverlayTag, SentimentCategory, Trade, TradeId};
