//! Runtime configuration from environment variables

use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;

use crate::error::{FlowError, Result};
use crate::overlay::SignalFallback;

const DEFAULT_TOP: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEndpoint {
    pub url: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// CSV batch to analyse
    pub input: Option<PathBuf>,
    /// Stamps every row of the batch; otherwise each row's date column is used
    pub date: Option<NaiveDate>,
    /// JSON file of `{ "YYYY-MM-DD": move_pct }`
    pub signals: Option<PathBuf>,
    pub signal_fallback: SignalFallback,
    pub summary: Option<SummaryEndpoint>,
    /// Rows printed per table
    pub top: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            input: None,
            date: None,
            signals: None,
            signal_fallback: SignalFallback::default(),
            summary: None,
            top: DEFAULT_TOP,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BLOCK_RADAR_INPUT`
    /// - `BLOCK_RADAR_DATE` (YYYY-MM-DD)
    /// - `BLOCK_RADAR_SIGNALS`
    /// - `BLOCK_RADAR_SIGNAL_FALLBACK` (random | zero | error, default: random)
    /// - `BLOCK_RADAR_SUMMARY_URL`, `BLOCK_RADAR_SUMMARY_KEY`, `BLOCK_RADAR_SUMMARY_MODEL`
    /// - `BLOCK_RADAR_TOP` (default: 15)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an arbitrary variable source.
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let date = var("BLOCK_RADAR_DATE")
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| FlowError::Config(format!("BLOCK_RADAR_DATE '{}' is not YYYY-MM-DD", raw)))
            })
            .transpose()?;

        let signal_fallback = var("BLOCK_RADAR_SIGNAL_FALLBACK")
            .map(|raw| raw.parse::<SignalFallback>())
            .transpose()?
            .unwrap_or_default();

        let top = var("BLOCK_RADAR_TOP")
            .map(|raw| {
                raw.parse::<usize>()
                    .map_err(|_| FlowError::Config(format!("BLOCK_RADAR_TOP '{}' is not a count", raw)))
            })
            .transpose()?
            .unwrap_or(DEFAULT_TOP);

        let summary = var("BLOCK_RADAR_SUMMARY_URL").map(|url| SummaryEndpoint {
            url,
            api_key: var("BLOCK_RADAR_SUMMARY_KEY"),
            model: var("BLOCK_RADAR_SUMMARY_MODEL"),
        });

        Ok(AppConfig {
            input: var("BLOCK_RADAR_INPUT").map(PathBuf::from),
            date,
            signals: var("BLOCK_RADAR_SIGNALS").map(PathBuf::from),
            signal_fallback,
            summary,
            top,
        })
    }
}
