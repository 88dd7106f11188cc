use chrono::NaiveDate;
use thiserror::Error;

/// All errors generated in `block_radar`.
///
/// The analytics passes themselves never fail: malformed rows are filtered and every
/// ratio has a guarded denominator. Errors only come from the I/O edges.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("no signal move available for {0}")]
    UnknownSignalDate(NaiveDate),

    #[error("summarizer request failed [CODE: {status}]: {body}")]
    SummarizerStatus { status: u16, body: String },

    #[error("summarizer response unusable: {0}")]
    SummarizerResponse(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
