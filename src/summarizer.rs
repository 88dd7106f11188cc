//! Natural-language summaries of a trade batch
//!
//! [`Summarizer`] is the seam; [`ChatSummarizer`] talks to any OpenAI-compatible
//! chat-completions endpoint and expects a JSON answer holding a list of strings.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::error::{FlowError, Result};
use crate::query::{top_by, SortKey};
use crate::trade::Trade;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

// Prompt subsets
const BRIEF_TOP_VALUE: usize = 50;
const ANOMALY_TOP_VALUE: usize = 30;
const ANOMALY_TOP_RS: usize = 30;
const ANOMALY_TOP_RANKED: usize = 20;

const MAX_INSIGHTS: usize = 5;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, trades: &[Trade]) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryKind {
    /// Sector rotation and unusual block sizes
    #[default]
    Brief,
    /// Cross-sector anomalies, each tagged with its kind
    Anomalies,
}

impl SummaryKind {
    fn system_prompt(self) -> &'static str {
        match self {
            SummaryKind::Brief => "You are a senior hedge fund analyst. Output raw JSON ONLY.",
            SummaryKind::Anomalies => "You are a senior quantitative analyst. Output raw JSON ONLY.",
        }
    }

    /// Object key the answer is expected under.
    fn answer_key(self) -> &'static str {
        match self {
            SummaryKind::Brief => "insights",
            SummaryKind::Anomalies => "anomalies",
        }
    }

    pub fn prompt(self, trades: &[Trade]) -> String {
        match self {
            SummaryKind::Brief => brief_prompt(trades),
            SummaryKind::Anomalies => anomaly_prompt(trades),
        }
    }
}

fn rank_label(t: &Trade) -> String {
    t.rank.map_or_else(|| "N/A".to_string(), |r| r.to_string())
}

fn millions(notional: f64) -> f64 {
    notional / 1_000_000.0
}

pub fn brief_prompt(trades: &[Trade]) -> String {
    let data: Vec<String> = top_by(trades, SortKey::Value, BRIEF_TOP_VALUE)
        .into_iter()
        .map(|t| {
            format!(
                "{} ({}): ${:.1}M, RS (Size):{:.1}, Rank:{}",
                t.ticker,
                t.sector,
                millions(t.notional),
                t.relative_size,
                rank_label(t)
            )
        })
        .collect();

    format!(
        "Analyze this list of institutional trades. RS = Relative Size (how big this trade is compared to ticker average).
Identify 3 critical insights regarding sector rotation (where money is flowing) and unusual block sizes (High RS).

Format Requirements:
- Return a JSON object with a key \"insights\" containing 3 strings.
- Keep each string under 20 words.
- Professional, hedge-fund analyst tone.

Data:
{}",
        data.join("\n")
    )
}

/// Largest by notional, largest by RS and best ranked, without repeats.
pub fn anomaly_subset(trades: &[Trade]) -> Vec<&Trade> {
    let mut ranked: Vec<&Trade> = trades.iter().filter(|t| t.rank.is_some()).collect();
    ranked.sort_by(|a, b| SortKey::Rank.compare(a, b));
    ranked.truncate(ANOMALY_TOP_RANKED);

    let mut seen = HashSet::new();
    top_by(trades, SortKey::Value, ANOMALY_TOP_VALUE)
        .into_iter()
        .chain(top_by(trades, SortKey::RelativeSize, ANOMALY_TOP_RS))
        .chain(ranked)
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

pub fn anomaly_prompt(trades: &[Trade]) -> String {
    let data: Vec<String> = anomaly_subset(trades)
        .into_iter()
        .map(|t| {
            format!(
                "Ticker:{}, Sec:{}, Ind:{}, Val:${:.1}M, RS(Size):{:.1}, Rank:{}, TP:{}",
                t.ticker,
                t.sector,
                t.industry,
                millions(t.notional),
                t.relative_size,
                rank_label(t),
                t.trade_price
            )
        })
        .collect();

    format!(
        "Role: Senior Quantitative Analyst
Objective: Perform a cross-sector correlation analysis on the provided trade data to identify institutional anomalies.
NOTE: RS = Relative Size. A High RS means this specific trade block was massive compared to the ticker's average trade size.

Data:
{}

Output Requirements:
Return a JSON object with a key \"anomalies\" containing exactly 3 strings.
Each string MUST start with one of these tags:
\"[Cluster Alert]: \"
\"[Institutional Floor]: \"
\"[Sector Rotation]: \"

Keep descriptions professional, punchy, and under 25 words.",
        data.join("\n")
    )
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Pull the first choice's message text out of a chat-completions body.
pub fn completion_content(body: &str) -> Result<String> {
    let completion: ChatCompletion = serde_json::from_str(body)?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| FlowError::SummarizerResponse("completion has no content".to_string()))
}

/// Accepts a bare JSON array or an object holding one under `key` (or as its
/// first value). Non-string items are skipped; at most five are kept.
pub fn parse_insights(content: &str, key: &str) -> Result<Vec<String>> {
    let parsed: Value = serde_json::from_str(content.trim())?;

    let items = match &parsed {
        Value::Array(items) => items,
        Value::Object(map) => match map.get(key).or_else(|| map.values().next()) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(FlowError::SummarizerResponse(format!(
                    "answer object has no '{}' list",
                    key
                )))
            }
        },
        _ => {
            return Err(FlowError::SummarizerResponse(
                "answer is neither a list nor an object".to_string(),
            ))
        }
    };

    Ok(items
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .take(MAX_INSIGHTS)
        .collect())
}

pub struct ChatSummarizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    kind: SummaryKind,
}

impl ChatSummarizer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, model: Option<String>) -> Self {
        ChatSummarizer {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            kind: SummaryKind::default(),
        }
    }

    pub fn with_kind(mut self, kind: SummaryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn send_chat(&self, system: &str, prompt: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let data = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "response_format": { "type": "json_object" }
        });

        let mut request = self.client.post(&self.endpoint).headers(headers).json(&data);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(FlowError::SummarizerStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, trades: &[Trade]) -> Result<Vec<String>> {
        let prompt = self.kind.prompt(trades);
        debug!(kind = ?self.kind, records = trades.len(), model = %self.model, "requesting summary");

        let body = self.send_chat(self.kind.system_prompt(), &prompt).await?;
        let content = completion_content(&body)?;
        parse_insights(&content, self.kind.answer_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::test_support::trade;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer exactly one HTTP request with `status` and `body`; the handle
    /// yields the raw request that was received.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + len {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/v1/chat/completions", addr), handle)
    }

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn completion(content: &str) -> String {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] }).to_string()
    }

    fn batch() -> Vec<Trade> {
        let mut a = trade("NVDA", 188.12, 261_905_931.0, 19.87);
        a.sector = "Technology".to_string();
        let mut b = trade("QGEN", 48.94, 78_975_957.0, 31.09);
        b.rank = Some(3);
        vec![a, b]
    }

    #[test]
    fn test_parse_insights_shapes() {
        assert_eq!(parse_insights(r#"["a", "b"]"#, "insights").unwrap(), vec!["a", "b"]);
        assert_eq!(
            parse_insights(r#"{"insights": ["x", 3, "y"]}"#, "insights").unwrap(),
            vec!["x", "y"]
        );
        // falls back to the first value when the expected key is missing
        assert_eq!(parse_insights(r#"{"notes": ["z"]}"#, "anomalies").unwrap(), vec!["z"]);
        assert_eq!(
            parse_insights(r#"["1","2","3","4","5","6","7"]"#, "insights").unwrap().len(),
            5
        );
        assert!(parse_insights(r#"{"insights": "flat"}"#, "insights").is_err());
        assert!(parse_insights("42", "insights").is_err());
        assert!(parse_insights("not json", "insights").is_err());
    }

    #[test]
    fn test_completion_content() {
        assert_eq!(completion_content(&completion("[\"a\"]")).unwrap(), "[\"a\"]");
        assert!(completion_content(r#"{"choices": []}"#).is_err());
    }

    #[test]
    fn test_prompts_carry_trade_lines() {
        let trades = batch();
        let brief = brief_prompt(&trades);
        assert!(brief.contains("NVDA (Technology): $261.9M, RS (Size):19.9, Rank:N/A"));
        assert!(brief.contains("QGEN (Industrials): $79.0M, RS (Size):31.1, Rank:3"));

        let anomalies = anomaly_prompt(&trades);
        assert!(anomalies.contains("Ticker:QGEN, Sec:Industrials, Ind:Machinery, Val:$79.0M"));
        assert!(anomalies.contains("[Cluster Alert]"));
    }

    #[test]
    fn test_anomaly_subset_has_no_repeats() {
        let trades = batch();
        // both trades appear in every sub-list
        assert_eq!(anomaly_subset(&trades).len(), 2);
    }

    #[tokio::test]
    async fn test_chat_summarizer_round_trip() {
        let (url, server) = serve_once("200 OK", completion(r#"{"anomalies": ["[Cluster Alert]: semis"]}"#)).await;
        let summarizer = ChatSummarizer::new(url, Some("secret".to_string()), None)
            .with_kind(SummaryKind::Anomalies)
            .with_client(local_client());

        let insights = summarizer.summarize(&batch()).await.unwrap();
        assert_eq!(insights, vec!["[Cluster Alert]: semis"]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains(DEFAULT_MODEL));
    }

    #[tokio::test]
    async fn test_chat_summarizer_http_error() {
        let (url, server) = serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#.to_string()).await;
        let summarizer = ChatSummarizer::new(url, None, Some("test-model".to_string())).with_client(local_client());

        let err = summarizer.summarize(&batch()).await.unwrap_err();
        assert!(matches!(err, FlowError::SummarizerStatus { status: 429, .. }));
        server.await.unwrap();
    }
}
