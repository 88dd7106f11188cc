use serde::Serialize;
use std::error::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use block_radar::config::AppConfig;
use block_radar::ingest::read_csv_file;
use block_radar::query::{top_by, SortKey};
use block_radar::summarizer::{ChatSummarizer, Summarizer};
use block_radar::{layout_sectors, run, sector_leaderboard, Dataset, FlowError, MoveTable, Rect, Trade};

const LEADERBOARD_SECTORS: usize = 5;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Wire name of a tag, e.g. `SYMPATHY_PLAY`.
fn label<T: Serialize>(tag: &T) -> String {
    serde_json::to_value(tag)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn annotations(t: &Trade) -> String {
    let mut notes = Vec::new();
    if let Some(tag) = &t.behavioral_tag {
        notes.push(label(tag));
    }
    if let Some(anchor) = &t.gravity_anchor {
        notes.push(format!("ANCHOR x{}", anchor.cluster_count));
    }
    if t.shadow_cluster {
        notes.push("SHADOW".to_string());
    }
    if let Some(ctx) = &t.context_overlay {
        notes.push(format!("{}/{}", label(&ctx.tag), label(&ctx.direction)));
    }
    notes.join(" ")
}

fn print_trade(t: &Trade) {
    let rank = t.rank.map_or_else(|| "-".to_string(), |r| r.to_string());
    println!(
        "  {} {:<6} ${:>8.1}M  RS {:>6.2}  R {:>3}  force {:>6.2}  def {:>2}  {:<10} {}",
        t.fingerprint,
        t.ticker,
        t.notional / 1_000_000.0,
        t.relative_size,
        rank,
        t.whale_force_score,
        t.defense_score,
        label(&t.sentiment_category),
        annotations(t)
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = AppConfig::from_env()?;
    let input = config
        .input
        .clone()
        .ok_or_else(|| FlowError::Config("BLOCK_RADAR_INPUT is not set".to_string()))?;

    let rows = read_csv_file(&input)?;
    info!(path = %input.display(), rows = rows.len(), "read batch");

    let mut dataset = Dataset::new();
    match config.date {
        Some(date) => dataset.insert_batch(date, rows),
        None => {
            dataset.insert_rows(rows);
        }
    }

    let analysis = run(&dataset);
    let Some(date) = config.date.or_else(|| analysis.available_dates().first().copied()) else {
        println!("No usable rows in {}", input.display());
        return Ok(());
    };

    let oracle = config.signals.as_ref().map(|p| MoveTable::load(p)).unwrap_or_default();
    let view = analysis.with_context(date, &oracle, config.signal_fallback)?;

    println!("Session {} | correlated asset move {:+.2}%", view.date, view.signal_move);
    println!(
        "{} records, {} anchors, {} shadow members",
        view.trades.len(),
        view.trades.iter().filter(|t| t.is_anchor()).count(),
        view.trades.iter().filter(|t| t.shadow_cluster).count()
    );

    println!("\nSector leaderboard:");
    for (i, (sector, value)) in sector_leaderboard(&view.trades, LEADERBOARD_SECTORS).iter().enumerate() {
        println!("  {}. {:<28} ${:.1}M", i + 1, sector, value / 1_000_000.0);
    }

    println!("\nTop {} by whale force:", config.top);
    for t in top_by(&view.trades, SortKey::Force, config.top) {
        print_trade(t);
    }

    println!("\nSector map (100 x 100):");
    for tile in layout_sectors(&view.trades, Rect::new(0.0, 0.0, 100.0, 100.0)) {
        println!(
            "  {:<28} x {:>5.1} y {:>5.1} w {:>5.1} h {:>5.1}  top {}",
            tile.key,
            tile.rect.x,
            tile.rect.y,
            tile.rect.width,
            tile.rect.height,
            tile.top_ticker.as_deref().unwrap_or("-")
        );
    }

    if let Some(endpoint) = &config.summary {
        let summarizer = ChatSummarizer::new(endpoint.url.clone(), endpoint.api_key.clone(), endpoint.model.clone());
        match summarizer.summarize(&view.trades).await {
            Ok(lines) => {
                println!("\nBrief:");
                for line in lines {
                    println!("  - {}", line);
                }
            }
            Err(e) => warn!(error = %e, "summary unavailable"),
        }
    }

    Ok(())
}
