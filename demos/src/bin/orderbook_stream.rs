//! Demo: Synchronized Order Book Stream
//!
//! Showcases: snapshot + diff synchronization, gap recovery, ranked levels
//!
//! Run: cargo run --bin orderbook_stream -- [SYMBOL] [LIMIT]
//!
//! Set DEPTH_REST_URL / DEPTH_WS_URL to point at another deployment.

use colored::*;
use depth_sync::{
    ConnectionEvent, DepthClient, Endpoint, SyncConfig, SyncEvent, TopLevels, UpdateSpeed,
};
use std::io::Write;
use std::time::{Duration, Instant};

const RUN_FOR: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let symbol = args.next().unwrap_or_else(|| "BTCUSDT".to_string());
    let limit = args
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10);

    println!("{}", "═".repeat(60).cyan());
    println!("{}", "  SYNCHRONIZED ORDER BOOK".cyan().bold());
    println!("{}", format!("  {} - top {} levels", symbol, limit).cyan());
    println!("{}", "═".repeat(60).cyan());
    println!();

    let endpoint = Endpoint::from_env();
    let config = SyncConfig::new()
        .with_endpoint(endpoint.clone())
        .with_speed(UpdateSpeed::Ms100)
        .with_limit(limit);
    let client = DepthClient::new(config)?;
    let mut events = client.events().expect("events() already called");

    client.subscribe(symbol.as_str()).await?;
    println!("{} Using {}", "✓".green(), endpoint);

    let start = Instant::now();
    let mut update_count = 0u64;

    while start.elapsed() < RUN_FOR {
        let event = match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => continue,
        };

        match event {
            SyncEvent::Synchronized {
                cursor,
                replayed,
                discarded,
                ..
            } => {
                println!(
                    "\n{} Synchronized at {} ({} replayed, {} discarded)\n",
                    "✓".green(),
                    cursor,
                    replayed,
                    discarded
                );
                print_levels(&client.top_levels());
                println!();
            }
            SyncEvent::BookUpdated { cursor, .. } => {
                update_count += 1;
                let view = client.view();
                if let Some(spread) = view.spread() {
                    let elapsed = start.elapsed().as_secs();
                    print!("\r\x1B[K");
                    print!(
                        "  {} {:.2}  {} {:.2}  {} {:.2} ({:.4}%)  ",
                        "BID:".yellow(),
                        spread.bid,
                        "ASK:".yellow(),
                        spread.ask,
                        "SPREAD:".green(),
                        spread.absolute,
                        spread.percentage
                    );
                    print!(
                        "│ {} {}  │ {} {}/s",
                        "Cursor:".dimmed(),
                        cursor,
                        "Rate:".dimmed(),
                        if elapsed > 0 { update_count / elapsed } else { 0 }
                    );
                    std::io::stdout().flush()?;
                }
            }
            SyncEvent::GapDetected {
                cursor,
                first_update_id,
                ..
            } => {
                println!(
                    "\n{} Gap: book at {}, next event starts at {}",
                    "!".yellow(),
                    cursor,
                    first_update_id
                );
            }
            SyncEvent::Resyncing { .. } => {
                println!("{} Resyncing...", "↻".yellow());
            }
            SyncEvent::SnapshotFailed {
                error, retryable, ..
            } => {
                println!("\n{} Snapshot failed: {}", "✗".red(), error);
                if !retryable {
                    break;
                }
                client.retry().await?;
            }
            SyncEvent::MalformedUpdate { error, .. } => {
                println!("\n{} Malformed update: {}", "!".yellow(), error);
            }
            SyncEvent::Connection(ConnectionEvent::Reconnecting { attempt, delay }) => {
                println!(
                    "\n{} Reconnecting (attempt {}, in {:?})",
                    "↻".yellow(),
                    attempt,
                    delay
                );
            }
            SyncEvent::Connection(ConnectionEvent::ReconnectFailed { error }) => {
                println!("\n{} Stream gave up: {}", "✗".red(), error);
                break;
            }
            SyncEvent::Connection(_) => {}
        }
    }

    client.shutdown().await;
    println!(
        "\n\n{} Demo complete. {} updates processed.",
        "✓".green(),
        update_count
    );
    Ok(())
}

fn print_levels(levels: &TopLevels) {
    println!(
        "  {:>16} {:>16} {:>18}",
        "PRICE".dimmed(),
        "QTY".dimmed(),
        "CUM NOTIONAL".dimmed()
    );
    for level in levels.asks.iter().rev() {
        println!(
            "  {:>16} {:>16} {:>18}",
            level.price.to_string().red(),
            level.qty,
            level.cumulative_notional.round_dp(2)
        );
    }
    if let Some(spread) = levels.spread() {
        println!("  {}", format!("── mid {} ──", spread.mid).dimmed());
    }
    for level in &levels.bids {
        println!(
            "  {:>16} {:>16} {:>18}",
            level.price.to_string().green(),
            level.qty,
            level.cumulative_notional.round_dp(2)
        );
    }
}
