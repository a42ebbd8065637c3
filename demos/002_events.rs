//! Event listeners.
//!
//! Demonstrates:
//! - Raw and typed event listeners
//! - Waiting for a lifecycle event after navigation
//! - Removing a listener
//!
//! Usage:
//!   cargo run --example 002_events
//!   cargo run --example 002_events -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, Result, bail};
use common::Args;
use devtools_rpc::RpcClient;
use devtools_rpc::domains::Page;
use serde::Deserialize;
use tokio::sync::mpsc;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct FrameNavigated {
    frame: Frame,
}

#[derive(Debug, Deserialize)]
struct Frame {
    id: String,
    url: String,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 002: Events ===\n");

    let client = RpcClient::builder()
        .discover(&args.http_base)
        .await
        .context("connect")?;

    // ========================================================================
    // Register Listeners
    // ========================================================================

    println!("[1] Registering listeners...");

    let (loaded_tx, mut loaded_rx) = mpsc::unbounded_channel();
    let load_listener = client.add_event_listener("Page", "loadEventFired", move |event| {
        let _ = loaded_tx.send(event.params["timestamp"].clone());
    });

    let navigated = client.add_typed_listener("Page", "frameNavigated", |event: FrameNavigated| {
        println!("    frameNavigated: {} -> {}", event.frame.id, event.frame.url);
    });

    println!("    ✓ 2 listeners\n");

    // ========================================================================
    // Navigate
    // ========================================================================

    println!("[2] Navigating and waiting for load...");

    let page = client.domain::<Page>();
    page.enable().await?;
    page.navigate("https://example.com".into()).await?;

    match tokio::time::timeout(Duration::from_secs(10), loaded_rx.recv()).await {
        Ok(Some(timestamp)) => println!("    ✓ Loaded at {timestamp}\n"),
        Ok(None) => bail!("connection closed before load"),
        Err(_) => bail!("no loadEventFired within 10s"),
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("[3] Removing listeners...");

    client.remove_event_listener(load_listener);
    client.remove_event_listener(navigated);
    page.reload(None).await?;

    println!("    ✓ Reload produced no output\n");

    common::wait_for_exit(args.no_wait).await;
    client.close().await;

    Ok(())
}
