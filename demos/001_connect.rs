//! Endpoint discovery and typed domain calls.
//!
//! Demonstrates:
//! - Discovering browser and page endpoints over HTTP
//! - Calling `Target`, `Page` and `Runtime` through domain interfaces
//! - Reading per-connection metrics
//! - Closing the client
//!
//! Start a browser first:
//!   chromium --headless --remote-debugging-port=9222
//!
//! Usage:
//!   cargo run --example 001_connect
//!   cargo run --example 001_connect -- http://127.0.0.1:9333
//!   cargo run --example 001_connect -- --debug --no-wait

mod common;

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Context, Result};
use common::Args;
use devtools_rpc::RpcClient;
use devtools_rpc::client::discover;
use devtools_rpc::domains::{Page, Runtime, Target};

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
    println!("=== 001: Connect ===\n");

    // ========================================================================
    // Discover Endpoints
    // ========================================================================

    println!("[1] Discovering endpoints at {}...", args.http_base);

    let endpoints = discover(&args.http_base)
        .await
        .with_context(|| format!("is a browser listening on {}?", args.http_base))?;

    println!("    Browser: {}", endpoints.browser);
    println!("    Page:    {}", endpoints.page);
    println!("    ✓ Endpoints found\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[2] Connecting...");

    let client = RpcClient::builder()
        .browser_url(endpoints.browser)
        .page_url(endpoints.page)
        .connect()
        .await
        .context("connect")?;

    println!("    ✓ Connected\n");

    // ========================================================================
    // Browser Channel
    // ========================================================================

    println!("[3] Listing targets (browser channel)...");

    let targets = client.domain::<Target>().get_targets().await?;
    for target in &targets.target_infos {
        println!("    {} {} {}", target.target_type, target.target_id, target.url);
    }
    println!("    ✓ {} targets\n", targets.target_infos.len());

    // ========================================================================
    // Page Channel
    // ========================================================================

    println!("[4] Navigating (page channel)...");

    let page = client.domain::<Page>();
    page.enable().await?;
    let frame_id = page.navigate("https://example.com".into()).await?;

    println!("    ✓ Frame {frame_id}\n");

    println!("[5] Evaluating script...");

    let evaluation = client
        .domain::<Runtime>()
        .evaluate("navigator.userAgent".into(), Some(true))
        .await?;

    println!("    userAgent: {}", evaluation.result["value"]);
    println!("    ✓ Evaluated\n");

    // ========================================================================
    // Shutdown
    // ========================================================================

    let metrics = client.metrics();
    println!(
        "[6] Calls: {} ok, {} failed, {} timed out",
        metrics.calls_succeeded, metrics.rpc_failures, metrics.timeouts
    );

    common::wait_for_exit(args.no_wait).await;

    client.close().await;
    println!("    ✓ Client closed");

    Ok(())
}
