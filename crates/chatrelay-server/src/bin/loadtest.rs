//! Fires concurrent streaming chat requests at a running relay and reports
//! how many completed.

use anyhow::{bail, Result};
use clap::Parser;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "chatrelay-loadtest")]
#[command(about = "Load test for the ChatRelay /chat endpoint")]
struct Cli {
    /// URL of the chat endpoint
    #[arg(long, default_value = "http://localhost:8080/chat")]
    url: String,

    /// Number of concurrent requests
    #[arg(short = 'c', long, default_value_t = 50)]
    concurrency: usize,

    /// Delay between starting consecutive requests
    #[arg(long, default_value_t = 500)]
    stagger_ms: u64,

    /// Shared secret, if the relay requires one
    #[arg(long)]
    api_key: Option<String>,
}

async fn send_request(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
) -> Result<()> {
    let payload = serde_json::json!({
        "messages": [{ "role": "user", "content": "Hello load test" }],
        "stream": true,
    });

    let mut request = client.post(url).json(&payload);
    if let Some(key) = api_key {
        request = request.header("X-API-Key", key);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        bail!("status code {}", status.as_u16());
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        chunk?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    println!(
        "Starting load test against {} with {} concurrent requests...",
        cli.url, cli.concurrency
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let success = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let mut handles = Vec::with_capacity(cli.concurrency);
    for id in 0..cli.concurrency {
        let client = client.clone();
        let url = cli.url.clone();
        let api_key = cli.api_key.clone();
        let success = Arc::clone(&success);
        let failed = Arc::clone(&failed);

        handles.push(tokio::spawn(async move {
            match send_request(&client, &url, api_key.as_deref()).await {
                Ok(()) => {
                    success.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    println!("[Req {}] Failed: {}", id, e);
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));

        tokio::time::sleep(Duration::from_millis(cli.stagger_ms)).await;
    }

    for handle in handles {
        handle.await?;
    }

    let failed = failed.load(Ordering::Relaxed);
    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", cli.concurrency);
    println!("Success: {}", success.load(Ordering::Relaxed));
    println!("Failed: {}", failed);
    println!("Total Duration: {:?}", start.elapsed());

    if failed == 0 {
        println!("Status: PASSED");
    } else {
        println!("Status: COMPLETED (with errors)");
    }
    Ok(())
}
