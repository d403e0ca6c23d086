//! End-to-end throughput benchmark for tidepool.
//!
//! Measures PUBLISH round trips over real TCP connections against a running
//! server, then checks one topic's listing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tidepool_client::{Client, ConsumeOutcome};
use tokio::sync::Barrier;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let addr = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    println!("tidepool end-to-end throughput benchmark");
    println!("Make sure the server is running: cargo run --release --bin tidepool");
    println!();

    run_publish_benchmark(num_clients, &addr).await;
}

async fn run_publish_benchmark(num_clients: usize, addr: &str) {
    println!("Publish benchmark: {} clients against {}", num_clients, addr);
    println!("Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let publish_count = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();

    for client_id in 0..num_clients {
        let count = Arc::clone(&publish_count);
        let barrier = Arc::clone(&barrier);
        let addr = addr.to_string();

        let handle = tokio::spawn(async move {
            if let Err(e) = run_client(client_id, &addr, count, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        });
        handles.push(handle);
    }

    barrier.wait().await;
    println!("All {} clients connected", num_clients);

    println!("Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    publish_count.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total = publish_count.load(Ordering::SeqCst);

    let per_sec = total as f64 / elapsed.as_secs_f64();

    println!();
    println!("Results");
    println!("  Clients:        {:>10}", num_clients);
    println!("  Duration:       {:>10.2}s", elapsed.as_secs_f64());
    println!("  Publishes:      {:>10}", total);
    println!("  Throughput:     {:>10.0} publish/s", per_sec);
    println!("  Per-Client:     {:>10.0} publish/s", per_sec / num_clients as f64);

    for handle in handles {
        handle.abort();
    }

    match listing_size(addr).await {
        Ok(Some(len)) => println!("  bench-0 holds:  {:>10} messages", len),
        Ok(None) => println!("  bench-0 was never published to"),
        Err(e) => eprintln!("Failed to read bench-0: {}", e),
    }
}

async fn run_client(
    client_id: usize,
    addr: &str,
    publish_count: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let connected = Client::connect(addr).await;

    // Always reach the barrier so the coordinator is not left waiting.
    barrier.wait().await;
    let mut client = connected?;

    let topic = format!("bench-{client_id}");
    let payload = "x".repeat(64);

    loop {
        client.publish(&topic, &payload).await?;
        publish_count.fetch_add(1, Ordering::Relaxed);
    }
}

async fn listing_size(
    addr: &str,
) -> Result<Option<usize>, Box<dyn std::error::Error + Send + Sync>> {
    let mut client = Client::connect(addr).await?;
    let outcome = client.consume("bench-0").await?;
    client.close().await?;

    Ok(match outcome {
        ConsumeOutcome::Messages(messages) => Some(messages.len()),
        ConsumeOutcome::TopicNotFound => None,
    })
}
