//! # tidepool-cli
//!
//! Interactive client for a tidepool broker.
//!
//! ```bash
//! # Connect to localhost:8080
//! tidepool-cli
//!
//! # Connect elsewhere
//! tidepool-cli 10.0.0.5:9000
//! ```

use anyhow::{Context, Result};
use std::io::Write;
use tidepool_client::{Client, ConsumeOutcome, PublishOutcome};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "localhost:8080";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let mut client = Client::connect(&addr)
        .await
        .with_context(|| format!("Error connecting to server at {addr}"))?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(command) = prompt(&mut input, "Enter command (PUBLISH/CONSUME/EXIT): ").await?
        else {
            break;
        };

        match command.trim().to_uppercase().as_str() {
            "PUBLISH" => {
                let Some(topic) = prompt(&mut input, "Enter topic name: ").await? else {
                    break;
                };
                let Some(content) = prompt(&mut input, "Enter message content: ").await? else {
                    break;
                };

                match client.publish(&topic, &content).await? {
                    PublishOutcome::Published => {
                        println!("Server response: Message published successfully.");
                    }
                    PublishOutcome::InvalidTopicName => {
                        println!("Server response: Invalid topic name.");
                    }
                }
            }
            "CONSUME" => {
                let Some(topic) = prompt(&mut input, "Enter topic name: ").await? else {
                    break;
                };

                match client.consume(&topic).await? {
                    ConsumeOutcome::Messages(messages) => {
                        println!("Messages from the server:");
                        for message in messages {
                            println!("{message}");
                        }
                    }
                    ConsumeOutcome::TopicNotFound => {
                        println!("Server response: Topic not found.");
                    }
                }
            }
            "EXIT" => {
                println!("Exiting.");
                break;
            }
            other => eprintln!("Unknown command: {other}"),
        }
    }

    client.close().await?;
    Ok(())
}

/// Print `label` and read one line from stdin. `None` on end of input.
async fn prompt(input: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    input.next_line().await.context("Failed to read stdin")
}
