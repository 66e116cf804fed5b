use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use redrive::{shutdown_channel, MessageModel, Processor, Queue, QueueSettings, SqsTransport};

mod config;
mod reader;

#[tokio::main]
pub async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = Cli::parse().run().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

#[derive(Debug, Parser)]
#[command(name = "redrive")]
#[command(about = "provision, feed and drain an SQS work queue with a dead letter queue", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    aws: config::AwsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the dead letter queue and the queue, print both URLs
    Provision { name: String },
    /// Send a JSON payload, or one payload per stdin line when omitted
    Send {
        name: String,
        payload: Option<String>,
    },
    /// Process messages, printing each JSON body, until Ctrl-C
    Work {
        name: String,
        /// Number of concurrent processors
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },
    /// Print messages waiting on the dead letter queue without removing them
    DeadLetters {
        name: String,
        /// Maximum number of messages to print
        #[arg(long, default_value_t = 10)]
        max: usize,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let transport = Arc::new(SqsTransport::from_config(self.aws.load().await));

        match self.command {
            Commands::Provision { name } => {
                let queue = Queue::open(name, transport, QueueSettings::default()).await?;
                println!("queue: {}", queue.url().unwrap_or_default());
                println!("dead letter queue: {}", queue.dead_letter_url().unwrap_or_default());
            }
            Commands::Send { name, payload } => {
                let queue = Queue::open(name, transport, QueueSettings::default()).await?;
                match payload {
                    Some(payload) => {
                        let message_id = send_json(&queue, &payload).await?;
                        println!("{message_id}");
                    }
                    None => send_lines(&queue).await?,
                }
            }
            Commands::Work { name, workers } => {
                let queue = Queue::open(name, transport, QueueSettings::default()).await?;
                work(queue, workers).await?;
            }
            Commands::DeadLetters { name, max } => {
                let queue = Queue::open(name, transport, QueueSettings::default()).await?;
                for _ in 0..max {
                    let Some(message) = queue.receive_dead_letter().await? else {
                        break;
                    };
                    println!("{}", serde_json::to_string(&MessageModel::from(&message))?);
                }
            }
        }

        Ok(())
    }
}

async fn send_json(queue: &Queue, payload: &str) -> anyhow::Result<String> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("payload is not valid JSON")?;
    Ok(queue.send_message(&payload).await?)
}

async fn send_lines(queue: &Queue) -> anyhow::Result<()> {
    let (reader, mut lines) = reader::concurrent_lines(tokio::io::stdin(), 100);

    let mut sent: usize = 0;
    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        match send_json(queue, &line).await {
            Ok(message_id) => {
                println!("{message_id}");
                sent += 1;
            }
            Err(e) => log::error!(line:% = line, error:% = format!("{e:#}"); "Skipping line"),
        }
    }
    reader.await?;

    log::info!(queue_name:% = queue.name(), sent = sent; "Finished sending stdin");
    Ok(())
}

async fn print_body(_queue: Queue, body: serde_json::Value) -> anyhow::Result<()> {
    println!("{body}");
    Ok(())
}

async fn work(queue: Queue, workers: usize) -> anyhow::Result<()> {
    let (stop, token) = shutdown_channel();
    let handles: Vec<_> = (0..workers.max(1))
        .map(|_| Processor::from_fn(queue.clone(), print_body).spawn(token.clone()))
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    log::info!(queue_name:% = queue.name(); "Shutting down processors");
    stop.shutdown();

    for handle in handles {
        handle.await??;
    }
    Ok(())
}
