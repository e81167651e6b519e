#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use clap::Parser;
use emissary_common::{Message, MessageId, logging};

/// Dispatch email through a chain of providers with retry, fallback and rate limiting
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (RON). Overrides `EMISSARY_CONFIG` and the default locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send a single message to this recipient instead of the configured messages
    #[arg(long)]
    to: Option<String>,

    /// Message id used for deduplication. Generated when omitted.
    #[arg(long, requires = "to")]
    id: Option<String>,

    #[arg(long, requires = "to", default_value = "")]
    subject: String,

    #[arg(long, requires = "to", default_value = "")]
    body: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init();

    let mut emissary = emissary::config::resolve(args.config)?;

    if let Some(to) = args.to {
        let id = args.id.map_or_else(MessageId::generate, MessageId::from);
        emissary.messages = vec![Message::new(id, to, args.subject, args.body)];
    }

    for (id, status) in emissary.run().await? {
        match status {
            Some(status) => println!("{id}: {status}"),
            None => println!("{id}: not attempted"),
        }
    }

    Ok(())
}
