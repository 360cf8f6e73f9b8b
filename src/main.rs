use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{Level, error, info};

use link_cards::chat::{link_router, reap_finished};
use link_cards::config::debug_from_env;
use link_cards::{CardFactory, ChatMessage, ChatTransport, Config, ConsoleTransport};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(if debug_from_env() {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    info!("Starting link card bot");
    let config = Config::from_env();
    config.warn_missing_credentials();

    let factory = Arc::new(CardFactory::new(&config)?);
    let router = Arc::new(link_router(factory)?);
    let transport: Arc<dyn ChatTransport> = Arc::new(ConsoleTransport);

    info!("Reading chat messages from stdin, one per line");

    // Each message resolves independently on its own task
    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        reap_finished(&mut tasks);

        if line.trim().is_empty() {
            continue;
        }

        let router = router.clone();
        let transport = transport.clone();
        tasks.spawn(async move {
            let msg = ChatMessage::console(line);
            if let Some(reply) = router.publish(&msg).await
                && let Err(e) = transport.send(&reply).await
            {
                error!("Failed to deliver reply: {}", e);
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Message task panicked: {}", e);
        }
    }

    info!("Input closed, shutting down");
    Ok(())
}
