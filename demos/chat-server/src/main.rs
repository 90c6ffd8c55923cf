use chatrelay::prelude::*;
use chatrelay::DEFAULT_BIND_ADDR;
use tracing_subscriber::EnvFilter;

/// Parses a comma-separated room list, skipping blank entries.
fn parse_rooms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("CHATRELAY_BIND").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    let mut builder = ChatServer::builder().bind(&bind);
    if let Ok(raw) = std::env::var("CHATRELAY_ROOMS") {
        builder = builder.rooms(parse_rooms(&raw));
    }

    let server = builder.build().await?;
    tracing::info!(addr = %server.local_addr()?, "starting chat server");

    server.run().await?;
    Ok(())
}
