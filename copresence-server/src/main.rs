use anyhow::{Context, Result};
use clap::Parser;
use copresence_server::RelayService;
use copresence_signal::MemoryStore;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "copresence-relay")]
#[command(about = "Presence, room and mailbox relay for copresence peers")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Log filter, e.g. `info` or `copresence_server=debug`.
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log)
        .with_context(|| format!("Invalid log filter '{}'", args.log))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let service = RelayService::new(MemoryStore::new());
    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(addr = %listener.local_addr()?, "relay listening on /relay");

    axum::serve(listener, service.router())
        .await
        .context("Relay server stopped")?;
    Ok(())
}
