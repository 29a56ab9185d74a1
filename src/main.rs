use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use motorpool::commands::{standard_registry, VehicleCollection};
use motorpool::server::{Dispatcher, MemoryAuthenticator, Server, DEFAULT_WORKERS};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "motorpool-server")]
#[command(about = "Vehicle collection server", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 6900)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Maximum concurrently executing command handlers
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motorpool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let collection = Arc::new(VehicleCollection::new());
    let registry = Arc::new(standard_registry(collection));
    let authenticator = Arc::new(MemoryAuthenticator::new());
    let dispatcher = Arc::new(Dispatcher::new(registry, authenticator, args.workers));

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    let server = Server::bind(addr, dispatcher).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}
