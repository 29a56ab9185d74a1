use clap::Parser;
use motorpool::client::console::Console;
use motorpool::client::{ClientConfig, ClientSession};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "motorpool-client")]
#[command(about = "Interactive vehicle collection client", long_about = None)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 6900)]
    port: u16,

    /// Seconds to wait for a response before giving up on a request
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Seconds between reconnect attempts
    #[arg(long, default_value_t = 5)]
    retry_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they do not interleave with the prompt.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motorpool=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ClientConfig::new(args.host, args.port);
    config.response_timeout = std::time::Duration::from_secs(args.timeout_secs);
    config.reconnect_delay = std::time::Duration::from_secs(args.retry_secs);

    ClientSession::new(config, Console::spawn_stdin()).run().await
}
