use clap::Parser;
use log::info;
use relay::network::{RelayConfig, RelayServer};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Maximum number of subscribed sockets
    #[arg(short = 'm', long, default_value = "256")]
    max_subscribers: usize,

    /// Seconds of silence before a subscriber is dropped
    #[arg(short = 't', long, default_value_t = shared::SUBSCRIBER_TIMEOUT_SECS)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = RelayConfig {
        max_subscribers: args.max_subscribers,
        subscriber_timeout: Duration::from_secs(args.timeout),
    };
    info!(
        "Starting relay: {} subscribers max, {}s timeout",
        config.max_subscribers, args.timeout
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut relay = RelayServer::bind(&address, config).await?;

    tokio::select! {
        result = relay.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
