//! Thumbla server binary

use clap::Parser;
use std::path::PathBuf;
use thumbla::api::server::{run, AppContext};
use thumbla::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Thumbla - HTTP image transformation gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "THUMBLACFG", value_name = "FILE")]
    config: PathBuf,

    /// Host to listen on
    #[arg(short = 'o', long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Listening port
    #[arg(short, long, env = "PORT", default_value_t = 1323)]
    port: u16,
}

fn init_logging(debug_level: &str) {
    let level = match debug_level {
        "" => "info",
        other => other,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("thumbla={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    init_logging(&config.debug_level);

    info!("Thumbla starting...");

    let ctx = AppContext::from_config(config).await;

    run(ctx, &args.host, args.port).await?;

    Ok(())
}
