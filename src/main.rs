use clap::Parser;
use tracing_subscriber::EnvFilter;

use serverpacker::cli::{self, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,serverpacker=debug")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = cli::run(cli).await {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
